use serde::{Deserialize, Serialize};

pub mod challenge;
pub mod progress;
pub mod user_challenge;

#[inline]
const fn default_page() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    50
}

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

impl Pagination {
    /// Clamps the requested window to sane bounds, returning `(limit, offset)`.
    pub fn window(&self) -> (i64, i64) {
        let limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        let page = self.page.max(0);

        (limit, page * limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_page(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_items + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pagination_window_is_clamped() {
        let p = Pagination {
            limit: 1_000,
            page: -3,
        };
        assert_eq!(p.window(), (MAX_PAGE_SIZE, 0));

        let p = Pagination { limit: 10, page: 2 };
        assert_eq!(p.window(), (10, 20));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let res = PaginatedResponse::new(vec![1, 2, 3], 21, 10, 0);
        assert_eq!(res.total_pages, 3);

        let res: PaginatedResponse<i32> = PaginatedResponse::new(vec![], 0, 10, 0);
        assert_eq!(res.total_pages, 0);
    }
}
