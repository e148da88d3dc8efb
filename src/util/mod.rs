pub mod clock;
pub mod env;
pub mod telemetry;

use std::hint::black_box;

/// Compares two `&str`s in constant time w.r.t. their contents, so a bearer token can't be
/// guessed byte by byte from response timings
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let res = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (l, r)| acc | black_box(l ^ r));

    black_box(res) == 0
}
