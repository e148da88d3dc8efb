pub mod api;
pub mod challenge;
pub mod db;
pub mod jobs;
pub mod util;
