pub mod sweep;

pub use sweep::spawn_sweeper;
