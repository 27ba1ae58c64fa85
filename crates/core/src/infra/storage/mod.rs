mod repository;

pub use repository::{Storage, DEFAULT_PROJECT};
