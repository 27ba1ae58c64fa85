pub mod batch;
pub mod error;
pub mod settings;
pub mod types;
