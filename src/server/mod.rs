pub mod config;
pub mod router;
pub mod types;
pub mod upload;
