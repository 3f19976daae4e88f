pub mod manager;
pub mod models;

pub use manager::*;
pub use models::*;
