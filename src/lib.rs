pub mod cli;
pub mod core;
pub mod error;
pub mod handlers;
pub mod models;
pub mod theme;
pub mod utils;

// Re-export commonly used types and traits
pub use crate::core::{router, AppState, ProfileStore, SharedState};
pub use crate::error::{SiteError, SiteResult};
pub use crate::models::{Catalog, Config, Creator};
