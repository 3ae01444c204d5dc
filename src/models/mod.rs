pub mod catalog;
pub mod config;
pub mod types;

pub use catalog::{Catalog, CategoryFilters, Country, ResolvedCategory};
pub use config::Config;
pub use types::{BlogPost, Creator, Page, PostSummary, Row};
