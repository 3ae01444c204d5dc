pub mod blog;
pub mod cache;
pub mod server;
pub mod sitemap;
pub mod state;
pub mod upstream;

pub use blog::{BlogRepository, FeaturedImageResolver};
pub use cache::TtlCache;
pub use server::{router, Server};
pub use state::{AppState, SharedState};
pub use upstream::{MemoryProfileStore, ProfileQuery, ProfileStore, RestProfileStore};
