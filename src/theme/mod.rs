pub mod anchors;
pub mod injector;
pub mod jsonld;
pub mod locale;
pub mod renderer;
pub mod store;

pub use injector::{Injector, Rendered};
pub use locale::Locale;
pub use renderer::FragmentRenderer;
pub use store::TemplateStore;
