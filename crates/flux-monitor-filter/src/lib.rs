pub mod document;
pub mod error;
pub mod filter_set;
pub mod kind;
pub mod loader;
pub mod property;
pub mod rule;

pub use document::{normalize_inline, DocumentOrigin, FilterDocument};
pub use error::FilterError;
pub use filter_set::FilterSet;
pub use kind::EntityKind;
pub use loader::{has_changed, FilterLoader, LoaderConfig, FILTER_DOCUMENT_PROPERTY};
pub use property::{FilePropertySource, MemoryPropertySource, PropertySource};
pub use rule::{MatchRule, Polarity};
