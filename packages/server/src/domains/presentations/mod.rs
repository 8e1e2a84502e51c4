//! Presentation domain: templates, decks, and spec versions.

pub mod models;
pub mod store;

pub use models::{Deck, DeckVersion, Template, TemplateVersion};
pub use store::{
    DeckStore, InMemoryDeckStore, InMemoryTemplateStore, PresentationStoreError, TemplateStore,
};
