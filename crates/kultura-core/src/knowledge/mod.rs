//! Cultural knowledge store.

mod store;

pub use store::KnowledgeStore;
