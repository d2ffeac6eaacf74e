//! Infrastructure adapters for session and subscriber storage.

pub mod store;

pub use store::{InMemoryBackend, JournalBackend};
