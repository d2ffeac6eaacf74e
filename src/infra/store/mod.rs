//! Store backends.

pub mod journal;
pub mod memory;

pub use journal::JournalBackend;
pub use memory::InMemoryBackend;
