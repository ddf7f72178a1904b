//! [`PersistentStore`](courier_core::PersistentStore) adapters.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
