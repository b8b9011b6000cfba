pub mod durable;
pub mod file;

pub use durable::{decode_value, DurableStore, MemoryStore, StoreError};
pub use file::JsonFileStore;
