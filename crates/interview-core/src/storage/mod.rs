pub mod file_store;
pub mod memory;
pub mod paths;
pub mod store;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use paths::StoreLayout;
pub use store::{DurableStore, SaveSlot};
