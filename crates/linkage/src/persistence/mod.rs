//! Contact persistence: the store gateway trait and its backends

pub mod contact_store;
pub mod entities;
pub mod memory_store;
pub mod sqlite_store;

pub use contact_store::{ContactStore, ContactUnitOfWork, StoreResult};
pub use entities::{Contact, LinkPrecedence, NewContact};
pub use memory_store::{MemoryContactStore, StoreOperation};
pub use sqlite_store::SqliteContactStore;
