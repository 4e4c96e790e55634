pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{InMemorySession, InMemoryStore, InMemoryStoreFactory};
pub use postgres::{PostgresSession, PostgresStore, PostgresStoreFactory};
pub use traits::{
    FolderClosureRepository, FolderRepository, MembershipRepository, PermissionGrantRepository,
    RelationshipRepository, Session, StorageError, Store, StoreFactory,
};
