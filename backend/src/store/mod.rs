pub mod notification;
pub mod property;
pub mod storage;

pub use notification::{spawn_poller, NotificationStore, PollHandle};
pub use property::{PropertyStore, StoreError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
