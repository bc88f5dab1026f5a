//! Table change notifications and the local caches they keep current.

pub mod cache;
pub mod feed;

pub use cache::{CacheUpdate, CachedRow, TableCache};
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, Notification, RowFilter, Subscription, Table};
