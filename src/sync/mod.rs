// Sync module - REST + realtime backed collections
pub mod collection;
pub mod merge;

pub use collection::{CollectionSnapshot, CollectionSource, NETWORK_ERROR_MESSAGE, RemoteCollection};
pub use merge::{MergePolicy, decode_records};
