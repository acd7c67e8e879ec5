pub mod config;
pub mod error;
pub mod fetcher;
pub mod mode;
pub mod models;
pub mod remote;
pub mod resolver;
pub mod store;
pub mod wishlist;

pub use config::Config;
pub use error::{FetchError, FetchResult};
pub use fetcher::DualSourceFetcher;
pub use mode::{Mode, ModeController};
pub use models::*;
pub use remote::RemoteClient;
pub use resolver::{normalize_name, IdentityResolver};
pub use store::{FileKvStore, JsonRecordStore, KeyValueStore, RecordStore};
pub use wishlist::Wishlist;
