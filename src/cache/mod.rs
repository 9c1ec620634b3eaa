//! Local video cache.
//!
//! - Persists videos in SQLite, one row per url
//! - Replaces a whole batch atomically
//! - Pushes the full contents to subscribers after every commit

mod observe;
mod storage;
mod types;

pub use observe::{Observer, SubscriptionId};
pub use storage::VideoStore;
pub use types::CachedVideo;
