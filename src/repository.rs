//! Repository for fetching videos from the network and storing them on disk.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::cache::{Observer, VideoStore};
use crate::domain::Video;
use crate::error::{RefreshError, StorageError};
use crate::network::PlaylistSource;
use crate::transform;

/// Keeps the local cache in step with the remote playlist.
///
/// Readers always go through the cache; the network is only touched by
/// [`VideosRepository::refresh`].
#[derive(Clone)]
pub struct VideosRepository {
  store: Arc<VideoStore>,
  source: Arc<dyn PlaylistSource>,
}

impl VideosRepository {
  pub fn new(store: Arc<VideoStore>, source: Arc<dyn PlaylistSource>) -> Self {
    Self { store, source }
  }

  /// Live list of cached videos, re-derived on every cache commit.
  pub fn observe_videos(&self) -> Observer<Video> {
    self.store.observe_with(transform::as_domain_model)
  }

  /// Current cached videos.
  pub fn videos(&self) -> Result<Vec<Video>, StorageError> {
    Ok(transform::as_domain_model(&self.store.get_all()?))
  }

  /// Fetch the playlist and replace the cached copy.
  ///
  /// Any failure leaves the cache exactly as it was. The write runs on the
  /// blocking pool so the calling task is never held up by disk I/O.
  #[instrument(skip(self))]
  pub async fn refresh(&self) -> Result<(), RefreshError> {
    debug!("refreshing videos");
    let playlist = self.source.fetch_playlist().await?;
    let videos = transform::as_database_model(&playlist.videos)?;
    let count = videos.len();

    let store = Arc::clone(&self.store);
    tokio::task::spawn_blocking(move || store.upsert_all(&videos))
      .await
      .map_err(|e| StorageError::Task(e.to_string()))??;

    info!(count, "video cache refreshed");
    Ok(())
  }
}
