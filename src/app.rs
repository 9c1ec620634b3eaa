//! Composition root: builds the store, source, repository and work host.

use color_eyre::Result;
use std::sync::Arc;
use tracing::info;

use crate::cache::VideoStore;
use crate::config::Config;
use crate::network::{HttpPlaylistSource, PlaylistSource};
use crate::repository::VideosRepository;
use crate::work::{self, EnqueueOutcome, InProcessWorkManager, UnconstrainedDevice, WorkHost};

/// Application services, constructed once and shared by handle.
pub struct App {
  repository: VideosRepository,
  work_manager: Arc<dyn WorkHost>,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let path = config.cache.resolve_path()?;
    let store = Arc::new(VideoStore::open(&path)?);
    info!(path = %path.display(), "opened video cache");

    let source = Arc::new(HttpPlaylistSource::new(&config.playlist)?);
    let work_manager = Arc::new(InProcessWorkManager::new(Arc::new(UnconstrainedDevice)));

    Ok(Self::from_parts(store, source, work_manager))
  }

  /// Assemble from already-built parts.
  pub fn from_parts(
    store: Arc<VideoStore>,
    source: Arc<dyn PlaylistSource>,
    work_manager: Arc<dyn WorkHost>,
  ) -> Self {
    Self {
      repository: VideosRepository::new(store, source),
      work_manager,
    }
  }

  pub fn repository(&self) -> &VideosRepository {
    &self.repository
  }

  pub fn work_manager(&self) -> &dyn WorkHost {
    self.work_manager.as_ref()
  }

  /// Schedule the daily background refresh. Safe to call on every start.
  pub fn setup_recurring_work(&self) -> EnqueueOutcome {
    work::setup_recurring_work(self.work_manager.as_ref(), self.repository.clone())
  }
}
