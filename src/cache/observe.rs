//! Subscriptions to cache contents.

use futures::Stream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::error;

use super::types::CachedVideo;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type Listener = Box<dyn Fn(&[CachedVideo]) + Send + Sync>;

/// Cache contents as of one commit.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
  /// Starts at 1 and increases with every commit
  pub(crate) seq: u64,
  pub(crate) videos: Arc<Vec<CachedVideo>>,
}

struct Registration {
  id: SubscriptionId,
  /// Sequence number of the newest snapshot handed to `listener`
  delivered: Mutex<u64>,
  listener: Listener,
}

impl Registration {
  /// Call the listener unless it has already seen this or a newer snapshot.
  fn deliver(&self, snapshot: &Snapshot) {
    let mut delivered = self
      .delivered
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    if snapshot.seq <= *delivered {
      return;
    }
    *delivered = snapshot.seq;

    let listener = &self.listener;
    if catch_unwind(AssertUnwindSafe(|| listener(&snapshot.videos))).is_err() {
      error!(subscription = self.id.0, "cache listener panicked");
    }
  }
}

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub(crate) struct Subscribers {
  next_id: AtomicU64,
  registrations: Mutex<Vec<Arc<Registration>>>,
}

impl Subscribers {
  fn lock(&self) -> MutexGuard<'_, Vec<Arc<Registration>>> {
    self
      .registrations
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Add `listener` and hand it `current()`, read after registration so no
  /// commit can slip between the two.
  pub(crate) fn register(
    &self,
    listener: Listener,
    current: impl FnOnce() -> Snapshot,
  ) -> SubscriptionId {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let registration = Arc::new(Registration {
      id,
      delivered: Mutex::new(0),
      listener,
    });
    self.lock().push(Arc::clone(&registration));

    registration.deliver(&current());
    id
  }

  /// Hand `snapshot` to every listener. No lock is held while listeners run.
  pub(crate) fn notify(&self, snapshot: &Snapshot) {
    let registrations = self.lock().clone();
    for registration in registrations {
      registration.deliver(snapshot);
    }
  }

  pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
    let mut registrations = self.lock();
    let before = registrations.len();
    registrations.retain(|existing| existing.id != id);
    registrations.len() != before
  }

  pub(crate) fn len(&self) -> usize {
    self.lock().len()
  }
}

/// Live view of the cache.
///
/// Always yields the newest committed contents; snapshots superseded before
/// they were read are skipped. The first call yields the contents at
/// creation. Dropping the observer unsubscribes it.
pub struct Observer<T> {
  rx: watch::Receiver<Snapshot>,
  map: Arc<dyn Fn(&[CachedVideo]) -> Vec<T> + Send + Sync>,
}

impl<T> Observer<T> {
  pub(crate) fn new(
    mut rx: watch::Receiver<Snapshot>,
    map: Arc<dyn Fn(&[CachedVideo]) -> Vec<T> + Send + Sync>,
  ) -> Self {
    rx.mark_changed();
    Self { rx, map }
  }

  /// Wait until the cache has changed since the last read and return its
  /// contents. Returns `None` once the store is gone.
  pub async fn next(&mut self) -> Option<Vec<T>> {
    self.rx.changed().await.ok()?;
    Some(self.current())
  }

  /// Return the contents if they changed since the last read, without
  /// waiting.
  pub fn try_next(&mut self) -> Option<Vec<T>> {
    if self.rx.has_changed().unwrap_or(false) {
      Some(self.current())
    } else {
      None
    }
  }

  fn current(&mut self) -> Vec<T> {
    // Release the borrow before mapping so writers are never held up.
    let videos = Arc::clone(&self.rx.borrow_and_update().videos);
    (self.map)(&videos)
  }

  /// Adapt into a `Stream` of snapshots.
  pub fn into_stream(self) -> impl Stream<Item = Vec<T>> {
    futures::stream::unfold(self, |mut observer| async move {
      let videos = observer.next().await?;
      Some((videos, observer))
    })
  }
}
