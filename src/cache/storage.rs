//! SQLite-backed video cache with change notification.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error};

use super::observe::{Observer, Snapshot, Subscribers, SubscriptionId};
use super::types::CachedVideo;
use crate::db::Database;
use crate::error::StorageError;

/// Durable cache of videos, keyed by url.
///
/// All writes go through [`VideoStore::upsert_all`], which commits a whole
/// batch in one transaction and then publishes the new contents. Nobody is
/// ever handed an older snapshot after a newer one.
pub struct VideoStore {
  db: Mutex<Database>,
  /// Latest committed contents; written only while `db` is locked
  latest: watch::Sender<Snapshot>,
  subscribers: Subscribers,
}

impl VideoStore {
  /// Open the store at `path`, creating it if needed.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    Self::with_database(Database::open(path)?)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_database(Database::open_in_memory()?)
  }

  fn with_database(db: Database) -> Result<Self, StorageError> {
    let initial = Snapshot {
      seq: 1,
      videos: Arc::new(load_all(db.conn())?),
    };
    let (latest, _) = watch::channel(initial);

    Ok(Self {
      db: Mutex::new(db),
      latest,
      subscribers: Subscribers::default(),
    })
  }

  fn lock_db(&self) -> MutexGuard<'_, Database> {
    // An interrupted transaction rolls back on drop, so a poisoned lock
    // still guards a consistent database.
    self.db.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert every video, replacing rows with the same url.
  ///
  /// Either the whole batch is committed or nothing is. Once committed the
  /// call succeeds; listener failures are logged, not returned.
  pub fn upsert_all(&self, videos: &[CachedVideo]) -> Result<(), StorageError> {
    let mut db = self.lock_db();

    let tx = db.conn_mut().transaction()?;
    {
      let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO videos (url, title, description, updated, thumbnail, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))",
      )?;
      for video in videos {
        stmt.execute(params![
          video.url,
          video.title,
          video.description,
          video.updated,
          video.thumbnail
        ])?;
      }
    }
    tx.commit()?;
    debug!(rows = videos.len(), "committed video batch");

    let snapshot = match load_all(db.conn()) {
      Ok(rows) => Snapshot {
        seq: self.latest.borrow().seq + 1,
        videos: Arc::new(rows),
      },
      Err(e) => {
        // The batch is durable; subscribers catch up on the next commit.
        error!(error = %e, "failed to read back cache after commit");
        return Ok(());
      }
    };
    // Publishing under the database lock keeps snapshots in commit order.
    self.latest.send_replace(snapshot.clone());
    drop(db);

    self.subscribers.notify(&snapshot);
    Ok(())
  }

  /// Current contents, in order of most recent write.
  pub fn get_all(&self) -> Result<Vec<CachedVideo>, StorageError> {
    let db = self.lock_db();
    load_all(db.conn())
  }

  /// Register `listener`, calling it right away with the current contents
  /// and again after every commit.
  ///
  /// Listeners run on the writer's thread with no store lock held, so they
  /// may subscribe or unsubscribe. A panicking listener is logged and kept.
  pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
  where
    F: Fn(&[CachedVideo]) + Send + Sync + 'static,
  {
    self
      .subscribers
      .register(Box::new(listener), || self.latest.borrow().clone())
  }

  /// Remove a listener. Returns `false` if it was not registered.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    self.subscribers.remove(id)
  }

  /// Number of live listeners and observers
  pub fn subscriber_count(&self) -> usize {
    self.subscribers.len() + self.latest.receiver_count()
  }

  /// Observe the raw cache rows.
  pub fn observe_all(&self) -> Observer<CachedVideo> {
    self.observe_with(|videos| videos.to_vec())
  }

  /// Observe the cache through `map`, which is re-run on every read.
  pub fn observe_with<T, F>(&self, map: F) -> Observer<T>
  where
    T: 'static,
    F: Fn(&[CachedVideo]) -> Vec<T> + Send + Sync + 'static,
  {
    Observer::new(self.latest.subscribe(), Arc::new(map))
  }
}

fn load_all(conn: &Connection) -> Result<Vec<CachedVideo>, StorageError> {
  let mut stmt = conn.prepare_cached(
    "SELECT url, title, description, updated, thumbnail FROM videos ORDER BY rowid",
  )?;

  let videos = stmt
    .query_map([], |row| {
      Ok(CachedVideo {
        url: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        updated: row.get(3)?,
        thumbnail: row.get(4)?,
      })
    })?
    .collect::<Result<Vec<_>, _>>()?;

  Ok(videos)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn video(url: &str, title: &str) -> CachedVideo {
    CachedVideo {
      url: url.to_string(),
      title: title.to_string(),
      description: "d".to_string(),
      updated: "2019-01-01".to_string(),
      thumbnail: "t".to_string(),
    }
  }

  #[test]
  fn test_upsert_replaces_by_url() {
    let store = VideoStore::open_in_memory().unwrap();

    store.upsert_all(&[video("u1", "old"), video("u2", "b")]).unwrap();
    store.upsert_all(&[video("u1", "new")]).unwrap();

    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 2);
    let u1 = all.iter().find(|v| v.url == "u1").unwrap();
    assert_eq!(u1.title, "new");
  }

  #[test]
  fn test_same_batch_twice_is_idempotent() {
    let store = VideoStore::open_in_memory().unwrap();
    let batch = vec![video("u1", "a"), video("u2", "b")];

    store.upsert_all(&batch).unwrap();
    let first = store.get_all().unwrap();
    store.upsert_all(&batch).unwrap();

    assert_eq!(store.get_all().unwrap(), first);
  }

  #[test]
  fn test_rows_missing_from_batch_are_kept() {
    let store = VideoStore::open_in_memory().unwrap();

    store.upsert_all(&[video("u1", "a")]).unwrap();
    store.upsert_all(&[video("u2", "b")]).unwrap();

    assert_eq!(store.get_all().unwrap().len(), 2);
  }

  #[test]
  fn test_subscribe_gets_snapshot_then_commits() {
    let store = VideoStore::open_in_memory().unwrap();
    store.upsert_all(&[video("u1", "a")]).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |videos| sink.lock().unwrap().push(videos.len()));

    store.upsert_all(&[video("u2", "b")]).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
  }

  #[test]
  fn test_unsubscribe_stops_notifications() {
    let store = VideoStore::open_in_memory().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let id = store.subscribe(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));

    store.upsert_all(&[video("u1", "a")]).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_failed_batch_leaves_store_unchanged() {
    let store = VideoStore::open_in_memory().unwrap();
    store.upsert_all(&[video("u1", "a")]).unwrap();

    store
      .lock_db()
      .conn()
      .execute_batch(
        "CREATE TRIGGER reject_u3 BEFORE INSERT ON videos WHEN NEW.url = 'u3'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
      )
      .unwrap();

    let result = store.upsert_all(&[video("u1", "changed"), video("u2", "b"), video("u3", "c")]);

    assert!(matches!(result, Err(StorageError::Sqlite(_))));
    assert_eq!(store.get_all().unwrap(), vec![video("u1", "a")]);
  }

  #[tokio::test]
  async fn test_observer_skips_superseded_snapshots() {
    let store = VideoStore::open_in_memory().unwrap();
    let mut observer = store.observe_all();

    assert!(observer.next().await.unwrap().is_empty());

    store.upsert_all(&[video("u1", "a")]).unwrap();
    store.upsert_all(&[video("u2", "b")]).unwrap();

    assert_eq!(observer.next().await.unwrap().len(), 2);
    assert!(observer.try_next().is_none());
  }

  #[tokio::test]
  async fn test_slow_observer_gets_only_latest_after_many_commits() {
    let store = VideoStore::open_in_memory().unwrap();
    let mut observer = store.observe_all();

    for i in 0..1000 {
      store.upsert_all(&[video(&format!("u{}", i), "a")]).unwrap();
    }

    assert_eq!(observer.next().await.unwrap().len(), 1000);
    assert!(observer.try_next().is_none());
  }

  #[tokio::test]
  async fn test_observer_stream_yields_current_contents() {
    use futures::StreamExt;

    let store = VideoStore::open_in_memory().unwrap();
    store.upsert_all(&[video("u1", "a")]).unwrap();

    let mut stream = Box::pin(store.observe_all().into_stream());

    assert_eq!(stream.next().await.unwrap(), vec![video("u1", "a")]);
  }

  #[test]
  fn test_panicking_listener_does_not_fail_later_writes() {
    let store = VideoStore::open_in_memory().unwrap();
    store.subscribe(|videos| {
      if !videos.is_empty() {
        panic!("listener failure");
      }
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    store.subscribe(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    store.upsert_all(&[video("u1", "a")]).unwrap();
    store.upsert_all(&[video("u2", "b")]).unwrap();

    assert_eq!(store.get_all().unwrap().len(), 2);
    // Initial snapshot plus both commits reached the healthy listener
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let mut observer = store.observe_all();
    assert_eq!(observer.try_next().unwrap().len(), 2);
  }

  #[test]
  fn test_concurrent_writers_publish_whole_batches() {
    let store = VideoStore::open_in_memory().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |videos| sink.lock().unwrap().push(videos.len()));

    let batch = |prefix: &str| -> Vec<CachedVideo> {
      (0..50)
        .map(|i| video(&format!("{}{}", prefix, i), prefix))
        .collect()
    };
    let (a, b) = (batch("a"), batch("b"));

    std::thread::scope(|scope| {
      scope.spawn(|| store.upsert_all(&a).unwrap());
      scope.spawn(|| store.upsert_all(&b).unwrap());
    });

    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|len| len % 50 == 0), "partial batch seen: {:?}", seen);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "older snapshot after newer: {:?}", seen);
    assert_eq!(seen.last(), Some(&100));
  }

  #[test]
  fn test_listener_may_subscribe_and_unsubscribe_during_notification() {
    let store = Arc::new(VideoStore::open_in_memory().unwrap());
    let other = store.subscribe(|_| {});

    let inner = Arc::clone(&store);
    store.subscribe(move |videos| {
      if videos.len() == 1 {
        inner.unsubscribe(other);
        inner.subscribe(|_| {});
      }
    });

    store.upsert_all(&[video("u1", "a")]).unwrap();

    assert!(!store.unsubscribe(other));
    assert_eq!(store.subscriber_count(), 2);
  }

  #[test]
  fn test_dropping_observer_unsubscribes() {
    let store = VideoStore::open_in_memory().unwrap();

    let observer = store.observe_all();
    assert_eq!(store.subscriber_count(), 1);

    drop(observer);
    assert_eq!(store.subscriber_count(), 0);
  }

  #[test]
  fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("videos.db");

    VideoStore::open(&path)
      .unwrap()
      .upsert_all(&[video("u1", "a")])
      .unwrap();

    let reopened = VideoStore::open(&path).unwrap();
    assert_eq!(reopened.get_all().unwrap(), vec![video("u1", "a")]);
  }
}
