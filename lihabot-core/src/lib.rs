mod error;
mod maintenance;
mod models;
mod projection;
mod queue;
mod roster;
mod store;

pub use error::{QueueError, Result, StoreError};
pub use maintenance::{ClearReport, DailyClear, MAX_POLL_INTERVAL};
pub use models::{BotData, Player, Queue, QueueMode, QueueRef, Queues, Tank, normalize_key};
pub use projection::{MAX_CHOICES, Position, QueueSnapshot, Snapshot, TankChoice};
pub use queue::{Cleared, Joined, Left, Taken};
pub use roster::Unregistered;
pub use store::Store;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Value of a mutation that has been applied in memory.
///
/// `write_error` is set when the snapshot could not be written. The mutation
/// stands regardless; the disk copy lags until the next successful save.
#[derive(Debug)]
pub struct Committed<T> {
  pub value: T,
  pub write_error: Option<StoreError>,
}

impl<T> Committed<T> {
  pub fn is_persisted(&self) -> bool {
    self.write_error.is_none()
  }

  pub fn into_inner(self) -> T {
    self.value
  }
}

struct Inner {
  mode: QueueMode,
  store: Store,
  data: RwLock<BotData>,
}

/// Handle to the roster and queue state. Cheap to clone.
///
/// Mutations hold the write lock through the snapshot write, so they are
/// serialized against each other and against readers.
#[derive(Clone)]
pub struct TankQueue {
  inner: Arc<Inner>,
}

impl TankQueue {
  /// Open the snapshot at `path`. A missing or unreadable file yields empty state.
  pub async fn open(path: impl AsRef<Path>, mode: QueueMode) -> Self {
    let store = Store::new(path);
    let data = store.load(mode).await;
    Self::with_store(store, data)
  }

  /// State that is never written to disk (useful for testing).
  pub fn open_in_memory(mode: QueueMode) -> Self {
    Self::with_store(Store::in_memory(), BotData::empty(mode))
  }

  fn with_store(store: Store, data: BotData) -> Self {
    Self {
      inner: Arc::new(Inner {
        mode: data.mode(),
        store,
        data: RwLock::new(data),
      }),
    }
  }

  pub fn mode(&self) -> QueueMode {
    self.inner.mode
  }

  /// Apply `op` under the write lock and persist if it succeeded.
  async fn commit<T>(&self, op: impl FnOnce(&mut BotData) -> Result<T>) -> Result<Committed<T>> {
    let mut data = self.inner.data.write().await;
    let value = op(&mut *data)?;
    let write_error = self.persist(&data).await;
    Ok(Committed { value, write_error })
  }

  async fn persist(&self, data: &BotData) -> Option<StoreError> {
    match self.inner.store.save(data).await {
      Ok(()) => None,
      Err(err) => {
        error!(error = %err, "failed to persist state, in-memory changes kept");
        Some(err)
      }
    }
  }

  // ========================================================================
  // Roster
  // ========================================================================

  /// Register a tank for `owner_id`. The roster key is `name` lowercased.
  pub async fn register(
    &self,
    owner_id: &str,
    name: &str,
    display_name: &str,
    now: DateTime<Utc>,
  ) -> Result<Committed<Tank>> {
    let committed = self
      .commit(|data| data.register(owner_id, name, display_name, now))
      .await?;
    debug!(tank = %committed.value.key, owner = owner_id, "registered tank");
    Ok(committed)
  }

  /// Remove a tank. Only its owner may do this.
  pub async fn unregister(&self, owner_id: &str, name: &str) -> Result<Committed<Unregistered>> {
    let committed = self.commit(|data| data.unregister(owner_id, name)).await?;
    debug!(
      tank = %committed.value.tank.key,
      evicted = committed.value.evicted,
      "unregistered tank"
    );
    Ok(committed)
  }

  pub async fn is_owner(&self, owner_id: &str, name: &str) -> bool {
    self.inner.data.read().await.is_owner(owner_id, name)
  }

  pub async fn find_by_owner(&self, owner_id: &str) -> Option<Tank> {
    self.inner.data.read().await.find_by_owner(owner_id).cloned()
  }

  pub async fn find_by_key(&self, name: &str) -> Option<Tank> {
    self.inner.data.read().await.find_by_key(name).cloned()
  }

  pub async fn is_registered(&self, owner_id: &str) -> bool {
    self.inner.data.read().await.is_registered(owner_id)
  }

  /// Tanks in registration order.
  pub async fn list_tanks(&self) -> Vec<Tank> {
    self.inner.data.read().await.list_tanks()
  }

  // ========================================================================
  // Queues
  // ========================================================================

  /// Append a player. Returns the 1-based position after the append.
  pub async fn join(
    &self,
    queue: &QueueRef,
    player_id: &str,
    player_name: &str,
    now: DateTime<Utc>,
  ) -> Result<Committed<Joined>> {
    let committed = self
      .commit(|data| data.join(queue, player_id, player_name, now))
      .await?;
    debug!(player_id, position = committed.value.position, "player joined");
    Ok(committed)
  }

  /// Pop the head of the queue served by `caller_id`, who must own a tank.
  pub async fn take_next(&self, caller_id: &str) -> Result<Committed<Taken>> {
    let committed = self.commit(|data| data.take_next(caller_id)).await?;
    debug!(
      tank = %committed.value.tank.key,
      player_id = %committed.value.player.id,
      remaining = committed.value.remaining,
      "took next player"
    );
    Ok(committed)
  }

  pub async fn leave(&self, queue: &QueueRef, player_id: &str) -> Result<Committed<Left>> {
    let committed = self.commit(|data| data.leave(queue, player_id)).await?;
    debug!(player_id, remaining = committed.value.remaining, "player left");
    Ok(committed)
  }

  /// Empty the queue served by `caller_id`, who must own a tank.
  pub async fn clear(&self, caller_id: &str) -> Result<Committed<Cleared>> {
    let committed = self.commit(|data| data.clear(caller_id)).await?;
    debug!(
      tank = %committed.value.tank.key,
      evicted = committed.value.evicted,
      "cleared queue"
    );
    Ok(committed)
  }

  /// Scheduled clear of every queue. Not reachable by external callers and
  /// skips the write when there is nothing to evict.
  pub(crate) async fn clear_for_maintenance(&self) -> Committed<usize> {
    let mut data = self.inner.data.write().await;
    let evicted = data.clear_all();
    let write_error = if evicted > 0 {
      self.persist(&data).await
    } else {
      None
    };
    Committed {
      value: evicted,
      write_error,
    }
  }

  pub async fn length(&self, queue: &QueueRef) -> Result<usize> {
    self.inner.data.read().await.length(queue)
  }

  pub async fn position_of(&self, queue: &QueueRef, player_id: &str) -> Result<Option<usize>> {
    self.inner.data.read().await.position_of(queue, player_id)
  }

  // ========================================================================
  // Views
  // ========================================================================

  pub async fn snapshot(&self) -> Snapshot {
    self.inner.data.read().await.snapshot()
  }

  pub async fn total_players(&self) -> usize {
    self.inner.data.read().await.queues.total_players()
  }

  pub async fn position_anywhere(&self, player_id: &str) -> Option<Position> {
    self.inner.data.read().await.position_anywhere(player_id)
  }

  pub async fn tank_choices(&self, partial: &str) -> Vec<TankChoice> {
    self.inner.data.read().await.tank_choices(partial)
  }

  pub async fn owned_tank_choices(&self, owner_id: &str, partial: &str) -> Vec<TankChoice> {
    self
      .inner
      .data
      .read()
      .await
      .owned_tank_choices(owner_id, partial)
  }
}
