//! JSON snapshot persistence.
//!
//! The whole state is rewritten after every mutation: serialized to a
//! sibling `.tmp` file, synced, then renamed over the snapshot so a reader
//! never sees a half-written file.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{BotData, Player, Queue, QueueMode, Queues, Tank};

/// On-disk layout. Exactly one of `queue`/`queues` is written.
#[derive(Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    tanks: BTreeMap<String, Tank>,
    #[serde(default)]
    queue: Option<Queue>,
    #[serde(default)]
    queues: Option<BTreeMap<String, Queue>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    tanks: &'a BTreeMap<String, Tank>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue: Option<&'a Queue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queues: Option<&'a BTreeMap<String, Queue>>,
}

impl<'a> From<&'a BotData> for SnapshotRef<'a> {
    fn from(data: &'a BotData) -> Self {
        match &data.queues {
            Queues::Shared(queue) => Self {
                tanks: &data.tanks,
                queue: Some(queue),
                queues: None,
            },
            Queues::PerTank(queues) => Self {
                tanks: &data.tanks,
                queue: None,
                queues: Some(queues),
            },
        }
    }
}

impl SnapshotFile {
    /// Convert into the running layout, migrating if the file was written
    /// in the other one.
    fn into_data(self, mode: QueueMode) -> BotData {
        let SnapshotFile {
            tanks,
            queue,
            queues,
        } = self;

        let queues = match mode {
            QueueMode::Shared => Queues::Shared(match (queue, queues) {
                (Some(mut queue), per_tank) => {
                    if per_tank.is_some() {
                        warn!("snapshot has both queue layouts, ignoring per-tank queues");
                    }
                    let dropped = dedup_players(&mut queue, &mut HashSet::new());
                    if dropped > 0 {
                        warn!(dropped, "dropped repeated players from the shared queue");
                    }
                    queue
                }
                (None, Some(per_tank)) => {
                    let merged = merge_queues(per_tank);
                    info!(players = merged.len(), "migrated per-tank queues into the shared queue");
                    merged
                }
                (None, None) => Queue::default(),
            }),
            QueueMode::PerTank => {
                if let Some(shared) = queue.filter(|q| !q.is_empty()) {
                    warn!(
                        dropped = shared.len(),
                        "shared queue cannot be split between tanks, dropping queued players"
                    );
                }
                let mut per_tank = queues.unwrap_or_default();
                per_tank.retain(|key, _| tanks.contains_key(key));
                for key in tanks.keys() {
                    per_tank.entry(key.clone()).or_default();
                }
                // Queues are visited in key order, so the first tank's entry wins.
                let mut seen = HashSet::new();
                for (key, queue) in per_tank.iter_mut() {
                    let dropped = dedup_players(queue, &mut seen);
                    if dropped > 0 {
                        warn!(tank = %key, dropped, "dropped players already queued elsewhere");
                    }
                }
                Queues::PerTank(per_tank)
            }
        };

        BotData { tanks, queues }
    }
}

/// Drop entries whose id is already in `seen`. Returns how many were dropped.
fn dedup_players(queue: &mut Queue, seen: &mut HashSet<String>) -> usize {
    let before = queue.len();
    queue.players.retain(|p| seen.insert(p.id.clone()));
    before - queue.len()
}

/// Merge per-tank queues by join time, keeping each player's earliest entry.
fn merge_queues(queues: BTreeMap<String, Queue>) -> Queue {
    let mut players: Vec<Player> = queues.into_values().flat_map(|q| q.players).collect();
    players.sort_by_key(|p| p.join_time);

    let mut merged = Queue {
        players: players.into(),
    };
    dedup_players(&mut merged, &mut HashSet::new());
    merged
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Snapshot location. An in-memory store never touches disk.
#[derive(Debug, Clone)]
pub struct Store {
    path: Option<PathBuf>,
}

impl Store {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the snapshot, falling back to empty state on any failure.
    pub async fn load(&self, mode: QueueMode) -> BotData {
        match self.try_load(mode).await {
            Ok(Some(data)) => {
                info!(
                    tanks = data.tanks.len(),
                    players = data.queues.total_players(),
                    "loaded snapshot"
                );
                data
            }
            Ok(None) => {
                info!("no snapshot found, starting with empty state");
                BotData::empty(mode)
            }
            Err(err) => {
                warn!(error = %err, "could not load snapshot, starting with empty state");
                BotData::empty(mode)
            }
        }
    }

    /// Load the snapshot. `Ok(None)` means there is nothing to load.
    pub async fn try_load(&self, mode: QueueMode) -> Result<Option<BotData>, StoreError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: path.clone(),
                    source,
                });
            }
        };

        let file: SnapshotFile =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::ReadCorrupt {
                path: path.clone(),
                source,
            })?;

        Ok(Some(file.into_data(mode)))
    }

    /// Write the full state. Does nothing for an in-memory store.
    pub async fn save(&self, data: &BotData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(&SnapshotRef::from(data))?;
        let tmp = temp_path(path);

        if let Err(source) = write_synced(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::WriteFailed {
                path: tmp,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::WriteFailed {
                path: path.clone(),
                source,
            });
        }

        debug!(path = %path.display(), bytes = bytes.len(), "saved snapshot");
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueueRef;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 123_456_789).unwrap()
    }

    fn sample(mode: QueueMode) -> BotData {
        let mut data = BotData::empty(mode);
        data.register("u1", "Kake", "Kake", at(0)).unwrap();
        data.register("u2", "Pete", "Pete", at(1)).unwrap();
        let queue = match mode {
            QueueMode::Shared => QueueRef::Shared,
            QueueMode::PerTank => QueueRef::tank("kake"),
        };
        data.join(&queue, "p1", "Alice", at(2)).unwrap();
        data.join(&queue, "p2", "Bob", at(3)).unwrap();
        data
    }

    #[tokio::test]
    async fn test_save_then_load_is_identical() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("bot-data.json"));

        for mode in [QueueMode::Shared, QueueMode::PerTank] {
            let data = sample(mode);
            store.save(&data).await.unwrap();
            let loaded = store.try_load(mode).await.unwrap().unwrap();
            assert_eq!(loaded, data);
        }
        assert!(!temp_path(&dir.path().join("bot-data.json")).exists());
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot-data.json");
        let store = Store::new(&path);
        store.save(&sample(QueueMode::Shared)).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["tanks"]["kake"]["name"], "kake");
        assert_eq!(json["tanks"]["kake"]["displayName"], "Kake");
        assert_eq!(json["tanks"]["kake"]["id"], "u1");
        assert!(json["tanks"]["kake"]["addedAt"].is_string());
        assert_eq!(json["queue"]["players"][0]["name"], "Alice");
        assert!(json["queue"]["players"][0]["joinTime"].is_string());
        assert!(json.get("queues").is_none());
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("absent.json"));
        assert!(store.try_load(QueueMode::Shared).await.unwrap().is_none());
        assert_eq!(
            store.load(QueueMode::Shared).await,
            BotData::empty(QueueMode::Shared)
        );
    }

    #[tokio::test]
    async fn test_garbage_timestamp_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot-data.json");
        std::fs::write(
            &path,
            r#"{"tanks":{"kake":{"id":"u1","name":"kake","displayName":"Kake","addedAt":"not a date"}},"queue":{"players":[]}}"#,
        )
        .unwrap();

        let store = Store::new(&path);
        assert!(matches!(
            store.try_load(QueueMode::Shared).await,
            Err(StoreError::ReadCorrupt { .. })
        ));
        assert_eq!(
            store.load(QueueMode::Shared).await,
            BotData::empty(QueueMode::Shared)
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot-data.json");
        // A directory at the snapshot path makes the final rename fail.
        std::fs::create_dir(&path).unwrap();

        let store = Store::new(&path);
        let err = store.save(&sample(QueueMode::Shared)).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_per_tank_snapshot_migrates_to_shared() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("bot-data.json"));

        let mut data = BotData::empty(QueueMode::PerTank);
        data.register("u1", "Kake", "Kake", at(0)).unwrap();
        data.register("u2", "Pete", "Pete", at(1)).unwrap();
        data.join(&QueueRef::tank("pete"), "p2", "Bob", at(3)).unwrap();
        data.join(&QueueRef::tank("kake"), "p1", "Alice", at(2)).unwrap();
        data.join(&QueueRef::tank("kake"), "p3", "Cecil", at(5)).unwrap();
        store.save(&data).await.unwrap();

        let loaded = store.try_load(QueueMode::Shared).await.unwrap().unwrap();
        assert_eq!(loaded.tanks.len(), 2);
        let names: Vec<String> = match loaded.queues {
            Queues::Shared(queue) => queue.players.into_iter().map(|p| p.name).collect(),
            Queues::PerTank(_) => panic!("expected shared queue"),
        };
        assert_eq!(names, vec!["Alice", "Bob", "Cecil"]);
    }

    #[tokio::test]
    async fn test_shared_snapshot_in_per_tank_mode_keeps_roster() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("bot-data.json"));
        store.save(&sample(QueueMode::Shared)).await.unwrap();

        let loaded = store.try_load(QueueMode::PerTank).await.unwrap().unwrap();
        assert_eq!(loaded.tanks.len(), 2);
        match loaded.queues {
            Queues::PerTank(queues) => {
                assert_eq!(queues.len(), 2);
                assert!(queues.values().all(Queue::is_empty));
            }
            Queues::Shared(_) => panic!("expected per-tank queues"),
        }
    }

    #[tokio::test]
    async fn test_repeated_player_in_shared_snapshot_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot-data.json");
        std::fs::write(
            &path,
            r#"{"tanks":{},"queue":{"players":[
                {"id":"p1","name":"Alice","joinTime":"2024-03-01T00:00:00Z"},
                {"id":"p2","name":"Bob","joinTime":"2024-03-01T00:00:30Z"},
                {"id":"p1","name":"Alice","joinTime":"2024-03-01T00:01:00Z"}
            ]}}"#,
        )
        .unwrap();

        let mut loaded = Store::new(&path)
            .try_load(QueueMode::Shared)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.length(&QueueRef::Shared).unwrap(), 2);
        assert_eq!(loaded.position_of(&QueueRef::Shared, "p2").unwrap(), Some(2));

        loaded.leave(&QueueRef::Shared, "p1").unwrap();
        assert_eq!(loaded.position_of(&QueueRef::Shared, "p1").unwrap(), None);
    }

    #[tokio::test]
    async fn test_player_in_two_tank_queues_keeps_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot-data.json");
        std::fs::write(
            &path,
            r#"{"tanks":{
                "kake":{"id":"u1","name":"kake","displayName":"Kake","addedAt":"2024-03-01T00:00:00Z"},
                "pete":{"id":"u2","name":"pete","displayName":"Pete","addedAt":"2024-03-01T00:00:01Z"}
            },"queues":{
                "kake":{"players":[
                    {"id":"p1","name":"Alice","joinTime":"2024-03-01T00:00:05Z"},
                    {"id":"p1","name":"Alice","joinTime":"2024-03-01T00:00:06Z"}
                ]},
                "pete":{"players":[
                    {"id":"p1","name":"Alice","joinTime":"2024-03-01T00:00:07Z"},
                    {"id":"p2","name":"Bob","joinTime":"2024-03-01T00:00:08Z"}
                ]}
            }}"#,
        )
        .unwrap();

        let loaded = Store::new(&path)
            .try_load(QueueMode::PerTank)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.length(&QueueRef::tank("kake")).unwrap(), 1);
        assert_eq!(loaded.length(&QueueRef::tank("pete")).unwrap(), 1);
        assert_eq!(loaded.position_of(&QueueRef::tank("pete"), "p1").unwrap(), None);
        assert_eq!(loaded.position_anywhere("p1").unwrap().tank.unwrap().key, "kake");
    }

    #[test]
    fn test_merge_keeps_earliest_entry() {
        let player = |id: &str, secs| Player {
            id: id.to_string(),
            name: id.to_string(),
            join_time: at(secs),
        };
        let mut queues = BTreeMap::new();
        queues.insert(
            "a".to_string(),
            Queue {
                players: vec![player("x", 5), player("y", 1)].into(),
            },
        );
        queues.insert(
            "b".to_string(),
            Queue {
                players: vec![player("x", 2)].into(),
            },
        );

        let merged = merge_queues(queues);
        let order: Vec<(&str, DateTime<Utc>)> = merged
            .players
            .iter()
            .map(|p| (p.id.as_str(), p.join_time))
            .collect();
        assert_eq!(order, vec![("y", at(1)), ("x", at(2))]);
    }
}
