use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a tank name into its roster key (case-insensitive).
pub fn normalize_key(name: &str) -> String {
  name.to_lowercase()
}

/// A registered privileged user who may dequeue players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tank {
  /// External user identity of the owner
  pub id: String,
  /// Lowercase roster key
  #[serde(rename = "name")]
  pub key: String,
  /// Name as typed at registration, used for rendering
  pub display_name: String,
  pub added_at: DateTime<Utc>,
}

/// A waiting queue entry. The name is a snapshot taken at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
  pub id: String,
  pub name: String,
  pub join_time: DateTime<Utc>,
}

/// FIFO of waiting players.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
  pub players: VecDeque<Player>,
}

impl Queue {
  pub fn len(&self) -> usize {
    self.players.len()
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }

  /// 1-based position of a player, if present.
  pub fn position_of(&self, player_id: &str) -> Option<usize> {
    self.players.iter().position(|p| p.id == player_id).map(|i| i + 1)
  }

  pub fn contains(&self, player_id: &str) -> bool {
    self.players.iter().any(|p| p.id == player_id)
  }

  /// Append and return the new 1-based position.
  pub fn push(&mut self, player: Player) -> usize {
    self.players.push_back(player);
    self.players.len()
  }

  pub fn pop_front(&mut self) -> Option<Player> {
    self.players.pop_front()
  }

  /// Remove the first entry with this id, keeping the order of the rest.
  pub fn remove(&mut self, player_id: &str) -> Option<Player> {
    let idx = self.players.iter().position(|p| p.id == player_id)?;
    self.players.remove(idx)
  }

  /// Empty the queue and return how many players were evicted.
  pub fn clear(&mut self) -> usize {
    let evicted = self.players.len();
    self.players.clear();
    evicted
  }
}

/// Which queue layout a deployment runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
  /// One global queue; any registered tank may take from it.
  #[default]
  Shared,
  /// One queue per tank; players choose which tank to wait for.
  PerTank,
}

impl fmt::Display for QueueMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueueMode::Shared => f.write_str("shared"),
      QueueMode::PerTank => f.write_str("per-tank"),
    }
  }
}

impl FromStr for QueueMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "shared" => Ok(QueueMode::Shared),
      "per-tank" | "per_tank" | "pertank" => Ok(QueueMode::PerTank),
      other => Err(format!("unknown queue mode \"{other}\" (expected shared or per-tank)")),
    }
  }
}

/// Address of a queue as given by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueRef {
  Shared,
  /// Tank name in any casing
  Tank(String),
}

impl QueueRef {
  pub fn tank(name: impl Into<String>) -> Self {
    QueueRef::Tank(name.into())
  }
}

/// Queue storage for one deployment. Never mixes both layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Queues {
  Shared(Queue),
  PerTank(BTreeMap<String, Queue>),
}

impl Queues {
  pub fn empty(mode: QueueMode) -> Self {
    match mode {
      QueueMode::Shared => Queues::Shared(Queue::default()),
      QueueMode::PerTank => Queues::PerTank(BTreeMap::new()),
    }
  }

  pub fn mode(&self) -> QueueMode {
    match self {
      Queues::Shared(_) => QueueMode::Shared,
      Queues::PerTank(_) => QueueMode::PerTank,
    }
  }

  /// Number of queued players across every queue.
  pub fn total_players(&self) -> usize {
    match self {
      Queues::Shared(queue) => queue.len(),
      Queues::PerTank(queues) => queues.values().map(Queue::len).sum(),
    }
  }
}

/// The whole durable state: roster plus queue(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotData {
  /// Tanks keyed by normalized name
  pub tanks: BTreeMap<String, Tank>,
  pub queues: Queues,
}

impl BotData {
  pub fn empty(mode: QueueMode) -> Self {
    Self {
      tanks: BTreeMap::new(),
      queues: Queues::empty(mode),
    }
  }

  pub fn mode(&self) -> QueueMode {
    self.queues.mode()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn player(id: &str, secs: i64) -> Player {
    Player {
      id: id.to_string(),
      name: id.to_uppercase(),
      join_time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
  }

  #[test]
  fn test_remove_keeps_relative_order() {
    let mut queue = Queue::default();
    queue.push(player("a", 0));
    queue.push(player("b", 1));
    queue.push(player("c", 2));

    let removed = queue.remove("b").unwrap();
    assert_eq!(removed.name, "B");
    let ids: Vec<&str> = queue.players.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(queue.position_of("c"), Some(2));
    assert!(queue.remove("b").is_none());
  }

  #[test]
  fn test_clear_reports_evicted() {
    let mut queue = Queue::default();
    assert_eq!(queue.clear(), 0);
    queue.push(player("a", 0));
    queue.push(player("b", 1));
    assert_eq!(queue.clear(), 2);
    assert!(queue.is_empty());
  }

  #[test]
  fn test_queue_mode_parse() {
    assert_eq!("shared".parse::<QueueMode>(), Ok(QueueMode::Shared));
    assert_eq!("Per-Tank".parse::<QueueMode>(), Ok(QueueMode::PerTank));
    assert_eq!("per_tank".parse::<QueueMode>(), Ok(QueueMode::PerTank));
    assert!("global".parse::<QueueMode>().is_err());
    assert_eq!(QueueMode::PerTank.to_string(), "per-tank");
  }

  #[test]
  fn test_normalize_key() {
    assert_eq!(normalize_key("Kake"), "kake");
    assert_eq!(normalize_key("KAKE"), normalize_key("kake"));
  }
}
