//! Queue engine.
//!
//! Every queue is a FIFO. A player id appears at most once system-wide: in
//! shared mode that follows from there being one queue, in per-tank mode it
//! is enforced on join by scanning the other queues.

use chrono::{DateTime, Utc};

use crate::error::{QueueError, Result};
use crate::models::{BotData, Player, Queue, QueueRef, Queues, Tank, normalize_key};

/// A successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub player: Player,
    /// 1-based position after the append
    pub position: usize,
}

/// The head of a queue, taken by a tank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taken {
    pub player: Player,
    pub remaining: usize,
    pub tank: Tank,
}

/// A player who left voluntarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Left {
    pub player: Player,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleared {
    pub evicted: usize,
    pub tank: Tank,
}

impl BotData {
    /// Resolve a caller-supplied ref to the key of a live queue.
    /// `None` addresses the shared queue.
    pub(crate) fn resolve(&self, queue: &QueueRef) -> Result<Option<String>> {
        match (&self.queues, queue) {
            (Queues::Shared(_), _) => Ok(None),
            (Queues::PerTank(queues), QueueRef::Tank(name)) => {
                let key = normalize_key(name);
                if self.tanks.contains_key(&key) && queues.contains_key(&key) {
                    Ok(Some(key))
                } else {
                    Err(QueueError::QueueNotFound(name.clone()))
                }
            }
            (Queues::PerTank(_), QueueRef::Shared) => {
                Err(QueueError::QueueNotFound("shared".to_string()))
            }
        }
    }

    /// Human-readable name of a resolved queue.
    pub fn queue_label(&self, key: Option<&str>) -> String {
        match key.and_then(|k| self.tanks.get(k)) {
            Some(tank) => format!("{}'s queue", tank.display_name),
            None => "the queue".to_string(),
        }
    }

    fn queue_at(&self, key: Option<&str>) -> Option<&Queue> {
        match (&self.queues, key) {
            (Queues::Shared(queue), _) => Some(queue),
            (Queues::PerTank(queues), Some(key)) => queues.get(key),
            (Queues::PerTank(_), None) => None,
        }
    }

    fn queue_at_mut(&mut self, key: Option<&str>) -> Option<&mut Queue> {
        match (&mut self.queues, key) {
            (Queues::Shared(queue), _) => Some(queue),
            (Queues::PerTank(queues), Some(key)) => queues.get_mut(key),
            (Queues::PerTank(_), None) => None,
        }
    }

    /// The queue a tank serves: the shared one, or its own in per-tank mode.
    fn served_by(&self, tank: &Tank) -> Option<String> {
        match self.queues {
            Queues::Shared(_) => None,
            Queues::PerTank(_) => Some(tank.key.clone()),
        }
    }

    pub fn join(
        &mut self,
        queue: &QueueRef,
        player_id: &str,
        player_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Joined> {
        let key = self.resolve(queue)?;
        let label = self.queue_label(key.as_deref());
        let target = self
            .queue_at(key.as_deref())
            .ok_or_else(|| QueueError::QueueNotFound(label.clone()))?;

        if let Some(position) = target.position_of(player_id) {
            return Err(QueueError::AlreadyQueued {
                queue: label,
                position,
            });
        }

        if let Queues::PerTank(queues) = &self.queues
            && let Some((other, _)) = queues
                .iter()
                .find(|(k, q)| Some(k.as_str()) != key.as_deref() && q.contains(player_id))
        {
            return Err(QueueError::AlreadyQueuedElsewhere {
                queue: self.queue_label(Some(other)),
            });
        }

        let player = Player {
            id: player_id.to_string(),
            name: player_name.to_string(),
            join_time: now,
        };
        let position = self
            .queue_at_mut(key.as_deref())
            .ok_or(QueueError::QueueNotFound(label))?
            .push(player.clone());

        Ok(Joined { player, position })
    }

    /// Pop the head of the queue the caller serves. The caller must own a tank.
    pub fn take_next(&mut self, caller_id: &str) -> Result<Taken> {
        let tank = self
            .find_by_owner(caller_id)
            .cloned()
            .ok_or(QueueError::NotAuthorized)?;
        let key = self.served_by(&tank);
        let label = self.queue_label(key.as_deref());

        let queue = self
            .queue_at_mut(key.as_deref())
            .ok_or_else(|| QueueError::QueueNotFound(tank.display_name.clone()))?;
        let player = queue.pop_front().ok_or(QueueError::QueueEmpty(label))?;

        Ok(Taken {
            player,
            remaining: queue.len(),
            tank,
        })
    }

    pub fn leave(&mut self, queue: &QueueRef, player_id: &str) -> Result<Left> {
        let key = self.resolve(queue)?;
        let label = self.queue_label(key.as_deref());

        let queue = self
            .queue_at_mut(key.as_deref())
            .ok_or_else(|| QueueError::QueueNotFound(label.clone()))?;
        let player = queue
            .remove(player_id)
            .ok_or(QueueError::NotQueued(label))?;

        Ok(Left {
            player,
            remaining: queue.len(),
        })
    }

    /// Empty the queue the caller serves. Succeeds on an empty queue.
    pub fn clear(&mut self, caller_id: &str) -> Result<Cleared> {
        let tank = self
            .find_by_owner(caller_id)
            .cloned()
            .ok_or(QueueError::NotAuthorized)?;
        let key = self.served_by(&tank);

        let evicted = self
            .queue_at_mut(key.as_deref())
            .ok_or_else(|| QueueError::QueueNotFound(tank.display_name.clone()))?
            .clear();

        Ok(Cleared { evicted, tank })
    }

    /// Empty every queue without an authorization check.
    pub(crate) fn clear_all(&mut self) -> usize {
        match &mut self.queues {
            Queues::Shared(queue) => queue.clear(),
            Queues::PerTank(queues) => queues.values_mut().map(Queue::clear).sum(),
        }
    }

    pub fn length(&self, queue: &QueueRef) -> Result<usize> {
        let key = self.resolve(queue)?;
        Ok(self.queue_at(key.as_deref()).map_or(0, Queue::len))
    }

    pub fn position_of(&self, queue: &QueueRef, player_id: &str) -> Result<Option<usize>> {
        let key = self.resolve(queue)?;
        Ok(self
            .queue_at(key.as_deref())
            .and_then(|q| q.position_of(player_id)))
    }
}
