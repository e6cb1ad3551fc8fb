//! Tank registration and lookup.
//!
//! A tank is keyed by its lowercased name and owned by exactly one external
//! user. Each owner may hold at most one tank at a time.

use chrono::{DateTime, Utc};

use crate::error::{QueueError, Result};
use crate::models::{BotData, Queue, Queues, Tank, normalize_key};

/// Result of a successful unregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub tank: Tank,
    /// Players dropped with the tank's queue (always 0 in shared mode)
    pub evicted: usize,
}

impl BotData {
    pub fn register(
        &mut self,
        owner_id: &str,
        name: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Tank> {
        let key = normalize_key(name);

        if let Some(existing) = self.tanks.get(&key) {
            return Err(QueueError::DuplicateKey {
                display_name: existing.display_name.clone(),
            });
        }

        if let Some(owned) = self.find_by_owner(owner_id) {
            return Err(QueueError::DuplicateOwner {
                existing: owned.display_name.clone(),
            });
        }

        let tank = Tank {
            id: owner_id.to_string(),
            key: key.clone(),
            display_name: display_name.to_string(),
            added_at: now,
        };
        self.tanks.insert(key.clone(), tank.clone());

        if let Queues::PerTank(queues) = &mut self.queues {
            queues.insert(key, Queue::default());
        }

        Ok(tank)
    }

    pub fn unregister(&mut self, owner_id: &str, name: &str) -> Result<Unregistered> {
        let key = normalize_key(name);

        let tank = self
            .tanks
            .get(&key)
            .ok_or_else(|| QueueError::NotFound(name.to_string()))?;
        if tank.id != owner_id {
            return Err(QueueError::NotOwner);
        }

        let tank = self
            .tanks
            .remove(&key)
            .ok_or_else(|| QueueError::NotFound(name.to_string()))?;
        let evicted = match &mut self.queues {
            Queues::Shared(_) => 0,
            Queues::PerTank(queues) => queues.remove(&key).map_or(0, |q| q.len()),
        };

        Ok(Unregistered { tank, evicted })
    }

    pub fn is_owner(&self, owner_id: &str, name: &str) -> bool {
        self.tanks
            .get(&normalize_key(name))
            .is_some_and(|t| t.id == owner_id)
    }

    pub fn find_by_owner(&self, owner_id: &str) -> Option<&Tank> {
        self.tanks.values().find(|t| t.id == owner_id)
    }

    pub fn find_by_key(&self, name: &str) -> Option<&Tank> {
        self.tanks.get(&normalize_key(name))
    }

    pub fn is_registered(&self, owner_id: &str) -> bool {
        self.find_by_owner(owner_id).is_some()
    }

    /// Tanks in registration order.
    pub fn list_tanks(&self) -> Vec<Tank> {
        let mut tanks: Vec<Tank> = self.tanks.values().cloned().collect();
        tanks.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.key.cmp(&b.key)));
        tanks
    }
}
