//! Read-only views for rendering. Everything here is an owned copy.

use serde::Serialize;

use crate::models::{BotData, Player, QueueMode, Queues, Tank, normalize_key};

/// Autocomplete results are capped at Discord's choice limit.
pub const MAX_CHOICES: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub mode: QueueMode,
    /// Tanks in registration order
    pub tanks: Vec<Tank>,
    /// One entry in shared mode, one per tank otherwise
    pub queues: Vec<QueueSnapshot>,
    pub total_players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Owning tank in per-tank mode
    pub tank: Option<Tank>,
    pub players: Vec<Player>,
}

/// Where a player is waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub tank: Option<Tank>,
    pub position: usize,
    pub queue_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TankChoice {
    pub display_name: String,
    pub key: String,
}

impl BotData {
    pub fn snapshot(&self) -> Snapshot {
        let tanks = self.list_tanks();
        let queues = match &self.queues {
            Queues::Shared(queue) => vec![QueueSnapshot {
                tank: None,
                players: queue.players.iter().cloned().collect(),
            }],
            Queues::PerTank(queues) => tanks
                .iter()
                .map(|tank| QueueSnapshot {
                    tank: Some(tank.clone()),
                    players: queues
                        .get(&tank.key)
                        .map(|q| q.players.iter().cloned().collect())
                        .unwrap_or_default(),
                })
                .collect(),
        };

        Snapshot {
            mode: self.mode(),
            total_players: self.queues.total_players(),
            tanks,
            queues,
        }
    }

    /// Find a player in whichever queue holds them.
    pub fn position_anywhere(&self, player_id: &str) -> Option<Position> {
        match &self.queues {
            Queues::Shared(queue) => queue.position_of(player_id).map(|position| Position {
                tank: None,
                position,
                queue_length: queue.len(),
            }),
            Queues::PerTank(queues) => queues.iter().find_map(|(key, queue)| {
                queue.position_of(player_id).map(|position| Position {
                    tank: self.tanks.get(key).cloned(),
                    position,
                    queue_length: queue.len(),
                })
            }),
        }
    }

    /// Tanks whose display name contains `partial`, case-insensitively.
    pub fn tank_choices(&self, partial: &str) -> Vec<TankChoice> {
        self.choices_where(partial, |_| true)
    }

    /// Like [`BotData::tank_choices`] but limited to tanks the user owns.
    pub fn owned_tank_choices(&self, owner_id: &str, partial: &str) -> Vec<TankChoice> {
        self.choices_where(partial, |tank| tank.id == owner_id)
    }

    fn choices_where(&self, partial: &str, keep: impl Fn(&Tank) -> bool) -> Vec<TankChoice> {
        let needle = normalize_key(partial);
        self.list_tanks()
            .into_iter()
            .filter(|tank| keep(tank) && normalize_key(&tank.display_name).contains(&needle))
            .take(MAX_CHOICES)
            .map(|tank| TankChoice {
                display_name: tank.display_name,
                key: tank.key,
            })
            .collect()
    }
}
