//! Embeds for command replies.

use chrono::{DateTime, Utc};
use lihabot_core::{Cleared, Joined, Position, QueueError, Snapshot, Tank, Taken, Unregistered};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter, Timestamp};

use crate::helpers::{format_waited, players, wait_estimate};

pub const SUCCESS: u32 = 0x00D26A;
pub const ERROR: u32 = 0xF23F43;
pub const WARNING: u32 = 0xFFAE42;
pub const INFO: u32 = 0x5865F2;
pub const QUEUE: u32 = 0x3BA55D;
pub const STATUS: u32 = 0x2B2D31;

const FOOTER: &str = "🎮 Lihabotti • pumpers gonna pump";

fn base(color: u32, title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .color(color)
        .timestamp(Timestamp::now())
}

pub fn error(title: &str, description: impl Into<String>) -> CreateEmbed {
    base(ERROR, format!("❌ {title}")).description(description)
}

/// Error embed for a rejected queue or roster operation.
pub fn failure(title: &str, err: &QueueError) -> CreateEmbed {
    error(title, sentence(&err.to_string()))
}

/// Capitalize and punctuate an error message.
fn sentence(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Mark a reply whose change could not be written to disk.
pub fn unsaved(embed: CreateEmbed) -> CreateEmbed {
    embed.footer(CreateEmbedFooter::new(
        "⚠️ Saved in memory only: the data file could not be written",
    ))
}

pub fn tank_added(tank: &Tank) -> CreateEmbed {
    base(INFO, "🛡️ Tank added")
        .description(format!(
            "**{}** is ready to take players from the queue!",
            tank.display_name
        ))
        .field(
            " ",
            "• Players join with `/join`\n• Use `/next` to take the next player\n• Follow along with `/status`",
            false,
        )
}

pub fn tank_removed(removed: &Unregistered) -> CreateEmbed {
    let embed = base(WARNING, "⚠️ Tank retired")
        .description(format!("**{}** has been removed.", removed.tank.display_name));
    if removed.evicted > 0 {
        let verb = if removed.evicted == 1 { "was" } else { "were" };
        embed.field(
            "ℹ️ Queue",
            format!("{} {verb} removed from the queue.", players(removed.evicted)),
            false,
        )
    } else {
        embed
    }
}

pub fn tank_list(tanks: &[Tank]) -> CreateEmbed {
    let embed = base(INFO, "Available tanks");
    if tanks.is_empty() {
        return embed.description(
            "📭 **No tanks yet!**\n\nBe the first one with `/add-tank`.",
        );
    }

    let list = tanks
        .iter()
        .enumerate()
        .map(|(i, tank)| {
            let icon = if i == 0 { "👑" } else { "🛡️" };
            format!(
                "{icon} **{}**\n└ *Bringing the heat since {}*",
                tank.display_name,
                tank.added_at.format("%d.%m.%Y")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    embed.description(list)
}

pub fn joined(joined: &Joined, queue_name: &str) -> CreateEmbed {
    let position_text = if joined.position == 1 {
        "You're next!".to_string()
    } else {
        format!("Your position: **#{}**", joined.position)
    };
    base(QUEUE, format!("Joined {queue_name}!"))
        .field("Queue", position_text, true)
        .field("⏳ Estimated wait", wait_estimate(joined.position), true)
}

pub fn left(player_name: &str, queue_name: &str) -> CreateEmbed {
    base(QUEUE, "Left the queue").description(format!("**{player_name}** left {queue_name}."))
}

pub fn taken(taken: &Taken) -> CreateEmbed {
    base(SUCCESS, "Next player called up!")
        .description(format!("**{}** is up next.", taken.player.name))
        .field("Still waiting", format!("**{}**", players(taken.remaining)), false)
}

pub fn queue_empty(queue_name: &str) -> CreateEmbed {
    base(WARNING, "Queue is empty").description(format!("Nobody is waiting in {queue_name}."))
}

pub fn cleared(cleared: &Cleared) -> CreateEmbed {
    base(WARNING, "Queue cleared").description(format!(
        "**{}** cleared the queue. {} removed.",
        cleared.tank.display_name,
        players(cleared.evicted)
    ))
}

pub fn position(position: Option<&Position>) -> CreateEmbed {
    match position {
        Some(p) => {
            let queue = p
                .tank
                .as_ref()
                .map_or("the queue".to_string(), |t| format!("{}'s queue", t.display_name));
            base(QUEUE, "Your place in line")
                .description(format!(
                    "You are **#{}** of {} in {queue}.",
                    p.position, p.queue_length
                ))
                .field("⏳ Estimated wait", wait_estimate(p.position), true)
        }
        None => base(INFO, "Not queued").description("You're not in any queue. Join with `/join`."),
    }
}

/// Numbered player list with wait times, or a placeholder.
pub fn player_lines<'a>(
    players: impl IntoIterator<Item = (&'a str, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> String {
    let lines: Vec<String> = players
        .into_iter()
        .enumerate()
        .map(|(i, (name, joined))| format!("{}. {} ({})", i + 1, name, format_waited(joined, now)))
        .collect();
    if lines.is_empty() {
        "😭 Empty".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn status(snapshot: &Snapshot, now: DateTime<Utc>) -> CreateEmbed {
    let embed = base(STATUS, "Queue status").footer(CreateEmbedFooter::new(FOOTER));

    let tank_names = if snapshot.tanks.is_empty() {
        "No tanks on duty. Add yourself with `/add-tank`.".to_string()
    } else {
        snapshot
            .tanks
            .iter()
            .map(|t| format!("🛡️ {}", t.display_name))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let embed = embed.description(format!(
        "**{}** waiting\n\n{tank_names}",
        players(snapshot.total_players)
    ));

    snapshot.queues.iter().fold(embed, |embed, queue| {
        let title = match &queue.tank {
            Some(tank) => format!("{} ({})", tank.display_name, queue.players.len()),
            None => format!("Queue ({})", queue.players.len()),
        };
        let lines = player_lines(
            queue.players.iter().map(|p| (p.name.as_str(), p.join_time)),
            now,
        );
        embed.field(title, format!("```\n{lines}\n```"), true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lihabot_core::{Player, Tank};

    fn tank() -> Tank {
        Tank {
            id: "u1".to_string(),
            key: "kake".to_string(),
            display_name: "Kake".to_string(),
            added_at: Utc.timestamp_opt(1700000000, 0).unwrap(),
        }
    }

    fn embed_text(embed: CreateEmbed) -> String {
        serde_json::to_string(&embed).unwrap()
    }

    #[test]
    fn test_counts_are_pluralized() {
        let removed = |evicted| Unregistered {
            tank: tank(),
            evicted,
        };
        assert!(embed_text(tank_removed(&removed(1))).contains("1 player was removed"));
        assert!(embed_text(tank_removed(&removed(3))).contains("3 players were removed"));

        let taken = Taken {
            player: Player {
                id: "p1".to_string(),
                name: "Alice".to_string(),
                join_time: Utc.timestamp_opt(1700000000, 0).unwrap(),
            },
            remaining: 1,
            tank: tank(),
        };
        assert!(embed_text(super::taken(&taken)).contains("**1 player**"));

        let cleared = |evicted| Cleared {
            evicted,
            tank: tank(),
        };
        assert!(embed_text(super::cleared(&cleared(1))).contains("1 player removed"));
        assert!(embed_text(super::cleared(&cleared(0))).contains("0 players removed"));
    }

    #[test]
    fn test_sentence() {
        assert_eq!(
            sentence("already in the queue (position 2)"),
            "Already in the queue (position 2)."
        );
        assert_eq!(sentence(""), "");
        assert_eq!(
            sentence(&QueueError::NotAuthorized.to_string()),
            "Only registered tanks can do that."
        );
    }

    #[test]
    fn test_player_lines() {
        let now = Utc.timestamp_opt(1700003600, 0).unwrap();
        let alice = Utc.timestamp_opt(1700000000, 0).unwrap();
        let bob = Utc.timestamp_opt(1700003000, 0).unwrap();

        assert_eq!(
            player_lines([("Alice", alice), ("Bob", bob)], now),
            "1. Alice (1h 0m)\n2. Bob (10m)"
        );
        assert_eq!(player_lines(Vec::<(&str, DateTime<Utc>)>::new(), now), "😭 Empty");
    }
}
