use crate::{Context, notify};
use lihabot_bot::helpers::now;
use lihabot_bot::render;
use lihabot_bot::validation::validate_tank_name;
use lihabot_core::{Committed, QueueError, QueueMode, QueueRef};
use poise::CreateReply;
use poise::command;
use poise::serenity_prelude::{self as serenity, CreateEmbed};

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

const NO_TANK: &str = "You don't have a tank! Add yourself with `/add-tank`.";

/// Reply only the caller can see.
async fn reply(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Reply the whole channel can see.
async fn announce(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn saved<T>(embed: CreateEmbed, committed: &Committed<T>) -> CreateEmbed {
    if committed.is_persisted() {
        embed
    } else {
        render::unsaved(embed)
    }
}

/// Run `follow_up` whether or not the reply went out, then return the reply's result.
async fn after_reply(
    sent: Result<(), Error>,
    follow_up: impl Future<Output = ()>,
) -> Result<(), Error> {
    if let Err(e) = &sent {
        tracing::warn!("Failed to send reply: {}", e);
    }
    follow_up.await;
    sent
}

fn refresh_topic(ctx: Context<'_>) {
    let data = ctx.data();
    notify::spawn_topic_refresh(
        ctx.serenity_context().http.clone(),
        data.channel_id,
        data.queue.clone(),
    );
}

/// Resolve the optional tank argument against the queue mode.
fn queue_ref(mode: QueueMode, tank: Option<String>) -> Option<QueueRef> {
    match (mode, tank) {
        (QueueMode::Shared, _) => Some(QueueRef::Shared),
        (QueueMode::PerTank, Some(tank)) => Some(QueueRef::Tank(tank)),
        (QueueMode::PerTank, None) => None,
    }
}

async fn queue_name(ctx: Context<'_>, queue: &QueueRef) -> String {
    match queue {
        QueueRef::Tank(key) => match ctx.data().queue.find_by_key(key).await {
            Some(tank) => format!("{}'s queue", tank.display_name),
            None => format!("{key}'s queue"),
        },
        QueueRef::Shared => "the queue".to_string(),
    }
}

/// Tank suggestions; none in shared mode, where the option is ignored.
async fn autocomplete_tank(
    ctx: Context<'_>,
    partial: &str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> {
    let queue = &ctx.data().queue;
    let choices = match queue.mode() {
        QueueMode::Shared => Vec::new(),
        QueueMode::PerTank => queue.tank_choices(partial).await,
    };
    choices
        .into_iter()
        .map(|choice| serenity::AutocompleteChoice::new(choice.display_name, choice.key))
}

async fn autocomplete_owned_tank(
    ctx: Context<'_>,
    partial: &str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> {
    let owner = ctx.author().id.to_string();
    ctx.data()
        .queue
        .owned_tank_choices(&owner, partial)
        .await
        .into_iter()
        .map(|choice| serenity::AutocompleteChoice::new(choice.display_name, choice.key))
}

/// Join the queue
#[command(slash_command)]
pub async fn join(
    ctx: Context<'_>,
    #[description = "Whose queue to join (per-tank mode only; ignored with a shared queue)"]
    #[autocomplete = "autocomplete_tank"]
    tank: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(queue) = queue_ref(data.queue.mode(), tank) else {
        return reply(ctx, render::error("Could not join", "Pick a tank to queue for.")).await;
    };

    let author = ctx.author();
    match data
        .queue
        .join(&queue, &author.id.to_string(), author.display_name(), now())
        .await
    {
        Ok(committed) => {
            refresh_topic(ctx);
            let name = queue_name(ctx, &queue).await;
            reply(ctx, saved(render::joined(&committed.value, &name), &committed)).await
        }
        Err(e) => reply(ctx, render::failure("Could not join", &e)).await,
    }
}

/// Leave the queue
#[command(slash_command)]
pub async fn leave(
    ctx: Context<'_>,
    #[description = "Whose queue to leave (per-tank mode only; ignored with a shared queue)"]
    #[autocomplete = "autocomplete_tank"]
    tank: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let author_id = ctx.author().id.to_string();

    // Without an explicit tank, leave whichever queue the player is in.
    let queue = match queue_ref(data.queue.mode(), tank) {
        Some(queue) => queue,
        None => match data.queue.position_anywhere(&author_id).await {
            Some(found) => found.tank.map_or(QueueRef::Shared, |t| QueueRef::Tank(t.key)),
            None => return reply(ctx, render::position(None)).await,
        },
    };

    match data.queue.leave(&queue, &author_id).await {
        Ok(committed) => {
            refresh_topic(ctx);
            let name = queue_name(ctx, &queue).await;
            reply(
                ctx,
                saved(render::left(&committed.value.player.name, &name), &committed),
            )
            .await
        }
        Err(e) => reply(ctx, render::failure("Could not leave", &e)).await,
    }
}

/// Take the next player from your queue (tanks only)
#[command(slash_command)]
pub async fn next(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    match data.queue.take_next(&ctx.author().id.to_string()).await {
        Ok(committed) => {
            refresh_topic(ctx);
            let sent = reply(ctx, saved(render::taken(&committed.value), &committed)).await;
            let taken = committed.into_inner();
            // The player is already off the queue, so the ping goes out even if the reply failed.
            after_reply(
                sent,
                notify::ping_player(
                    ctx.serenity_context().http.clone(),
                    data.channel_id,
                    &taken.player,
                    &taken.tank,
                    data.ping_delete_after,
                ),
            )
            .await
        }
        Err(QueueError::QueueEmpty(queue)) => reply(ctx, render::queue_empty(&queue)).await,
        Err(QueueError::NotAuthorized) => reply(ctx, render::error("No tank", NO_TANK)).await,
        Err(e) => reply(ctx, render::failure("Could not take next", &e)).await,
    }
}

/// Empty your queue (tanks only)
#[command(slash_command)]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    match data.queue.clear(&ctx.author().id.to_string()).await {
        Ok(committed) => {
            refresh_topic(ctx);
            announce(ctx, saved(render::cleared(&committed.value), &committed)).await
        }
        Err(QueueError::NotAuthorized) => reply(ctx, render::error("No tank", NO_TANK)).await,
        Err(e) => reply(ctx, render::failure("Could not clear", &e)).await,
    }
}

/// Show everyone waiting in line
#[command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let snapshot = ctx.data().queue.snapshot().await;
    reply(ctx, render::status(&snapshot, now())).await
}

/// Check your place in line
#[command(slash_command)]
pub async fn position(ctx: Context<'_>) -> Result<(), Error> {
    let found = ctx
        .data()
        .queue
        .position_anywhere(&ctx.author().id.to_string())
        .await;
    reply(ctx, render::position(found.as_ref())).await
}

/// Register yourself as a tank
#[command(slash_command, rename = "add-tank")]
pub async fn add_tank(
    ctx: Context<'_>,
    #[description = "Tank name"]
    #[max_length = 32]
    name: String,
) -> Result<(), Error> {
    let name = match validate_tank_name(&name) {
        Ok(name) => name,
        Err(e) => return reply(ctx, render::error("Invalid name", e.to_string())).await,
    };

    let data = ctx.data();
    match data
        .queue
        .register(&ctx.author().id.to_string(), name, name, now())
        .await
    {
        Ok(committed) => {
            refresh_topic(ctx);
            announce(ctx, saved(render::tank_added(&committed.value), &committed)).await
        }
        Err(e) => reply(ctx, render::failure("Could not add tank", &e)).await,
    }
}

/// Retire your tank
#[command(slash_command, rename = "remove-tank")]
pub async fn remove_tank(
    ctx: Context<'_>,
    #[description = "Tank to remove"]
    #[autocomplete = "autocomplete_owned_tank"]
    name: String,
) -> Result<(), Error> {
    let data = ctx.data();
    match data
        .queue
        .unregister(&ctx.author().id.to_string(), &name)
        .await
    {
        Ok(committed) => {
            refresh_topic(ctx);
            announce(ctx, saved(render::tank_removed(&committed.value), &committed)).await
        }
        Err(e) => reply(ctx, render::failure("Could not remove tank", &e)).await,
    }
}

/// List registered tanks
#[command(slash_command)]
pub async fn tanks(ctx: Context<'_>) -> Result<(), Error> {
    let tanks = ctx.data().queue.list_tanks().await;
    reply(ctx, render::tank_list(&tanks)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_queue_ref_follows_mode() {
        assert_eq!(
            queue_ref(QueueMode::Shared, Some("kake".into())),
            Some(QueueRef::Shared)
        );
        assert_eq!(queue_ref(QueueMode::Shared, None), Some(QueueRef::Shared));
        assert_eq!(
            queue_ref(QueueMode::PerTank, Some("kake".into())),
            Some(QueueRef::Tank("kake".into()))
        );
        assert_eq!(queue_ref(QueueMode::PerTank, None), None);
    }

    #[tokio::test]
    async fn test_follow_up_runs_when_reply_fails() {
        let pinged = AtomicBool::new(false);
        let result = after_reply(Err("interaction expired".into()), async {
            pinged.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(pinged.load(Ordering::SeqCst));
        assert_eq!(result.unwrap_err().to_string(), "interaction expired");
    }

    #[tokio::test]
    async fn test_follow_up_runs_after_successful_reply() {
        let pinged = AtomicBool::new(false);
        let result = after_reply(Ok(()), async {
            pinged.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(pinged.load(Ordering::SeqCst));
        assert!(result.is_ok());
    }

    #[test]
    fn test_tank_option_says_it_is_per_tank_only() {
        for command in [join(), leave()] {
            let description = command.parameters[0].description.clone().unwrap_or_default();
            assert!(description.contains("per-tank mode only"), "{}", command.name);
        }
    }
}
