use std::sync::Arc;
use std::time::Duration;

use lihabot_bot::helpers::topic_text;
use lihabot_core::{Player, Tank, TankQueue};
use poise::serenity_prelude::{ChannelId, EditChannel, Http};

/// Rewrite the queue channel topic from the current player count.
pub(crate) async fn update_topic(http: &Http, channel_id: ChannelId, queue_length: usize) {
    let topic = topic_text(queue_length);
    match channel_id.edit(http, EditChannel::new().topic(&topic)).await {
        Ok(_) => tracing::debug!("Channel topic set to '{}'", topic),
        Err(e) => tracing::warn!("Failed to update channel topic: {}", e),
    }
}

/// Refresh the topic in the background so command replies are not delayed.
pub(crate) fn spawn_topic_refresh(http: Arc<Http>, channel_id: ChannelId, queue: TankQueue) {
    tokio::spawn(async move {
        let total = queue.total_players().await;
        update_topic(&http, channel_id, total).await;
    });
}

/// Mention the player in the queue channel and delete the mention after `delete_after`.
pub(crate) async fn ping_player(
    http: Arc<Http>,
    channel_id: ChannelId,
    player: &Player,
    tank: &Tank,
    delete_after: Duration,
) {
    let content = format!(
        "<@{}> you're up! **{}** is waiting for you.",
        player.id, tank.display_name
    );
    let message = match channel_id.say(&http, content).await {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Failed to ping player {}: {}", player.id, e);
            return;
        }
    };

    tokio::spawn(async move {
        tokio::time::sleep(delete_after).await;
        if let Err(e) = message.delete(&*http).await {
            tracing::debug!("Failed to delete ping message: {}", e);
        }
    });
}
