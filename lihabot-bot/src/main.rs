mod discord_commands;
mod notify;

use anyhow::Context as _;
use lihabot_bot::config::Config;
use lihabot_bot::{RateLimitConfig, create_app};
use lihabot_core::{DailyClear, TankQueue};
use poise::{Framework, FrameworkOptions, serenity_prelude as serenity};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) queue: TankQueue,
    pub(crate) channel_id: serenity::ChannelId,
    pub(crate) ping_delete_after: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let log_level = "debug";
    #[cfg(not(debug_assertions))]
    let log_level = "info";

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Lihabotti...");

    let config = Config::from_env();
    config.validate()?;
    let mode = config.mode()?;
    tracing::info!(
        "Configuration: port={}, data_path={}, mode={}, daily_clear={:02}:{:02}, timeout={}s",
        config.port,
        config.data_path,
        mode,
        config.clear_hour,
        config.clear_minute,
        config.request_timeout.as_secs()
    );
    tracing::info!(
        "Rate limits: status={}/sec (burst {})",
        config.rate_limit_per_sec,
        config.rate_limit_burst
    );

    let token = config
        .discord_token
        .clone()
        .context("DISCORD_TOKEN is not set")?;
    let channel_id = serenity::ChannelId::new(
        config
            .queue_channel_id
            .context("QUEUE_CHANNEL_ID is not set")?,
    );

    let queue = TankQueue::open(&config.data_path, mode).await;
    let daily_clear = DailyClear::new(config.clear_hour, config.clear_minute)
        .context("daily clear time is out of range")?;
    let (_clear_task, mut clear_reports) =
        daily_clear.spawn(queue.clone(), config.clear_check_interval);

    let rate_limit = RateLimitConfig {
        per_sec: config.rate_limit_per_sec,
        burst: config.rate_limit_burst,
    };
    let app = create_app(queue.clone(), config.request_timeout, rate_limit);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Status server listening on {}", addr);

    let intents = serenity::GatewayIntents::non_privileged();
    let ping_delete_after = config.ping_delete_after;
    let setup_queue = queue.clone();

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                discord_commands::join(),
                discord_commands::leave(),
                discord_commands::next(),
                discord_commands::clear(),
                discord_commands::status(),
                discord_commands::position(),
                discord_commands::add_tank(),
                discord_commands::remove_tank(),
                discord_commands::tanks(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let total = setup_queue.total_players().await;
                notify::update_topic(&ctx.http, channel_id, total).await;
                Ok(Data {
                    queue: setup_queue,
                    channel_id,
                    ping_delete_after,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("failed to create Discord client")?;

    let http = client.http.clone();
    tokio::spawn(async move {
        while let Some(report) = clear_reports.recv().await {
            if report.first_since_start {
                tracing::debug!(
                    "First daily clear since start; a restart inside the trigger minute can clear twice"
                );
            }
            if !report.persisted {
                tracing::warn!("Daily clear on {} was not saved to disk", report.date);
            }
            if report.evicted > 0 {
                tracing::info!(
                    "Daily clear on {} removed {} players",
                    report.date,
                    report.evicted
                );
                notify::update_topic(&http, channel_id, 0).await;
            }
        }
    });

    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
    }
    Ok(())
}
