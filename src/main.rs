use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod manga;
mod sources;
mod storage;
mod ui;

use crate::bot::{Bot, ShardManagerContainer};
use crate::config::Config;
use crate::sources::youtube::YouTubeClient;
use crate::storage::GuildStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("multipurpose_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    // Los chequeos de dependencias no necesitan token
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }
    if std::env::args().any(|arg| arg == "--update-ytdlp") {
        return YouTubeClient::update_ytdlp().await;
    }

    info!("🤖 Starting multipurpose bot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    // Base de datos JSON
    let storage = Arc::new(tokio::sync::Mutex::new(
        GuildStore::open(config.data_file.clone(), config.default_prefix.clone()).await?,
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES
        | GatewayIntents::DIRECT_MESSAGES;

    let token = config.discord_token.clone();
    let handler = Bot::new(config, storage, Arc::new(YouTubeClient::new()))?;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    {
        let mut data = client.data.write().await;
        data.insert::<ShardManagerContainer>(client.shard_manager.clone());
    }

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing shards...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Missing dependencies (yt-dlp and ffmpeg are required)");
    }
}
