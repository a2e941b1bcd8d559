use anyhow::Result;
use tracing::warn;

use crate::{
    bot::handlers::CommandContext,
    manga::MangaSummary,
    ui::embeds,
};

async fn send_result(cmd: &CommandContext<'_>, result: Result<Option<MangaSummary>>, not_found: String) -> Result<()> {
    let embed = match result {
        Ok(Some(manga)) => embeds::manga_embed(&manga),
        Ok(None) => embeds::error_embed("No Results", not_found),
        Err(e) => {
            warn!("⚠️ MangaDex request failed: {:?}", e);
            embeds::error_embed("API Error", "Could not connect to MangaDex API.")
        }
    };

    cmd.reply(embed).await?;
    Ok(())
}

pub async fn manga(cmd: &CommandContext<'_>) -> Result<()> {
    let query = cmd.required_text("title")?;
    let _ = cmd.msg.channel_id.broadcast_typing(&cmd.ctx.http).await;

    let result = cmd.bot.manga.search(query).await;
    send_result(cmd, result, format!("No manga found for '{}'.", query)).await
}

pub async fn random_manga(cmd: &CommandContext<'_>) -> Result<()> {
    let _ = cmd.msg.channel_id.broadcast_typing(&cmd.ctx.http).await;

    let result = cmd.bot.manga.random().await;
    send_result(cmd, result, "Could not get random manga.".to_string()).await
}
