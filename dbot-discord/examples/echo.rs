//! Echo bot: replies to every message with its own text.
//!
//! Reads DISCORD_TOKEN (or BOT_TOKEN) from the environment or a `.env` file.
//! Run with `cargo run -p dbot-discord --example echo`.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{init_tracing, Handler, HandlerResponse, Result, User, UserMessage};
use dbot_discord::{run_until_shutdown, DiscordClient, DiscordClientUser, DiscordConfig};

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, message: &Arc<dyn UserMessage>) -> Result<HandlerResponse> {
        if message.sender().as_any().is::<DiscordClientUser>() || message.text().is_empty() {
            return Ok(HandlerResponse::Continue);
        }
        Ok(HandlerResponse::Reply(message.text().to_string()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DiscordConfig::from_env()?;
    init_tracing(config.log_file.as_deref())?;

    let client = DiscordClient::new(config);
    run_until_shutdown(&client, Arc::new(Echo)).await
}
