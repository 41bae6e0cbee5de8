//! Runs a [`DiscordClient`] with an inbound handler until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use dbot_core::{Client, Handler};
use tracing::{info, instrument};

use crate::client::DiscordClient;

/// Installs `handler`, starts the client, waits for Ctrl-C and stops it again.
/// A `Reply` returned by the handler is sent back to the channel the message came from.
#[instrument(skip_all)]
pub async fn run_until_shutdown(client: &DiscordClient, handler: Arc<dyn Handler>) -> Result<()> {
    client.set_handler(handler);
    client.start().await?;
    if let Some(me) = client.client_user() {
        info!(user_id = %me.identity_id(), username = %me.name(), "Bot running, press Ctrl-C to stop");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    client.stop().await?;
    Ok(())
}
