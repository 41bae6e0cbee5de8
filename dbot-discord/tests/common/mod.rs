pub mod mock_platform;

use std::sync::Arc;
use std::time::Duration;

use dbot_core::Client;
use dbot_discord::{DiscordClient, DiscordConfig};

use mock_platform::MockFactory;

/// Client over a [`MockFactory`], already started.
pub async fn started_client() -> (DiscordClient, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::default());
    let client = DiscordClient::with_factory(DiscordConfig::with_token("test-token"), factory.clone());
    client.start().await.expect("start");
    (client, factory)
}

/// Polls `condition` every 10ms for up to one second.
#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
