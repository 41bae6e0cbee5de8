//! Integration tests: start/stop lifecycle and the inbound handler pump.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    Channel, Client, ClientUser, DbotError, Handler, HandlerResponse, Result, User, UserMessage,
};
use dbot_discord::{DiscordClient, DiscordConfig, SessionState};
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::mock_platform::{alice, inbound, me, Call, MockFactory, GUILD_TEXT};
use common::{started_client, wait_until};

#[tokio::test]
async fn start_connects_with_fresh_platform() {
    let (client, factory) = started_client().await;

    assert!(client.started());
    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(factory.count(), 1);
    assert_eq!(factory.latest().calls(), vec![Call::Login]);
    let me = client.client_user().unwrap();
    assert_eq!(me.name(), "dbot");
    assert!(me.connected());
}

#[tokio::test]
async fn start_while_connected_is_noop() {
    let (client, factory) = started_client().await;
    client.start().await.unwrap();

    assert_eq!(factory.count(), 1);
    assert_eq!(factory.latest().count(|call| *call == Call::Login), 1);
}

#[tokio::test]
async fn stop_clears_cache_and_disconnects() {
    let (client, factory) = started_client().await;
    let channel = client.fetch_channel(GUILD_TEXT).await.unwrap();
    let me = client.client_user().unwrap();
    assert_eq!(client.channel_list().len(), 1);

    client.stop().await.unwrap();

    assert!(!client.started());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.channel_list().is_empty());
    assert!(client.client_user().is_none());
    assert!(!me.connected());
    assert_eq!(factory.latest().count(|call| *call == Call::Destroy), 1);

    let err = client.send_text("hi", &channel).await.unwrap_err();
    assert!(matches!(err, DbotError::NotConnected));
    let err = channel.members().await.unwrap_err();
    assert!(matches!(err, DbotError::NotConnected));
}

#[tokio::test]
async fn stop_while_disconnected_is_noop() {
    let factory = Arc::new(MockFactory::default());
    let client = DiscordClient::with_factory(DiscordConfig::with_token("t"), factory.clone());

    client.stop().await.unwrap();
    assert_eq!(factory.count(), 0);

    client.start().await.unwrap();
    client.stop().await.unwrap();
    client.stop().await.unwrap();
    assert_eq!(factory.latest().count(|call| *call == Call::Destroy), 1);
}

#[tokio::test]
async fn restart_builds_new_wrappers() {
    let (client, factory) = started_client().await;
    let before = client.fetch_channel(GUILD_TEXT).await.unwrap();

    client.stop().await.unwrap();
    client.start().await.unwrap();

    assert_eq!(factory.count(), 2);
    let after = client.fetch_channel(GUILD_TEXT).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    let err = client.send_text("hi", &before).await.unwrap_err();
    assert!(matches!(err, DbotError::ForeignChannel(_)));
    client.send_text("hi", &after).await.unwrap();
}

#[tokio::test]
async fn teardown_failure_still_clears_cache() {
    let (client, factory) = started_client().await;
    client.fetch_channel(GUILD_TEXT).await.unwrap();
    factory.latest().fail_destroy.store(true, Ordering::SeqCst);

    client.stop().await.unwrap();

    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.channel_list().is_empty());
    client.start().await.unwrap();
    assert!(client.started());
}

#[tokio::test]
async fn login_failure_reverts_to_disconnected() {
    let factory = Arc::new(MockFactory::default());
    factory.fail_login.store(true, Ordering::SeqCst);
    let client = DiscordClient::with_factory(DiscordConfig::with_token("t"), factory.clone());

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, DbotError::Platform(_)));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.client_user().is_none());
    assert_eq!(factory.latest().count(|call| *call == Call::Destroy), 1);

    factory.fail_login.store(false, Ordering::SeqCst);
    client.start().await.unwrap();
    assert!(client.started());
    assert_eq!(factory.count(), 2);
}

/// Forwards each inbound message to the test and answers with a fixed response.
struct Recorder {
    seen: mpsc::UnboundedSender<Arc<dyn UserMessage>>,
    response: HandlerResponse,
}

#[async_trait]
impl Handler for Recorder {
    async fn handle(&self, message: &Arc<dyn UserMessage>) -> Result<HandlerResponse> {
        let _ = self.seen.send(message.clone());
        Ok(self.response.clone())
    }
}

fn recorder(response: HandlerResponse) -> (Arc<Recorder>, mpsc::UnboundedReceiver<Arc<dyn UserMessage>>) {
    let (seen, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { seen, response }), rx)
}

#[tokio::test]
async fn inbound_messages_reach_handler_once_each() {
    let (client, factory) = started_client().await;
    let (handler, mut seen) = recorder(HandlerResponse::Continue);
    client.set_handler(handler);

    let platform = factory.latest();
    platform.emit(inbound("m1", GUILD_TEXT, alice(), "first"));
    platform.emit(inbound("m2", GUILD_TEXT, alice(), "second"));

    let first = timeout(Duration::from_secs(1), seen.recv()).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(1), seen.recv()).await.unwrap().unwrap();
    assert_eq!(first.text(), "first");
    assert_eq!(second.text(), "second");
    assert!(Arc::ptr_eq(first.sender(), second.sender()));
    assert!(timeout(Duration::from_millis(50), seen.recv()).await.is_err());
    assert!(platform.sends().is_empty());
}

#[tokio::test]
async fn handler_reply_is_sent_to_origin_channel() {
    let (client, factory) = started_client().await;
    let (handler, mut seen) = recorder(HandlerResponse::Reply("pong".to_string()));
    client.set_handler(handler);

    let platform = factory.latest();
    platform.emit(inbound("m1", GUILD_TEXT, alice(), "ping"));
    timeout(Duration::from_secs(1), seen.recv()).await.unwrap().unwrap();

    assert!(wait_until(|| !platform.sends().is_empty()).await);
    let sends = platform.sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].0, GUILD_TEXT);
    assert_eq!(sends[0].1.content, "pong");
}

#[tokio::test]
async fn own_messages_are_delivered_as_self_user() {
    let (client, factory) = started_client().await;
    let (handler, mut seen) = recorder(HandlerResponse::Continue);
    client.set_handler(handler);

    factory.latest().emit(inbound("m1", GUILD_TEXT, me(), "echo"));
    let message = timeout(Duration::from_secs(1), seen.recv()).await.unwrap().unwrap();
    assert!(message
        .sender()
        .as_any()
        .is::<dbot_discord::DiscordClientUser>());
}

#[tokio::test]
async fn ended_event_stream_disconnects_client() {
    let (client, factory) = started_client().await;
    client.fetch_channel(GUILD_TEXT).await.unwrap();
    let me = client.client_user().unwrap();

    factory.latest().close_stream();

    assert!(wait_until(|| client.state() == SessionState::Disconnected).await);
    assert!(wait_until(|| factory.latest().count(|call| *call == Call::Destroy) == 1).await);
    assert!(!client.started());
    assert!(client.client_user().is_none());
    assert!(client.channel_list().is_empty());
    assert!(!me.connected());

    client.start().await.unwrap();
    assert!(client.started());
    assert_eq!(factory.count(), 2);
}

#[tokio::test]
async fn gateway_reconnect_passes_through_connecting() {
    let (client, factory) = started_client().await;
    let platform = factory.latest();

    platform.reconnect();
    assert!(wait_until(|| client.state() == SessionState::Connecting).await);
    assert!(!client.started());

    platform.ready();
    assert!(wait_until(|| client.state() == SessionState::Connected).await);
    assert_eq!(factory.count(), 1);
    assert_eq!(platform.count(|call| *call == Call::Destroy), 0);
}

#[tokio::test]
async fn stop_cancels_start_waiting_for_ready() {
    let factory = Arc::new(MockFactory::default());
    factory.hold_ready.store(true, Ordering::SeqCst);
    let client = DiscordClient::with_factory(DiscordConfig::with_token("t"), factory.clone());

    let stopping = async {
        assert!(wait_until(|| client.state() == SessionState::Connecting).await);
        client.stop().await
    };
    let (started, stopped) = timeout(Duration::from_secs(2), async {
        tokio::join!(client.start(), stopping)
    })
    .await
    .expect("stop did not cancel the pending start");

    assert!(matches!(started.unwrap_err(), DbotError::NotConnected));
    stopped.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.client_user().is_none());
    assert_eq!(factory.latest().count(|call| *call == Call::Destroy), 1);
}
