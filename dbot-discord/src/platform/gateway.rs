//! Discord gateway connection: Hello, Identify, heartbeats, and dispatch of the events the adapter
//! consumes (`READY`, `MESSAGE_CREATE`).
//!
//! [`supervise`] keeps one connection alive at a time and reconnects with a back-off. The event
//! stream only closes when the subscriber goes away or Discord rejects the session for good.

use std::time::Duration;

use dbot_core::{DbotError, Result};
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::native::{NativeMessage, NativeUser};
use super::GatewayEvent;

/// Intents: GUILDS (1) | GUILD_MESSAGES (512) | DIRECT_MESSAGES (4096) | MESSAGE_CONTENT (32768)
const GATEWAY_INTENTS: u64 = 1 | 512 | 4096 | 32768;
const DEFAULT_HEARTBEAT_MS: u64 = 41250;

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const MAX_BACKOFF_SECS: u64 = 60;

pub(super) async fn fetch_gateway_url(client: &Client, api_base: &str, token: &str) -> Result<String> {
    let response = client
        .get(format!("{api_base}/gateway/bot"))
        .header("Authorization", format!("Bot {token}"))
        .send()
        .await
        .map_err(DbotError::platform)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DbotError::Platform(format!(
            "Discord gateway lookup failed ({status}): {body}"
        )));
    }

    let body: Value = response.json().await.map_err(DbotError::platform)?;
    let url = body["url"]
        .as_str()
        .ok_or_else(|| DbotError::Platform("missing 'url' in gateway response".to_string()))?;
    Ok(format!("{url}/?v=10&encoding=json"))
}

/// What the read loop should do with one gateway frame.
#[derive(Debug)]
enum Frame {
    Event(GatewayEvent),
    HeartbeatRequest,
    HeartbeatAck,
    Reconnect,
    Ignore,
}

fn parse_frame(payload: &Value, sequence: &mut Option<u64>) -> Frame {
    if let Some(s) = payload["s"].as_u64() {
        *sequence = Some(s);
    }

    match payload["op"].as_u64() {
        Some(OP_DISPATCH) => match payload["t"].as_str() {
            Some("READY") => match serde_json::from_value::<NativeUser>(payload["d"]["user"].clone()) {
                Ok(user) => Frame::Event(GatewayEvent::Ready(user)),
                Err(e) => {
                    warn!(error = %e, "Malformed READY payload");
                    Frame::Ignore
                }
            },
            Some("MESSAGE_CREATE") => {
                match serde_json::from_value::<NativeMessage>(payload["d"].clone()) {
                    Ok(message) => Frame::Event(GatewayEvent::MessageCreate(message)),
                    Err(e) => {
                        warn!(error = %e, "Malformed MESSAGE_CREATE payload");
                        Frame::Ignore
                    }
                }
            }
            _ => Frame::Ignore,
        },
        Some(OP_HEARTBEAT) => Frame::HeartbeatRequest,
        Some(OP_HEARTBEAT_ACK) => Frame::HeartbeatAck,
        Some(OP_RECONNECT) | Some(OP_INVALID_SESSION) => Frame::Reconnect,
        _ => Frame::Ignore,
    }
}

fn heartbeat_frame(sequence: Option<u64>) -> WsMessage {
    WsMessage::Text(json!({ "op": OP_HEARTBEAT, "d": sequence }).to_string().into())
}

/// Why a single connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// Socket dropped, Discord asked for a reconnect, or heartbeats went unacknowledged.
    Retry,
    /// Discord closed with a code that a new Identify cannot fix (bad token, bad intents...).
    Fatal(u16),
    /// Nobody listens for events any more.
    SubscriberGone,
}

/// Close codes after which Discord will keep rejecting the same token and intents.
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010 | 4011 | 4012 | 4013 | 4014)
}

/// Delay before reconnect attempt `attempt` (0-based): 1s, 2s, 4s ... capped at one minute.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs((1u64 << attempt.min(6)).min(MAX_BACKOFF_SECS))
}

/// Keeps the gateway connected until the subscriber is dropped or the session is rejected for good.
/// Every reconnect is announced with [`GatewayEvent::Reconnecting`]; the next `READY` completes it.
pub(super) async fn supervise(
    client: Client,
    api_base: String,
    token: String,
    first_url: String,
    events: mpsc::UnboundedSender<GatewayEvent>,
) {
    let mut url = Some(first_url);
    let mut attempt: u32 = 0;

    loop {
        let ready_seen = match url.take() {
            Some(current) => {
                let (end, ready_seen) = run(&current, &token, &events).await;
                match end {
                    Disconnect::Retry => {}
                    Disconnect::Fatal(code) => {
                        error!(code, "Discord rejected the gateway session");
                        return;
                    }
                    Disconnect::SubscriberGone => return,
                }
                ready_seen
            }
            None => false,
        };

        if ready_seen {
            attempt = 0;
        }
        if events.send(GatewayEvent::Reconnecting).is_err() {
            return;
        }
        let delay = backoff(attempt);
        attempt = attempt.saturating_add(1);
        warn!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting to Discord gateway");
        tokio::time::sleep(delay).await;

        match fetch_gateway_url(&client, &api_base, &token).await {
            Ok(next) => url = Some(next),
            Err(e) => warn!(error = %e, "Gateway lookup failed"),
        }
    }
}

/// Runs one gateway connection until it ends. Returns why it ended and whether `READY` was seen.
async fn run(
    url: &str,
    token: &str,
    events: &mpsc::UnboundedSender<GatewayEvent>,
) -> (Disconnect, bool) {
    let ws_stream = match tokio_tungstenite::connect_async(url).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!(error = %e, "Failed to connect to Discord gateway");
            return (Disconnect::Retry, false);
        }
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let heartbeat_ms = match ws_read.next().await {
        Some(Ok(msg)) => {
            let payload: Value = msg
                .to_text()
                .ok()
                .and_then(|text| serde_json::from_str(text).ok())
                .unwrap_or_default();
            if payload["op"].as_u64() == Some(OP_HELLO) {
                payload["d"]["heartbeat_interval"]
                    .as_u64()
                    .unwrap_or(DEFAULT_HEARTBEAT_MS)
            } else {
                warn!("Expected Hello (op 10) from Discord gateway");
                DEFAULT_HEARTBEAT_MS
            }
        }
        _ => {
            error!("No Hello from Discord gateway");
            return (Disconnect::Retry, false);
        }
    };
    debug!(heartbeat_ms, "Discord heartbeat interval");

    let identify = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "dbot",
                "device": "dbot"
            }
        }
    });
    if let Err(e) = ws_write
        .send(WsMessage::Text(identify.to_string().into()))
        .await
    {
        error!(error = %e, "Failed to send Identify");
        return (Disconnect::Retry, false);
    }

    let mut sequence: Option<u64> = None;
    let mut awaiting_ack = false;
    let mut ready_seen = false;
    let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
    heartbeat.tick().await;

    let end = loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if awaiting_ack {
                    warn!("Discord heartbeat not acknowledged, dropping connection");
                    break Disconnect::Retry;
                }
                if let Err(e) = ws_write.send(heartbeat_frame(sequence)).await {
                    warn!(error = %e, "Discord heartbeat failed");
                    break Disconnect::Retry;
                }
                awaiting_ack = true;
            }
            frame = ws_read.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = %e, "Discord WebSocket error");
                        break Disconnect::Retry;
                    }
                    None => break Disconnect::Retry,
                };
                if let WsMessage::Close(close) = &msg {
                    let code = close.as_ref().map(|frame| u16::from(frame.code));
                    warn!(?code, "Discord gateway closed the connection");
                    match code {
                        Some(code) if is_fatal_close(code) => break Disconnect::Fatal(code),
                        _ => break Disconnect::Retry,
                    }
                }
                let Ok(text) = msg.to_text() else { continue };
                let Ok(payload) = serde_json::from_str::<Value>(text) else { continue };

                match parse_frame(&payload, &mut sequence) {
                    Frame::Event(event) => {
                        ready_seen |= matches!(event, GatewayEvent::Ready(_));
                        if events.send(event).is_err() {
                            debug!("Discord event subscriber dropped");
                            break Disconnect::SubscriberGone;
                        }
                    }
                    Frame::HeartbeatRequest => {
                        if let Err(e) = ws_write.send(heartbeat_frame(sequence)).await {
                            warn!(error = %e, "Discord heartbeat failed");
                            break Disconnect::Retry;
                        }
                        awaiting_ack = true;
                    }
                    Frame::HeartbeatAck => {
                        debug!("Heartbeat ACK");
                        awaiting_ack = false;
                    }
                    Frame::Reconnect => {
                        warn!("Discord gateway requested reconnect");
                        break Disconnect::Retry;
                    }
                    Frame::Ignore => {}
                }
            }
        }
    };

    info!(?end, "Discord gateway connection ended");
    (end, ready_seen)
}
