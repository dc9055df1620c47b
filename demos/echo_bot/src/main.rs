//! Echo Bot Example
//!
//! A self-contained demonstration of the weaver framework. Instead of a
//! real WhatsApp connection it wires the client to a scripted transport
//! that replays a fixed conversation, so the whole flow — normalization,
//! event fan-out, plugin dispatch, access control, storage — runs without
//! credentials.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::info;

use weaver::prelude::*;
use weaver::transport::{GroupMetadata, ParticipantAction};
use weaver::{TransportError, TransportResult, logging};

// ============================================================================
// Scripted transport
// ============================================================================

/// A transport that replays a scripted conversation and prints whatever
/// the bot sends back.
struct ScriptTransport {
    sessions: Mutex<VecDeque<Vec<TransportEvent>>>,
}

impl ScriptTransport {
    fn new(sessions: Vec<Vec<TransportEvent>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
        })
    }
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn connect(&self) -> TransportResult<mpsc::Receiver<TransportEvent>> {
        let Some(events) = self.sessions.lock().pop_front() else {
            return Err(TransportError::ConnectionFailed {
                reason: "script finished".to_string(),
            });
        };

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for event in events {
                // A little pacing so the log reads like a conversation.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn self_id(&self) -> Option<String> {
        Some("628999000111:1@s.whatsapp.net".to_string())
    }

    fn is_registered(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
        _options: SendOptions,
    ) -> TransportResult<Value> {
        match content {
            OutgoingContent::Text(text) => info!("→ {jid}: {text}"),
            other => info!("→ {jid}: {other:?}"),
        }
        Ok(Value::Null)
    }

    async fn group_metadata(&self, jid: &str) -> TransportResult<GroupMetadata> {
        Ok(GroupMetadata {
            id: jid.to_string(),
            subject: "Demo Group".to_string(),
            participants: Vec::new(),
        })
    }

    async fn group_participants_update(
        &self,
        _jid: &str,
        _participants: &[String],
        _action: ParticipantAction,
    ) -> TransportResult<Value> {
        Ok(Value::Null)
    }

    async fn group_update_subject(&self, _jid: &str, _subject: &str) -> TransportResult<()> {
        Ok(())
    }

    async fn group_update_description(
        &self,
        _jid: &str,
        _description: &str,
    ) -> TransportResult<()> {
        Ok(())
    }

    async fn download_media(&self, _message: &RawMessage) -> TransportResult<Vec<u8>> {
        Err(TransportError::Download("no media in this demo".to_string()))
    }

    async fn request_pairing_code(&self, _phone_number: &str) -> TransportResult<String> {
        Ok("DEMO-CODE".to_string())
    }
}

// ============================================================================
// Plugins
// ============================================================================

/// Serves the built-in plugin set. A production loader would scan the
/// directory for plugin manifests; the demo's set is static.
struct BuiltinPlugins;

impl PluginLoader for BuiltinPlugins {
    fn discover(&self, _dir: &Path) -> std::io::Result<Vec<PluginDescriptor>> {
        Ok(vec![ping_plugin(), echo_plugin(), stats_plugin(), shutdown_plugin()])
    }
}

/// `!ping` — liveness check.
fn ping_plugin() -> PluginDescriptor {
    PluginDescriptor::new()
        .name("ping")
        .category("core")
        .description("Replies with pong")
        .handler(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.message.reply("Pong! 🏓", SendOptions::default()).await?;
                Ok(())
            })
        }))
}

/// `!echo <text>` — echoes the arguments back.
fn echo_plugin() -> PluginDescriptor {
    PluginDescriptor::new()
        .name("echo")
        .commands(["echo", "say"])
        .category("core")
        .description("Echoes the given text")
        .handler(handler_fn(|ctx| {
            Box::pin(async move {
                let text = ctx.arg_text();
                if text.is_empty() {
                    ctx.message
                        .reply(&format!("Usage: {}echo <text>", ctx.prefix), SendOptions::default())
                        .await?;
                } else {
                    ctx.message.reply(&text, SendOptions::default()).await?;
                }
                Ok(())
            })
        }))
}

/// `!stats` — counts invocations per sender in the key-value store.
fn stats_plugin() -> PluginDescriptor {
    PluginDescriptor::new()
        .name("stats")
        .category("fun")
        .description("Counts how often you asked")
        .handler(handler_fn(|ctx| {
            Box::pin(async move {
                let store = JsonStore::new("./demo-store");
                let sender = ctx.message.sender_id().to_string();
                let updated = store.increment("stats", &sender, "asked", 1).await?;
                let count = updated["asked"].as_i64().unwrap_or(0);
                ctx.message
                    .reply(&format!("You have asked {count} time(s)."), SendOptions::default())
                    .await?;
                Ok(())
            })
        }))
}

/// `!shutdown` — owner-only, demonstrates access control.
fn shutdown_plugin() -> PluginDescriptor {
    PluginDescriptor::new()
        .name("shutdown")
        .category("admin")
        .description("Owner-only demonstration command")
        .owner_only()
        .handler(handler_fn(|ctx| {
            Box::pin(async move {
                ctx.message.reply("Shutting down…", SendOptions::default()).await?;
                Ok(())
            })
        }))
}

// ============================================================================
// Script
// ============================================================================

fn inbound(sender: &str, text: &str) -> TransportEvent {
    TransportEvent::Messages {
        batch: vec![RawMessage {
            key: MessageKey {
                remote_jid: sender.to_string(),
                from_me: false,
                id: format!("DEMO-{}", text.len()),
                participant: None,
            },
            push_name: Some("Demo User".to_string()),
            message: json!({"conversation": text}),
        }],
        kind: DeliveryKind::Live,
    }
}

fn script() -> Vec<Vec<TransportEvent>> {
    let friend = "628123456789@s.whatsapp.net";
    let stranger = "628555555555@s.whatsapp.net";

    vec![vec![
        TransportEvent::Connecting,
        TransportEvent::Open(Identity {
            id: "628999000111:1@s.whatsapp.net".to_string(),
            name: Some("weaver demo".to_string()),
        }),
        inbound(friend, "hello bot"),
        inbound(friend, "!ping"),
        inbound(friend, "!echo talk to me"),
        inbound(friend, "!stats"),
        inbound(stranger, "!shutdown"),
        inbound(friend, "!shutdown"),
        TransportEvent::Closed(DisconnectReason::LoggedOut),
    ]]
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    logging::LoggingBuilder::new()
        .with_level(tracing::Level::INFO)
        .init();

    let config = ClientConfig {
        // The "friend" in the script is the owner; the stranger is not.
        owners: vec!["628123456789".to_string()],
        ..ClientConfig::default()
    };

    let client = Client::new(config, ScriptTransport::new(script()));

    // The demo's plugin set is static, so any existing directory
    // satisfies the load pass.
    let loaded = client.load_plugins(&BuiltinPlugins, Path::new("."));
    info!("Loaded {loaded} plugin(s)");

    let mut events = client.events();
    let handle = client.start()?;

    while let Ok(event) = events.recv().await {
        match event {
            ClientEvent::Ready(identity) => {
                info!("Ready as {} ({:?})", identity.id, identity.name);
            }
            ClientEvent::Message(message) => {
                info!("← {}: {}", message.sender_id(), message.text());
            }
            ClientEvent::Logout => {
                info!("Logged out, bye");
                break;
            }
            other => info!("Event: {other:?}"),
        }
    }

    handle.await?;
    Ok(())
}
