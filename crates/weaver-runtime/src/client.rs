//! The client: event bridge, reconnect policy, and send helpers.
//!
//! A [`Client`] owns a transport handle, a plugin registry, and a
//! dispatch engine. [`Client::start`] validates the configuration and
//! spawns the bridge loop, which consumes the transport's event stream,
//! re-emits each event as a [`ClientEvent`] on a broadcast channel, and
//! hands live command messages to the dispatch engine.
//!
//! # Reconnection
//!
//! When a session ends for any reason other than an explicit logout, the
//! bridge emits [`ClientEvent::Reconnecting`] and re-runs the connect
//! sequence exactly once per disconnect, waiting out a bounded
//! exponential backoff ([`RetryConfig`](crate::config::RetryConfig))
//! between attempts. A successful open resets the backoff. An explicit
//! logout — or an exhausted retry budget — emits
//! [`ClientEvent::Logout`] and stops the loop.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use weaver_core::error::{TransportError, TransportResult};
use weaver_core::message::view_once::{self, ViewOnceKind, ViewOnceLookup};
use weaver_core::message::{CanonicalMessage, RawMessage, normalize};
use weaver_core::transport::{
    BoxedTransport, Contact, DeliveryKind, Identity, OutgoingContent, ParticipantAction,
    SendOptions, TransportEvent,
};
use weaver_framework::{DispatchConfig, DispatchEngine, Plugin, PluginDescriptor, PluginLoader,
    PluginRegistry};

use crate::config::{ClientConfig, LoginMethod};
use crate::error::RuntimeResult;
use crate::store::JsonStore;

/// Capacity of the client's event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Client events
// ============================================================================

/// Events the client re-emits to the embedding application.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session is open; carries the session identity.
    Ready(Identity),
    /// A live inbound message was normalized.
    Message(CanonicalMessage),
    /// A group membership change (raw participant-update payload).
    GroupUpdate(Value),
    /// Group metadata changes (raw group-info updates).
    GroupsUpdate(Vec<Value>),
    /// An incoming call (raw call-event payload).
    Call(Value),
    /// A pairing-code login flow produced a code.
    PairingCode(String),
    /// The pairing-code request failed.
    PairingError(String),
    /// A non-logout disconnect triggered a reconnect attempt.
    Reconnecting,
    /// The transport began a connection attempt.
    Connecting,
    /// The session was explicitly logged out (or the retry budget ran
    /// out); the bridge loop has stopped.
    Logout,
}

/// How one transport session ended.
enum SessionEnd {
    /// Explicit logout; no reconnection.
    LoggedOut,
    /// Anything else. `opened` records whether the session ever reached
    /// the open state, which resets the backoff counter.
    Dropped { opened: bool },
}

// ============================================================================
// View-once surface
// ============================================================================

/// Errors from the view-once read/send helpers.
#[derive(Debug, Error)]
pub enum ViewOnceError {
    /// The quoted message matches none of the view-once shapes.
    #[error("the quoted message is not a view-once message")]
    NotViewOnce,

    /// The envelope unwrapped, but no media variant was inside.
    #[error("view-once envelope carries no media content")]
    NoContent,

    /// The media bytes could not be downloaded (commonly: expired).
    #[error("failed to download view-once media: {0}")]
    Download(TransportError),

    /// The unwrapped media could not be re-sent.
    #[error("failed to re-send view-once media: {0}")]
    Send(TransportError),
}

/// Unwrapped view-once media, ready for re-sending or storage.
#[derive(Debug, Clone)]
pub struct ViewOnceMedia {
    /// The downloaded media bytes.
    pub bytes: Vec<u8>,
    /// Media kind of the inner message.
    pub kind: ViewOnceKind,
    /// Original caption, empty when absent.
    pub caption: String,
    /// Mime type, empty when absent.
    pub mime_type: String,
    /// Voice-note flag (audio only).
    pub ptt: bool,
}

// ============================================================================
// Client
// ============================================================================

/// The framework client.
///
/// A cheap handle: cloning shares the transport, the registry, and the
/// event channel.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: BoxedTransport,
    registry: Arc<PluginRegistry>,
    dispatcher: Arc<DispatchEngine>,
    events: broadcast::Sender<ClientEvent>,
}

impl Client {
    /// Creates a client over a transport. Nothing connects until
    /// [`start`](Self::start).
    pub fn new(config: ClientConfig, transport: BoxedTransport) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let dispatcher = Arc::new(DispatchEngine::new(
            Arc::clone(&registry),
            DispatchConfig {
                prefix: config.prefix.clone(),
                owners: config.owners.clone(),
            },
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            transport,
            registry,
            dispatcher,
            events,
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The active command prefix.
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// The transport handle.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// The plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// A key-value store rooted at the configured store path.
    pub fn store(&self) -> JsonStore {
        JsonStore::new(self.config.store_path.clone())
    }

    /// Subscribes to client events. Subscribe before calling
    /// [`start`](Self::start) to observe the connection lifecycle from
    /// the beginning.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Registers a single plugin.
    pub fn load_plugin(&self, descriptor: PluginDescriptor) -> Option<Arc<Plugin>> {
        self.registry.load(descriptor)
    }

    /// Discovers and registers plugins under `dir` through the given
    /// loader; returns the number loaded. Command dispatch stays
    /// disabled until the first load pass completes.
    pub fn load_plugins(&self, loader: &dyn PluginLoader, dir: &Path) -> usize {
        self.registry.load_all(loader, dir)
    }

    /// Validates the configuration and spawns the bridge loop.
    ///
    /// Configuration problems are returned synchronously, before any
    /// connection attempt. The returned handle completes when the loop
    /// stops (logout or exhausted retries).
    pub fn start(&self) -> RuntimeResult<JoinHandle<()>> {
        self.config.validate()?;
        let client = self.clone();
        Ok(tokio::spawn(async move { client.run_loop().await }))
    }

    // ------------------------------------------------------------------
    // Bridge loop
    // ------------------------------------------------------------------

    async fn run_loop(self) {
        let mut attempt: u32 = 0;

        loop {
            match self.run_session().await {
                SessionEnd::LoggedOut => {
                    info!("Session logged out");
                    self.emit(ClientEvent::Logout);
                    return;
                }
                SessionEnd::Dropped { opened } => {
                    if opened {
                        attempt = 0;
                    }
                    attempt += 1;

                    if let Some(max) = self.config.reconnect.max_retries
                        && attempt > max
                    {
                        error!(attempts = max, "Reconnect attempts exhausted, giving up");
                        self.emit(ClientEvent::Logout);
                        return;
                    }

                    self.emit(ClientEvent::Reconnecting);
                    let delay = self.config.reconnect.delay_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Runs one transport session to completion.
    async fn run_session(&self) -> SessionEnd {
        let mut events = match self.transport.connect().await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "Connection attempt failed");
                return SessionEnd::Dropped { opened: false };
            }
        };

        if self.config.login_method == LoginMethod::Pairing
            && !self.transport.is_registered()
            && let Some(phone) = self.config.normalized_phone()
        {
            match self.transport.request_pairing_code(&phone).await {
                Ok(code) => {
                    info!(code = %code, "Pairing code issued");
                    self.emit(ClientEvent::PairingCode(code));
                }
                Err(err) => {
                    error!(error = %err, "Pairing code request failed");
                    self.emit(ClientEvent::PairingError(err.to_string()));
                }
            }
        }

        let mut opened = false;
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connecting => self.emit(ClientEvent::Connecting),
                TransportEvent::Open(identity) => {
                    opened = true;
                    info!(id = %identity.id, "Session open");
                    self.emit(ClientEvent::Ready(identity));
                }
                TransportEvent::Closed(reason) => {
                    return if reason.is_logged_out() {
                        SessionEnd::LoggedOut
                    } else {
                        debug!(?reason, "Session closed");
                        SessionEnd::Dropped { opened }
                    };
                }
                TransportEvent::Messages { batch, kind } => self.handle_batch(batch, kind).await,
                TransportEvent::GroupParticipants(update) => {
                    self.emit(ClientEvent::GroupUpdate(update));
                }
                TransportEvent::GroupsUpdate(updates) => {
                    self.emit(ClientEvent::GroupsUpdate(updates));
                }
                TransportEvent::Call(call) => self.emit(ClientEvent::Call(call)),
            }
        }

        // Event stream closed without an explicit reason.
        SessionEnd::Dropped { opened }
    }

    /// Normalizes a live batch, emits each message, and dispatches
    /// commands once the registry has completed a load pass.
    async fn handle_batch(&self, batch: Vec<RawMessage>, kind: DeliveryKind) {
        if kind != DeliveryKind::Live {
            return;
        }

        for raw in batch {
            let message = normalize(&raw, Arc::clone(&self.transport));
            self.emit(ClientEvent::Message(message.clone()));

            if self.registry.is_loaded() && message.text().starts_with(&self.config.prefix) {
                self.dispatcher.execute(&message).await;
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Send helpers
    // ------------------------------------------------------------------

    /// Sends arbitrary content to a chat.
    pub async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.transport.send_message(jid, content, options).await
    }

    /// Sends a text message.
    pub async fn send_text(
        &self,
        jid: &str,
        text: &str,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(jid, OutgoingContent::Text(text.to_string()), options)
            .await
    }

    /// Sends an image with an optional caption.
    pub async fn send_image(
        &self,
        jid: &str,
        bytes: Vec<u8>,
        caption: &str,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Image {
                bytes,
                caption: caption.to_string(),
            },
            options,
        )
        .await
    }

    /// Sends a video with an optional caption.
    pub async fn send_video(
        &self,
        jid: &str,
        bytes: Vec<u8>,
        caption: &str,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Video {
                bytes,
                caption: caption.to_string(),
            },
            options,
        )
        .await
    }

    /// Sends an audio clip; `ptt` marks it as a voice note.
    pub async fn send_audio(
        &self,
        jid: &str,
        bytes: Vec<u8>,
        ptt: bool,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Audio {
                bytes,
                mime_type: "audio/mp4".to_string(),
                ptt,
            },
            options,
        )
        .await
    }

    /// Sends a document.
    pub async fn send_document(
        &self,
        jid: &str,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Document {
                bytes,
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
            },
            options,
        )
        .await
    }

    /// Sends a pre-encoded webp sticker.
    pub async fn send_sticker(
        &self,
        jid: &str,
        webp_bytes: Vec<u8>,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(jid, OutgoingContent::Sticker(webp_bytes), options)
            .await
    }

    /// Sends contact cards.
    pub async fn send_contacts(
        &self,
        jid: &str,
        contacts: Vec<Contact>,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(jid, OutgoingContent::Contacts(contacts), options)
            .await
    }

    /// Sends a location.
    pub async fn send_location(
        &self,
        jid: &str,
        latitude: f64,
        longitude: f64,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Location {
                latitude,
                longitude,
            },
            options,
        )
        .await
    }

    /// Sends a poll.
    pub async fn send_poll(
        &self,
        jid: &str,
        name: &str,
        values: Vec<String>,
        selectable_count: u32,
        options: SendOptions,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Poll {
                name: name.to_string(),
                values,
                selectable_count,
            },
            options,
        )
        .await
    }

    /// Reacts to a message by key.
    pub async fn send_react(
        &self,
        jid: &str,
        key: weaver_core::MessageKey,
        emoji: &str,
    ) -> TransportResult<Value> {
        self.send_message(
            jid,
            OutgoingContent::Reaction {
                emoji: emoji.to_string(),
                key,
            },
            SendOptions::default(),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Group helpers
    // ------------------------------------------------------------------

    /// Fetches current metadata of a group chat.
    pub async fn group_metadata(
        &self,
        jid: &str,
    ) -> TransportResult<weaver_core::GroupMetadata> {
        self.transport.group_metadata(jid).await
    }

    /// Applies a membership action to group participants.
    pub async fn group_participants_update(
        &self,
        jid: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> TransportResult<Value> {
        self.transport
            .group_participants_update(jid, participants, action)
            .await
    }

    /// Changes a group's subject.
    pub async fn group_update_subject(&self, jid: &str, subject: &str) -> TransportResult<()> {
        self.transport.group_update_subject(jid, subject).await
    }

    /// Changes a group's description.
    pub async fn group_update_description(
        &self,
        jid: &str,
        description: &str,
    ) -> TransportResult<()> {
        self.transport.group_update_description(jid, description).await
    }

    // ------------------------------------------------------------------
    // View-once helpers
    // ------------------------------------------------------------------

    /// Unwraps a quoted view-once message and downloads its media.
    pub async fn read_view_once(
        &self,
        quoted: &CanonicalMessage,
    ) -> Result<ViewOnceMedia, ViewOnceError> {
        let inner = match view_once::unwrap(quoted.raw_content()) {
            ViewOnceLookup::Found { inner, .. } => inner,
            ViewOnceLookup::NotViewOnce => return Err(ViewOnceError::NotViewOnce),
        };

        let (kind, variant) = view_once::media_variant(&inner).ok_or(ViewOnceError::NoContent)?;
        let caption = variant
            .get("caption")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mime_type = variant
            .get("mimetype")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let ptt = variant
            .get("ptt")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let raw = RawMessage {
            key: quoted.key().clone(),
            push_name: None,
            message: inner.clone(),
        };
        let bytes = self
            .transport
            .download_media(&raw)
            .await
            .map_err(ViewOnceError::Download)?;

        Ok(ViewOnceMedia {
            bytes,
            kind,
            caption,
            mime_type,
            ptt,
        })
    }

    /// Reads a quoted view-once message and re-sends its media into a
    /// chat as a regular message.
    pub async fn send_view_once(
        &self,
        jid: &str,
        quoted: &CanonicalMessage,
        options: SendOptions,
    ) -> Result<Value, ViewOnceError> {
        let media = self.read_view_once(quoted).await?;
        let content = match media.kind {
            ViewOnceKind::Image => OutgoingContent::Image {
                bytes: media.bytes,
                caption: media.caption,
            },
            ViewOnceKind::Video => OutgoingContent::Video {
                bytes: media.bytes,
                caption: media.caption,
            },
            ViewOnceKind::Audio => OutgoingContent::Audio {
                bytes: media.bytes,
                mime_type: if media.mime_type.is_empty() {
                    "audio/mp4".to_string()
                } else {
                    media.mime_type
                },
                ptt: media.ptt,
            },
        };

        self.transport
            .send_message(jid, content, options)
            .await
            .map_err(ViewOnceError::Send)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.config.session_id)
            .field("prefix", &self.config.prefix)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
