//! The transport seam.
//!
//! Everything protocol-shaped lives behind the [`Transport`] trait: the
//! socket, the cryptographic session, authentication, and the wire codec
//! are the transport implementation's problem. The framework only consumes
//! the event stream a transport produces and calls back into it to send
//! messages, fetch group metadata, and download media.
//!
//! A transport session is started with [`Transport::connect`], which hands
//! back an [`mpsc::Receiver`] of [`TransportEvent`]s. The channel closing
//! is equivalent to a dropped connection.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::message::RawMessage;

// ============================================================================
// Session identity
// ============================================================================

/// The authenticated identity of an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Full session JID, possibly carrying a device part
    /// (e.g. `628123456789:12@s.whatsapp.net`).
    pub id: String,
    /// Display name of the account, if known.
    #[serde(default)]
    pub name: Option<String>,
}

// ============================================================================
// Inbound events
// ============================================================================

/// Why a session ended.
///
/// Only [`DisconnectReason::LoggedOut`] suppresses reconnection; every
/// other reason is treated as transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The account was explicitly logged out; the session is unusable.
    LoggedOut,
    /// The server closed the connection.
    ConnectionClosed,
    /// The connection dropped without a close frame.
    ConnectionLost,
    /// Another device took over the session.
    ConnectionReplaced,
    /// The server asked for a restart (normal after pairing).
    RestartRequired,
    /// A request timed out at the socket level.
    TimedOut,
    /// Any other reason, as reported by the transport.
    Other(String),
}

impl DisconnectReason {
    /// Returns true when the session ended in an explicit logout.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// How a message batch was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// Freshly received messages; the only kind that is dispatched.
    Live,
    /// Messages appended while offline.
    Append,
    /// History sync.
    Historical,
}

/// An event produced by the transport session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A connection attempt started.
    Connecting,
    /// The session is open and authenticated.
    Open(Identity),
    /// The session ended.
    Closed(DisconnectReason),
    /// A batch of inbound messages.
    Messages {
        /// The raw messages, in delivery order.
        batch: Vec<RawMessage>,
        /// Delivery kind of the whole batch.
        kind: DeliveryKind,
    },
    /// A group membership change (raw participant-update payload).
    GroupParticipants(Value),
    /// Group metadata changes (raw group-info updates).
    GroupsUpdate(Vec<Value>),
    /// An incoming call (raw call-event payload).
    Call(Value),
}

// ============================================================================
// Outbound content
// ============================================================================

/// A contact card attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Name shown for the contact.
    pub display_name: String,
    /// The vCard payload.
    pub vcard: String,
}

/// Content of an outbound message.
///
/// The transport owns the mapping onto wire shapes; the framework only
/// names the intent.
#[derive(Debug, Clone)]
pub enum OutgoingContent {
    /// Plain text.
    Text(String),
    /// Image with optional caption.
    Image {
        /// Encoded image bytes.
        bytes: Vec<u8>,
        /// Caption, empty for none.
        caption: String,
    },
    /// Video with optional caption.
    Video {
        /// Encoded video bytes.
        bytes: Vec<u8>,
        /// Caption, empty for none.
        caption: String,
    },
    /// Audio clip or voice note.
    Audio {
        /// Encoded audio bytes.
        bytes: Vec<u8>,
        /// Mime type (`audio/mp4` when unspecified upstream).
        mime_type: String,
        /// Push-to-talk (voice note) flag.
        ptt: bool,
    },
    /// Document attachment.
    Document {
        /// File bytes.
        bytes: Vec<u8>,
        /// File name shown to the recipient.
        file_name: String,
        /// Mime type of the file.
        mime_type: String,
    },
    /// A pre-encoded webp sticker.
    Sticker(Vec<u8>),
    /// One or more contact cards.
    Contacts(Vec<Contact>),
    /// A geographic location.
    Location {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// A poll.
    Poll {
        /// Poll question.
        name: String,
        /// Poll options.
        values: Vec<String>,
        /// How many options a voter may select.
        selectable_count: u32,
    },
    /// An emoji reaction to an existing message.
    Reaction {
        /// The emoji, or empty string to retract.
        emoji: String,
        /// Key of the message being reacted to.
        key: crate::message::MessageKey,
    },
    /// Deletion of a previously sent message.
    Delete(crate::message::MessageKey),
    /// Forward of a raw message as-is.
    Forward(RawMessage),
}

/// Options applied to an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Message to quote (reply context).
    pub quoted: Option<RawMessage>,
    /// JIDs to mention.
    pub mentions: Vec<String>,
}

impl SendOptions {
    /// Options quoting the given raw message.
    pub fn quoting(raw: RawMessage) -> Self {
        Self {
            quoted: Some(raw),
            ..Self::default()
        }
    }
}

// ============================================================================
// Group metadata
// ============================================================================

/// Admin role of a group participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    /// Regular group admin.
    Admin,
    /// The group creator.
    SuperAdmin,
}

/// One group participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupParticipant {
    /// Participant JID.
    pub id: String,
    /// Admin role, if any.
    #[serde(default)]
    pub admin: Option<AdminRole>,
}

impl GroupParticipant {
    /// Returns true when the participant holds any admin role.
    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }
}

/// Metadata of a group chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMetadata {
    /// Group JID.
    pub id: String,
    /// Group subject (title).
    #[serde(default)]
    pub subject: String,
    /// Current participants.
    #[serde(default)]
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    /// JIDs of all participants holding an admin role.
    pub fn admin_ids(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|p| p.is_admin())
            .map(|p| p.id.as_str())
    }
}

/// Membership action applied to group participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    /// Add to the group.
    Add,
    /// Remove from the group.
    Remove,
    /// Grant admin.
    Promote,
    /// Revoke admin.
    Demote,
}

// ============================================================================
// The Transport trait
// ============================================================================

/// The external protocol collaborator.
///
/// Implementations wrap a concrete WhatsApp multi-device library (socket,
/// session keys, codec). The framework never inspects wire formats; raw
/// payloads pass through as [`serde_json::Value`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a session and returns its event stream.
    ///
    /// Called once per (re)connection attempt by the client's bridge loop.
    /// The receiver closing without a [`TransportEvent::Closed`] is treated
    /// as a lost connection.
    async fn connect(&self) -> TransportResult<mpsc::Receiver<TransportEvent>>;

    /// The session identity, once known.
    fn self_id(&self) -> Option<String>;

    /// Whether the underlying session store already holds credentials.
    ///
    /// A pairing-code login is only requested when this returns false.
    fn is_registered(&self) -> bool;

    /// Sends a message to a chat. Returns the raw transport acknowledgement.
    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
        options: SendOptions,
    ) -> TransportResult<Value>;

    /// Fetches current metadata of a group chat. Network round-trip.
    async fn group_metadata(&self, jid: &str) -> TransportResult<GroupMetadata>;

    /// Applies a membership action to group participants.
    async fn group_participants_update(
        &self,
        jid: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> TransportResult<Value>;

    /// Changes a group's subject.
    async fn group_update_subject(&self, jid: &str, subject: &str) -> TransportResult<()>;

    /// Changes a group's description.
    async fn group_update_description(&self, jid: &str, description: &str)
    -> TransportResult<()>;

    /// Downloads the media content of a raw message.
    async fn download_media(&self, message: &RawMessage) -> TransportResult<Vec<u8>>;

    /// Requests a pairing code for the given phone number (digits only).
    async fn request_pairing_code(&self, phone_number: &str) -> TransportResult<String>;
}

/// A shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;
