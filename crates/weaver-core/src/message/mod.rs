//! Message model: raw transport messages and their canonical form.
//!
//! The transport delivers messages as opaque JSON plus a key
//! ([`RawMessage`]). [`normalize`] reshapes one raw message into a
//! [`CanonicalMessage`]: a flat, immutable record with the derived fields
//! every plugin wants (chat, sender, text, quoted message, media info) and
//! bound action methods (reply, react, download, delete, forward) that
//! capture the transport handle they need.

mod normalize;
pub mod view_once;

pub use normalize::normalize;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::TransportResult;
use crate::transport::{BoxedTransport, OutgoingContent, SendOptions};

// ============================================================================
// Raw transport shapes
// ============================================================================

/// The transport's opaque message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKey {
    /// JID of the chat the message belongs to.
    #[serde(rename = "remoteJid")]
    pub remote_jid: String,
    /// Whether the message was sent by this session.
    #[serde(rename = "fromMe", default)]
    pub from_me: bool,
    /// Stanza id, unique per chat.
    pub id: String,
    /// Sender JID inside a group chat; absent in direct chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// One inbound message exactly as the transport delivered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// The message key.
    pub key: MessageKey,
    /// Push name of the sender, if the transport knows it.
    #[serde(rename = "pushName", default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// The content object: a map from content-variant name
    /// (`conversation`, `imageMessage`, …) to the variant payload.
    #[serde(default)]
    pub message: Value,
}

// ============================================================================
// Content types
// ============================================================================

/// Keys the transport attaches for protocol bookkeeping; they never carry
/// user-visible content and are skipped when deriving the content type.
const BOOKKEEPING_KEYS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

/// The content variant of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// Plain `conversation` text.
    Text,
    /// `extendedTextMessage` (text with context, links, formatting).
    ExtendedText,
    /// `imageMessage`.
    Image,
    /// `videoMessage`.
    Video,
    /// `audioMessage`.
    Audio,
    /// `documentMessage`.
    Document,
    /// `stickerMessage`.
    Sticker,
    /// `buttonsResponseMessage` (button reply).
    ButtonReply,
    /// `templateButtonReplyMessage`.
    TemplateButtonReply,
    /// `listResponseMessage` (list row selection).
    ListReply,
    /// `interactiveResponseMessage` (native flow reply).
    InteractiveReply,
    /// Any other content variant, by its wire key.
    Other(String),
}

impl ContentType {
    /// Maps a wire key to its content type; `None` for bookkeeping keys.
    pub fn from_wire_key(key: &str) -> Option<Self> {
        if BOOKKEEPING_KEYS.contains(&key) {
            return None;
        }
        Some(match key {
            "conversation" => Self::Text,
            "extendedTextMessage" => Self::ExtendedText,
            "imageMessage" => Self::Image,
            "videoMessage" => Self::Video,
            "audioMessage" => Self::Audio,
            "documentMessage" => Self::Document,
            "stickerMessage" => Self::Sticker,
            "buttonsResponseMessage" => Self::ButtonReply,
            "templateButtonReplyMessage" => Self::TemplateButtonReply,
            "listResponseMessage" => Self::ListReply,
            "interactiveResponseMessage" => Self::InteractiveReply,
            other => Self::Other(other.to_string()),
        })
    }

    /// The wire key this content type was derived from.
    pub fn wire_key(&self) -> &str {
        match self {
            Self::Text => "conversation",
            Self::ExtendedText => "extendedTextMessage",
            Self::Image => "imageMessage",
            Self::Video => "videoMessage",
            Self::Audio => "audioMessage",
            Self::Document => "documentMessage",
            Self::Sticker => "stickerMessage",
            Self::ButtonReply => "buttonsResponseMessage",
            Self::TemplateButtonReply => "templateButtonReplyMessage",
            Self::ListReply => "listResponseMessage",
            Self::InteractiveReply => "interactiveResponseMessage",
            Self::Other(key) => key,
        }
    }

    /// Returns true for downloadable media variants.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Video | Self::Audio | Self::Document | Self::Sticker
        )
    }
}

// ============================================================================
// Canonical message
// ============================================================================

/// The canonical, framework-native view of one inbound (or quoted) message.
///
/// Constructed once by [`normalize`] and never mutated afterwards. The
/// action methods capture the transport handle taken at construction time
/// and operate on the message's own key and raw content.
#[derive(Clone)]
pub struct CanonicalMessage {
    pub(crate) key: MessageKey,
    pub(crate) chat_id: String,
    pub(crate) from_self: bool,
    pub(crate) id: String,
    pub(crate) is_group_chat: bool,
    pub(crate) sender_id: String,
    pub(crate) display_name: String,
    pub(crate) content_type: ContentType,
    pub(crate) raw_content: Value,
    pub(crate) text: String,
    pub(crate) quoted: Option<Box<CanonicalMessage>>,
    pub(crate) caption: String,
    pub(crate) mime_type: String,
    pub(crate) file_size_bytes: u64,
    pub(crate) mentioned_ids: Vec<String>,
    pub(crate) transport: BoxedTransport,
}

impl CanonicalMessage {
    /// The transport message key.
    pub fn key(&self) -> &MessageKey {
        &self.key
    }

    /// JID of the chat this message belongs to (group or direct).
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Whether this session sent the message.
    pub fn from_self(&self) -> bool {
        self.from_self
    }

    /// Stanza id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the chat is a group chat.
    pub fn is_group_chat(&self) -> bool {
        self.is_group_chat
    }

    /// JID of the sender. Equals [`chat_id`](Self::chat_id) in direct
    /// chats and the participant JID in group chats.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Push name of the sender; empty when unknown.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The derived content variant.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// The untouched transport content object.
    pub fn raw_content(&self) -> &Value {
        &self.raw_content
    }

    /// Extracted message body; empty when the content carries no text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The quoted (replied-to) message, normalized one level deep.
    pub fn quoted(&self) -> Option<&CanonicalMessage> {
        self.quoted.as_deref()
    }

    /// Media caption; empty when absent.
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Media mime type; empty when absent.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Media size in bytes; 0 when absent.
    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    /// JIDs mentioned in the message.
    pub fn mentioned_ids(&self) -> &[String] {
        &self.mentioned_ids
    }

    /// The transport handle captured at construction time.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// Reconstructs the raw transport shape of this message, as needed by
    /// quote/forward/download calls.
    pub fn to_raw(&self) -> RawMessage {
        RawMessage {
            key: self.key.clone(),
            push_name: (!self.display_name.is_empty()).then(|| self.display_name.clone()),
            message: self.raw_content.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Bound actions
    // ------------------------------------------------------------------

    /// Sends a text reply into this chat, quoting this message.
    pub async fn reply(&self, text: &str, mut options: SendOptions) -> TransportResult<Value> {
        options.quoted = Some(self.to_raw());
        self.transport
            .send_message(&self.chat_id, OutgoingContent::Text(text.to_string()), options)
            .await
    }

    /// Reacts to this message with an emoji (empty string retracts).
    pub async fn react(&self, emoji: &str) -> TransportResult<Value> {
        self.transport
            .send_message(
                &self.chat_id,
                OutgoingContent::Reaction {
                    emoji: emoji.to_string(),
                    key: self.key.clone(),
                },
                SendOptions::default(),
            )
            .await
    }

    /// Downloads this message's media content.
    ///
    /// Failures are logged and surfaced as `None`; this boundary never
    /// propagates transport errors.
    pub async fn download(&self) -> Option<Vec<u8>> {
        match self.transport.download_media(&self.to_raw()).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(message_id = %self.id, error = %err, "Media download failed");
                None
            }
        }
    }

    /// Deletes this message for everyone.
    pub async fn delete(&self) -> TransportResult<Value> {
        self.transport
            .send_message(
                &self.chat_id,
                OutgoingContent::Delete(self.key.clone()),
                SendOptions::default(),
            )
            .await
    }

    /// Forwards this message to another chat.
    pub async fn forward(&self, jid: &str, options: SendOptions) -> TransportResult<Value> {
        self.transport
            .send_message(jid, OutgoingContent::Forward(self.to_raw()), options)
            .await
    }
}

impl std::fmt::Debug for CanonicalMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalMessage")
            .field("chat_id", &self.chat_id)
            .field("sender_id", &self.sender_id)
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("text", &self.text)
            .field("is_group_chat", &self.is_group_chat)
            .field("quoted", &self.quoted)
            .finish_non_exhaustive()
    }
}
