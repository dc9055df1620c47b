//! # Weaver Core
//!
//! Foundation layer of the weaver WhatsApp bot framework.
//!
//! This crate holds everything the higher layers agree on:
//!
//! - **Message model**: raw transport messages and their canonical,
//!   normalized form with bound action methods ([`CanonicalMessage`],
//!   [`message::normalize`])
//! - **Command parsing**: prefix/token extraction ([`command::parse`])
//! - **Transport seam**: the [`Transport`] trait and its event stream —
//!   the wire protocol, encryption, and authentication live entirely
//!   behind this trait
//! - **View-once matching**: structural search over quoted payloads
//!   ([`message::view_once`])
//! - **JID helpers** and small formatting utilities
//!
//! The framework layer (plugin registry + dispatch) builds on these in
//! `weaver-framework`; the client/event bridge lives in `weaver-runtime`.

pub mod command;
pub mod error;
pub mod jid;
pub mod message;
pub mod transport;
pub mod util;

pub use error::{TransportError, TransportResult};
pub use message::{
    CanonicalMessage, ContentType, MessageKey, RawMessage, normalize,
    view_once::{ViewOnceKind, ViewOnceLookup, ViewOncePath},
};
pub use transport::{
    AdminRole, BoxedTransport, Contact, DeliveryKind, DisconnectReason, GroupMetadata,
    GroupParticipant, Identity, OutgoingContent, ParticipantAction, SendOptions, Transport,
    TransportEvent,
};
