//! # Weaver
//!
//! A convenience framework over an external WhatsApp multi-device
//! transport. Weaver normalizes inbound messages into a canonical form
//! with bound action methods, routes prefixed text commands to plugins
//! with owner/group/admin access control, re-emits transport lifecycle
//! events with a bounded-backoff reconnect policy, and ships a JSON
//! key-value store and logging setup.
//!
//! The wire protocol, encryption, and authentication are *not* here:
//! they live behind [`Transport`], implemented by the embedding
//! application over its protocol library of choice.
//!
//! ## Layers
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `weaver-core` | message model, command parser, transport seam |
//! | `weaver-framework` | plugins, registry, dispatch engine |
//! | `weaver-runtime` | client/event bridge, config, logging, store |
//!
//! ## Example
//!
//! ```rust,ignore
//! use weaver::prelude::*;
//!
//! let client = Client::new(ClientConfig::default(), transport);
//! client.load_plugin(
//!     PluginDescriptor::new()
//!         .name("ping")
//!         .description("liveness check")
//!         .handler(handler_fn(|ctx| Box::pin(async move {
//!             ctx.message.reply("pong!", Default::default()).await?;
//!             Ok(())
//!         }))),
//! );
//!
//! let handle = client.start()?;
//! handle.await?;
//! ```

pub use weaver_core;
pub use weaver_framework;
pub use weaver_runtime;

pub use weaver_core::{
    CanonicalMessage, ContentType, MessageKey, RawMessage, Transport, TransportError,
    TransportResult, command, jid, message, transport, util,
};
pub use weaver_framework::{
    AccessFlags, DispatchConfig, DispatchEngine, ExecutionContext, Plugin, PluginDescriptor,
    PluginHandler, PluginLoader, PluginRegistry, handler_fn,
};
pub use weaver_runtime::{
    Client, ClientConfig, ClientEvent, ConfigLoader, JsonStore, LoginMethod, RuntimeError,
    RuntimeResult, load_config, logging,
};

/// Common imports for embedding applications and plugins.
pub mod prelude {
    pub use weaver_core::transport::{
        BoxedTransport, DeliveryKind, DisconnectReason, Identity, OutgoingContent, SendOptions,
        Transport, TransportEvent,
    };
    pub use weaver_core::{CanonicalMessage, ContentType, MessageKey, RawMessage};
    pub use weaver_framework::{
        ExecutionContext, HandlerResult, PluginDescriptor, PluginLoader, PluginRegistry,
        handler_fn,
    };
    pub use weaver_runtime::{Client, ClientConfig, ClientEvent, JsonStore, LoginMethod};
}
