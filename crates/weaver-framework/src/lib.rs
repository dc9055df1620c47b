//! # Weaver Framework
//!
//! Framework layer of the weaver WhatsApp bot framework: command plugins
//! and their dispatch.
//!
//! - [`PluginDescriptor`] / [`Plugin`] — the duck-typed load-time form of
//!   a plugin and its validated, registered form
//! - [`PluginRegistry`] — name- and alias-indexed storage with
//!   load/reload/list/lookup, fed by a [`PluginLoader`] port
//! - [`DispatchEngine`] — resolves a canonical message to a plugin, runs
//!   the access-control predicates, and invokes the handler with a fresh
//!   [`ExecutionContext`]
//!
//! The flow, end to end:
//!
//! ```text
//! ┌───────────┐    ┌────────────────┐    ┌────────────────┐
//! │ Canonical │───▶│ DispatchEngine │───▶│ PluginRegistry │
//! │  Message  │    │ parse + gates  │    │  alias lookup  │
//! └───────────┘    └───────┬────────┘    └────────────────┘
//!                          ▼
//!                  ┌────────────────┐
//!                  │ PluginHandler  │
//!                  │ (ExecutionCtx) │
//!                  └────────────────┘
//! ```

pub mod context;
pub mod dispatch;
pub mod plugin;
pub mod registry;

pub use context::ExecutionContext;
pub use dispatch::{DispatchConfig, DispatchEngine};
pub use plugin::{
    AccessFlags, HandlerError, HandlerResult, Plugin, PluginDescriptor, PluginError,
    PluginHandler, handler_fn,
};
pub use registry::{PluginLoader, PluginRegistry};
