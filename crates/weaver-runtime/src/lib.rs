//! # Weaver Runtime
//!
//! Integration layer of the weaver WhatsApp bot framework.
//!
//! - [`Client`] — the event bridge: wires a transport's event stream to
//!   broadcast [`ClientEvent`]s, gates command dispatch, reconnects with
//!   bounded backoff, and offers send / group / view-once helpers
//! - [`config`] — TOML + environment configuration with validation
//! - [`logging`] — tracing-subscriber setup
//! - [`store`] — one-JSON-file-per-collection key-value storage
//!
//! ```rust,ignore
//! use weaver_runtime::{Client, config::load_config};
//!
//! let config = load_config()?;
//! let client = Client::new(config, transport);
//! client.load_plugins(&my_loader, Path::new("./plugins"));
//!
//! let mut events = client.events();
//! let handle = client.start()?;
//! while let Ok(event) = events.recv().await {
//!     // react to Ready / Message / Reconnecting / …
//! }
//! handle.await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use client::{Client, ClientEvent, ViewOnceError, ViewOnceMedia};
pub use config::{ClientConfig, ConfigError, ConfigLoader, LoginMethod, RetryConfig, load_config};
pub use error::{RuntimeError, RuntimeResult};
pub use store::{JsonStore, StoreError, StoreResult};
