//! Plugin descriptors, validation, and the handler trait.
//!
//! A plugin arrives as a loosely-filled [`PluginDescriptor`] — typically
//! produced by a [`PluginLoader`](crate::registry::PluginLoader) scanning
//! a directory, or built inline with the descriptor's builder methods.
//! [`PluginDescriptor::validate`] is a pure function that turns the
//! descriptor into a [`Plugin`]: it derives a name, normalizes aliases,
//! and rejects descriptors without a handler or without any usable alias.
//! Keeping validation independent of the loading mechanism makes it
//! testable without any filesystem machinery.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::context::ExecutionContext;

/// Error type a plugin handler may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a plugin handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// A command handler.
///
/// Handlers receive a fresh [`ExecutionContext`] per dispatch and return
/// nothing meaningful; any error they produce is caught by the dispatch
/// engine, logged, and reported back into the chat.
#[async_trait]
pub trait PluginHandler: Send + Sync {
    /// Runs the command.
    async fn execute(&self, ctx: ExecutionContext) -> HandlerResult;
}

/// Adapts an async function or closure into a [`PluginHandler`].
///
/// ```rust,ignore
/// let handler = handler_fn(|ctx: ExecutionContext| async move {
///     ctx.message.reply("pong", Default::default()).await?;
///     Ok(())
/// });
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn PluginHandler>
where
    F: Fn(ExecutionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
{
    struct FnHandler<F>(F);

    #[async_trait]
    impl<F> PluginHandler for FnHandler<F>
    where
        F: Fn(ExecutionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync,
    {
        async fn execute(&self, ctx: ExecutionContext) -> HandlerResult {
            (self.0)(ctx).await
        }
    }

    Arc::new(FnHandler(f))
}

// ============================================================================
// Access flags
// ============================================================================

/// Access-control flags evaluated before a handler runs.
///
/// All default to false. Admin flags only apply inside group chats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessFlags {
    /// Only senders on the configured owner list may run the command.
    pub owner_only: bool,
    /// The command only works in group chats.
    pub group_only: bool,
    /// The command only works in direct chats.
    pub private_only: bool,
    /// The sender must be a group admin.
    pub require_admin: bool,
    /// The bot itself must be a group admin.
    pub require_bot_admin: bool,
}

// ============================================================================
// Descriptor
// ============================================================================

/// The duck-typed, load-time form of a plugin.
///
/// Everything is optional until [`validate`](Self::validate) runs.
#[derive(Clone, Default)]
pub struct PluginDescriptor {
    /// Unique plugin name; derived from `source` when absent.
    pub name: Option<String>,
    /// Command aliases; defaults to `[name]` when empty.
    pub commands: Vec<String>,
    /// Free-form category shown in listings.
    pub category: Option<String>,
    /// One-line description.
    pub description: Option<String>,
    /// Access-control flags.
    pub access: AccessFlags,
    /// The handler entry point.
    pub handler: Option<Arc<dyn PluginHandler>>,
    /// Path of the module this descriptor was loaded from, if any.
    pub source: Option<PathBuf>,
}

impl PluginDescriptor {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plugin name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds one command alias.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Adds several command aliases.
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Sets the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts the command to the owner list.
    pub fn owner_only(mut self) -> Self {
        self.access.owner_only = true;
        self
    }

    /// Restricts the command to group chats.
    pub fn group_only(mut self) -> Self {
        self.access.group_only = true;
        self
    }

    /// Restricts the command to direct chats.
    pub fn private_only(mut self) -> Self {
        self.access.private_only = true;
        self
    }

    /// Requires the sender to be a group admin.
    pub fn require_admin(mut self) -> Self {
        self.access.require_admin = true;
        self
    }

    /// Requires the bot to be a group admin.
    pub fn require_bot_admin(mut self) -> Self {
        self.access.require_bot_admin = true;
        self
    }

    /// Sets the handler.
    pub fn handler(mut self, handler: Arc<dyn PluginHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the source path the descriptor was loaded from.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Validates the descriptor into a [`Plugin`].
    ///
    /// Pure: no I/O, no logging. The name falls back to the source file
    /// stem; aliases are trimmed, lower-cased, de-duplicated, and default
    /// to the lower-cased name when none were declared.
    pub fn validate(self) -> Result<Plugin, PluginError> {
        let handler = self.handler.ok_or(PluginError::MissingHandler)?;

        let name = self
            .name
            .or_else(|| {
                self.source
                    .as_deref()
                    .and_then(|p| p.file_stem())
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .ok_or(PluginError::Unnamed)?;

        let declared = if self.commands.is_empty() {
            vec![name.clone()]
        } else {
            self.commands
        };

        let mut aliases = Vec::with_capacity(declared.len());
        for alias in declared {
            let alias = alias.trim().to_lowercase();
            if !alias.is_empty() && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        if aliases.is_empty() {
            return Err(PluginError::NoAliases { name });
        }

        Ok(Plugin {
            name,
            aliases,
            category: self.category,
            description: self.description,
            access: self.access,
            handler,
        })
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("commands", &self.commands)
            .field("access", &self.access)
            .field("has_handler", &self.handler.is_some())
            .field("source", &self.source)
            .finish()
    }
}

/// Why a descriptor failed validation.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// No handler entry point.
    #[error("plugin does not expose a handler")]
    MissingHandler,

    /// No name and no source path to derive one from.
    #[error("plugin has neither a name nor a source path")]
    Unnamed,

    /// All declared aliases were empty after normalization.
    #[error("plugin '{name}' declares no usable command alias")]
    NoAliases {
        /// The plugin name.
        name: String,
    },
}

// ============================================================================
// Plugin
// ============================================================================

/// A validated, registered command handler.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    aliases: Vec<String>,
    category: Option<String>,
    description: Option<String>,
    access: AccessFlags,
    handler: Arc<dyn PluginHandler>,
}

impl Plugin {
    /// The unique plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased command aliases, in declaration order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The plugin's category, if declared.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// The plugin's description, if declared.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Access-control flags.
    pub fn access(&self) -> AccessFlags {
        self.access
    }

    /// The handler entry point.
    pub fn handler(&self) -> &Arc<dyn PluginHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> Arc<dyn PluginHandler> {
        handler_fn(|_ctx| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn validation_requires_a_handler() {
        let err = PluginDescriptor::new().name("ping").validate().unwrap_err();
        assert!(matches!(err, PluginError::MissingHandler));
    }

    #[test]
    fn validation_requires_a_derivable_name() {
        let err = PluginDescriptor::new()
            .handler(noop_handler())
            .validate()
            .unwrap_err();
        assert!(matches!(err, PluginError::Unnamed));
    }

    #[test]
    fn name_derives_from_source_stem() {
        let plugin = PluginDescriptor::new()
            .source("/bots/plugins/ping.rs")
            .handler(noop_handler())
            .validate()
            .unwrap();
        assert_eq!(plugin.name(), "ping");
        assert_eq!(plugin.aliases(), ["ping"]);
    }

    #[test]
    fn aliases_default_to_name_and_are_lowercased() {
        let plugin = PluginDescriptor::new()
            .name("Ping")
            .handler(noop_handler())
            .validate()
            .unwrap();
        assert_eq!(plugin.aliases(), ["ping"]);

        let plugin = PluginDescriptor::new()
            .name("ping")
            .commands(["PING", "P", " p "])
            .handler(noop_handler())
            .validate()
            .unwrap();
        assert_eq!(plugin.aliases(), ["ping", "p"]);
    }

    #[test]
    fn empty_aliases_are_rejected() {
        let err = PluginDescriptor::new()
            .name("broken")
            .commands(["", "   "])
            .handler(noop_handler())
            .validate()
            .unwrap_err();
        assert!(matches!(err, PluginError::NoAliases { .. }));
    }
}
