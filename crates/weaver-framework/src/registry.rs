//! The plugin registry.
//!
//! Holds every loaded plugin under its unique name and indexes each of
//! its aliases. Alias collisions are last-loaded-wins: loading a plugin
//! whose alias is already taken silently re-points the alias at the new
//! plugin. The name map and the alias map are kept consistent at all
//! times — an alias never points at a name that is not registered.
//!
//! Discovery of plugins on disk is delegated to a [`PluginLoader`]
//! implemented by the embedding application; the registry itself only
//! validates and indexes the descriptors a loader yields.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::plugin::{Plugin, PluginDescriptor};

/// The plugin-loading port.
///
/// An implementation knows how to turn the contents of a directory into
/// plugin descriptors — statically linked plugin sets, a manifest file,
/// or whatever the embedding application prefers. Validation stays in the
/// registry, so loaders can be as dumb as possible.
pub trait PluginLoader: Send + Sync {
    /// Discovers all loadable plugins under `dir`, recursively.
    fn discover(&self, dir: &Path) -> std::io::Result<Vec<PluginDescriptor>>;
}

#[derive(Default)]
struct RegistryInner {
    /// name → plugin
    plugins: HashMap<String, Arc<Plugin>>,
    /// alias → owning plugin name
    aliases: HashMap<String, String>,
    /// Set once the first `load_all` pass completes.
    loaded: bool,
}

/// Registry of loaded command plugins.
///
/// Cheap to share: all methods take `&self` and the interior lock is held
/// only for map operations, never across await points.
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<RegistryInner>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers one plugin.
    ///
    /// On validation failure, logs a diagnostic and returns `None` — a
    /// broken plugin never aborts a load pass. On success the plugin is
    /// registered under its name and every alias is indexed, overwriting
    /// any prior owner of a colliding alias.
    pub fn load(&self, descriptor: PluginDescriptor) -> Option<Arc<Plugin>> {
        let source = descriptor.source.clone();
        let plugin = match descriptor.validate() {
            Ok(plugin) => Arc::new(plugin),
            Err(err) => {
                error!(source = ?source, error = %err, "Failed to load plugin");
                return None;
            }
        };

        let mut inner = self.inner.write();

        // Re-loading a name replaces the previous plugin wholesale, so its
        // old aliases must not keep resolving.
        if inner.plugins.contains_key(plugin.name()) {
            let name = plugin.name().to_string();
            inner.aliases.retain(|_, owner| *owner != name);
        }

        for alias in plugin.aliases() {
            inner.aliases.insert(alias.clone(), plugin.name().to_string());
        }
        inner.plugins.insert(plugin.name().to_string(), Arc::clone(&plugin));

        Some(plugin)
    }

    /// Discovers and loads every plugin under `dir` using the given
    /// loader. Returns the number of successfully loaded plugins.
    ///
    /// A missing directory logs a warning and loads nothing; individual
    /// load failures are logged and skipped. After any completed pass the
    /// registry reports [`is_loaded`](Self::is_loaded) as true, which is
    /// the dispatch engine's gate.
    pub fn load_all(&self, loader: &dyn PluginLoader, dir: &Path) -> usize {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Plugin directory not found");
            return 0;
        }

        let descriptors = match loader.discover(dir) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                error!(dir = %dir.display(), error = %err, "Plugin discovery failed");
                return 0;
            }
        };

        let total = descriptors.len();
        let loaded = descriptors
            .into_iter()
            .filter(|descriptor| self.load(descriptor.clone()).is_some())
            .count();

        self.inner.write().loaded = true;
        info!(loaded, total, dir = %dir.display(), "Plugin load pass complete");

        loaded
    }

    /// Removes a plugin and all of its aliases.
    ///
    /// Returns whether the plugin was present. Does not re-load anything;
    /// the caller must call [`load`](Self::load) again explicitly.
    pub fn reload(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.plugins.remove(name).is_none() {
            return false;
        }
        inner.aliases.retain(|_, owner| owner != name);
        true
    }

    /// Looks up a plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.inner.read().plugins.get(name).cloned()
    }

    /// Resolves a command alias to its plugin.
    pub fn find_command(&self, alias: &str) -> Option<Arc<Plugin>> {
        let inner = self.inner.read();
        let name = inner.aliases.get(alias)?;
        inner.plugins.get(name).cloned()
    }

    /// All loaded plugins, in no particular order.
    pub fn list(&self) -> Vec<Arc<Plugin>> {
        self.inner.read().plugins.values().cloned().collect()
    }

    /// Whether at least one `load_all` pass has completed.
    pub fn is_loaded(&self) -> bool {
        self.inner.read().loaded
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.inner.read().plugins.len()
    }

    /// Number of registered aliases.
    pub fn alias_count(&self) -> usize {
        self.inner.read().aliases.len()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PluginRegistry")
            .field("plugins", &inner.plugins.len())
            .field("aliases", &inner.aliases.len())
            .field("loaded", &inner.loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::handler_fn;

    fn descriptor(name: &str, commands: &[&str]) -> PluginDescriptor {
        PluginDescriptor::new()
            .name(name)
            .commands(commands.iter().copied())
            .handler(handler_fn(|_ctx| Box::pin(async { Ok(()) })))
    }

    struct StaticLoader(Vec<PluginDescriptor>);

    impl PluginLoader for StaticLoader {
        fn discover(&self, _dir: &Path) -> std::io::Result<Vec<PluginDescriptor>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn load_and_lookup() {
        let registry = PluginRegistry::new();
        registry.load(descriptor("ping", &["ping", "p"])).unwrap();

        assert_eq!(registry.get("ping").unwrap().name(), "ping");
        assert_eq!(registry.find_command("p").unwrap().name(), "ping");
        assert!(registry.find_command("pong").is_none());
        assert_eq!(registry.plugin_count(), 1);
        assert_eq!(registry.alias_count(), 2);
    }

    #[test]
    fn invalid_descriptor_is_skipped() {
        let registry = PluginRegistry::new();
        assert!(registry.load(PluginDescriptor::new().name("broken")).is_none());
        assert_eq!(registry.plugin_count(), 0);
    }

    #[test]
    fn alias_collision_is_last_loaded_wins() {
        let registry = PluginRegistry::new();
        registry.load(descriptor("first", &["x", "one"])).unwrap();
        registry.load(descriptor("second", &["x"])).unwrap();

        assert_eq!(registry.find_command("x").unwrap().name(), "second");
        // The loser keeps its other aliases.
        assert_eq!(registry.find_command("one").unwrap().name(), "first");

        // Removing the winner removes "x" entirely rather than reviving
        // the previous owner.
        assert!(registry.reload("second"));
        assert!(registry.find_command("x").is_none());
        assert!(registry.get("second").is_none());
    }

    #[test]
    fn reloading_a_name_drops_its_stale_aliases() {
        let registry = PluginRegistry::new();
        registry.load(descriptor("tool", &["tool", "old"])).unwrap();
        registry.load(descriptor("tool", &["tool", "new"])).unwrap();

        assert!(registry.find_command("old").is_none());
        assert_eq!(registry.find_command("new").unwrap().name(), "tool");
        assert_eq!(registry.plugin_count(), 1);
    }

    #[test]
    fn reload_of_unknown_name_is_false() {
        let registry = PluginRegistry::new();
        assert!(!registry.reload("ghost"));
    }

    #[test]
    fn load_all_counts_successes_and_sets_loaded() {
        let registry = PluginRegistry::new();
        let loader = StaticLoader(vec![
            descriptor("a", &["a"]),
            PluginDescriptor::new().name("broken"),
            descriptor("b", &["b"]),
        ]);

        assert!(!registry.is_loaded());
        let dir = std::env::temp_dir();
        assert_eq!(registry.load_all(&loader, &dir), 2);
        assert!(registry.is_loaded());
    }

    #[test]
    fn load_all_with_missing_dir_is_a_noop() {
        let registry = PluginRegistry::new();
        let loader = StaticLoader(vec![descriptor("a", &["a"])]);

        let missing = std::env::temp_dir().join("weaver-no-such-plugin-dir");
        assert_eq!(registry.load_all(&loader, &missing), 0);
        assert!(!registry.is_loaded());
        assert_eq!(registry.plugin_count(), 0);
    }
}
