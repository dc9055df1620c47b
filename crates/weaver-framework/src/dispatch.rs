//! The dispatch engine.
//!
//! One call to [`DispatchEngine::execute`] runs a single linear pass for
//! one canonical message: prefix check, command parse, registry lookup,
//! access-control predicates in a fixed order, then the handler. Every
//! failure is terminal to that one dispatch — denials and handler errors
//! become chat replies, nothing propagates to the caller, and there are
//! no retries.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use weaver_core::transport::SendOptions;
use weaver_core::{CanonicalMessage, command, jid};

use crate::context::ExecutionContext;
use crate::registry::PluginRegistry;

/// Notice sent when an owner-only command is used by a non-owner.
pub const NOTICE_OWNER_ONLY: &str = "⚠️ This command is for the owner only!";
/// Notice sent when a group-only command is used in a direct chat.
pub const NOTICE_GROUP_ONLY: &str = "⚠️ This command can only be used in groups!";
/// Notice sent when a private-only command is used in a group.
pub const NOTICE_PRIVATE_ONLY: &str = "⚠️ This command can only be used in private chat!";
/// Notice sent when an admin-only command is used by a non-admin.
pub const NOTICE_ADMIN_ONLY: &str = "⚠️ This command is for group admins only!";
/// Notice sent when the bot lacks the admin role a command needs.
pub const NOTICE_BOT_ADMIN: &str = "⚠️ Bot must be admin to use this command!";

/// Configuration the dispatch engine evaluates access control against.
///
/// Passed in explicitly at construction time — the engine never reads
/// ambient state, so access-control behavior is testable in isolation.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// The active command prefix.
    pub prefix: String,
    /// Owner identities, as bare numbers or full JIDs.
    pub owners: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            owners: Vec::new(),
        }
    }
}

/// Routes canonical messages to plugin handlers.
pub struct DispatchEngine {
    registry: Arc<PluginRegistry>,
    config: DispatchConfig,
}

impl DispatchEngine {
    /// Creates an engine over the given registry and configuration.
    pub fn new(registry: Arc<PluginRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The plugin registry commands are resolved against.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Dispatches one message. Fire-and-forget: all outcomes, including
    /// access denials and handler failures, are handled inside this call.
    pub async fn execute(&self, message: &CanonicalMessage) {
        let text = message.text();
        if text.is_empty() || !text.starts_with(&self.config.prefix) {
            return;
        }

        let Some(parsed) = command::parse(text, &self.config.prefix) else {
            return;
        };
        if parsed.command.is_empty() {
            return;
        }

        let Some(plugin) = self.registry.find_command(&parsed.command) else {
            debug!(command = %parsed.command, "No plugin registered for command");
            return;
        };

        let access = plugin.access();

        if access.owner_only && !self.is_owner(message.sender_id()) {
            self.deny(message, NOTICE_OWNER_ONLY).await;
            return;
        }

        if access.group_only && !message.is_group_chat() {
            self.deny(message, NOTICE_GROUP_ONLY).await;
            return;
        }

        if access.private_only && message.is_group_chat() {
            self.deny(message, NOTICE_PRIVATE_ONLY).await;
            return;
        }

        // Admin predicates only apply in groups and need current group
        // metadata from the transport (a network round-trip).
        if message.is_group_chat() && (access.require_admin || access.require_bot_admin) {
            let metadata = match message.transport().group_metadata(message.chat_id()).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    error!(chat = %message.chat_id(), error = %err, "Group metadata fetch failed");
                    self.deny(message, &format!("❌ Error: {err}")).await;
                    return;
                }
            };
            let admins: Vec<&str> = metadata.admin_ids().collect();

            if access.require_admin && !admins.contains(&message.sender_id()) {
                self.deny(message, NOTICE_ADMIN_ONLY).await;
                return;
            }

            if access.require_bot_admin {
                let bot_jid = message
                    .transport()
                    .self_id()
                    .map(|id| jid::self_user_jid(&id));
                let bot_is_admin = bot_jid
                    .as_deref()
                    .is_some_and(|bot| admins.contains(&bot));
                if !bot_is_admin {
                    self.deny(message, NOTICE_BOT_ADMIN).await;
                    return;
                }
            }
        }

        info!(
            target: "weaver::command",
            command = %parsed.command,
            from = %message.sender_id(),
            "Executing command"
        );

        let ctx = ExecutionContext {
            message: message.clone(),
            args: parsed.args,
            command: parsed.command.clone(),
            prefix: self.config.prefix.clone(),
            transport: message.transport().clone(),
        };

        if let Err(err) = plugin.handler().execute(ctx).await {
            error!(command = %parsed.command, error = %err, "Command handler failed");
            self.deny(message, &format!("❌ Error: {err}")).await;
        }
    }

    /// Matches a sender against the owner list, as a bare number or a
    /// full JID.
    fn is_owner(&self, sender: &str) -> bool {
        let number = jid::bare(sender);
        self.config
            .owners
            .iter()
            .any(|owner| owner == number || owner == sender)
    }

    /// Best-effort notice back into the chat.
    async fn deny(&self, message: &CanonicalMessage, notice: &str) {
        if let Err(err) = message.reply(notice, SendOptions::default()).await {
            warn!(chat = %message.chat_id(), error = %err, "Failed to send notice");
        }
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("prefix", &self.config.prefix)
            .field("owners", &self.config.owners.len())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use weaver_core::error::{TransportError, TransportResult};
    use weaver_core::message::{MessageKey, RawMessage, normalize};
    use weaver_core::transport::{
        AdminRole, GroupMetadata, GroupParticipant, OutgoingContent, ParticipantAction,
        SendOptions, Transport, TransportEvent,
    };

    use crate::plugin::{PluginDescriptor, handler_fn};

    use super::*;

    #[derive(Default)]
    struct RecordingTransport {
        self_id: Option<String>,
        metadata: Option<GroupMetadata>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingTransport {
        fn sent_texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn connect(&self) -> TransportResult<mpsc::Receiver<TransportEvent>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        fn self_id(&self) -> Option<String> {
            self.self_id.clone()
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
            let text = match content {
                OutgoingContent::Text(text) => text,
                other => format!("{other:?}"),
            };
            self.sent.lock().push((jid.to_string(), text));
            Ok(Value::Null)
        }

        async fn group_metadata(&self, jid: &str) -> TransportResult<GroupMetadata> {
            self.metadata
                .clone()
                .ok_or_else(|| TransportError::GroupMetadata {
                    jid: jid.to_string(),
                    reason: "unavailable".to_string(),
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
            Ok(Vec::new())
        }

        async fn request_pairing_code(&self, _phone_number: &str) -> TransportResult<String> {
            Ok("CODE".to_string())
        }
    }

    fn message(
        transport: &Arc<RecordingTransport>,
        chat: &str,
        sender: Option<&str>,
        text: &str,
    ) -> weaver_core::CanonicalMessage {
        let raw = RawMessage {
            key: MessageKey {
                remote_jid: chat.to_string(),
                from_me: false,
                id: "T-1".to_string(),
                participant: sender.map(str::to_string),
            },
            push_name: None,
            message: json!({"conversation": text}),
        };
        normalize(&raw, transport.clone() as weaver_core::transport::BoxedTransport)
    }

    fn engine_with(
        descriptor: PluginDescriptor,
        config: DispatchConfig,
    ) -> (DispatchEngine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let descriptor = descriptor.handler(handler_fn(move |_ctx| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }));

        let registry = Arc::new(PluginRegistry::new());
        registry.load(descriptor).unwrap();
        (DispatchEngine::new(registry, config), calls)
    }

    fn owners(list: &[&str]) -> DispatchConfig {
        DispatchConfig {
            prefix: "!".to_string(),
            owners: list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn non_command_text_is_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) =
            engine_with(PluginDescriptor::new().name("ping"), DispatchConfig::default());

        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "hello")).await;
        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn prefix_only_input_matches_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) =
            engine_with(PluginDescriptor::new().name("ping"), DispatchConfig::default());

        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "!")).await;
        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "!   ")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn unregistered_command_is_a_noop() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) =
            engine_with(PluginDescriptor::new().name("ping"), DispatchConfig::default());

        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "!nosuch")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn matched_command_runs_once_with_args() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) =
            engine_with(PluginDescriptor::new().name("ping"), DispatchConfig::default());

        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "!PING extra arg")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn owner_only_denies_with_exactly_one_notice() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("admin").owner_only(),
            owners(&["628000111222"]),
        );

        engine
            .execute(&message(&transport, "628999@s.whatsapp.net", None, "!admin"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_texts(), vec![NOTICE_OWNER_ONLY.to_string()]);
    }

    #[tokio::test]
    async fn owner_matches_by_bare_number_or_full_jid() {
        for owner in ["628000111222", "628000111222@s.whatsapp.net"] {
            let transport = Arc::new(RecordingTransport::default());
            let (engine, calls) = engine_with(
                PluginDescriptor::new().name("admin").owner_only(),
                owners(&[owner]),
            );

            engine
                .execute(&message(&transport, "628000111222@s.whatsapp.net", None, "!admin"))
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1, "owner form: {owner}");
            assert!(transport.sent_texts().is_empty());
        }
    }

    #[tokio::test]
    async fn group_only_and_private_only_gates() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("tag").group_only(),
            DispatchConfig::default(),
        );
        engine.execute(&message(&transport, "u@s.whatsapp.net", None, "!tag")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_texts(), vec![NOTICE_GROUP_ONLY.to_string()]);

        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("dm").private_only(),
            DispatchConfig::default(),
        );
        engine
            .execute(&message(&transport, "123@g.us", Some("u@s.whatsapp.net"), "!dm"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_texts(), vec![NOTICE_PRIVATE_ONLY.to_string()]);
    }

    #[tokio::test]
    async fn require_admin_checks_group_metadata() {
        let metadata = GroupMetadata {
            id: "123@g.us".to_string(),
            subject: "Test".to_string(),
            participants: vec![
                GroupParticipant {
                    id: "boss@s.whatsapp.net".to_string(),
                    admin: Some(AdminRole::Admin),
                },
                GroupParticipant {
                    id: "pleb@s.whatsapp.net".to_string(),
                    admin: None,
                },
            ],
        };

        let transport = Arc::new(RecordingTransport {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("kick").require_admin(),
            DispatchConfig::default(),
        );

        engine
            .execute(&message(&transport, "123@g.us", Some("pleb@s.whatsapp.net"), "!kick"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_texts(), vec![NOTICE_ADMIN_ONLY.to_string()]);

        engine
            .execute(&message(&transport, "123@g.us", Some("boss@s.whatsapp.net"), "!kick"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn admin_check_is_skipped_outside_groups() {
        // No metadata configured: a fetch would fail, so passing proves
        // the predicate was skipped for the direct chat.
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("kick").require_admin(),
            DispatchConfig::default(),
        );

        engine.execute(&message(&transport, "u@s.whatsapp.net", None, "!kick")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn require_bot_admin_uses_session_identity() {
        let metadata = GroupMetadata {
            id: "123@g.us".to_string(),
            subject: String::new(),
            participants: vec![GroupParticipant {
                id: "boss@s.whatsapp.net".to_string(),
                admin: Some(AdminRole::SuperAdmin),
            }],
        };

        let transport = Arc::new(RecordingTransport {
            self_id: Some("990011:7@s.whatsapp.net".to_string()),
            metadata: Some(metadata),
            ..Default::default()
        });
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("promote").require_bot_admin(),
            DispatchConfig::default(),
        );

        engine
            .execute(&message(&transport, "123@g.us", Some("boss@s.whatsapp.net"), "!promote"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_texts(), vec![NOTICE_BOT_ADMIN.to_string()]);
    }

    #[tokio::test]
    async fn metadata_failure_reports_and_skips_handler() {
        let transport = Arc::new(RecordingTransport::default());
        let (engine, calls) = engine_with(
            PluginDescriptor::new().name("kick").require_admin(),
            DispatchConfig::default(),
        );

        engine
            .execute(&message(&transport, "123@g.us", Some("u@s.whatsapp.net"), "!kick"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let sent = transport.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("❌ Error:"), "{}", sent[0]);
    }

    #[tokio::test]
    async fn handler_failure_becomes_an_error_reply() {
        let registry = Arc::new(PluginRegistry::new());
        registry
            .load(
                PluginDescriptor::new()
                    .name("boom")
                    .handler(handler_fn(|_ctx| {
                        Box::pin(async { Err("the thing exploded".into()) })
                    })),
            )
            .unwrap();
        let engine = DispatchEngine::new(registry, DispatchConfig::default());

        let transport = Arc::new(RecordingTransport::default());
        engine.execute(&message(&transport, "a@s.whatsapp.net", None, "!boom")).await;

        let sent = transport.sent_texts();
        assert_eq!(sent, vec!["❌ Error: the thing exploded".to_string()]);
    }
}
