//! Raw-to-canonical message normalization.

use serde_json::Value;

use crate::jid;
use crate::transport::BoxedTransport;

use super::{CanonicalMessage, ContentType, MessageKey, RawMessage};

/// Normalizes one raw transport message into its canonical form.
///
/// Pure data shaping: the only side effect is capturing `transport` for
/// the canonical message's bound actions. Quoted messages are normalized
/// recursively through a synthetic raw message reconstructed from the
/// content's reply context; missing or partial context never fails, it
/// just yields no quoted message.
pub fn normalize(raw: &RawMessage, transport: BoxedTransport) -> CanonicalMessage {
    let chat_id = raw.key.remote_jid.clone();
    let is_group_chat = jid::is_group(&chat_id);
    let sender_id = if is_group_chat {
        raw.key.participant.clone().unwrap_or_else(|| chat_id.clone())
    } else {
        chat_id.clone()
    };

    let (content_type, variant) = content_variant(&raw.message);
    let text = extract_body(&content_type, variant);
    let context = variant.get("contextInfo");

    let quoted = context
        .and_then(|ctx| synthetic_quoted(&chat_id, ctx, &transport))
        .map(|quoted_raw| Box::new(normalize(&quoted_raw, transport.clone())));

    let mentioned_ids = context
        .and_then(|ctx| ctx.get("mentionedJid"))
        .and_then(Value::as_array)
        .map(|jids| {
            jids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    CanonicalMessage {
        chat_id,
        from_self: raw.key.from_me,
        id: raw.key.id.clone(),
        is_group_chat,
        sender_id,
        display_name: raw.push_name.clone().unwrap_or_default(),
        content_type,
        raw_content: raw.message.clone(),
        text,
        quoted,
        caption: str_field(variant, "caption"),
        mime_type: str_field(variant, "mimetype"),
        file_size_bytes: file_length(variant),
        mentioned_ids,
        key: raw.key.clone(),
        transport,
    }
}

/// Picks the content variant of a message object: the first key that maps
/// to a content type, skipping protocol bookkeeping keys.
fn content_variant(message: &Value) -> (ContentType, &Value) {
    static NULL: Value = Value::Null;

    if let Some(map) = message.as_object() {
        for (key, value) in map {
            if let Some(content_type) = ContentType::from_wire_key(key) {
                return (content_type, value);
            }
        }
    }
    (ContentType::Other("unknown".to_string()), &NULL)
}

/// Extracts the message body.
///
/// Priority: plain conversation text, extended text, button/list/
/// interactive reply selection id, media caption, empty string. The
/// interactive variant embeds its selection as JSON; a parse failure
/// yields an empty body rather than an error.
fn extract_body(content_type: &ContentType, variant: &Value) -> String {
    match content_type {
        ContentType::Text => variant.as_str().unwrap_or_default().to_string(),
        ContentType::ExtendedText => str_field(variant, "text"),
        ContentType::ButtonReply => str_field(variant, "selectedButtonId"),
        ContentType::TemplateButtonReply => str_field(variant, "selectedId"),
        ContentType::ListReply => variant
            .get("singleSelectReply")
            .map(|reply| str_field(reply, "selectedRowId"))
            .unwrap_or_default(),
        ContentType::InteractiveReply => variant
            .get("nativeFlowResponseMessage")
            .and_then(|flow| flow.get("paramsJson"))
            .and_then(Value::as_str)
            .and_then(|params| serde_json::from_str::<Value>(params).ok())
            .map(|params| str_field(&params, "id"))
            .unwrap_or_default(),
        _ => str_field(variant, "caption"),
    }
}

/// Rebuilds the raw shape of a quoted message from its reply context.
///
/// The synthetic key places the quoted message in the same chat, marks it
/// as our own when the context participant is this session, and carries
/// the quoted stanza id and the context participant.
fn synthetic_quoted(
    chat_id: &str,
    context: &Value,
    transport: &BoxedTransport,
) -> Option<RawMessage> {
    let quoted = context.get("quotedMessage")?.clone();
    let participant = context
        .get("participant")
        .and_then(Value::as_str)
        .map(str::to_string);

    let from_me = match (&participant, transport.self_id()) {
        (Some(participant), Some(self_id)) => {
            jid::strip_device(participant) == jid::strip_device(&self_id)
        }
        _ => false,
    };

    Some(RawMessage {
        key: MessageKey {
            remote_jid: chat_id.to_string(),
            from_me,
            id: context
                .get("stanzaId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            participant,
        },
        push_name: context
            .get("pushName")
            .and_then(Value::as_str)
            .map(str::to_string),
        message: quoted,
    })
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `fileLength` arrives as a JSON number or a decimal string depending on
/// the transport's protobuf-to-JSON mapping.
fn file_length(variant: &Value) -> u64 {
    match variant.get("fileLength") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}
