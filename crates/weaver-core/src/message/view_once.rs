//! View-once envelope matching.
//!
//! A view-once message hides its media inside a wrapper envelope, and the
//! transport surfaces that envelope in several shapes depending on where
//! the message was picked up (live, quoted raw, quoted parsed, or already
//! unwrapped with only a flag left). [`unwrap`] probes the four known
//! shapes and returns a tagged result instead of nested conditionals, so
//! each path is testable against a fixture payload.

use serde_json::Value;

/// Wrapper envelope keys, in the order they appeared in the protocol.
const WRAPPER_KEYS: &[&str] = &[
    "viewOnceMessage",
    "viewOnceMessageV2",
    "viewOnceMessageV2Extension",
];

/// Media variants that can carry a `viewOnce` flag once unwrapped.
const FLAGGED_KEYS: &[&str] = &["imageMessage", "videoMessage", "audioMessage"];

/// Which structural path matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOncePath {
    /// A wrapper envelope at the top level of the content object.
    RawWrapper,
    /// A wrapper envelope nested under a `message` field.
    ParsedWrapper,
    /// A media variant carrying `viewOnce: true` at the top level.
    FlaggedMedia,
    /// A flagged media variant nested under a `message` field.
    RawFlaggedMedia,
}

/// Result of a view-once lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOnceLookup {
    /// The content is a view-once message; `inner` is the unwrapped
    /// media message object.
    Found {
        /// The inner message content.
        inner: Value,
        /// The structural path that matched.
        path: ViewOncePath,
    },
    /// None of the recognized shapes matched.
    NotViewOnce,
}

impl ViewOnceLookup {
    /// Returns the inner message, if found.
    pub fn into_inner(self) -> Option<Value> {
        match self {
            Self::Found { inner, .. } => Some(inner),
            Self::NotViewOnce => None,
        }
    }
}

/// The media kind of an unwrapped view-once message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOnceKind {
    /// `imageMessage` content.
    Image,
    /// `videoMessage` content.
    Video,
    /// `audioMessage` content.
    Audio,
}

impl ViewOnceKind {
    fn from_wire_key(key: &str) -> Option<Self> {
        match key {
            "imageMessage" => Some(Self::Image),
            "videoMessage" => Some(Self::Video),
            "audioMessage" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Searches a (quoted) message content object for a view-once envelope.
///
/// Probes, in order: a raw wrapper at the top level, a wrapper nested
/// under `message`, a `viewOnce`-flagged media variant at the top level,
/// and a flagged variant nested under `message`. Never fails: anything
/// that matches none of these is [`ViewOnceLookup::NotViewOnce`].
pub fn unwrap(content: &Value) -> ViewOnceLookup {
    if let Some(inner) = wrapper_inner(content) {
        return ViewOnceLookup::Found {
            inner: inner.clone(),
            path: ViewOncePath::RawWrapper,
        };
    }

    let nested = content.get("message");
    if let Some(inner) = nested.and_then(wrapper_inner) {
        return ViewOnceLookup::Found {
            inner: inner.clone(),
            path: ViewOncePath::ParsedWrapper,
        };
    }

    if has_flagged_media(content) {
        return ViewOnceLookup::Found {
            inner: content.clone(),
            path: ViewOncePath::FlaggedMedia,
        };
    }

    if let Some(nested) = nested
        && has_flagged_media(nested)
    {
        return ViewOnceLookup::Found {
            inner: nested.clone(),
            path: ViewOncePath::RawFlaggedMedia,
        };
    }

    ViewOnceLookup::NotViewOnce
}

/// Finds the media variant of an unwrapped view-once message.
pub fn media_variant(message: &Value) -> Option<(ViewOnceKind, &Value)> {
    let map = message.as_object()?;
    map.iter().find_map(|(key, value)| {
        ViewOnceKind::from_wire_key(key).map(|kind| (kind, value))
    })
}

fn wrapper_inner(content: &Value) -> Option<&Value> {
    WRAPPER_KEYS
        .iter()
        .find_map(|key| content.get(key))
        .and_then(|wrapper| wrapper.get("message"))
}

fn has_flagged_media(content: &Value) -> bool {
    FLAGGED_KEYS.iter().any(|key| {
        content
            .get(key)
            .and_then(|variant| variant.get("viewOnce"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn raw_wrapper_matches() {
        let content = json!({
            "viewOnceMessageV2": {"message": {"imageMessage": {"caption": "secret"}}}
        });
        match unwrap(&content) {
            ViewOnceLookup::Found { inner, path } => {
                assert_eq!(path, ViewOncePath::RawWrapper);
                assert_eq!(inner["imageMessage"]["caption"], "secret");
            }
            ViewOnceLookup::NotViewOnce => panic!("expected a match"),
        }
    }

    #[test]
    fn all_wrapper_generations_match() {
        for key in ["viewOnceMessage", "viewOnceMessageV2", "viewOnceMessageV2Extension"] {
            let content = json!({key: {"message": {"videoMessage": {}}}});
            assert!(matches!(unwrap(&content), ViewOnceLookup::Found { .. }), "{key}");
        }
    }

    #[test]
    fn parsed_wrapper_matches() {
        let content = json!({
            "message": {"viewOnceMessage": {"message": {"videoMessage": {"seconds": 3}}}}
        });
        match unwrap(&content) {
            ViewOnceLookup::Found { inner, path } => {
                assert_eq!(path, ViewOncePath::ParsedWrapper);
                assert!(inner.get("videoMessage").is_some());
            }
            ViewOnceLookup::NotViewOnce => panic!("expected a match"),
        }
    }

    #[test]
    fn flagged_media_matches() {
        let content = json!({"imageMessage": {"viewOnce": true, "mimetype": "image/jpeg"}});
        match unwrap(&content) {
            ViewOnceLookup::Found { path, .. } => assert_eq!(path, ViewOncePath::FlaggedMedia),
            ViewOnceLookup::NotViewOnce => panic!("expected a match"),
        }
    }

    #[test]
    fn nested_flagged_media_matches() {
        let content = json!({"message": {"audioMessage": {"viewOnce": true, "ptt": true}}});
        match unwrap(&content) {
            ViewOnceLookup::Found { path, .. } => assert_eq!(path, ViewOncePath::RawFlaggedMedia),
            ViewOnceLookup::NotViewOnce => panic!("expected a match"),
        }
    }

    #[test]
    fn unflagged_media_is_not_view_once() {
        let content = json!({"imageMessage": {"viewOnce": false, "mimetype": "image/jpeg"}});
        assert_eq!(unwrap(&content), ViewOnceLookup::NotViewOnce);
    }

    #[test]
    fn plain_text_is_not_view_once() {
        assert_eq!(unwrap(&json!({"conversation": "hello"})), ViewOnceLookup::NotViewOnce);
        assert_eq!(unwrap(&Value::Null), ViewOnceLookup::NotViewOnce);
    }

    #[test]
    fn media_variant_picks_kind() {
        let inner = json!({"videoMessage": {"mimetype": "video/mp4"}});
        let (kind, variant) = media_variant(&inner).unwrap();
        assert_eq!(kind, ViewOnceKind::Video);
        assert_eq!(variant["mimetype"], "video/mp4");

        assert!(media_variant(&json!({"conversation": "x"})).is_none());
    }
}
