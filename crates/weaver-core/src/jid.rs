//! JID (Jabber-style chat identifier) helpers.
//!
//! The transport addresses every chat and participant with a JID string.
//! Two server suffixes matter to the framework: `@s.whatsapp.net` for
//! direct chats and users, and `@g.us` for group chats. A user JID may
//! additionally carry a device part (`12345:7@s.whatsapp.net`) which must
//! be stripped before comparing identities.

/// Server suffix of group chat JIDs.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Server suffix of user / direct chat JIDs.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";

/// Returns true if the JID addresses a group chat.
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Returns true if the JID addresses a user or direct chat.
pub fn is_user(jid: &str) -> bool {
    jid.ends_with(USER_SUFFIX)
}

/// Returns the bare number of a JID: the part before the server suffix,
/// with any `:device` part removed.
///
/// ```
/// use weaver_core::jid;
///
/// assert_eq!(jid::bare("628123456789@s.whatsapp.net"), "628123456789");
/// assert_eq!(jid::bare("628123456789:12@s.whatsapp.net"), "628123456789");
/// ```
pub fn bare(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}

/// Removes the device part of a JID, keeping the server suffix.
pub fn strip_device(jid: &str) -> String {
    match jid.split_once('@') {
        Some((user, server)) => {
            let user = user.split(':').next().unwrap_or(user);
            format!("{user}@{server}")
        }
        None => jid.to_string(),
    }
}

/// Derives the bot's user JID from its session identity
/// (e.g. `628123456789:12@s.whatsapp.net` → `628123456789@s.whatsapp.net`).
pub fn self_user_jid(session_id: &str) -> String {
    format!("{}{USER_SUFFIX}", bare(session_id))
}
