//! JID (chat/user identifier) helpers.
//!
//! Group and direct chats are distinguished by suffix convention:
//! groups end in `@g.us`, direct chats in `@s.whatsapp.net`.

/// Suffix for group chat identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Suffix for direct (two-party) chat identifiers.
pub const DIRECT_SUFFIX: &str = "@s.whatsapp.net";

/// Returns true if the JID denotes a group chat.
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Returns true if the JID denotes a direct chat.
pub fn is_direct(jid: &str) -> bool {
    jid.ends_with(DIRECT_SUFFIX)
}

/// Build the direct-chat JID for a phone number.
pub fn direct_jid(phone: &str) -> String {
    format!("{phone}{DIRECT_SUFFIX}")
}

/// The user-visible part of a JID (everything before `@`).
pub fn short(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// Bare phone number: the short part with any device suffix (`:NN`)
/// removed.
pub fn phone(jid: &str) -> &str {
    short(jid).split(':').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_and_direct_suffixes() {
        assert!(is_group("12036304@g.us"));
        assert!(!is_group("254700000001@s.whatsapp.net"));
        assert!(is_direct("254700000001@s.whatsapp.net"));
        assert!(!is_direct("12036304@g.us"));
    }

    #[test]
    fn short_strips_server() {
        assert_eq!(short("254700000001@s.whatsapp.net"), "254700000001");
        assert_eq!(short("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn phone_strips_device_suffix() {
        assert_eq!(phone("254700000001:12@s.whatsapp.net"), "254700000001");
        assert_eq!(phone("254700000001@s.whatsapp.net"), "254700000001");
    }
}
