//! Link detection for group moderation.

use once_cell::sync::Lazy;
use regex::Regex;

/// What kind of link was found, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    GroupInvite,
    Discord,
    Telegram,
    Url,
}

impl LinkKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GroupInvite => "group invite link",
            Self::Discord => "Discord invite",
            Self::Telegram => "Telegram link",
            Self::Url => "link",
        }
    }
}

static GROUP_INVITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)chat\.whatsapp\.com/\S+").unwrap());
static DISCORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)discord\.gg/\S+").unwrap());
static TELEGRAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bt\.me/\S+").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhttps?://\S+").unwrap());

/// Scan a message body for links. Checked most specific first, so an
/// invite URL reports as an invite rather than a generic link.
pub fn find_link(text: &str) -> Option<LinkKind> {
    if GROUP_INVITE.is_match(text) {
        Some(LinkKind::GroupInvite)
    } else if DISCORD.is_match(text) {
        Some(LinkKind::Discord)
    } else if TELEGRAM.is_match(text) {
        Some(LinkKind::Telegram)
    } else if URL.is_match(text) {
        Some(LinkKind::Url)
    } else {
        None
    }
}
