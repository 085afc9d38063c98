//! Admin-tag detection.
//!
//! Mass-pinging admins with `@admin` / `@admins` is a common nuisance;
//! the observer warns non-admin senders who do it.

/// True if the text tries to summon the admin group.
pub fn mentions_admins(text: &str) -> bool {
    text.to_lowercase().contains("@admin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_admin_summons() {
        assert!(mentions_admins("hey @admin help"));
        assert!(mentions_admins("@Admins wake up"));
        assert!(!mentions_admins("the administrator said"));
        assert!(!mentions_admins("email admin@example.com"));
    }
}
