//! Permission checks.
//!
//! Two levels matter here: the bot owner (configured phone number, may do
//! anything anywhere) and group admins (resolved through group metadata,
//! cached briefly so moderation observers do not hammer the transport).

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::transport::{Transport, jid};

const ADMIN_CACHE_TTL: Duration = Duration::from_secs(300);

pub struct PermissionChecker {
    transport: Arc<dyn Transport>,
    owner_phone: String,
    admin_cache: TypedCache<String, Vec<String>>,
}

impl PermissionChecker {
    pub fn new(
        transport: Arc<dyn Transport>,
        caches: &CacheRegistry,
        owner_phone: impl Into<String>,
    ) -> Self {
        let admin_cache = caches.get_or_create(
            "group_admins",
            CacheConfig::with_capacity(1_000).ttl(ADMIN_CACHE_TTL),
        );
        Self {
            transport,
            owner_phone: owner_phone.into(),
            admin_cache,
        }
    }

    /// Whether the JID belongs to the configured owner. Device suffixes
    /// (`:NN`) are ignored.
    pub fn is_owner(&self, user_jid: &str) -> bool {
        jid::phone(user_jid) == self.owner_phone
    }

    /// Whether the user is an admin of the group (owner always passes).
    /// Metadata failures resolve to `false` rather than erroring, so a
    /// flaky transport cannot block moderation decisions.
    pub async fn is_group_admin(&self, chat_id: &str, user_jid: &str) -> bool {
        if self.is_owner(user_jid) {
            return true;
        }
        let admins = match self.group_admins(chat_id).await {
            Some(admins) => admins,
            None => return false,
        };
        let phone = jid::phone(user_jid);
        admins.iter().any(|a| jid::phone(a) == phone)
    }

    async fn group_admins(&self, chat_id: &str) -> Option<Vec<String>> {
        if let Some(admins) = self.admin_cache.get(&chat_id.to_string()) {
            return Some(admins);
        }
        match self.transport.group_metadata(chat_id).await {
            Ok(meta) => {
                let admins = meta.admin_jids();
                self.admin_cache.insert(chat_id.to_string(), admins.clone());
                Some(admins)
            }
            Err(e) => {
                debug!("Group metadata lookup failed for {}: {}", chat_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;

    fn checker(transport: Arc<MemoryTransport>) -> PermissionChecker {
        PermissionChecker::new(transport, &CacheRegistry::new(), "254700000001")
    }

    #[test]
    fn owner_matches_with_and_without_device_suffix() {
        let c = checker(Arc::new(MemoryTransport::new()));
        assert!(c.is_owner("254700000001@s.whatsapp.net"));
        assert!(c.is_owner("254700000001:44@s.whatsapp.net"));
        assert!(!c.is_owner("254799999999@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn admin_lookup_uses_group_metadata() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_group_admins("g1@g.us", vec!["111@s.whatsapp.net".to_string()]);
        let c = checker(Arc::clone(&transport));

        assert!(c.is_group_admin("g1@g.us", "111@s.whatsapp.net").await);
        assert!(!c.is_group_admin("g1@g.us", "222@s.whatsapp.net").await);
        // Unknown group resolves to not-admin, not an error.
        assert!(!c.is_group_admin("missing@g.us", "111@s.whatsapp.net").await);
        // Owner passes even where metadata is unavailable.
        assert!(
            c.is_group_admin("missing@g.us", "254700000001@s.whatsapp.net")
                .await
        );
    }
}
