//! In-memory API key store.
//!
//! Keys are stored as SHA-256 digests; the bare credential never persists
//! past hashing. Lookup compares the presented digest against every stored
//! digest with a constant-time comparison and no early exit, so timing
//! reveals neither a match nor which key matched.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Principal record attached to an API key.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub user_id: String,
    pub name: String,
    pub per_minute: u32,
    pub per_hour: u32,
    pub active: bool,
}

pub struct ApiKeyStore {
    keys: RwLock<HashMap<[u8; 32], KeyRecord>>,
}

fn digest(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Compare digests without short-circuiting on the first differing byte.
fn constant_time_compare(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Register a key. Returns the hex digest for logging.
    pub async fn insert(&self, key: &str, record: KeyRecord) -> String {
        let hash = digest(key);
        let hash_hex = hex::encode(hash);
        tracing::info!(
            user_id = %record.user_id,
            name = %record.name,
            key_hash = %&hash_hex[..16],
            "API key added"
        );
        self.keys.write().await.insert(hash, record);
        hash_hex
    }

    /// Resolve a presented credential to its principal record.
    ///
    /// Scans every stored digest so the work done is independent of whether
    /// (and where) a match exists.
    pub async fn lookup(&self, presented: &str) -> Option<KeyRecord> {
        let presented = digest(presented);
        let keys = self.keys.read().await;

        let mut found: Option<KeyRecord> = None;
        for (stored, record) in keys.iter() {
            if constant_time_compare(stored, &presented) && record.active {
                found = Some(record.clone());
            }
        }
        found
    }

    /// Revoke a key (soft delete). Returns whether the key existed.
    pub async fn revoke(&self, key: &str) -> bool {
        let hash = digest(key);
        let mut keys = self.keys.write().await;
        match keys.get_mut(&hash) {
            Some(record) => {
                record.active = false;
                tracing::info!(key_hash = %&hex::encode(hash)[..16], "API key revoked");
                true
            }
            None => false,
        }
    }

    /// Generate a new API key with a prefix, e.g. `sk_live_…`.
    pub fn generate_key(prefix: &str) -> String {
        let random_part: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(43)
            .map(char::from)
            .collect();
        format!("{}_{}", prefix, random_part)
    }
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str) -> KeyRecord {
        KeyRecord {
            user_id: user_id.to_string(),
            name: "test key".to_string(),
            per_minute: 60,
            per_hour: 1000,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_lookup_known_key() {
        let store = ApiKeyStore::new();
        store.insert("sk_test_alpha", record("user-1")).await;

        let found = store.lookup("sk_test_alpha").await.unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(found.per_minute, 60);
    }

    #[tokio::test]
    async fn test_lookup_unknown_key() {
        let store = ApiKeyStore::new();
        store.insert("sk_test_alpha", record("user-1")).await;

        assert!(store.lookup("sk_test_beta").await.is_none());
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let store = ApiKeyStore::new();
        store.insert("sk_test_alpha", record("user-1")).await;

        assert!(store.revoke("sk_test_alpha").await);
        assert!(store.lookup("sk_test_alpha").await.is_none());
    }

    #[tokio::test]
    async fn test_revoke_unknown_key() {
        let store = ApiKeyStore::new();
        assert!(!store.revoke("sk_test_ghost").await);
    }

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        let a = ApiKeyStore::generate_key("sk_dev");
        let b = ApiKeyStore::generate_key("sk_dev");
        assert!(a.starts_with("sk_dev_"));
        assert_ne!(a, b);
        assert!(a.len() > 40);
    }

    #[test]
    fn test_constant_time_compare() {
        let a = digest("one");
        let b = digest("two");
        assert!(constant_time_compare(&a, &a));
        assert!(!constant_time_compare(&a, &b));
    }
}
