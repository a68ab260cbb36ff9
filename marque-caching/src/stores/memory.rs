//! In-memory key-value store
//!
//! Backs tests and local development; the production deployment injects
//! a Redis-backed implementation of the same trait.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use marque_interfaces::{KvCommand, KvError, KvReply, KvResult, KvStore};

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// HashMap-backed [`KvStore`] with per-key expiry
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl MemoryKvStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        self.entries.read().values().filter(|v| !v.is_expired()).count()
    }

    /// Whether the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_live(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(stored) if stored.is_expired() => {
                entries.remove(key);
                None
            }
            Some(stored) => Some(stored.value.clone()),
            None => None,
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.entries.write().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    fn apply(&self, command: &KvCommand) -> KvResult<KvReply> {
        match command {
            KvCommand::Get { key } => Ok(KvReply::Value(self.get_live(key))),
            KvCommand::Set { key, value, ttl } => {
                self.put(key, value, *ttl);
                Ok(KvReply::Unit)
            }
            KvCommand::Del { key } => {
                self.entries.write().remove(key);
                Ok(KvReply::Unit)
            }
            KvCommand::Incr { key } => {
                let mut entries = self.entries.write();
                let current = match entries.get(key) {
                    Some(stored) if !stored.is_expired() => {
                        stored.value.parse::<i64>().map_err(|_| {
                            KvError::Backend(format!("value at '{}' is not an integer", key))
                        })?
                    }
                    _ => 0,
                };
                let next = current + 1;
                entries.insert(
                    key.clone(),
                    StoredValue {
                        value: next.to_string(),
                        expires_at: None,
                    },
                );
                Ok(KvReply::Integer(next))
            }
            KvCommand::Expire { key, ttl } => {
                let mut entries = self.entries.write();
                if let Some(stored) = entries.get_mut(key) {
                    stored.expires_at = Some(Instant::now() + *ttl);
                }
                Ok(KvReply::Unit)
            }
        }
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.get_live(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        self.put(key, value, ttl);
        Ok(())
    }

    async fn del(&self, key: &str) -> KvResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let entries = self.entries.read();
        let matches = |key: &str| match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        };
        Ok(entries
            .iter()
            .filter(|(key, stored)| matches(key) && !stored.is_expired())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        match self.apply(&KvCommand::Incr { key: key.to_string() })? {
            KvReply::Integer(value) => Ok(value),
            _ => Err(KvError::Backend("unexpected incr reply".to_string())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<()> {
        self.apply(&KvCommand::Expire {
            key: key.to_string(),
            ttl,
        })?;
        Ok(())
    }

    async fn pipeline(&self, commands: Vec<KvCommand>) -> KvResult<Vec<KvReply>> {
        commands.iter().map(|command| self.apply(command)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryKvStore::new();

        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryKvStore::new();

        store.set("k", "v", Some(Duration::from_millis(30))).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_prefix_pattern() {
        let store = MemoryKvStore::new();

        store.set("search:a", "1", None).await.unwrap();
        store.set("search:b", "2", None).await.unwrap();
        store.set("billing:a", "3", None).await.unwrap();

        let mut keys = store.keys("search:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["search:a", "search:b"]);
    }

    #[tokio::test]
    async fn test_incr_creates_and_counts() {
        let store = MemoryKvStore::new();

        assert_eq!(store.incr("hits").await.unwrap(), 1);
        assert_eq!(store.incr("hits").await.unwrap(), 2);
        assert_eq!(store.incr("hits").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let store = MemoryKvStore::new();

        store.set("k", "not-a-number", None).await.unwrap();
        assert!(store.incr("k").await.is_err());
    }

    #[tokio::test]
    async fn test_pipeline_preserves_order() {
        let store = MemoryKvStore::new();

        let replies = store
            .pipeline(vec![
                KvCommand::Set {
                    key: "a".to_string(),
                    value: "1".to_string(),
                    ttl: None,
                },
                KvCommand::Get { key: "a".to_string() },
                KvCommand::Incr { key: "n".to_string() },
                KvCommand::Del { key: "a".to_string() },
                KvCommand::Get { key: "a".to_string() },
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                KvReply::Unit,
                KvReply::Value(Some("1".to_string())),
                KvReply::Integer(1),
                KvReply::Unit,
                KvReply::Value(None),
            ]
        );
    }
}
