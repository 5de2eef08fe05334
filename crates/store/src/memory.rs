use std::collections::{HashMap, VecDeque};

use {async_trait::async_trait, tokio::sync::Mutex};

use crate::{KvStore, StoreError, StoreResult};

#[derive(Debug)]
enum Entry {
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

/// Process-local store. Behaves like Redis for the commands we use: lists
/// vanish once drained, and mixing hash and list commands on one key fails
/// with [`StoreError::WrongType`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.hset_multiple(key, &[(field, value.to_string())]).await
    }

    async fn hset_multiple(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(map) => {
                for (field, value) in fields {
                    map.insert((*field).to_string(), value.clone());
                }
                Ok(())
            },
            Entry::List(_) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(map)) => Ok(map.get(field).cloned()),
            Some(Entry::List(_)) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(map)) => Ok(map.clone()),
            Some(Entry::List(_)) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(false),
            Some(Entry::Hash(map)) => Ok(map.contains_key(field)),
            Some(Entry::List(_)) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn list_push(&self, key: &str, value: &str) -> StoreResult<usize> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(list) => {
                list.push_back(value.to_string());
                Ok(list.len())
            },
            Entry::Hash(_) => Err(StoreError::wrong_type(key)),
        }
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        let (popped, drained) = match entries.get_mut(key) {
            None => return Ok(None),
            Some(Entry::List(list)) => {
                let popped = list.pop_front();
                (popped, list.is_empty())
            },
            Some(Entry::Hash(_)) => return Err(StoreError::wrong_type(key)),
        };
        if drained {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(0),
            Some(Entry::List(list)) => Ok(list.len()),
            Some(Entry::Hash(_)) => Err(StoreError::wrong_type(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_fields() {
        let store = MemoryStore::new();
        assert!(!store.exists("h").await.unwrap());
        assert_eq!(store.hget("h", "a").await.unwrap(), None);

        store
            .hset_multiple("h", &[("a", "1".into()), ("b", "2".into())])
            .await
            .unwrap();
        store.hset("h", "a", "3").await.unwrap();

        assert!(store.exists("h").await.unwrap());
        assert!(store.hexists("h", "b").await.unwrap());
        assert!(!store.hexists("h", "c").await.unwrap());
        assert_eq!(store.hget("h", "a").await.unwrap().as_deref(), Some("3"));

        let all = store.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["b"], "2");
    }

    #[tokio::test]
    async fn test_list_is_fifo_and_vanishes_when_drained() {
        let store = MemoryStore::new();
        assert_eq!(store.list_push("l", "first").await.unwrap(), 1);
        assert_eq!(store.list_push("l", "second").await.unwrap(), 2);
        assert_eq!(store.list_len("l").await.unwrap(), 2);

        assert_eq!(store.list_pop("l").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.list_pop("l").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.list_pop("l").await.unwrap(), None);
        assert!(!store.exists("l").await.unwrap());
        assert_eq!(store.list_len("l").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.hset("h", "a", "1").await.unwrap();
        store.list_push("l", "x").await.unwrap();

        assert!(matches!(
            store.list_push("h", "x").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.hget("l", "a").await,
            Err(StoreError::WrongType { .. })
        ));
        // A failed command leaves the list untouched.
        assert_eq!(store.list_len("l").await.unwrap(), 1);
    }
}
