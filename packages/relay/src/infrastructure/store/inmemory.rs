//! InMemory Auxiliary Store 実装
//!
//! ドメイン層が定義する AuxiliaryStore trait のプロセス内実装。
//! 単一インスタンスでの開発とテストに使う。TTL は `tokio::time::Instant` で管理するため、
//! テストでは `tokio::time::pause` / `advance` で期限切れを再現できる。
//!
//! 期限切れのキーはアクセス時に削除する（Redis の遅延削除と同じ振る舞い）。

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::domain::{AuxiliaryStore, StoreError};

#[derive(Debug)]
enum Value {
    List(VecDeque<String>),
    Scalar(String),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// インメモリ Auxiliary Store
#[derive(Debug, Default)]
pub struct InMemoryAuxiliaryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryAuxiliaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
    }

    fn list_mut<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Result<&'a mut Entry, StoreError> {
        Self::purge_expired(entries, key);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        if matches!(entry.value, Value::Scalar(_)) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(entry)
    }
}

#[async_trait]
impl AuxiliaryStore for InMemoryAuxiliaryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn append(
        &self,
        key: &str,
        value: String,
        retention: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = Self::list_mut(&mut entries, key)?;
        if let Value::List(list) = &mut entry.value {
            list.push_back(value);
        }
        if let Some(retention) = retention {
            entry.expires_at = Some(Instant::now() + retention);
        }
        Ok(())
    }

    async fn append_capped(
        &self,
        key: &str,
        value: String,
        capacity: usize,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = Self::list_mut(&mut entries, key)?;
        if let Value::List(list) = &mut entry.value {
            list.push_back(value);
            while list.len() > capacity {
                list.pop_front();
            }
        }
        Ok(())
    }

    async fn range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Scalar(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        Self::purge_expired(&mut entries, key);
        let (current, expires_at) = match entries.get(key) {
            None => (0, None),
            Some(Entry {
                value: Value::Scalar(value),
                expires_at,
            }) => match value.parse::<u64>() {
                Ok(current) => (current, *expires_at),
                Err(_) => return Err(StoreError::WrongType(key.to_string())),
            },
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(next.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl).or(expires_at),
            },
        );
        Ok(next)
    }

    async fn fetch_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));

        let mut found: Vec<(String, String)> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, entry)| match &entry.value {
                Value::Scalar(value) => Some((key.clone(), value.clone())),
                Value::List(_) => None,
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        tracing::debug!("In-memory auxiliary store closed");
        Ok(())
    }
}
