//! In-memory [`SharedStore`] backend.
//!
//! [`MemoryStore`] keeps every key in a [`DashMap`] whose shard locks make
//! each operation atomic per key. Expiry is lazy: an expired slot is
//! treated as absent (and purged) the next time it is touched. Used by
//! single-node deployments and by every test in this crate; multi-node
//! deployments plug a networked backend into the same trait.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{SetAdd, SharedStore, StoreError, StoreResult, Versioned};

/// One stored value of any supported kind.
#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
    List(Vec<String>),
    Hash(BTreeMap<String, String>),
}

/// A keyed slot: value, CAS version, optional expiry.
#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    version: u64,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            version: 1,
            expires_at: ttl.map(|t| now + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_kind(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongKind {
        key: key.to_string(),
        expected,
    }
}

/// DashMap-backed shared store with lazy TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the slot if its TTL has elapsed, so subsequent reads see it
    /// as absent.
    fn purge_if_expired(&self, key: &str, now: Instant) {
        self.slots.remove_if(key, |_, slot| slot.is_expired(now));
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Text(text) => Ok(Some(text.clone())),
                _ => Err(wrong_kind(key, "text value")),
            },
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                let expired = slot.is_expired(now);
                let version = if expired {
                    1
                } else {
                    slot.version.saturating_add(1)
                };
                let expires_at = match ttl {
                    Some(t) => Some(now + t),
                    None if expired => None,
                    None => slot.expires_at,
                };
                *slot = Slot {
                    value: Value::Text(value.to_string()),
                    version,
                    expires_at,
                };
                Ok(())
            }
            Entry::Vacant(vac) => {
                vac.insert(Slot::new(Value::Text(value.to_string()), ttl, now));
                Ok(())
            }
        }
    }

    async fn get_versioned(&self, key: &str) -> StoreResult<Option<Versioned>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Text(text) => Ok(Some(Versioned {
                    value: text.clone(),
                    version: slot.version,
                })),
                _ => Err(wrong_kind(key, "text value")),
            },
        }
    }

    async fn put_versioned(
        &self,
        key: &str,
        value: &str,
        expected_version: u64,
        ttl: Option<Duration>,
    ) -> StoreResult<u64> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                if slot.is_expired(now) {
                    if expected_version != 0 {
                        return Err(StoreError::VersionMismatch {
                            key: key.to_string(),
                        });
                    }
                    *slot = Slot::new(Value::Text(value.to_string()), ttl, now);
                    return Ok(1);
                }
                if slot.version != expected_version {
                    return Err(StoreError::VersionMismatch {
                        key: key.to_string(),
                    });
                }
                let next = slot.version.saturating_add(1);
                slot.value = Value::Text(value.to_string());
                slot.version = next;
                if let Some(t) = ttl {
                    slot.expires_at = Some(now + t);
                }
                Ok(next)
            }
            Entry::Vacant(vac) => {
                if expected_version != 0 {
                    return Err(StoreError::VersionMismatch {
                        key: key.to_string(),
                    });
                }
                vac.insert(Slot::new(Value::Text(value.to_string()), ttl, now));
                Ok(1)
            }
        }
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        Ok(self.slots.remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get_mut(key) {
            None => Ok(false),
            Some(mut slot) => {
                slot.expires_at = Some(now + ttl);
                Ok(true)
            }
        }
    }

    async fn set_add(
        &self,
        key: &str,
        member: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<SetAdd> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                if slot.is_expired(now) {
                    let mut set = BTreeSet::new();
                    set.insert(member.to_string());
                    *slot = Slot::new(Value::Set(set), ttl, now);
                    return Ok(SetAdd {
                        inserted: true,
                        len: 1,
                    });
                }
                if let Some(t) = ttl {
                    slot.expires_at = Some(now + t);
                }
                match &mut slot.value {
                    Value::Set(set) => {
                        let inserted = set.insert(member.to_string());
                        Ok(SetAdd {
                            inserted,
                            len: set.len() as u64,
                        })
                    }
                    _ => Err(wrong_kind(key, "set")),
                }
            }
            Entry::Vacant(vac) => {
                let mut set = BTreeSet::new();
                set.insert(member.to_string());
                vac.insert(Slot::new(Value::Set(set), ttl, now));
                Ok(SetAdd {
                    inserted: true,
                    len: 1,
                })
            }
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get_mut(key) {
            None => Ok(false),
            Some(mut slot) => match &mut slot.value {
                Value::Set(set) => Ok(set.remove(member)),
                _ => Err(wrong_kind(key, "set")),
            },
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(false),
            Some(slot) => match &slot.value {
                Value::Set(set) => Ok(set.contains(member)),
                _ => Err(wrong_kind(key, "set")),
            },
        }
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::Set(set) => Ok(set.iter().cloned().collect()),
                _ => Err(wrong_kind(key, "set")),
            },
        }
    }

    async fn set_len(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(0),
            Some(slot) => match &slot.value {
                Value::Set(set) => Ok(set.len() as u64),
                _ => Err(wrong_kind(key, "set")),
            },
        }
    }

    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<u64> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                if slot.is_expired(now) {
                    *slot = Slot::new(Value::List(vec![value.to_string()]), ttl, now);
                    return Ok(1);
                }
                if let Some(t) = ttl {
                    slot.expires_at = Some(now + t);
                }
                match &mut slot.value {
                    Value::List(list) => {
                        list.push(value.to_string());
                        Ok(list.len() as u64)
                    }
                    _ => Err(wrong_kind(key, "list")),
                }
            }
            Entry::Vacant(vac) => {
                vac.insert(Slot::new(Value::List(vec![value.to_string()]), ttl, now));
                Ok(1)
            }
        }
    }

    async fn list_get(&self, key: &str, index: u64) -> StoreResult<Option<String>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::List(list) => Ok(list.get(index as usize).cloned()),
                _ => Err(wrong_kind(key, "list")),
            },
        }
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(0),
            Some(slot) => match &slot.value {
                Value::List(list) => Ok(list.len() as u64),
                _ => Err(wrong_kind(key, "list")),
            },
        }
    }

    async fn hash_set(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                if slot.is_expired(now) {
                    let mut hash = BTreeMap::new();
                    hash.insert(field.to_string(), value.to_string());
                    *slot = Slot::new(Value::Hash(hash), ttl, now);
                    return Ok(());
                }
                if let Some(t) = ttl {
                    slot.expires_at = Some(now + t);
                }
                match &mut slot.value {
                    Value::Hash(hash) => {
                        hash.insert(field.to_string(), value.to_string());
                        Ok(())
                    }
                    _ => Err(wrong_kind(key, "hash")),
                }
            }
            Entry::Vacant(vac) => {
                let mut hash = BTreeMap::new();
                hash.insert(field.to_string(), value.to_string());
                vac.insert(Slot::new(Value::Hash(hash), ttl, now));
                Ok(())
            }
        }
    }

    async fn hash_set_nx(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let slot = occ.get_mut();
                if slot.is_expired(now) {
                    let mut hash = BTreeMap::new();
                    hash.insert(field.to_string(), value.to_string());
                    *slot = Slot::new(Value::Hash(hash), ttl, now);
                    return Ok(true);
                }
                if let Some(t) = ttl {
                    slot.expires_at = Some(now + t);
                }
                match &mut slot.value {
                    Value::Hash(hash) => {
                        if hash.contains_key(field) {
                            return Ok(false);
                        }
                        hash.insert(field.to_string(), value.to_string());
                        Ok(true)
                    }
                    _ => Err(wrong_kind(key, "hash")),
                }
            }
            Entry::Vacant(vac) => {
                let mut hash = BTreeMap::new();
                hash.insert(field.to_string(), value.to_string());
                vac.insert(Slot::new(Value::Hash(hash), ttl, now));
                Ok(true)
            }
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Hash(hash) => Ok(hash.get(field).cloned()),
                _ => Err(wrong_kind(key, "hash")),
            },
        }
    }

    async fn hash_entries(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(Vec::new()),
            Some(slot) => match &slot.value {
                Value::Hash(hash) => {
                    Ok(hash.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                }
                _ => Err(wrong_kind(key, "hash")),
            },
        }
    }

    async fn hash_remove(&self, key: &str, field: &str) -> StoreResult<bool> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        let (removed, emptied) = match self.slots.get_mut(key) {
            None => return Ok(false),
            Some(mut slot) => match &mut slot.value {
                Value::Hash(hash) => {
                    let removed = hash.remove(field).is_some();
                    (removed, hash.is_empty())
                }
                _ => return Err(wrong_kind(key, "hash")),
            },
        };
        if emptied {
            self.slots
                .remove_if(key, |_, s| matches!(&s.value, Value::Hash(h) if h.is_empty()));
        }
        Ok(removed)
    }

    async fn hash_len(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.slots.get(key) {
            None => Ok(0),
            Some(slot) => match &slot.value {
                Value::Hash(hash) => Ok(hash.len() as u64),
                _ => Err(wrong_kind(key, "hash")),
            },
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = Instant::now();
        let keys = self
            .slots
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        Ok(keys)
    }
}
