//! Key-value queue store abstraction
//!
//! Queue state (traditional queue hash, instant queue entries, ignore
//! sets, immediate-scan set) lives behind this trait so the engine can
//! run against an in-memory store in tests and a networked store in
//! production. Values are stored as strings; callers own parsing, which
//! keeps defensive cleanup of malformed entries possible.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::Result;

/// Minimal hash/set store the queue layer is written against
pub trait QueueStore: Send + Sync {
    /// Set a field in the named hash
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Remove a field from the named hash
    fn hash_del(&self, key: &str, field: &str) -> Result<()>;

    /// Read a single field from the named hash
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Read all field/value pairs from the named hash
    fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// Check whether the named hash contains a field
    fn hash_contains(&self, key: &str, field: &str) -> Result<bool>;

    /// Add a member to the named set
    fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from the named set
    fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// Check whether the named set contains a member
    fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// Read all members of the named set
    fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Delete an entire key, hash or set
    fn delete_key(&self, key: &str) -> Result<()>;
}

/// In-memory store used by tests and single-node deployments
#[derive(Default)]
pub struct InMemoryQueueStore {
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for InMemoryQueueStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut hashes = self.hashes.lock().unwrap();
        hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn hash_del(&self, key: &str, field: &str) -> Result<()> {
        let mut hashes = self.hashes.lock().unwrap();
        if let Some(hash) = hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(())
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let hashes = self.hashes.lock().unwrap();
        Ok(hashes.get(key).and_then(|hash| hash.get(field).cloned()))
    }

    fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>> {
        let hashes = self.hashes.lock().unwrap();
        Ok(hashes
            .get(key)
            .map(|hash| {
                hash.iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn hash_contains(&self, key: &str, field: &str) -> Result<bool> {
        let hashes = self.hashes.lock().unwrap();
        Ok(hashes
            .get(key)
            .map(|hash| hash.contains_key(field))
            .unwrap_or(false))
    }

    fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut sets = self.sets.lock().unwrap();
        sets.entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut sets = self.sets.lock().unwrap();
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let sets = self.sets.lock().unwrap();
        Ok(sets.get(key).map(|set| set.contains(member)).unwrap_or(false))
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let sets = self.sets.lock().unwrap();
        Ok(sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn delete_key(&self, key: &str) -> Result<()> {
        self.hashes.lock().unwrap().remove(key);
        self.sets.lock().unwrap().remove(key);
        Ok(())
    }
}
