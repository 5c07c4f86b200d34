//! Per-resource versioned storage.
//!
//! Every record lives under its own key in a sharded map. Mutations run
//! while holding the key's shard lock and are applied to a scratch copy, so
//! a reader always clones either the full pre-mutation or the full
//! post-mutation record. Each applied change bumps the record revision,
//! which callers may use for compare-and-set.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{BankingError, BankingResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: u64,
}

/// Outcome of [`VersionedStore::mutate`].
#[derive(Debug, Clone)]
pub struct Mutation<T> {
    pub record: Versioned<T>,
    /// `false` when the mutator decided nothing needed to change.
    pub changed: bool,
}

pub type Mutator<T> = Box<dyn FnOnce(&mut T) -> BankingResult<bool> + Send>;

pub struct VersionedStore<T> {
    kind: &'static str,
    entries: DashMap<String, Versioned<T>>,
}

impl<T: Clone> VersionedStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Versioned<T>> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, id: &str, value: T) -> BankingResult<Versioned<T>> {
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(_) => Err(BankingError::conflict(format!(
                "{} {} already exists",
                self.kind, id
            ))),
            Entry::Vacant(slot) => {
                let record = Versioned { value, revision: 1 };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Apply `f` atomically to the record stored under `id`.
    ///
    /// The mutator works on a copy; the copy is written back only when it
    /// returns `Ok(true)`. An error leaves the stored record untouched.
    pub fn mutate<F>(&self, id: &str, f: F) -> BankingResult<Mutation<T>>
    where
        F: FnOnce(&mut T) -> BankingResult<bool>,
    {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| BankingError::not_found(format!("{} {}", self.kind, id)))?;

        let mut scratch = entry.value.clone();
        let changed = f(&mut scratch)?;
        if changed {
            entry.value = scratch;
            entry.revision += 1;
        }
        Ok(Mutation {
            record: (*entry).clone(),
            changed,
        })
    }

    /// Replace the record only if its revision still equals `expected`.
    pub fn compare_and_set(
        &self,
        id: &str,
        expected: u64,
        value: T,
    ) -> BankingResult<Versioned<T>> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| BankingError::not_found(format!("{} {}", self.kind, id)))?;

        if entry.revision != expected {
            return Err(BankingError::conflict(format!(
                "{} {} revision mismatch: expected {}, found {}",
                self.kind, id, expected, entry.revision
            )));
        }
        entry.value = value;
        entry.revision += 1;
        Ok((*entry).clone())
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<(String, T)>
    where
        P: Fn(&T) -> bool,
    {
        let mut matches: Vec<(String, T)> = self
            .entries
            .iter()
            .filter(|entry| predicate(&entry.value().value))
            .map(|entry| (entry.key().clone(), entry.value().value.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_rejects_duplicates() {
        let store = VersionedStore::new("card");
        store.insert("c1", 1u32).unwrap();
        let err = store.insert("c1", 2u32).unwrap_err();
        assert!(matches!(err, BankingError::Conflict(_)));
        assert_eq!(store.get("c1").unwrap().value, 1);
    }

    #[test]
    fn test_mutate_bumps_revision_only_on_change() {
        let store = VersionedStore::new("card");
        store.insert("c1", 10u32).unwrap();

        let unchanged = store.mutate("c1", |_| Ok(false)).unwrap();
        assert!(!unchanged.changed);
        assert_eq!(unchanged.record.revision, 1);

        let changed = store
            .mutate("c1", |v| {
                *v += 1;
                Ok(true)
            })
            .unwrap();
        assert!(changed.changed);
        assert_eq!(changed.record.value, 11);
        assert_eq!(changed.record.revision, 2);
    }

    #[test]
    fn test_failed_mutation_leaves_record_untouched() {
        let store = VersionedStore::new("account");
        store.insert("a1", String::from("Compte Courant")).unwrap();

        let err = store
            .mutate("a1", |name| {
                name.clear();
                Err(BankingError::conflict("not the owner"))
            })
            .unwrap_err();
        assert!(matches!(err, BankingError::Conflict(_)));

        let record = store.get("a1").unwrap();
        assert_eq!(record.value, "Compte Courant");
        assert_eq!(record.revision, 1);
    }

    #[test]
    fn test_mutate_unknown_is_not_found() {
        let store: VersionedStore<u32> = VersionedStore::new("card");
        let err = store.mutate("nope", |_| Ok(true)).unwrap_err();
        assert_eq!(err, BankingError::not_found("card nope"));
    }

    #[test]
    fn test_compare_and_set() {
        let store = VersionedStore::new("account");
        store.insert("a1", 5u32).unwrap();

        let updated = store.compare_and_set("a1", 1, 6).unwrap();
        assert_eq!(updated.revision, 2);

        let err = store.compare_and_set("a1", 1, 7).unwrap_err();
        assert!(matches!(err, BankingError::Conflict(_)));
        assert_eq!(store.get("a1").unwrap().value, 6);
    }

    #[test]
    fn test_concurrent_mutations_are_serialized_per_key() {
        let store = Arc::new(VersionedStore::new("counter"));
        store.insert("k", 0u64).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        store
                            .mutate("k", |v| {
                                *v += 1;
                                Ok(true)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let record = store.get("k").unwrap();
        assert_eq!(record.value, 4000);
        assert_eq!(record.revision, 4001);
    }
}
