//! Write-once keyed store shared by concurrently running steps.

use crate::errors::SideChannelError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

struct Slot {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// A thread-safe, write-once map from string keys to values of any type.
///
/// Inserting a key that already exists is rejected atomically, so two steps
/// racing on the same key always see exactly one winner.
#[derive(Default)]
pub struct SideChannel {
    slots: DashMap<String, Slot>,
}

impl SideChannel {
    /// Creates an empty side channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under a new key.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for empty or whitespace keys, `DuplicateKey` if the key
    /// has already been written.
    pub fn set<V>(&self, key: &str, value: V) -> Result<(), SideChannelError>
    where
        V: Any + Send + Sync,
    {
        self.set_opt(key, Some(value))
    }

    /// Stores an optional value under a new key.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set), plus `NullValue` when `value` is `None`.
    pub fn set_opt<V>(&self, key: &str, value: Option<V>) -> Result<(), SideChannelError>
    where
        V: Any + Send + Sync,
    {
        validate_key(key)?;
        let Some(value) = value else {
            return Err(SideChannelError::NullValue { key: key.to_string() });
        };

        match self.slots.entry(key.to_string()) {
            Entry::Occupied(_) => Err(SideChannelError::DuplicateKey { key: key.to_string() }),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Arc::new(value),
                    type_name: type_name::<V>(),
                });
                Ok(())
            }
        }
    }

    /// Looks up a value by key.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for empty or whitespace keys, `TypeMismatch` when the stored
    /// value is not a `T`.
    pub fn try_get<T>(&self, key: &str) -> Result<Option<Arc<T>>, SideChannelError>
    where
        T: Any + Send + Sync,
    {
        validate_key(key)?;
        let Some(slot) = self.slots.get(key) else {
            return Ok(None);
        };

        Arc::clone(&slot.value)
            .downcast::<T>()
            .map(Some)
            .map_err(|_| SideChannelError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
                actual: slot.type_name,
            })
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns all keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for SideChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideChannel")
            .field("keys", &self.keys())
            .finish()
    }
}

fn validate_key(key: &str) -> Result<(), SideChannelError> {
    if key.trim().is_empty() {
        return Err(SideChannelError::InvalidKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get() {
        let channel = SideChannel::new();
        channel.set("user", "alice".to_string()).unwrap();

        let value = channel.try_get::<String>("user").unwrap().unwrap();
        assert_eq!(value.as_str(), "alice");
        assert!(channel.contains_key("user"));
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let channel = SideChannel::new();
        channel.set("k", 1_u32).unwrap();

        let err = channel.set("k", 2_u32).unwrap_err();
        assert_eq!(err, SideChannelError::DuplicateKey { key: "k".into() });
        assert_eq!(*channel.try_get::<u32>("k").unwrap().unwrap(), 1);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let channel = SideChannel::new();
        assert_eq!(channel.set("", 1_u8).unwrap_err(), SideChannelError::InvalidKey);
        assert_eq!(channel.set("   ", 1_u8).unwrap_err(), SideChannelError::InvalidKey);
        assert_eq!(
            channel.try_get::<u8>(" ").unwrap_err(),
            SideChannelError::InvalidKey
        );
        assert!(channel.is_empty());
    }

    #[test]
    fn test_null_value_rejected() {
        let channel = SideChannel::new();
        let err = channel.set_opt::<String>("missing", None).unwrap_err();
        assert_eq!(err, SideChannelError::NullValue { key: "missing".into() });
        assert!(!channel.contains_key("missing"));
    }

    #[test]
    fn test_absent_key_is_not_an_error() {
        let channel = SideChannel::new();
        assert!(channel.try_get::<String>("nope").unwrap().is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let channel = SideChannel::new();
        channel.set("n", 5_i64).unwrap();

        let err = channel.try_get::<String>("n").unwrap_err();
        match err {
            SideChannelError::TypeMismatch { key, actual, .. } => {
                assert_eq!(key, "n");
                assert_eq!(actual, "i64");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_writers_single_winner() {
        let channel = Arc::new(SideChannel::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let channel = Arc::clone(&channel);
                std::thread::spawn(move || channel.set("race", i).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(channel.keys(), vec!["race".to_string()]);
    }
}
