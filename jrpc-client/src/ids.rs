//! Request id strategies
//!
//! The call tracker only needs ids that are unique among the calls it
//! currently has pending. Two strategies ship with the crate:
//!
//! - [`SequentialIds`]: numeric ids from a monotonic counter (the default)
//! - [`RandomIds`]: random alphanumeric string tokens
//!
//! Either can be swapped for a custom [`IdGenerator`]. A generator that
//! hands out an id still in flight makes the call fail with
//! `Error::IdCollision`.

use jrpc_core::Id;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of fresh request ids
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Id;
}

/// Monotonic numeric ids
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> Id {
        Id::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Random string ids
#[derive(Debug, Clone)]
pub struct RandomIds {
    len: usize,
}

impl RandomIds {
    pub const DEFAULT_LEN: usize = 16;

    pub fn new() -> Self {
        Self::with_len(Self::DEFAULT_LEN)
    }

    pub fn with_len(len: usize) -> Self {
        Self { len: len.max(1) }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Id {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect();
        Id::String(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id(), Id::Number(1));
        assert_eq!(ids.next_id(), Id::Number(2));

        let offset = SequentialIds::starting_at(100);
        assert_eq!(offset.next_id(), Id::Number(100));
    }

    #[test]
    fn test_random_ids() {
        let ids = RandomIds::with_len(8);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let Id::String(token) = ids.next_id() else {
                panic!("expected a string id");
            };
            assert_eq!(token.len(), 8);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
            seen.insert(token);
        }
        assert!(seen.len() > 90);
    }
}
