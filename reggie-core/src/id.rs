//! Snowflake id generation.
//!
//! Layout (most significant first): 41 bits of milliseconds since
//! [`EPOCH_MS`], 10 bits of worker id, 12 bits of per-millisecond sequence.
//! Ids are positive, unique per worker and increase monotonically.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// 2020-01-01T00:00:00Z.
pub const EPOCH_MS: i64 = 1_577_836_800_000;

const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("worker id {0} exceeds maximum {max}", max = MAX_WORKER_ID)]
pub struct InvalidWorkerId(pub u16);

#[derive(Debug)]
struct Clock {
    last_ms: i64,
    sequence: i64,
}

#[derive(Debug)]
pub struct IdGenerator {
    worker_id: i64,
    clock: Mutex<Clock>,
}

impl IdGenerator {
    pub fn new(worker_id: u16) -> Result<Self, InvalidWorkerId> {
        if worker_id > MAX_WORKER_ID {
            return Err(InvalidWorkerId(worker_id));
        }
        Ok(Self::with_worker(worker_id))
    }

    fn with_worker(worker_id: u16) -> Self {
        Self {
            worker_id: i64::from(worker_id),
            clock: Mutex::new(Clock {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn next_id(&self) -> i64 {
        let mut clock = self.clock.lock().expect("mutex poisoned");
        let mut now = current_ms();

        // A clock that steps backwards keeps issuing from the last timestamp.
        if now < clock.last_ms {
            now = clock.last_ms;
        }

        if now == clock.last_ms {
            clock.sequence = (clock.sequence + 1) & SEQUENCE_MASK;
            if clock.sequence == 0 {
                // Sequence exhausted for this millisecond.
                while now <= clock.last_ms {
                    std::thread::yield_now();
                    now = current_ms();
                }
            }
        } else {
            clock.sequence = 0;
        }

        clock.last_ms = now;
        ((now - EPOCH_MS) << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | clock.sequence
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::with_worker(1)
    }
}

fn current_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(EPOCH_MS)
}

/// Parse a comma separated id list as sent in `?ids=1,2,3`.
///
/// Blank entries are skipped; any non-numeric entry fails the whole list.
pub fn parse_id_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| format!("invalid id '{}'", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let gen = IdGenerator::new(3).unwrap();
        let ids: Vec<i64> = (0..10_000).map(|_| gen.next_id()).collect();

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids.iter().all(|id| *id > 0));
    }

    #[test]
    fn test_worker_id_is_embedded() {
        let gen = IdGenerator::new(517).unwrap();
        let id = gen.next_id();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_WORKER_ID), 517);
    }

    #[test]
    fn test_worker_id_out_of_range() {
        assert_eq!(
            IdGenerator::new(MAX_WORKER_ID + 1).unwrap_err(),
            InvalidWorkerId(MAX_WORKER_ID + 1)
        );
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1,2, 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("").unwrap(), Vec::<i64>::new());
        assert_eq!(parse_id_list("4,,5,").unwrap(), vec![4, 5]);
        assert!(parse_id_list("1,x").is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_id_list_inverts_join(ids in proptest::collection::vec(any::<i64>(), 0..20)) {
            let raw = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
            prop_assert_eq!(parse_id_list(&raw).unwrap(), ids);
        }
    }
}
