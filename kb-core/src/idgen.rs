//! 64-bit monotonic ID generator: `(ms_since_epoch - EPOCH_MS) << 22 | machine_id << 12 | sequence`.
//!
//! Grounded on `app/core/snowflake.py`: a fixed epoch, a machine id read from
//! the environment (falling back to a hash of the hostname), and a 12-bit
//! per-millisecond sequence that spins to the next millisecond on overflow
//! rather than ever emitting a non-monotonic id.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// 2024-01-01T00:00:00Z, matching the original service's fixed epoch.
const EPOCH_MS: i64 = 1_704_067_200_000;
const SEQUENCE_BITS: i64 = 12;
const MACHINE_ID_BITS: i64 = 10;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const MAX_MACHINE_ID: i64 = (1 << MACHINE_ID_BITS) - 1;

struct State {
    last_ms: i64,
    sequence: i64,
}

/// Thread-safe generator of 64-bit, string-encoded, monotonically
/// increasing identifiers, shared by one process-wide instance.
pub struct IdGenerator {
    machine_id: i64,
    state: Mutex<State>,
}

static GLOBAL: OnceCell<IdGenerator> = OnceCell::new();

impl IdGenerator {
    pub fn new(machine_id: i64) -> Self {
        Self {
            machine_id: machine_id.clamp(0, MAX_MACHINE_ID),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    /// The process-wide generator. Machine id comes from `KB_MACHINE_ID`,
    /// falling back to a hash of the hostname modulo 1024 when unset.
    pub fn global() -> &'static IdGenerator {
        GLOBAL.get_or_init(|| IdGenerator::new(default_machine_id()))
    }

    /// Generate the next id as a 64-bit integer.
    pub fn next_id(&self) -> i64 {
        let mut state = self.state.lock();
        let mut now = current_millis();

        if now < state.last_ms {
            // Clock regression: spin until time catches back up rather than
            // ever emitting a non-monotonic id.
            while now < state.last_ms {
                std::thread::yield_now();
                now = current_millis();
            }
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                // Sequence exhausted within this millisecond: spin to the next one.
                while now <= state.last_ms {
                    std::thread::yield_now();
                    now = current_millis();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now;
        ((now - EPOCH_MS) << (MACHINE_ID_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence
    }

    /// Generate the next id as a string, for cross-system use.
    pub fn next_id_string(&self) -> String {
        self.next_id().to_string()
    }
}

fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

fn default_machine_id() -> i64 {
    if let Ok(raw) = std::env::var("KB_MACHINE_ID") {
        if let Ok(parsed) = raw.parse::<i64>() {
            return parsed.clamp(0, MAX_MACHINE_ID);
        }
    }
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    (hash_str(&hostname) % (MAX_MACHINE_ID as u64 + 1)) as i64
}

fn hash_str(s: &str) -> u64 {
    // FNV-1a, adequate for a stable, deterministic machine-id fallback.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let gen = IdGenerator::new(7);
        let mut seen = HashSet::new();
        let mut prev = gen.next_id();
        seen.insert(prev);
        for _ in 0..5000 {
            let id = gen.next_id();
            assert!(id > prev, "ids must strictly increase");
            assert!(seen.insert(id), "ids must be unique");
            prev = id;
        }
    }

    #[test]
    fn machine_id_is_clamped() {
        let gen = IdGenerator::new(9999);
        assert_eq!(gen.machine_id, MAX_MACHINE_ID);
    }

    proptest! {
        /// However many ids are pulled in a row from one generator, the
        /// sequence is strictly increasing and carries no duplicates,
        /// regardless of machine id or batch size.
        #[test]
        fn ids_stay_monotonic_and_unique_for_any_machine_and_batch(
            machine_id in 0i64..=MAX_MACHINE_ID,
            count in 1usize..500,
        ) {
            let gen = IdGenerator::new(machine_id);
            let mut seen = HashSet::new();
            let mut prev = None;
            for _ in 0..count {
                let id = gen.next_id();
                if let Some(p) = prev {
                    prop_assert!(id > p);
                }
                prop_assert!(seen.insert(id));
                prev = Some(id);
            }
        }
    }
}
