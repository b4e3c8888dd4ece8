//! Hop-by-Hop and End-to-End identifier generation (RFC 6733 §3).
//!
//! Hop-by-Hop ids only need to be unique among a peer's outstanding
//! requests, so a randomly-seeded counter is enough. End-to-End ids
//! must stay unique across agent restarts, so they combine the
//! current time with a counter seeded from a value persisted to disk,
//! the same scheme RFC 6733 §3 recommends:
//! `<high 12 bits: low 12 bits of boot time><low 20 bits: counter>`.
use crate::error::{Error, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const STATE_ID_ENV: &str = "AAA_ROUTER_STATE_DIR";
const STATE_ID_FILE: &str = "end_to_end_seed";

pub struct HopByHopGenerator {
    counter: AtomicU32,
}

impl HopByHopGenerator {
    pub fn new() -> HopByHopGenerator {
        HopByHopGenerator {
            counter: AtomicU32::new(rand::random()),
        }
    }

    pub fn next(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for HopByHopGenerator {
    fn default() -> Self {
        HopByHopGenerator::new()
    }
}

pub struct EndToEndGenerator {
    high_bits: u32,
    counter: AtomicU32,
}

impl EndToEndGenerator {
    /// Loads (or initializes) the persistent low-20-bits seed from the
    /// state-id file under `$AAA_ROUTER_STATE_DIR`, then seeds the
    /// high 12 bits from the current boot time per RFC 6733 §3.
    pub fn load() -> Result<EndToEndGenerator> {
        let seed = load_and_advance_state_seed()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::DecodeError(e.to_string()))?
            .as_secs() as u32;
        let high_bits = (now & 0x0FFF) << 20;

        Ok(EndToEndGenerator {
            high_bits,
            counter: AtomicU32::new(seed),
        })
    }

    pub fn next(&self) -> u32 {
        let low_bits = self.counter.fetch_add(1, Ordering::Relaxed) & 0x000F_FFFF;
        self.high_bits | low_bits
    }
}

fn state_dir() -> Result<PathBuf> {
    let dir = std::env::var(STATE_ID_ENV).map_err(|_| Error::MissingEnv(STATE_ID_ENV.to_string()))?;
    Ok(PathBuf::from(dir))
}

/// Reads the state-id file as a decimal text integer (spec.md §6: "a
/// text file containing a decimal integer"), defaulting to 1 when the
/// file is absent, then writes back the incremented value.
fn load_and_advance_state_seed() -> Result<u32> {
    let path = state_dir()?.join(STATE_ID_FILE);

    let current = match std::fs::read_to_string(&path) {
        Ok(text) => text.trim().parse().unwrap_or(1),
        Err(_) => 1,
    };

    let next = current.wrapping_add(1);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(&path)?;
    file.write_all(next.to_string().as_bytes())?;

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_increments() {
        let gen = HopByHopGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert_eq!(b, a.wrapping_add(1));
    }

    #[test]
    fn test_end_to_end_persists_across_loads() {
        let dir = std::env::temp_dir().join(format!("aaa-router-test-{}", rand::random::<u32>()));
        std::env::set_var(STATE_ID_ENV, &dir);

        let gen1 = EndToEndGenerator::load().unwrap();
        let first = gen1.next();
        let second = gen1.next();
        assert_ne!(first, second);

        let gen2 = EndToEndGenerator::load().unwrap();
        let third = gen2.next();
        assert_ne!(third, first);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_state_seed_file_is_decimal_text_starting_at_one() {
        let dir = std::env::temp_dir().join(format!("aaa-router-test-{}", rand::random::<u32>()));
        std::env::set_var(STATE_ID_ENV, &dir);

        let first = load_and_advance_state_seed().unwrap();
        assert_eq!(first, 1);

        let contents = std::fs::read_to_string(dir.join(STATE_ID_FILE)).unwrap();
        assert_eq!(contents.trim(), "2");

        let second = load_and_advance_state_seed().unwrap();
        assert_eq!(second, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_env_is_an_error() {
        std::env::remove_var(STATE_ID_ENV);
        assert!(matches!(state_dir(), Err(Error::MissingEnv(_))));
    }
}
