//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! Session randomness flows through DojoRng streams derived from the
//! session master seed; seeded agent backfill flows through a stream
//! derived from the agent's identity alone.
//!
//! Each stream is seeded from (master_seed XOR slot_index). This means:
//!   - Adding a new stream never changes existing streams.
//!   - Each stream is fully reproducible in isolation.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG stream.
pub struct DojoRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl DojoRng {
    /// Create a stream from the master seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Stream keyed purely by an identity string. Same identity, same stream.
    pub fn from_identity(identity: &str) -> Self {
        Self {
            name: "identity",
            inner: Pcg64Mcg::seed_from_u64(identity_hash(identity)),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an index into a slice of length `len`.
    pub fn next_index(&mut self, len: usize) -> usize {
        self.next_u64_below(len as u64) as usize
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

impl Iterator for DojoRng {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_f64())
    }
}

/// Infinite stream of floats in [0, 1) keyed by the identity's
/// character codes only.
pub fn seed_stream(identity: &str) -> impl Iterator<Item = f64> {
    DojoRng::from_identity(identity).with_name("seed")
}

/// 31-multiplier rolling hash over UTF-16 code units, wrapped to i32.
fn identity_hash(identity: &str) -> u64 {
    let hash = identity
        .encode_utf16()
        .fold(0i32, |h, c| (c as i32).wrapping_add(h.wrapping_shl(5).wrapping_sub(h)));
    hash as u32 as u64
}

/// All session streams, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_stream(&self, slot: StreamSlot) -> DojoRng {
        DojoRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries, only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Guard = 0,
    Topic = 1,
    Autoplay = 2,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Guard => "guard",
            Self::Topic => "topic",
            Self::Autoplay => "autoplay",
        }
    }
}
