// Seedable pseudo-random number generator for matchmaking decisions.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// The arena needs very little randomness: the coin flip that decides which of
// two drawn players re-enters the queue first. A seeded generator keeps that
// decision reproducible in tests, and `from_entropy` mixes wall-clock time with
// a process-wide counter for production servers that don't pin a seed.
//
// The scheduler owns one master `ArenaRng` and derives a child generator per
// session (`fork`), so sessions never contend on a shared generator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Distinguishes generators created within the same clock tick.
static ENTROPY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Xoshiro256++ PRNG.
#[derive(Clone, Debug)]
pub struct ArenaRng {
    s: [u64; 4],
}

impl ArenaRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Two `ArenaRng` instances created with the same seed produce identical
    /// output sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Create a PRNG seeded from the system clock and a per-process counter.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let count = ENTROPY_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut sm = nanos ^ count.rotate_left(32) ^ u64::from(std::process::id());
        Self::new(splitmix64(&mut sm))
    }

    /// Derive an independent child generator, advancing this one.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Fair coin flip. Uses the top bit, which has the best statistical
    /// quality in xoshiro output.
    pub fn coin_flip(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }
}

/// SplitMix64, used only to expand a single `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
