//! Seedable Random Number Generation for `no_std`
//!
//! The melody generator and the sequencer never reach for ambient
//! entropy: they draw from whatever [`RandomSource`] the host hands them.
//! [`Rng`] is a Xorshift128+ generator that runs on the module itself;
//! with the `std` feature, [`RandSource`] lets any `rand` generator stand
//! in, and [`Rng::from_entropy`] seeds from the OS.

/// Source of uniform randomness for melody generation.
///
/// Only [`next_u64`](RandomSource::next_u64) is required; the derived
/// draws are all built on it so that a seeded source gives reproducible
/// melodies.
pub trait RandomSource {
    /// Generate the next u64 value.
    fn next_u64(&mut self) -> u64;

    /// Uniform f64 in [0.0, 1.0).
    #[inline]
    fn next_f64(&mut self) -> f64 {
        // Use the upper 53 bits for the mantissa
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in [0, bound). Returns 0 when `bound` is 0.
    #[inline]
    fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        // Multiply-shift keeps the draw unbiased enough for musical use
        ((self.next_u64() >> 32) * bound as u64 >> 32) as u32
    }

    /// Uniform f32 in [lo, hi).
    #[inline]
    fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f64() as f32
    }

    /// True with `percent` chance, where `percent` is 0..=100.
    #[inline]
    fn chance_percent(&mut self, percent: f32) -> bool {
        (self.next_f64() * 100.0) < percent as f64
    }
}

/// A seedable random number generator using Xorshift128+.
///
/// This RNG is fast, has a period of 2^128 - 1, and is plenty for picking
/// notes. It is `Copy` so a sequencer snapshot can be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    s0: u64,
    s1: u64,
}

impl Rng {
    /// Create a new RNG with the given seed values.
    ///
    /// The seeds should not both be zero.
    #[inline]
    pub const fn new(s0: u64, s1: u64) -> Self {
        // Ensure at least one seed is non-zero
        let s0 = if s0 == 0 && s1 == 0 { 1 } else { s0 };
        Self { s0, s1 }
    }

    /// Create a new RNG from a single 64-bit seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        let s0 = splitmix64(seed);
        let s1 = splitmix64(seed.wrapping_add(0x9e3779b97f4a7c15));
        Self::new(s0, s1)
    }

    /// Create a new RNG seeded from the operating system (std only).
    #[cfg(feature = "std")]
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    /// Generate the next u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.s0;
        let mut s1 = self.s1;
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);

        result
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(0x853c49e6748fea9b, 0xda3e39cb94b95bdb)
    }
}

impl RandomSource for Rng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        Rng::next_u64(self)
    }
}

/// Adapter exposing any `rand` generator as a [`RandomSource`].
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct RandSource<R>(pub R);

#[cfg(feature = "std")]
impl<R: rand::RngCore> RandomSource for RandSource<R> {
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
}

/// Splitmix64 mixing function for deriving state from seeds.
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Pick an index with probability proportional to its weight.
///
/// Draws a uniform integer below the weight sum, then walks the list
/// subtracting weights until the remainder falls below the current one.
/// Returns `None` for an empty or all-zero list; scale tables and
/// note-kind weights reject those when they are built.
pub fn weighted_index<R: RandomSource + ?Sized>(rng: &mut R, weights: &[u32]) -> Option<usize> {
    let total: u32 = weights.iter().sum();
    if total == 0 {
        return None;
    }

    let mut remainder = rng.below(total);
    for (index, &weight) in weights.iter().enumerate() {
        if remainder < weight {
            return Some(index);
        }
        remainder -= weight;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = Rng::from_seed(12345);
        let mut rng2 = Rng::from_seed(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = Rng::from_seed(12345);
        let mut rng2 = Rng::from_seed(54321);

        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_below_range() {
        let mut rng = Rng::from_seed(42);

        for bound in [1u32, 2, 3, 7, 32, 100] {
            for _ in 0..500 {
                assert!(rng.below(bound) < bound);
            }
        }
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn test_range_f32() {
        let mut rng = Rng::from_seed(7);

        for _ in 0..1000 {
            let v = rng.range_f32(0.0, 5.0);
            assert!((0.0..5.0).contains(&v), "Value {} out of range", v);
        }
    }

    #[test]
    fn test_chance_percent_extremes() {
        let mut rng = Rng::from_seed(3);

        for _ in 0..1000 {
            assert!(!rng.chance_percent(0.0));
            assert!(rng.chance_percent(100.0));
        }
    }

    #[test]
    fn test_chance_percent_ratio() {
        let mut rng = Rng::from_seed(42);
        let count = 10000;
        let hits = (0..count).filter(|_| rng.chance_percent(30.0)).count();

        let ratio = hits as f64 / count as f64;
        assert!(
            (ratio - 0.3).abs() < 0.03,
            "Ratio {} too far from 0.3",
            ratio
        );
    }

    #[test]
    fn test_weighted_index_skips_zero_weights() {
        let mut rng = Rng::from_seed(99);

        for _ in 0..1000 {
            assert_eq!(weighted_index(&mut rng, &[0, 0, 0, 10]), Some(3));
            let idx = weighted_index(&mut rng, &[0, 4, 0, 4]).unwrap();
            assert!(idx == 1 || idx == 3);
        }
    }

    #[test]
    fn test_weighted_index_distribution() {
        let mut rng = Rng::from_seed(1234);
        let mut counts = [0usize; 3];

        for _ in 0..12000 {
            counts[weighted_index(&mut rng, &[1, 2, 3]).unwrap()] += 1;
        }

        // Expected 2000 / 4000 / 6000
        assert!((counts[0] as i64 - 2000).abs() < 300);
        assert!((counts[1] as i64 - 4000).abs() < 300);
        assert!((counts[2] as i64 - 6000).abs() < 300);
    }

    #[test]
    fn test_weighted_index_zero_sum() {
        let mut rng = Rng::from_seed(1);
        assert_eq!(weighted_index(&mut rng, &[0, 0]), None);
        assert_eq!(weighted_index(&mut rng, &[]), None);
    }

    #[test]
    fn test_rand_adapter_is_reproducible() {
        use rand::SeedableRng;

        let mut a = RandSource(rand::rngs::StdRng::seed_from_u64(5));
        let mut b = RandSource(rand::rngs::StdRng::seed_from_u64(5));
        for _ in 0..50 {
            assert_eq!(a.below(12), b.below(12));
        }
    }

    #[test]
    fn test_zero_seed_handling() {
        let mut rng = Rng::new(0, 0);
        let v = rng.next_f64();
        assert!((0.0..1.0).contains(&v));
    }
}
