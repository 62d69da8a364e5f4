//! Seedable Random Number Generation
//!
//! Xorshift128+ uniform generator plus a standard-normal source, the two
//! random primitives the generator modules consume. The algorithm is fast,
//! has a period of 2^128 - 1, and passes most statistical tests, which is
//! plenty for audio-rate noise.

/// A seedable random number generator using Xorshift128+.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    s0: u64,
    s1: u64,
    spare_normal: Option<f64>,
}

impl Rng {
    /// Create a new RNG with the given seed values.
    ///
    /// The seeds should not both be zero.
    #[inline]
    pub const fn new(s0: u64, s1: u64) -> Self {
        let s0 = if s0 == 0 && s1 == 0 { 1 } else { s0 };
        Self {
            s0,
            s1,
            spare_normal: None,
        }
    }

    /// Create a new RNG from a single 64-bit seed.
    ///
    /// The seed is split into two state values using a mixing function.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        let s0 = splitmix64(seed);
        let s1 = splitmix64(seed.wrapping_add(0x9e3779b97f4a7c15));
        Self::new(s0, s1)
    }

    /// Create a new RNG seeded from system time.
    pub fn from_system_time() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_seed(duration.as_nanos() as u64)
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

    /// Generate a random f64 in the range [0.0, 1.0).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // Upper 53 bits for the mantissa
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate a standard-normal deviate (mean 0, variance 1).
    ///
    /// Marsaglia polar method; the second deviate of each pair is cached for
    /// the next call.
    pub fn next_normal(&mut self) -> f64 {
        if let Some(z) = self.spare_normal.take() {
            return z;
        }
        loop {
            let u = self.next_f64() * 2.0 - 1.0;
            let v = self.next_f64() * 2.0 - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let m = (-2.0 * s.ln() / s).sqrt();
                self.spare_normal = Some(v * m);
                return u * m;
            }
        }
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::from_system_time()
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

/// The random-source contract the modules consume: a uniform real in [0,1)
/// and a standard-normal deviate, independent across calls.
pub trait NoiseSource: Send {
    fn uniform(&mut self) -> f64;
    fn normal(&mut self) -> f64;
}

impl NoiseSource for Rng {
    fn uniform(&mut self) -> f64 {
        self.next_f64()
    }

    fn normal(&mut self) -> f64 {
        self.next_normal()
    }
}

/// A scripted noise source replaying fixed draw sequences.
///
/// Lets tests drive the probabilistic state machines deterministically; both
/// queues repeat their last value once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNoise {
    uniforms: Vec<f64>,
    normals: Vec<f64>,
    u_pos: usize,
    n_pos: usize,
}

impl ScriptedNoise {
    pub fn new(uniforms: Vec<f64>, normals: Vec<f64>) -> Self {
        Self {
            uniforms,
            normals,
            u_pos: 0,
            n_pos: 0,
        }
    }
}

impl NoiseSource for ScriptedNoise {
    fn uniform(&mut self) -> f64 {
        let v = match self.uniforms.get(self.u_pos) {
            Some(&v) => v,
            None => *self.uniforms.last().unwrap_or(&0.5),
        };
        self.u_pos += 1;
        v
    }

    fn normal(&mut self) -> f64 {
        let v = match self.normals.get(self.n_pos) {
            Some(&v) => v,
            None => *self.normals.last().unwrap_or(&0.0),
        };
        self.n_pos += 1;
        v
    }
}

/// A precomputed ring of standard-normal deviates, cycled with wraparound.
///
/// Trades exact statistical independence at the buffer period for not running
/// the generator on every one of the bank's per-sample draws. The length is
/// prime so the period never aligns with a partial count.
#[derive(Debug, Clone)]
pub struct NormalBuffer {
    table: Vec<f64>,
    pos: usize,
}

impl NormalBuffer {
    pub const DEFAULT_LEN: usize = 9973;

    pub fn new(seed: u64) -> Self {
        Self::with_len(seed, Self::DEFAULT_LEN)
    }

    pub fn with_len(seed: u64, len: usize) -> Self {
        let mut rng = Rng::from_seed(seed);
        let table = (0..len.max(1)).map(|_| rng.next_normal()).collect();
        Self { table, pos: 0 }
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        let v = self.table[self.pos];
        self.pos += 1;
        if self.pos == self.table.len() {
            self.pos = 0;
        }
        v
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
