//! Shared DSP Helpers
//!
//! Edge detection, fixed-step integrators, and the small nonlinear shaping
//! functions the generator modules have in common.

/// Frequency of middle C (C4), the 0V reference for V/Oct pitch inputs
pub const FREQ_C4: f64 = 261.6256;

/// Rising-edge detector with hysteresis.
///
/// Fires at most once per crossing: the input must fall below the low
/// threshold before another rising edge can fire. State persists between
/// samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchmittTrigger {
    high: bool,
}

impl SchmittTrigger {
    const LOW_THRESHOLD: f64 = 0.1;
    const HIGH_THRESHOLD: f64 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample; returns true on a rising edge
    pub fn process(&mut self, v: f64) -> bool {
        if self.high {
            if v <= Self::LOW_THRESHOLD {
                self.high = false;
            }
            false
        } else if v >= Self::HIGH_THRESHOLD {
            self.high = true;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.high = false;
    }
}

/// One step of classical 4th-order Runge-Kutta over a fixed-size state.
///
/// The slope function receives time and state and writes derivatives into the
/// output array; slopes are kept in per-call locals rather than reused scratch
/// storage, so the four evaluations can never alias each other.
pub fn step_rk4<const N: usize>(
    t: f64,
    dt: f64,
    x: &mut [f64; N],
    mut f: impl FnMut(f64, &[f64; N], &mut [f64; N]),
) {
    let mut k1 = [0.0; N];
    let mut k2 = [0.0; N];
    let mut k3 = [0.0; N];
    let mut k4 = [0.0; N];
    let mut trial = [0.0; N];

    f(t, x, &mut k1);

    for i in 0..N {
        trial[i] = x[i] + k1[i] * dt / 2.0;
    }
    f(t + dt / 2.0, &trial, &mut k2);

    for i in 0..N {
        trial[i] = x[i] + k2[i] * dt / 2.0;
    }
    f(t + dt / 2.0, &trial, &mut k3);

    for i in 0..N {
        trial[i] = x[i] + k3[i] * dt;
    }
    f(t + dt, &trial, &mut k4);

    for i in 0..N {
        x[i] += dt * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]) / 6.0;
    }
}

/// Order-tolerant clamp matching host math conventions: evaluated as
/// `max(min(x, hi), lo)`, so `lo` wins when CV modulation pushes the bounds
/// past each other. Never panics.
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.min(hi).max(lo)
}

/// Padé approximant of tanh with a pre-clamp to ±3, where the approximation
/// saturates at exactly ±1. Cheap soft limiter for chaotic state variables.
pub fn tanh_pade(x: f64) -> f64 {
    let x = x.clamp(-3.0, 3.0);
    x * (27.0 + x * x) / (27.0 + 9.0 * x * x)
}

/// Sign-preserving square response for bipolar knobs
pub fn quadratic_bipolar(x: f64) -> f64 {
    if x >= 0.0 {
        x * x
    } else {
        -(x * x)
    }
}
