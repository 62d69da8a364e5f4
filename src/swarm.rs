//! Coupled Oscillator Banks
//!
//! Firefly: a bank of phase oscillators with table-driven pairwise coupling
//! and wavetable output. Warbler: a bank of weakly-coupled Van-der-Pol-style
//! limit-cycle oscillators with noise-driven detune drift. Both integrate
//! with plain Euler steps and rely on clamping for stability.

use crate::dsp::{self, FREQ_C4};
use crate::port::{
    ParamDef, ParamId, PolyModule, PolyValue, PortDef, PortId, PortSpec, PortValues, ProcessArgs,
    SignalKind,
};
use crate::rng::{NormalBuffer, Rng};
use std::f64::consts::{PI, TAU};

const WAVE_TABLES: usize = 11;
const WAVE_LEN: usize = 7200;
const CURVE_LEN: usize = 102;
const OSCILLATORS: usize = 5;

/// Harmonic degrees used to build the waveform tables (offset by one octave)
const GRADUS: [f64; 20] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 12.0, 14.0, 15.0, 16.0, 18.0, 20.0, 21.0,
    24.0, 25.0, 27.0,
];

/// Harmonic amplitude rows, one per waveform table, from pure sine to
/// increasingly dense spectra
const WAVE_AMPS: [[f64; 20]; WAVE_TABLES] = [
    [
        1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 0.0,
    ],
    [
        0.689, 0.228, 0.064, 0.015, 0.003, 0.001, 0.000, 0.000, 0.000, 0.000, 0.000, 0.000, 0.000,
        0.000, 0.000, 0.000, 0.000, 0.000, 0.000, 0.000,
    ],
    [
        0.358, 0.251, 0.164, 0.103, 0.061, 0.034, 0.017, 0.008, 0.003, 0.001, 0.000, 0.000, 0.000,
        0.000, 0.000, 0.000, 0.000, 0.000, 0.000, 0.000,
    ],
    [
        0.262, 0.213, 0.159, 0.117, 0.085, 0.061, 0.042, 0.027, 0.017, 0.009, 0.005, 0.002, 0.001,
        0.000, 0.000, 0.000, 0.000, 0.000, 0.000, 0.000,
    ],
    [
        0.211, 0.192, 0.151, 0.116, 0.092, 0.070, 0.053, 0.039, 0.029, 0.020, 0.013, 0.008, 0.004,
        0.002, 0.001, 0.000, 0.000, 0.000, 0.000, 0.000,
    ],
    [
        0.171, 0.178, 0.149, 0.114, 0.093, 0.076, 0.059, 0.046, 0.036, 0.027, 0.019, 0.014, 0.009,
        0.005, 0.003, 0.001, 0.000, 0.000, 0.000, 0.000,
    ],
    [
        0.136, 0.161, 0.153, 0.116, 0.091, 0.079, 0.065, 0.050, 0.040, 0.032, 0.024, 0.018, 0.013,
        0.009, 0.006, 0.003, 0.002, 0.001, 0.000, 0.000,
    ],
    [
        0.106, 0.137, 0.155, 0.126, 0.092, 0.079, 0.071, 0.056, 0.043, 0.035, 0.029, 0.022, 0.016,
        0.012, 0.009, 0.006, 0.003, 0.002, 0.001, 0.000,
    ],
    [
        0.084, 0.108, 0.147, 0.141, 0.100, 0.076, 0.072, 0.064, 0.049, 0.038, 0.032, 0.026, 0.020,
        0.015, 0.011, 0.008, 0.005, 0.003, 0.001, 0.000,
    ],
    [
        0.071, 0.079, 0.127, 0.150, 0.119, 0.079, 0.067, 0.068, 0.058, 0.042, 0.033, 0.028, 0.024,
        0.018, 0.013, 0.010, 0.007, 0.004, 0.002, 0.001,
    ],
    [
        0.067, 0.041, 0.069, 0.126, 0.152, 0.117, 0.070, 0.057, 0.063, 0.060, 0.045, 0.031, 0.026,
        0.024, 0.019, 0.014, 0.009, 0.007, 0.004, 0.002,
    ],
];

fn build_wavetables() -> Vec<Vec<f64>> {
    let mut waves = vec![vec![0.0; WAVE_LEN]; WAVE_TABLES];
    for (k, table) in waves.iter_mut().enumerate() {
        for (i, sample) in table.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, &degree) in GRADUS.iter().enumerate() {
                acc += (TAU * i as f64 * (degree + 1.0) / WAVE_LEN as f64 + j as f64 / 10.0).sin()
                    * WAVE_AMPS[k][j];
            }
            *sample = acc;
        }
    }
    waves
}

fn build_coupling_curves() -> [[f64; CURVE_LEN]; 2] {
    let mut curves = [[0.0; CURVE_LEN]; 2];
    for i in 0..CURVE_LEN {
        let arg = (i as f64 - 50.0) * PI / 50.0;
        curves[0][i] = arg.sin();
        curves[1][i] = (2.0 * arg).sin();
    }
    curves
}

/// Per-channel Firefly state: oscillator phases plus the control-rate-derived
/// wavetable selection.
#[derive(Debug, Clone, Copy)]
struct FireflyChannel {
    theta: [f64; OSCILLATORS],
    wind1: [usize; OSCILLATORS],
    wind2: [usize; OSCILLATORS],
    frac: [f64; OSCILLATORS],
}

impl Default for FireflyChannel {
    fn default() -> Self {
        Self {
            theta: [0.0; OSCILLATORS],
            wind1: [0; OSCILLATORS],
            wind2: [1; OSCILLATORS],
            frac: [0.0; OSCILLATORS],
        }
    }
}

/// Bank of five phase-coupled oscillators per channel.
///
/// Coupling between oscillator pairs is looked up from two precomputed
/// curves indexed by the wrapped phase difference and cross-blended by the
/// coupling-type control. Each oscillator's waveform is a continuous index
/// into eleven harmonic tables with linear crossfade between the neighboring
/// pair.
///
/// Expensive control work (channel count, wave-table selection, crossfade
/// fractions, charm weights) runs only every 121 samples; phase integration
/// and output run every sample.
pub struct Firefly {
    waves: Vec<Vec<f64>>,
    k_curves: [[f64; CURVE_LEN]; 2],
    chan: Vec<FireflyChannel>,
    charms: [f64; OSCILLATORS],
    ctl_count: u32,
    params: crate::port::Params,
    spec: PortSpec,
}

impl Firefly {
    pub const F1R_PARAM: ParamId = 0;
    pub const F2R_PARAM: ParamId = 1;
    pub const F3R_PARAM: ParamId = 2;
    pub const F4R_PARAM: ParamId = 3;
    pub const F5R_PARAM: ParamId = 4;
    pub const W1_PARAM: ParamId = 5;
    pub const W2_PARAM: ParamId = 6;
    pub const W3_PARAM: ParamId = 7;
    pub const W4_PARAM: ParamId = 8;
    pub const W5_PARAM: ParamId = 9;
    pub const CH1_PARAM: ParamId = 10;
    pub const CH2_PARAM: ParamId = 11;
    pub const CH3_PARAM: ParamId = 12;
    pub const CH4_PARAM: ParamId = 13;
    pub const CH5_PARAM: ParamId = 14;
    pub const K_PARAM: ParamId = 15;
    pub const KTYPE_PARAM: ParamId = 16;
    pub const FM_PARAM: ParamId = 17;
    pub const GAIN_PARAM: ParamId = 18;

    pub const F1R_INPUT: PortId = 0;
    pub const F2R_INPUT: PortId = 1;
    pub const F3R_INPUT: PortId = 2;
    pub const F4R_INPUT: PortId = 3;
    pub const F5R_INPUT: PortId = 4;
    pub const W1_INPUT: PortId = 5;
    pub const W2_INPUT: PortId = 6;
    pub const W3_INPUT: PortId = 7;
    pub const W4_INPUT: PortId = 8;
    pub const W5_INPUT: PortId = 9;
    pub const K_INPUT: PortId = 10;
    pub const KTYPE_INPUT: PortId = 11;
    pub const FM_INPUT: PortId = 12;
    pub const GAIN_INPUT: PortId = 13;
    pub const VOCT_INPUT: PortId = 14;

    pub const SM_OUTPUT: PortId = 20;

    /// Samples between control-rate updates, minus one
    const CONTROL_PERIOD: u32 = 120;

    /// Frequency-ratio quantization steps per unit
    const RATIO_STEPS: f64 = 720.0;

    pub fn new(_sample_rate: f64) -> Self {
        let freq_defaults = [1.0, 1.01, 0.99, 0.5, 3.0];
        let wave_defaults = [0.0, 0.0, 0.0, 1.0, 5.0];
        let charm_defaults = [1.25, 1.0, 1.0, 0.5, 0.25];

        let mut defs = Vec::new();
        let mut inputs = Vec::new();
        for i in 0..OSCILLATORS {
            defs.push(ParamDef::new(
                Self::F1R_PARAM + i as ParamId,
                0.0,
                10.0,
                freq_defaults[i],
                format!("Freq ratio {}", i + 1),
            ));
            inputs.push(PortDef::new(
                Self::F1R_INPUT + i as PortId,
                format!("fr{}", i + 1),
                SignalKind::CvBipolar,
            ));
        }
        for i in 0..OSCILLATORS {
            defs.push(ParamDef::new(
                Self::W1_PARAM + i as ParamId,
                0.0,
                10.0,
                wave_defaults[i],
                format!("Wave type {}", i + 1),
            ));
            inputs.push(PortDef::new(
                Self::W1_INPUT + i as PortId,
                format!("w{}", i + 1),
                SignalKind::CvBipolar,
            ));
        }
        for i in 0..OSCILLATORS {
            defs.push(ParamDef::new(
                Self::CH1_PARAM + i as ParamId,
                0.0,
                2.0,
                charm_defaults[i],
                format!("Charm {}", i + 1),
            ));
        }
        defs.push(ParamDef::new(Self::K_PARAM, -0.2, 0.2, 0.01, "Coupling strength"));
        defs.push(ParamDef::new(Self::KTYPE_PARAM, 0.0, 1.0, 0.0, "Coupling type"));
        defs.push(ParamDef::new(Self::FM_PARAM, 0.0, 1.0, 0.0, "FM index"));
        defs.push(ParamDef::new(Self::GAIN_PARAM, 0.0, 10.0, 1.0, "Gain"));

        inputs.push(PortDef::new(Self::K_INPUT, "k", SignalKind::CvBipolar));
        inputs.push(PortDef::new(Self::KTYPE_INPUT, "ktype", SignalKind::CvBipolar));
        inputs.push(PortDef::new(Self::FM_INPUT, "fm", SignalKind::CvBipolar));
        inputs.push(PortDef::new(Self::GAIN_INPUT, "gain", SignalKind::CvBipolar));
        inputs.push(PortDef::new(Self::VOCT_INPUT, "voct", SignalKind::VoltPerOctave));

        Self {
            waves: build_wavetables(),
            k_curves: build_coupling_curves(),
            chan: Vec::new(),
            charms: charm_defaults,
            // Forces a control update on the very first tick
            ctl_count: Self::CONTROL_PERIOD,
            params: crate::port::Params::new(defs),
            spec: PortSpec {
                inputs,
                outputs: vec![PortDef::new(Self::SM_OUTPUT, "sum", SignalKind::Audio)],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize_with(n, Default::default);
        }
    }

    /// Control-rate pass: wavetable indices, crossfade fractions, charms
    fn control_update(&mut self, inputs: &PortValues) {
        let channels = inputs.channels_max(&[
            Self::F1R_INPUT,
            Self::F2R_INPUT,
            Self::F3R_INPUT,
            Self::F4R_INPUT,
            Self::F5R_INPUT,
            Self::VOCT_INPUT,
            Self::W1_INPUT,
        ]);
        self.ensure_channels(channels);

        for i in 0..OSCILLATORS {
            self.charms[i] = self.params.get(Self::CH1_PARAM + i as ParamId);
        }

        for c in 0..channels {
            for i in 0..OSCILLATORS {
                let knob = self.params.get(Self::W1_PARAM + i as ParamId);
                let cv = inputs.voltage(Self::W1_INPUT + i as PortId, c);
                // Wave 5's CV scales its knob rather than offsetting it
                let w = if i == OSCILLATORS - 1 { knob * cv } else { knob + cv };

                let base = w.floor() as i64;
                let ch = &mut self.chan[c];
                ch.wind1[i] = base.clamp(0, WAVE_TABLES as i64 - 1) as usize;
                ch.wind2[i] = (base + 1).clamp(0, WAVE_TABLES as i64 - 1) as usize;
                ch.frac[i] = dsp::clamp(w - w.floor(), 0.0, 1.0);
            }
        }
    }
}

impl PolyModule for Firefly {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        self.ctl_count += 1;
        if self.ctl_count > Self::CONTROL_PERIOD {
            self.control_update(inputs);
            self.ctl_count = 0;
        }

        let channels = inputs.channels_max(&[Self::F1R_INPUT, Self::VOCT_INPUT]);
        self.ensure_channels(channels);

        let k_param = self.params.get(Self::K_PARAM);
        let ktype = self.params.get(Self::KTYPE_PARAM);
        let fm_param = self.params.get(Self::FM_PARAM);
        let gain_param = self.params.get(Self::GAIN_PARAM);
        let dt = args.sample_time;

        let mut out = PolyValue::with_channels(channels);
        for c in 0..channels {
            let voct = inputs.voltage(Self::VOCT_INPUT, c);
            let fm_index = fm_param * inputs.voltage(Self::FM_INPUT, c);
            let freq = FREQ_C4 * 2.0f64.powf(voct * (1.0 + fm_index)) * TAU;
            let k = k_param + inputs.voltage(Self::K_INPUT, c);
            let kt = dsp::clamp(ktype + inputs.voltage(Self::KTYPE_INPUT, c), 0.0, 1.0);
            let gain = gain_param + inputs.voltage(Self::GAIN_INPUT, c);

            let mut omega = [0.0; OSCILLATORS];
            for (i, w) in omega.iter_mut().enumerate() {
                let ratio = self.params.get(Self::F1R_PARAM + i as ParamId)
                    + inputs.voltage(Self::F1R_INPUT + i as PortId, c);
                let ratio = (Self::RATIO_STEPS * ratio).round() / Self::RATIO_STEPS;
                *w = ratio * freq;
            }

            let charms = self.charms;
            let ch = &mut self.chan[c];
            let mut sum = 0.0;
            for i in 0..OSCILLATORS {
                let mut slope = omega[i];
                for j in 0..OSCILLATORS {
                    if i != j {
                        let idx = ((50.0 + 50.0 * ((ch.theta[j] - ch.theta[i]) / TAU)) as usize)
                            .min(CURVE_LEN - 1);
                        let coupling =
                            self.k_curves[0][idx] * kt + self.k_curves[1][idx] * (1.0 - kt);
                        slope += charms[j] * omega[i] * k * coupling;
                    }
                }
                ch.theta[i] += slope * dt;
                ch.theta[i] -= (ch.theta[i] / TAU).floor() * TAU;

                let windex =
                    ((WAVE_LEN as f64 * ch.theta[i] / TAU).floor() as usize).min(WAVE_LEN - 1);
                sum += self.waves[ch.wind1[i]][windex] * (1.0 - ch.frac[i]) * charms[i];
                sum += self.waves[ch.wind2[i]][windex] * ch.frac[i] * charms[i];
            }

            out.set_voltage(c, dsp::clamp(sum * gain, -5.0, 5.0));
        }
        outputs.set(Self::SM_OUTPUT, out);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = FireflyChannel::default();
        }
        self.ctl_count = Self::CONTROL_PERIOD;
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn params(&self) -> &[ParamDef] {
        self.params.defs()
    }

    fn get_param(&self, id: ParamId) -> f64 {
        self.params.get(id)
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        self.params.set(id, value);
    }

    fn type_id(&self) -> &'static str {
        "firefly"
    }
}

const PARTIALS: usize = 8;
const HARMONIC_ROWS: usize = 22;

/// Per-partial base detune offsets, deliberately asymmetric around zero
const DETS: [f64; PARTIALS] = [
    -0.000929, -0.000377, -0.000076, 0.0, 0.000081, 0.000108, 0.000153, 0.000487,
];

/// Harmonic ratio rows indexed by the harmonics control: from deep
/// subharmonics up through an overtone ladder
const MULTS: [[f64; PARTIALS]; HARMONIC_ROWS] = [
    [0.03125, 0.0625, 0.125, 0.25, 0.5, 0.5, 1.0, 1.0],
    [0.0625, 0.125, 0.25, 0.25, 0.5, 0.5, 1.0, 1.0],
    [0.125, 0.25, 0.25, 0.5, 0.5, 0.5, 1.0, 1.0],
    [0.125, 0.25, 0.25, 0.5, 0.5, 1.0, 1.0, 1.0],
    [0.25, 0.25, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0],
    [0.25, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 2.0],
    [0.25, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 2.0],
    [0.25, 0.5, 0.5, 1.0, 1.0, 1.0, 2.0, 2.0],
    [0.25, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0],
    [0.50, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0],
    [1.00, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.00, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0],
    [0.50, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0],
    [0.50, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
    [0.50, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0],
    [0.50, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0],
    [1.00, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 4.0],
    [1.00, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 5.0],
    [1.00, 1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    [1.00, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
    [1.00, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 7.0],
    [1.00, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
];

#[derive(Debug, Clone, Copy, Default)]
struct Partial {
    x: f64,
    y: f64,
    det: f64,
}

#[derive(Debug, Clone, Copy)]
struct WarblerChannel {
    osc: [Partial; PARTIALS],
}

impl Default for WarblerChannel {
    fn default() -> Self {
        // The first partial starts on the limit cycle, so the bank speaks
        // even with the stochasticity knob at zero; the rest sit at the
        // origin until noise kicks them
        let mut osc = [Partial::default(); PARTIALS];
        osc[0].y = 1.0;
        Self { osc }
    }
}

/// Bank of eight weakly-coupled 2D limit-cycle oscillators per channel.
///
/// Each partial runs a Van-der-Pol-style system pulled toward the unit
/// circle, with the external input and a noise term forcing the x equation
/// and a slowly relaxing detune state fed by the oscillator's own y value.
/// Noise comes from a precomputed ring of normal deviates cycled with
/// wraparound instead of a fresh draw per partial per sample; the ring is
/// long enough (and prime) that the reuse period is inaudible.
pub struct Warbler {
    chan: Vec<WarblerChannel>,
    sqrt_delta: f64,
    noise_buf: NormalBuffer,
    params: crate::port::Params,
    spec: PortSpec,
}

impl Warbler {
    pub const NOISE_PARAM: ParamId = 0;
    pub const DETUNE_PARAM: ParamId = 1;
    pub const GAIN_PARAM: ParamId = 2;
    pub const HARMN_PARAM: ParamId = 3;
    pub const RGAIN_PARAM: ParamId = 4;

    pub const NOISE_INPUT: PortId = 0;
    pub const DETUNE_INPUT: PortId = 1;
    pub const GAIN_INPUT: PortId = 2;
    pub const HARMN_INPUT: PortId = 3;
    pub const PITCH_INPUT: PortId = 4;
    pub const EXT_INPUT: PortId = 5;

    pub const X_OUTPUT: PortId = 10;
    pub const Y_OUTPUT: PortId = 11;

    const STATE_BOUND: f64 = 1.25;

    pub fn new(sample_rate: f64) -> Self {
        Self::with_seed(sample_rate, Rng::from_system_time().next_u64())
    }

    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        Self {
            chan: Vec::new(),
            sqrt_delta: 1.0 / sample_rate.sqrt(),
            noise_buf: NormalBuffer::new(seed),
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::NOISE_PARAM, 0.0, 1.0, 0.01, "Stochasticity"),
                ParamDef::new(Self::DETUNE_PARAM, 0.0, 1000.0, 0.1, "Variation/detune amount"),
                ParamDef::new(Self::GAIN_PARAM, 0.0, 10.0, 1.0, "Input influence"),
                ParamDef::new(Self::HARMN_PARAM, 0.0, 20.0, 10.0, "(Sub)harmonics"),
                ParamDef::new(Self::RGAIN_PARAM, 0.0, 2.0, 0.1, "Random influence attenuation"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::NOISE_INPUT, "noise", SignalKind::CvBipolar),
                    PortDef::new(Self::DETUNE_INPUT, "detune", SignalKind::CvBipolar),
                    PortDef::new(Self::GAIN_INPUT, "gain", SignalKind::CvBipolar),
                    PortDef::new(Self::HARMN_INPUT, "harmn", SignalKind::CvBipolar),
                    PortDef::new(Self::PITCH_INPUT, "pitch", SignalKind::VoltPerOctave),
                    PortDef::new(Self::EXT_INPUT, "ext", SignalKind::Audio),
                ],
                outputs: vec![
                    PortDef::new(Self::X_OUTPUT, "x", SignalKind::Audio),
                    PortDef::new(Self::Y_OUTPUT, "y", SignalKind::Audio),
                ],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize_with(n, Default::default);
        }
    }
}

impl PolyModule for Warbler {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[
            Self::NOISE_INPUT,
            Self::DETUNE_INPUT,
            Self::EXT_INPUT,
            Self::PITCH_INPUT,
        ]);
        self.ensure_channels(channels);

        let dt = args.sample_time;
        let mut out_x = PolyValue::with_channels(channels);
        let mut out_y = PolyValue::with_channels(channels);

        for c in 0..channels {
            let noise = self.params.get(Self::NOISE_PARAM)
                + self.params.get(Self::RGAIN_PARAM) * inputs.voltage(Self::NOISE_INPUT, c);
            let detune = self.params.get(Self::DETUNE_PARAM) + inputs.voltage(Self::DETUNE_INPUT, c);
            let mut pitch = inputs.voltage(Self::PITCH_INPUT, c);
            let ext = inputs.voltage(Self::EXT_INPUT, c) / 40.0;
            let ingain = self.params.get(Self::GAIN_PARAM) + inputs.voltage(Self::GAIN_INPUT, c);
            let hp = ((self.params.get(Self::HARMN_PARAM) + inputs.voltage(Self::HARMN_INPUT, c))
                .round() as i64)
                .clamp(0, 20) as usize;

            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for ri in 0..PARTIALS {
                let rf = MULTS[hp][ri];
                let p = &mut self.chan[c].osc[ri];
                // Detune compounds across the partial loop, as a slowly
                // drifting stretch of the whole bank
                pitch = dsp::clamp(pitch, -4.0, 4.0) * (1.0 + p.det);
                let freq = FREQ_C4 * 2.0f64.powf(pitch);
                let kf = freq * TAU;
                let rad2 = p.x * p.x + p.y * p.y;
                let r = self.noise_buf.next() * noise * self.sqrt_delta;

                let xd_new = rf * kf * (-p.y + 2.0 * p.x * (1.0 - rad2) + ingain * ext + r) * dt;
                p.y += rf * kf * (p.x + 2.0 * p.y * (1.0 - rad2)) * dt;
                p.x += xd_new;
                p.det += (p.y * DETS[ri] * detune - p.det) * dt;

                p.x = dsp::clamp(p.x, -Self::STATE_BOUND, Self::STATE_BOUND);
                p.y = dsp::clamp(p.y, -Self::STATE_BOUND, Self::STATE_BOUND);

                sum_x += p.x;
                sum_y += p.y;
            }

            out_x.set_voltage(c, dsp::clamp(sum_x / 2.0, -5.0, 5.0));
            out_y.set_voltage(c, dsp::clamp(sum_y / 2.0, -5.0, 5.0));
        }
        outputs.set(Self::X_OUTPUT, out_x);
        outputs.set(Self::Y_OUTPUT, out_y);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = WarblerChannel::default();
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sqrt_delta = 1.0 / sample_rate.sqrt();
    }

    fn params(&self) -> &[ParamDef] {
        self.params.defs()
    }

    fn get_param(&self, id: ParamId) -> f64 {
        self.params.get(id)
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        self.params.set(id, value);
    }

    fn type_id(&self) -> &'static str {
        "warbler"
    }
}
