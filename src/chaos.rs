//! Chaotic Attractor Engines
//!
//! Fixed-step explicit ODE integrators over small nonlinear state vectors:
//! the Rossler attractor driven at audio pitch, and a Rossler-like forced
//! filter bank stepped with RK4 and soft-saturated.

use crate::dsp::{self, quadratic_bipolar, step_rk4, tanh_pade, FREQ_C4};
use crate::port::{
    ParamDef, ParamId, PolyModule, PolyValue, PortDef, PortId, PortSpec, PortValues, ProcessArgs,
    SignalKind,
};
use serde_json::json;
use std::f64::consts::TAU;

/// Processing mode of [`RosslerRustler`], persisted in patch state.
///
/// `Legacy` reproduces an earlier update rule where both slope evaluations
/// aliased the same scratch array, so the second slope was counted twice.
/// Patches made with that behavior depend on its sound, so it stays
/// selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcMode {
    /// Averaged two-slope update
    #[default]
    Updated,
    /// Double-counted second slope
    Legacy,
}

impl ProcMode {
    fn to_flag(self) -> i64 {
        match self {
            ProcMode::Updated => 1,
            ProcMode::Legacy => 0,
        }
    }

    fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            ProcMode::Legacy
        } else {
            ProcMode::Updated
        }
    }
}

/// Classic Rossler attractor as an audio-rate chaotic oscillator.
///
/// The V/Oct pitch input rescales the integration step, so pitch controls the
/// oscillation rate of the attractor. Two-slope midpoint-style update; state
/// clamped to ±20 per component.
pub struct RosslerRustler {
    chan: Vec<[f64; 3]>,
    proc_mode: ProcMode,
    params: crate::port::Params,
    spec: PortSpec,
}

impl RosslerRustler {
    pub const A_PARAM: ParamId = 0;
    pub const B_PARAM: ParamId = 1;
    pub const C_PARAM: ParamId = 2;
    pub const EXT_GAIN_PARAM: ParamId = 3;
    pub const EXT_MIX_PARAM: ParamId = 4;

    pub const PITCH_INPUT: PortId = 0;
    pub const EXT_INPUT: PortId = 1;

    pub const X_OUTPUT: PortId = 10;

    const STATE_BOUND: f64 = 20.0;

    pub fn new(_sample_rate: f64) -> Self {
        Self {
            chan: Vec::new(),
            proc_mode: ProcMode::default(),
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::A_PARAM, 0.0, 1.0, 0.2, "A dynamical parameter"),
                ParamDef::new(Self::B_PARAM, 0.0, 1.0, 0.2, "B dynamical parameter"),
                ParamDef::new(Self::C_PARAM, 0.0, 30.0, 5.7, "C dynamical parameter"),
                ParamDef::new(Self::EXT_GAIN_PARAM, 0.0, 10.0, 1.0, "External gain"),
                ParamDef::new(Self::EXT_MIX_PARAM, 0.0, 1.0, 0.5, "Internal/external mix"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::PITCH_INPUT, "pitch", SignalKind::VoltPerOctave),
                    PortDef::new(Self::EXT_INPUT, "ext", SignalKind::Audio),
                ],
                outputs: vec![PortDef::new(Self::X_OUTPUT, "x", SignalKind::Audio)],
            },
        }
    }

    pub fn proc_mode(&self) -> ProcMode {
        self.proc_mode
    }

    pub fn set_proc_mode(&mut self, mode: ProcMode) {
        self.proc_mode = mode;
    }

    fn slope(s: &[f64; 3], a: f64, b: f64, c: f64, pert: f64) -> [f64; 3] {
        [-s[1] - s[2], s[0] + a * s[1] + pert, b + s[2] * (s[0] - c)]
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize(n, [0.0, 5.0, 0.0]);
        }
    }
}

impl PolyModule for RosslerRustler {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[Self::PITCH_INPUT]);
        self.ensure_channels(channels);

        let a = self.params.get(Self::A_PARAM);
        let b = self.params.get(Self::B_PARAM);
        let c_param = self.params.get(Self::C_PARAM);
        let gain = self.params.get(Self::EXT_GAIN_PARAM);
        let mix = self.params.get(Self::EXT_MIX_PARAM);

        let mut out = PolyValue::with_channels(channels);
        for c in 0..channels {
            let pitch = inputs.voltage(Self::PITCH_INPUT, c);
            let rate = FREQ_C4 * 2.0f64.powf(pitch) * TAU;
            let dt = args.sample_time * rate / 2.0;
            let ext = inputs.voltage(Self::EXT_INPUT, c);
            let pert = ext * gain;

            let s = &mut self.chan[c];
            let k1 = Self::slope(s, a, b, c_param, pert);
            let trial = [s[0] + k1[0] * dt, s[1] + k1[1] * dt, s[2] + k1[2] * dt];
            let k2 = Self::slope(&trial, a, b, c_param, pert);
            match self.proc_mode {
                ProcMode::Updated => {
                    for i in 0..3 {
                        s[i] += (k1[i] + k2[i]) * dt;
                    }
                }
                ProcMode::Legacy => {
                    for i in 0..3 {
                        s[i] += (k2[i] + k2[i]) * dt;
                    }
                }
            }
            for v in s.iter_mut() {
                *v = dsp::clamp(*v, -Self::STATE_BOUND, Self::STATE_BOUND);
            }

            out.set_voltage(c, s[0] / 3.0 * (1.0 - mix) + mix * ext);
        }
        outputs.set(Self::X_OUTPUT, out);
    }

    fn reset(&mut self) {
        for s in &mut self.chan {
            *s = [0.0, 5.0, 0.0];
        }
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
        "rossler_rustler"
    }

    fn serialize_state(&self) -> Option<serde_json::Value> {
        Some(json!({ "procmode": self.proc_mode.to_flag() }))
    }

    fn deserialize_state(&mut self, state: &serde_json::Value) {
        // Missing or mistyped field keeps the updated behavior
        if let Some(flag) = state.get("procmode").and_then(|v| v.as_i64()) {
            self.proc_mode = ProcMode::from_flag(flag);
        }
    }
}

/// Rossler-like forced filter bank stepped with 4th-order Runge-Kutta.
///
/// One state variable receives the audio input as direct forcing (the drive
/// term); the Fs parameter scales the system's time constant. Every state
/// passes through a rational tanh approximation after each step, which is the
/// only thing keeping the forced system bounded.
pub struct Dynamo {
    chan: Vec<[f64; 3]>,
    params: crate::port::Params,
    spec: PortSpec,
}

impl Dynamo {
    pub const FREQ_PARAM: ParamId = 0;
    pub const FS_PARAM: ParamId = 1;
    pub const RES_PARAM: ParamId = 2;
    pub const FREQ_CV_PARAM: ParamId = 3;
    pub const DRIVE_PARAM: ParamId = 4;

    pub const FREQ_INPUT: PortId = 0;
    pub const RES_INPUT: PortId = 1;
    pub const DRIVE_INPUT: PortId = 2;
    pub const IN_INPUT: PortId = 3;

    pub const X_OUTPUT: PortId = 10;
    pub const Z_OUTPUT: PortId = 11;

    pub fn new(_sample_rate: f64) -> Self {
        Self {
            chan: Vec::new(),
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::FREQ_PARAM, 0.0, 1.0, 0.5, "Frequency"),
                ParamDef::new(Self::FS_PARAM, 0.0, 1.0, 0.5, "Fs"),
                ParamDef::new(Self::RES_PARAM, 0.0, 1.0, 0.0, "Resonance"),
                ParamDef::new(Self::FREQ_CV_PARAM, -1.0, 1.0, 0.0, "Frequency modulation"),
                ParamDef::new(Self::DRIVE_PARAM, 0.0, 1.0, 0.0, "Drive"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::FREQ_INPUT, "freq", SignalKind::VoltPerOctave),
                    PortDef::new(Self::RES_INPUT, "res", SignalKind::CvUnipolar),
                    PortDef::new(Self::DRIVE_INPUT, "drive", SignalKind::CvUnipolar),
                    PortDef::new(Self::IN_INPUT, "in", SignalKind::Audio),
                ],
                outputs: vec![
                    PortDef::new(Self::X_OUTPUT, "x", SignalKind::Audio),
                    PortDef::new(Self::Z_OUTPUT, "z", SignalKind::Audio),
                ],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize(n, [0.5; 3]);
        }
    }
}

impl PolyModule for Dynamo {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[Self::IN_INPUT]);
        self.ensure_channels(channels);

        let drive = self.params.get(Self::DRIVE_PARAM);
        let fs_knob = self.params.get(Self::FS_PARAM);
        let fs_curve = quadratic_bipolar(fs_knob * 2.0 - 1.0) * 7.0 / 12.0;
        let fs = 1.0 + fs_curve * 800.0;
        let gain = drive * 1000.0;

        let mut out_x = PolyValue::with_channels(channels);
        let mut out_z = PolyValue::with_channels(channels);
        for c in 0..channels {
            let input = inputs.voltage(Self::IN_INPUT, c) / 5.0;

            let s = &mut self.chan[c];
            step_rk4(0.0, args.sample_time, s, |_t, x, dxdt| {
                dxdt[0] = fs * (x[1] - (x[0] * x[0] + x[1] * x[1]));
                dxdt[1] = fs * (-x[0]);
                dxdt[2] = input * gain;
            });
            for v in s.iter_mut() {
                *v = tanh_pade(*v);
            }

            out_x.set_voltage(c, 5.0 * s[0]);
            out_z.set_voltage(c, 5.0 * s[2]);
        }
        outputs.set(Self::X_OUTPUT, out_x);
        outputs.set(Self::Z_OUTPUT, out_z);
    }

    fn reset(&mut self) {
        for s in &mut self.chan {
            *s = [0.5; 3];
        }
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
        "dynamo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ProcessArgs {
        ProcessArgs::new(44100.0)
    }

    #[test]
    fn test_rossler_output_bounded_pre_mix() {
        let mut rossler = RosslerRustler::new(44100.0);
        rossler.set_param(RosslerRustler::EXT_MIX_PARAM, 0.0);
        let inputs = PortValues::new();
        let mut outputs = PortValues::new();

        for _ in 0..50000 {
            rossler.tick(&args(), &inputs, &mut outputs);
            let v = outputs.voltage(RosslerRustler::X_OUTPUT, 0);
            assert!(
                v.abs() <= 20.0 / 3.0 + 1e-9,
                "x output escaped clamp bound: {}",
                v
            );
        }
    }

    #[test]
    fn test_rossler_modes_diverge() {
        let mut updated = RosslerRustler::new(44100.0);
        let mut legacy = RosslerRustler::new(44100.0);
        legacy.set_proc_mode(ProcMode::Legacy);
        let inputs = PortValues::new();
        let mut out_a = PortValues::new();
        let mut out_b = PortValues::new();

        let mut diverged = false;
        for _ in 0..1000 {
            updated.tick(&args(), &inputs, &mut out_a);
            legacy.tick(&args(), &inputs, &mut out_b);
            if out_a.voltage(RosslerRustler::X_OUTPUT, 0)
                != out_b.voltage(RosslerRustler::X_OUTPUT, 0)
            {
                diverged = true;
                break;
            }
        }
        assert!(diverged, "legacy and updated modes produced identical paths");
    }

    #[test]
    fn test_rossler_procmode_round_trip() {
        let mut rossler = RosslerRustler::new(44100.0);
        rossler.set_proc_mode(ProcMode::Legacy);
        let state = rossler.serialize_state().unwrap();
        assert_eq!(state["procmode"], 0);

        let mut restored = RosslerRustler::new(44100.0);
        assert_eq!(restored.proc_mode(), ProcMode::Updated);
        restored.deserialize_state(&state);
        assert_eq!(restored.proc_mode(), ProcMode::Legacy);
    }

    #[test]
    fn test_rossler_malformed_state_defaults() {
        let mut rossler = RosslerRustler::new(44100.0);
        rossler.deserialize_state(&serde_json::json!({}));
        assert_eq!(rossler.proc_mode(), ProcMode::Updated);
        rossler.deserialize_state(&serde_json::json!({ "procmode": "bogus" }));
        assert_eq!(rossler.proc_mode(), ProcMode::Updated);
    }

    #[test]
    fn test_rossler_polyphony_follows_pitch_input() {
        let mut rossler = RosslerRustler::new(44100.0);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();
        inputs.set(RosslerRustler::PITCH_INPUT, PolyValue::with_channels(6));

        rossler.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.poly(RosslerRustler::X_OUTPUT).channels(), 6);
    }

    #[test]
    fn test_dynamo_outputs_bounded_under_hard_drive() {
        let mut dynamo = Dynamo::new(44100.0);
        dynamo.set_param(Dynamo::DRIVE_PARAM, 1.0);
        dynamo.set_param(Dynamo::FS_PARAM, 1.0);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();
        inputs.set_mono(Dynamo::IN_INPUT, 5.0);

        for _ in 0..20000 {
            dynamo.tick(&args(), &inputs, &mut outputs);
            let x = outputs.voltage(Dynamo::X_OUTPUT, 0);
            let z = outputs.voltage(Dynamo::Z_OUTPUT, 0);
            assert!(x.abs() <= 5.0 + 1e-9, "x escaped saturation: {}", x);
            assert!(z.abs() <= 5.0 + 1e-9, "z escaped saturation: {}", z);
        }
    }

    #[test]
    fn test_dynamo_reset_restores_initial_state() {
        let mut dynamo = Dynamo::new(44100.0);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();
        inputs.set_mono(Dynamo::IN_INPUT, 3.0);
        dynamo.set_param(Dynamo::DRIVE_PARAM, 0.5);

        for _ in 0..100 {
            dynamo.tick(&args(), &inputs, &mut outputs);
        }
        dynamo.reset();

        let mut fresh = Dynamo::new(44100.0);
        fresh.set_param(Dynamo::DRIVE_PARAM, 0.5);
        let mut fresh_out = PortValues::new();
        dynamo.tick(&args(), &inputs, &mut outputs);
        fresh.tick(&args(), &inputs, &mut fresh_out);
        assert_eq!(
            outputs.voltage(Dynamo::X_OUTPUT, 0),
            fresh_out.voltage(Dynamo::X_OUTPUT, 0)
        );
    }
}
