//! Signal Conventions and Port System
//!
//! This module defines the signal types, polyphonic port values, parameter
//! handling, and the type-erased module interface the host drives once per
//! audio sample.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a port within a module
pub type PortId = u32;

/// Unique identifier for a parameter within a module
pub type ParamId = u32;

/// Maximum number of polyphonic channels a cable can carry
pub const MAX_CHANNELS: usize = 16;

/// Semantic signal classification following hardware modular conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Audio signal, AC-coupled, typically ±5V peak
    Audio,

    /// Bipolar control voltage, ±5V (LFO, modulation)
    CvBipolar,

    /// Unipolar control voltage, 0–10V (envelope, expression)
    CvUnipolar,

    /// Pitch CV following 1V/octave standard
    /// Reference: 0V = C4 (middle C, 261.63 Hz)
    VoltPerOctave,

    /// Trigger signal, short pulse at +5V for instantaneous events
    Trigger,
}

impl SignalKind {
    /// Returns the typical voltage range (min, max) for this signal type
    pub fn voltage_range(&self) -> (f64, f64) {
        match self {
            SignalKind::Audio => (-5.0, 5.0),
            SignalKind::CvBipolar => (-5.0, 5.0),
            SignalKind::CvUnipolar => (0.0, 10.0),
            SignalKind::VoltPerOctave => (-5.0, 5.0),
            SignalKind::Trigger => (0.0, 5.0),
        }
    }

    /// Threshold voltage for edge detection
    pub fn trigger_threshold(&self) -> Option<f64> {
        match self {
            SignalKind::Trigger => Some(1.0),
            _ => None,
        }
    }
}

/// A polyphonic voltage carried by one cable: up to [`MAX_CHANNELS`] channels.
///
/// A disconnected port is represented by `channels == 0`; it reads 0V on every
/// channel, which is the host convention for unpatched inputs.
#[derive(Debug, Clone, Copy)]
pub struct PolyValue {
    voltages: [f64; MAX_CHANNELS],
    channels: usize,
}

impl PolyValue {
    /// A disconnected (0-channel) value
    pub fn disconnected() -> Self {
        Self {
            voltages: [0.0; MAX_CHANNELS],
            channels: 0,
        }
    }

    /// A monophonic value carrying one channel
    pub fn mono(v: f64) -> Self {
        let mut pv = Self::disconnected();
        pv.channels = 1;
        pv.voltages[0] = v;
        pv
    }

    /// A connected value with `channels` channels, all 0V
    pub fn with_channels(channels: usize) -> Self {
        let mut pv = Self::disconnected();
        pv.channels = channels.min(MAX_CHANNELS);
        pv
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_connected(&self) -> bool {
        self.channels > 0
    }

    /// Voltage of channel `c`; 0V beyond the carried channel count
    pub fn voltage(&self, c: usize) -> f64 {
        if c < MAX_CHANNELS {
            self.voltages[c]
        } else {
            0.0
        }
    }

    /// Sum of all carried channels (used by mono trigger inputs)
    pub fn voltage_sum(&self) -> f64 {
        self.voltages[..self.channels].iter().sum()
    }

    pub fn set_voltage(&mut self, c: usize, v: f64) {
        if c < MAX_CHANNELS {
            self.voltages[c] = v;
        }
    }

    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.min(MAX_CHANNELS);
    }
}

impl Default for PolyValue {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Definition of a single port (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    /// Unique identifier within the module
    pub id: PortId,

    /// Human-readable name (e.g., "noise", "trig", "out")
    pub name: String,

    /// Signal type for validation and UI hints
    pub kind: SignalKind,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

/// Specification of all ports for a module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
}

impl PortSpec {
    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Runtime container of polyphonic port values for one sample
#[derive(Debug, Clone, Default)]
pub struct PortValues {
    values: HashMap<PortId, PolyValue>,
}

impl PortValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at a port; disconnected if nothing was patched
    pub fn poly(&self, id: PortId) -> PolyValue {
        self.values.get(&id).copied().unwrap_or_default()
    }

    /// Voltage of one channel at a port (0V when disconnected)
    pub fn voltage(&self, id: PortId, c: usize) -> f64 {
        self.poly(id).voltage(c)
    }

    pub fn set(&mut self, id: PortId, value: PolyValue) {
        self.values.insert(id, value);
    }

    /// Convenience for monophonic values
    pub fn set_mono(&mut self, id: PortId, v: f64) {
        self.values.insert(id, PolyValue::mono(v));
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// The shared polyphony rule: a module runs as many channels as the widest
    /// cable among the given inputs, and at least one.
    pub fn channels_max(&self, ids: &[PortId]) -> usize {
        ids.iter()
            .map(|id| self.poly(*id).channels())
            .max()
            .unwrap_or(0)
            .max(1)
    }
}

/// Parameter definition: a bounded knob scalar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamDef {
    pub fn new(id: ParamId, min: f64, max: f64, default: f64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
        }
    }
}

/// Parameter storage shared by all modules: values are always clamped into
/// their declared bounds, so a module can trust what it reads back.
#[derive(Debug, Clone)]
pub struct Params {
    defs: Vec<ParamDef>,
    values: Vec<f64>,
}

impl Params {
    pub fn new(defs: Vec<ParamDef>) -> Self {
        let values = defs.iter().map(|d| d.default).collect();
        Self { defs, values }
    }

    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    pub fn get(&self, id: ParamId) -> f64 {
        self.defs
            .iter()
            .position(|d| d.id == id)
            .map(|i| self.values[i])
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, id: ParamId, value: f64) {
        if let Some(i) = self.defs.iter().position(|d| d.id == id) {
            self.values[i] = value.clamp(self.defs[i].min, self.defs[i].max);
        }
    }

    pub fn reset(&mut self) {
        for (v, d) in self.values.iter_mut().zip(&self.defs) {
            *v = d.default;
        }
    }
}

/// Per-sample timing supplied by the host
#[derive(Debug, Clone, Copy)]
pub struct ProcessArgs {
    pub sample_rate: f64,
    pub sample_time: f64,
}

impl ProcessArgs {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            sample_time: 1.0 / sample_rate,
        }
    }
}

/// Type-erased polyphonic module interface driven by the host
pub trait PolyModule: Send {
    /// Returns the module's port specification
    fn port_spec(&self) -> &PortSpec;

    /// Process one sample given port values; the module writes its outputs
    /// including their channel counts
    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues);

    /// Reset internal state to construction values
    fn reset(&mut self);

    /// Sample-rate-change notification; rate-derived constants are recomputed
    /// here, not lazily during `tick`
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Get parameter definitions for host binding
    fn params(&self) -> &[ParamDef];

    /// Get a parameter value
    fn get_param(&self, id: ParamId) -> f64;

    /// Set a parameter value (clamped into its declared bounds)
    fn set_param(&mut self, id: ParamId, value: f64);

    /// Module type identifier for serialization
    fn type_id(&self) -> &'static str;

    /// Serialize module-specific state as a key-value record
    fn serialize_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore module-specific state; missing or malformed fields degrade
    /// silently to defaults
    fn deserialize_state(&mut self, _state: &serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_kind_ranges() {
        assert_eq!(SignalKind::Audio.voltage_range(), (-5.0, 5.0));
        assert_eq!(SignalKind::CvUnipolar.voltage_range(), (0.0, 10.0));
        assert_eq!(SignalKind::Trigger.voltage_range(), (0.0, 5.0));
    }

    #[test]
    fn test_disconnected_reads_zero() {
        let pv = PolyValue::disconnected();
        assert_eq!(pv.channels(), 0);
        assert!(!pv.is_connected());
        for c in 0..MAX_CHANNELS {
            assert_eq!(pv.voltage(c), 0.0);
        }
    }

    #[test]
    fn test_poly_value_channels() {
        let mut pv = PolyValue::with_channels(4);
        pv.set_voltage(2, 3.5);
        assert_eq!(pv.channels(), 4);
        assert_eq!(pv.voltage(2), 3.5);
        assert_eq!(pv.voltage(17), 0.0);

        pv.set_channels(40);
        assert_eq!(pv.channels(), MAX_CHANNELS);
    }

    #[test]
    fn test_voltage_sum() {
        let mut pv = PolyValue::with_channels(3);
        pv.set_voltage(0, 1.0);
        pv.set_voltage(1, 2.0);
        pv.set_voltage(2, 3.0);
        assert!((pv.voltage_sum() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_channels_max_rule() {
        let mut values = PortValues::new();
        assert_eq!(values.channels_max(&[0, 1, 2]), 1);

        values.set(0, PolyValue::with_channels(3));
        values.set(2, PolyValue::with_channels(7));
        assert_eq!(values.channels_max(&[0, 1, 2]), 7);
        assert_eq!(values.channels_max(&[0]), 3);
    }

    #[test]
    fn test_params_clamp() {
        let mut params = Params::new(vec![ParamDef::new(0, 0.0, 5.0, 2.0, "noise")]);
        assert_eq!(params.get(0), 2.0);

        params.set(0, 7.5);
        assert_eq!(params.get(0), 5.0);
        params.set(0, -1.0);
        assert_eq!(params.get(0), 0.0);

        params.reset();
        assert_eq!(params.get(0), 2.0);
    }

    #[test]
    fn test_port_spec_lookup() {
        let spec = PortSpec {
            inputs: vec![PortDef::new(0, "trig", SignalKind::Trigger)],
            outputs: vec![PortDef::new(10, "out", SignalKind::CvBipolar)],
        };
        assert!(spec.input_by_name("trig").is_some());
        assert!(spec.input_by_name("missing").is_none());
        assert!(spec.output_by_name("out").is_some());
    }
}
