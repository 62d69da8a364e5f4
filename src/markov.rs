//! Discrete Stochastic State Machines
//!
//! Rosenchance: a two-state hidden-Markov-style emitter. GuildensTurn: a
//! four-state cyclic random walk that routes one of four inputs. Both
//! machines advance only on rising trigger edges; between triggers, outputs
//! hold (or decay, for the entry pulses).

use crate::dsp::{self, SchmittTrigger};
use crate::port::{
    ParamDef, ParamId, PolyModule, PolyValue, PortDef, PortId, PortSpec, PortValues, ProcessArgs,
    SignalKind,
};
use crate::rng::{NoiseSource, Rng};

const PULSE_SAMPLES: u32 = 10;
const PULSE_VOLTAGE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbState {
    A,
    B,
}

impl AbState {
    fn code(self) -> f64 {
        match self {
            AbState::A => 1.0,
            AbState::B => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RosenchanceChannel {
    state: AbState,
    trigger: SchmittTrigger,
    emitted: f64,
    pulse_a: f64,
    pulse_b: f64,
    pulse_count: u32,
}

impl Default for RosenchanceChannel {
    fn default() -> Self {
        Self {
            state: AbState::A,
            trigger: SchmittTrigger::new(),
            emitted: 0.0,
            pulse_a: 0.0,
            pulse_b: 0.0,
            pulse_count: 0,
        }
    }
}

/// Two-state probabilistic emitter.
///
/// Each trigger edge draws two independent uniforms: the first decides the
/// next state from the current state's self-transition probability, the
/// second picks which of that state's two emission values to output. The
/// state comparison is deliberately asymmetric: from A the machine stays
/// when `Tr < PA`, from B it leaves when `Tr > PB`, so both conditions route
/// to "enter A".
///
/// The emitted value and state code hold between triggers; the entry pulses
/// decay to zero after a short countdown.
pub struct Rosenchance<R: NoiseSource = Rng> {
    chan: Vec<RosenchanceChannel>,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

impl Rosenchance<Rng> {
    pub fn new(_sample_rate: f64) -> Self {
        Self::with_noise(_sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> Rosenchance<R> {
    pub const PA_PARAM: ParamId = 0;
    pub const PAE1_PARAM: ParamId = 1;
    pub const AE1_PARAM: ParamId = 2;
    pub const AE2_PARAM: ParamId = 3;
    pub const PB_PARAM: ParamId = 4;
    pub const PBE1_PARAM: ParamId = 5;
    pub const BE1_PARAM: ParamId = 6;
    pub const BE2_PARAM: ParamId = 7;
    pub const ATT_PA_PARAM: ParamId = 8;
    pub const ATT_PAE1_PARAM: ParamId = 9;
    pub const ATT_AE1_PARAM: ParamId = 10;
    pub const ATT_AE2_PARAM: ParamId = 11;
    pub const ATT_PB_PARAM: ParamId = 12;
    pub const ATT_PBE1_PARAM: ParamId = 13;
    pub const ATT_BE1_PARAM: ParamId = 14;
    pub const ATT_BE2_PARAM: ParamId = 15;

    pub const TRIG_INPUT: PortId = 0;
    pub const PA_INPUT: PortId = 1;
    pub const PAE1_INPUT: PortId = 2;
    pub const AE1_INPUT: PortId = 3;
    pub const AE2_INPUT: PortId = 4;
    pub const PB_INPUT: PortId = 5;
    pub const PBE1_INPUT: PortId = 6;
    pub const BE1_INPUT: PortId = 7;
    pub const BE2_INPUT: PortId = 8;

    pub const OUT_OUTPUT: PortId = 10;
    pub const STATE_OUTPUT: PortId = 11;
    pub const A_OUTPUT: PortId = 12;
    pub const B_OUTPUT: PortId = 13;

    pub fn with_noise(_sample_rate: f64, noise: R) -> Self {
        Self {
            chan: Vec::new(),
            noise,
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::PA_PARAM, 0.0, 1.0, 0.5, "A->A transition probability"),
                ParamDef::new(Self::PAE1_PARAM, 0.0, 1.0, 0.5, "A's e1 emission probability"),
                ParamDef::new(Self::AE1_PARAM, -10.0, 10.0, 0.0, "A's e1 emission value"),
                ParamDef::new(Self::AE2_PARAM, -10.0, 10.0, 1.0, "A's e2 emission value"),
                ParamDef::new(Self::PB_PARAM, 0.0, 1.0, 0.5, "B->B transition probability"),
                ParamDef::new(Self::PBE1_PARAM, 0.0, 1.0, 0.5, "B's e1 emission probability"),
                ParamDef::new(Self::BE1_PARAM, -10.0, 10.0, 2.0, "B's e1 emission value"),
                ParamDef::new(Self::BE2_PARAM, -10.0, 10.0, 3.0, "B's e2 emission value"),
                ParamDef::new(Self::ATT_PA_PARAM, 0.0, 1.0, 1.0, "A->A probability attenuation"),
                ParamDef::new(Self::ATT_PAE1_PARAM, 0.0, 1.0, 1.0, "A's e1 probability attenuation"),
                ParamDef::new(Self::ATT_AE1_PARAM, -10.0, 10.0, 1.0, "A's e1 value attenuation"),
                ParamDef::new(Self::ATT_AE2_PARAM, -10.0, 10.0, 1.0, "A's e2 value attenuation"),
                ParamDef::new(Self::ATT_PB_PARAM, 0.0, 1.0, 1.0, "B->B probability attenuation"),
                ParamDef::new(Self::ATT_PBE1_PARAM, 0.0, 1.0, 1.0, "B's e1 probability attenuation"),
                ParamDef::new(Self::ATT_BE1_PARAM, -10.0, 10.0, 1.0, "B's e1 value attenuation"),
                ParamDef::new(Self::ATT_BE2_PARAM, -10.0, 10.0, 1.0, "B's e2 value attenuation"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::TRIG_INPUT, "trig", SignalKind::Trigger),
                    PortDef::new(Self::PA_INPUT, "pa", SignalKind::CvBipolar),
                    PortDef::new(Self::PAE1_INPUT, "pae1", SignalKind::CvBipolar),
                    PortDef::new(Self::AE1_INPUT, "ae1", SignalKind::CvBipolar),
                    PortDef::new(Self::AE2_INPUT, "ae2", SignalKind::CvBipolar),
                    PortDef::new(Self::PB_INPUT, "pb", SignalKind::CvBipolar),
                    PortDef::new(Self::PBE1_INPUT, "pbe1", SignalKind::CvBipolar),
                    PortDef::new(Self::BE1_INPUT, "be1", SignalKind::CvBipolar),
                    PortDef::new(Self::BE2_INPUT, "be2", SignalKind::CvBipolar),
                ],
                outputs: vec![
                    PortDef::new(Self::OUT_OUTPUT, "out", SignalKind::CvBipolar),
                    PortDef::new(Self::STATE_OUTPUT, "state", SignalKind::CvUnipolar),
                    PortDef::new(Self::A_OUTPUT, "a", SignalKind::Trigger),
                    PortDef::new(Self::B_OUTPUT, "b", SignalKind::Trigger),
                ],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize_with(n, Default::default);
        }
    }

    /// Knob value plus attenuated CV
    fn modulated(&self, inputs: &PortValues, c: usize, param: ParamId, att: ParamId, port: PortId) -> f64 {
        self.params.get(param) + self.params.get(att) * inputs.voltage(port, c)
    }
}

impl<R: NoiseSource> PolyModule for Rosenchance<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[Self::TRIG_INPUT]);
        self.ensure_channels(channels);

        let mut out = PolyValue::with_channels(channels);
        let mut state_out = PolyValue::with_channels(channels);
        let mut a_out = PolyValue::with_channels(channels);
        let mut b_out = PolyValue::with_channels(channels);

        for c in 0..channels {
            let trig_v = inputs.voltage(Self::TRIG_INPUT, c);
            if self.chan[c].trigger.process(trig_v) {
                let pa = self.modulated(inputs, c, Self::PA_PARAM, Self::ATT_PA_PARAM, Self::PA_INPUT);
                let pb = self.modulated(inputs, c, Self::PB_PARAM, Self::ATT_PB_PARAM, Self::PB_INPUT);
                let pae1 =
                    self.modulated(inputs, c, Self::PAE1_PARAM, Self::ATT_PAE1_PARAM, Self::PAE1_INPUT);
                let pbe1 =
                    self.modulated(inputs, c, Self::PBE1_PARAM, Self::ATT_PBE1_PARAM, Self::PBE1_INPUT);
                let ae1 = self.modulated(inputs, c, Self::AE1_PARAM, Self::ATT_AE1_PARAM, Self::AE1_INPUT);
                let ae2 = self.modulated(inputs, c, Self::AE2_PARAM, Self::ATT_AE2_PARAM, Self::AE2_INPUT);
                let be1 = self.modulated(inputs, c, Self::BE1_PARAM, Self::ATT_BE1_PARAM, Self::BE1_INPUT);
                let be2 = self.modulated(inputs, c, Self::BE2_PARAM, Self::ATT_BE2_PARAM, Self::BE2_INPUT);

                let tr = self.noise.uniform();
                let er = self.noise.uniform();
                let ch = &mut self.chan[c];
                // From A, stay when Tr < PA; from B, leave when Tr > PB.
                // Both conditions enter A.
                let enter_a = (ch.state == AbState::A && tr < pa)
                    || (ch.state == AbState::B && tr > pb);
                if enter_a {
                    ch.state = AbState::A;
                    ch.pulse_a = PULSE_VOLTAGE;
                    ch.pulse_b = 0.0;
                    ch.emitted = if er < pae1 { ae1 } else { ae2 };
                } else {
                    ch.state = AbState::B;
                    ch.pulse_a = 0.0;
                    ch.pulse_b = PULSE_VOLTAGE;
                    ch.emitted = if er < pbe1 { be1 } else { be2 };
                }
                ch.pulse_count = 0;
            } else {
                let ch = &mut self.chan[c];
                ch.pulse_count += 1;
                if ch.pulse_count > PULSE_SAMPLES {
                    ch.pulse_count = 0;
                    ch.pulse_a = 0.0;
                    ch.pulse_b = 0.0;
                }
            }

            let ch = &self.chan[c];
            out.set_voltage(c, ch.emitted);
            state_out.set_voltage(c, ch.state.code());
            a_out.set_voltage(c, ch.pulse_a);
            b_out.set_voltage(c, ch.pulse_b);
        }

        outputs.set(Self::OUT_OUTPUT, out);
        outputs.set(Self::STATE_OUTPUT, state_out);
        outputs.set(Self::A_OUTPUT, a_out);
        outputs.set(Self::B_OUTPUT, b_out);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = RosenchanceChannel::default();
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
        "rosenchance"
    }
}

const RING_STATES: usize = 4;

/// Clamp both ring-walk probabilities to [0,1], then normalize by
/// `max(back + forward, 1)`. Sums at or below 1 pass through unscaled, so a
/// low-probability pair keeps a matching stay probability rather than being
/// stretched to fill the unit interval.
pub fn normalized_step_probs(back: f64, forward: f64) -> (f64, f64) {
    let back = dsp::clamp(back, 0.0, 1.0);
    let forward = dsp::clamp(forward, 0.0, 1.0);
    let total = (back + forward).max(1.0);
    (back / total, forward / total)
}

#[derive(Debug, Clone, Copy)]
struct GuildensTurnChannel {
    // Ring position, 0..=3
    index: usize,
    trigger: SchmittTrigger,
}

impl Default for GuildensTurnChannel {
    fn default() -> Self {
        Self {
            index: 0,
            trigger: SchmittTrigger::new(),
        }
    }
}

/// Four-state cyclic random walk with signal routing.
///
/// States A through D sit on a ring with forward and backward edges only.
/// Each trigger edge computes the current state's two edge probabilities
/// (knob plus attenuated CV), normalizes them, and draws one uniform to move
/// forward, backward, or stay. Every sample, the input assigned to the
/// current state routes through to the output, and the state index is
/// emitted as a 1-4V code.
pub struct GuildensTurn<R: NoiseSource = Rng> {
    chan: Vec<GuildensTurnChannel>,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

impl GuildensTurn<Rng> {
    pub fn new(_sample_rate: f64) -> Self {
        Self::with_noise(_sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> GuildensTurn<R> {
    pub const PAD_PARAM: ParamId = 0;
    pub const PAB_PARAM: ParamId = 1;
    pub const PBA_PARAM: ParamId = 2;
    pub const PBC_PARAM: ParamId = 3;
    pub const PCB_PARAM: ParamId = 4;
    pub const PCD_PARAM: ParamId = 5;
    pub const PDC_PARAM: ParamId = 6;
    pub const PDA_PARAM: ParamId = 7;
    pub const ATT_PAD_PARAM: ParamId = 8;
    pub const ATT_PAB_PARAM: ParamId = 9;
    pub const ATT_PBA_PARAM: ParamId = 10;
    pub const ATT_PBC_PARAM: ParamId = 11;
    pub const ATT_PCB_PARAM: ParamId = 12;
    pub const ATT_PCD_PARAM: ParamId = 13;
    pub const ATT_PDC_PARAM: ParamId = 14;
    pub const ATT_PDA_PARAM: ParamId = 15;

    pub const TRIG_INPUT: PortId = 0;
    pub const A_INPUT: PortId = 1;
    pub const B_INPUT: PortId = 2;
    pub const C_INPUT: PortId = 3;
    pub const D_INPUT: PortId = 4;
    pub const PAD_INPUT: PortId = 5;
    pub const PAB_INPUT: PortId = 6;
    pub const PBA_INPUT: PortId = 7;
    pub const PBC_INPUT: PortId = 8;
    pub const PCB_INPUT: PortId = 9;
    pub const PCD_INPUT: PortId = 10;
    pub const PDC_INPUT: PortId = 11;
    pub const PDA_INPUT: PortId = 12;

    pub const OUT_OUTPUT: PortId = 20;
    pub const STATE_OUTPUT: PortId = 21;

    /// Edge probabilities per state, backward then forward, walking the ring
    /// A -> B -> C -> D -> A
    const PROB_PARAMS: [ParamId; 8] = [
        Self::PAD_PARAM,
        Self::PAB_PARAM,
        Self::PBA_PARAM,
        Self::PBC_PARAM,
        Self::PCB_PARAM,
        Self::PCD_PARAM,
        Self::PDC_PARAM,
        Self::PDA_PARAM,
    ];
    const ATT_PARAMS: [ParamId; 8] = [
        Self::ATT_PAD_PARAM,
        Self::ATT_PAB_PARAM,
        Self::ATT_PBA_PARAM,
        Self::ATT_PBC_PARAM,
        Self::ATT_PCB_PARAM,
        Self::ATT_PCD_PARAM,
        Self::ATT_PDC_PARAM,
        Self::ATT_PDA_PARAM,
    ];
    const PROB_INPUTS: [PortId; 8] = [
        Self::PAD_INPUT,
        Self::PAB_INPUT,
        Self::PBA_INPUT,
        Self::PBC_INPUT,
        Self::PCB_INPUT,
        Self::PCD_INPUT,
        Self::PDC_INPUT,
        Self::PDA_INPUT,
    ];
    const SIGNAL_INPUTS: [PortId; RING_STATES] =
        [Self::A_INPUT, Self::B_INPUT, Self::C_INPUT, Self::D_INPUT];

    pub fn with_noise(_sample_rate: f64, noise: R) -> Self {
        let edges = ["A->D", "A->B", "B->A", "B->C", "C->B", "C->D", "D->C", "D->A"];
        let mut defs = Vec::new();
        for (i, edge) in edges.iter().enumerate() {
            defs.push(ParamDef::new(
                Self::PROB_PARAMS[i],
                0.0,
                1.0,
                0.333,
                format!("{} transition probability", edge),
            ));
        }
        for (i, edge) in edges.iter().enumerate() {
            defs.push(ParamDef::new(
                Self::ATT_PARAMS[i],
                0.0,
                2.0,
                1.0,
                format!("{} probability attenuation", edge),
            ));
        }

        let mut inputs = vec![PortDef::new(Self::TRIG_INPUT, "trig", SignalKind::Trigger)];
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            inputs.push(PortDef::new(Self::SIGNAL_INPUTS[i], *name, SignalKind::Audio));
        }
        for (i, edge) in ["pad", "pab", "pba", "pbc", "pcb", "pcd", "pdc", "pda"]
            .iter()
            .enumerate()
        {
            inputs.push(PortDef::new(Self::PROB_INPUTS[i], *edge, SignalKind::CvBipolar));
        }

        Self {
            chan: Vec::new(),
            noise,
            params: crate::port::Params::new(defs),
            spec: PortSpec {
                inputs,
                outputs: vec![
                    PortDef::new(Self::OUT_OUTPUT, "out", SignalKind::Audio),
                    PortDef::new(Self::STATE_OUTPUT, "state", SignalKind::CvUnipolar),
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

impl<R: NoiseSource> PolyModule for GuildensTurn<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[
            Self::TRIG_INPUT,
            Self::A_INPUT,
            Self::B_INPUT,
            Self::C_INPUT,
            Self::D_INPUT,
        ]);
        self.ensure_channels(channels);

        let mut out = PolyValue::with_channels(channels);
        let mut state_out = PolyValue::with_channels(channels);

        for c in 0..channels {
            let trig_v = inputs.voltage(Self::TRIG_INPUT, c);
            let mut index = self.chan[c].index;
            if self.chan[c].trigger.process(trig_v) {
                let back = self.params.get(Self::PROB_PARAMS[index * 2])
                    + self.params.get(Self::ATT_PARAMS[index * 2])
                        * inputs.voltage(Self::PROB_INPUTS[index * 2], c);
                let forward = self.params.get(Self::PROB_PARAMS[index * 2 + 1])
                    + self.params.get(Self::ATT_PARAMS[index * 2 + 1])
                        * inputs.voltage(Self::PROB_INPUTS[index * 2 + 1], c);
                let (back, forward) = normalized_step_probs(back, forward);

                let tr = self.noise.uniform();
                if tr < forward {
                    index = (index + 1) % RING_STATES;
                } else if tr < forward + back {
                    index = (index + RING_STATES - 1) % RING_STATES;
                }
                self.chan[c].index = index;
            }

            state_out.set_voltage(c, index as f64 + 1.0);
            out.set_voltage(c, inputs.voltage(Self::SIGNAL_INPUTS[index], c));
        }

        outputs.set(Self::OUT_OUTPUT, out);
        outputs.set(Self::STATE_OUTPUT, state_out);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = GuildensTurnChannel::default();
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
        "guildensturn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedNoise;

    fn args() -> ProcessArgs {
        ProcessArgs::new(44100.0)
    }

    fn pulse(inputs: &mut PortValues, port: PortId, high: bool) {
        inputs.set_mono(port, if high { 5.0 } else { 0.0 });
    }

    #[test]
    fn test_rosenchance_scripted_transitions() {
        // PA=PB=0.5, start in A. Tr=0.3 < PA stays A; next edge Tr=0.9 moves
        // to B; from B, Tr=0.9 > PB re-enters A.
        let noise = ScriptedNoise::new(vec![0.3, 0.0, 0.9, 0.0, 0.9, 0.0], vec![]);
        let mut m = Rosenchance::with_noise(44100.0, noise);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        let mut fire = |m: &mut Rosenchance<ScriptedNoise>, inputs: &mut PortValues| {
            pulse(inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, true);
            m.tick(&args(), inputs, &mut outputs);
            let state = outputs.voltage(Rosenchance::<ScriptedNoise>::STATE_OUTPUT, 0);
            pulse(inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, false);
            m.tick(&args(), inputs, &mut outputs);
            state
        };

        assert_eq!(fire(&mut m, &mut inputs), 1.0);
        assert_eq!(fire(&mut m, &mut inputs), 2.0);
        assert_eq!(fire(&mut m, &mut inputs), 1.0);
    }

    #[test]
    fn test_rosenchance_emission_selection() {
        // Er=0.2 < PAE1=0.5 picks e1 (default 0.0); Er=0.8 picks e2 (1.0).
        // Tr=0.0 keeps the machine in A for both edges.
        let noise = ScriptedNoise::new(vec![0.0, 0.2, 0.0, 0.8], vec![]);
        let mut m = Rosenchance::with_noise(44100.0, noise);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::OUT_OUTPUT, 0), 0.0);

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, false);
        m.tick(&args(), &inputs, &mut outputs);
        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::OUT_OUTPUT, 0), 1.0);
    }

    #[test]
    fn test_rosenchance_pulse_decays() {
        let noise = ScriptedNoise::new(vec![0.0, 0.0], vec![]);
        let mut m = Rosenchance::with_noise(44100.0, noise);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::A_OUTPUT, 0), 5.0);

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, false);
        for _ in 0..PULSE_SAMPLES {
            m.tick(&args(), &inputs, &mut outputs);
            assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::A_OUTPUT, 0), 5.0);
        }
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::A_OUTPUT, 0), 0.0);
    }

    #[test]
    fn test_rosenchance_holds_between_triggers() {
        let noise = ScriptedNoise::new(vec![0.0, 0.2], vec![]);
        let mut m = Rosenchance::with_noise(44100.0, noise);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        let emitted = outputs.voltage(Rosenchance::<ScriptedNoise>::OUT_OUTPUT, 0);

        pulse(&mut inputs, Rosenchance::<ScriptedNoise>::TRIG_INPUT, false);
        for _ in 0..100 {
            m.tick(&args(), &inputs, &mut outputs);
            assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::OUT_OUTPUT, 0), emitted);
            assert_eq!(outputs.voltage(Rosenchance::<ScriptedNoise>::STATE_OUTPUT, 0), 1.0);
        }
    }

    #[test]
    fn test_normalized_probs_never_exceed_one() {
        for bi in 0..=20 {
            for fi in 0..=20 {
                let b = bi as f64 * 0.1;
                let f = fi as f64 * 0.1;
                let (nb, nf) = normalized_step_probs(b, f);
                assert!(nb + nf <= 1.0 + 1e-12, "({}, {}) -> {} + {}", b, f, nb, nf);
                assert!(nb >= 0.0 && nf >= 0.0);
            }
        }
    }

    #[test]
    fn test_normalized_probs_low_sums_pass_through() {
        let (b, f) = normalized_step_probs(0.2, 0.3);
        assert_eq!(b, 0.2);
        assert_eq!(f, 0.3);
    }

    #[test]
    fn test_normalized_probs_preserve_ratio() {
        let (b, f) = normalized_step_probs(0.9, 0.9);
        assert!((b - 0.5).abs() < 1e-12);
        assert!((f - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_guildensturn_scripted_ring_walk() {
        // Forward certain: Tr=0.0 < Pforward=1. Walk A->B->C->D->A.
        let noise = ScriptedNoise::new(vec![0.0, 0.0, 0.0, 0.0], vec![]);
        let mut m = GuildensTurn::with_noise(44100.0, noise);
        for p in GuildensTurn::<ScriptedNoise>::PROB_PARAMS {
            m.set_param(p, 1.0);
        }
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        let mut fire = |m: &mut GuildensTurn<ScriptedNoise>, inputs: &mut PortValues| {
            pulse(inputs, GuildensTurn::<ScriptedNoise>::TRIG_INPUT, true);
            m.tick(&args(), inputs, &mut outputs);
            let state = outputs.voltage(GuildensTurn::<ScriptedNoise>::STATE_OUTPUT, 0);
            pulse(inputs, GuildensTurn::<ScriptedNoise>::TRIG_INPUT, false);
            m.tick(&args(), inputs, &mut outputs);
            state
        };

        assert_eq!(fire(&mut m, &mut inputs), 2.0);
        assert_eq!(fire(&mut m, &mut inputs), 3.0);
        assert_eq!(fire(&mut m, &mut inputs), 4.0);
        // Wraps back to A
        assert_eq!(fire(&mut m, &mut inputs), 1.0);
    }

    #[test]
    fn test_guildensturn_backward_wraps() {
        // Both probs 0.5 normalized; Tr=0.6 lands in the backward band
        // (forward 0.5, back 0.5): A steps back to D.
        let noise = ScriptedNoise::new(vec![0.6], vec![]);
        let mut m = GuildensTurn::with_noise(44100.0, noise);
        m.set_param(GuildensTurn::<ScriptedNoise>::PAD_PARAM, 0.5);
        m.set_param(GuildensTurn::<ScriptedNoise>::PAB_PARAM, 0.5);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        pulse(&mut inputs, GuildensTurn::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(GuildensTurn::<ScriptedNoise>::STATE_OUTPUT, 0), 4.0);
    }

    #[test]
    fn test_guildensturn_routes_current_state_input() {
        let noise = ScriptedNoise::new(vec![0.0], vec![]);
        let mut m = GuildensTurn::with_noise(44100.0, noise);
        for p in GuildensTurn::<ScriptedNoise>::PROB_PARAMS {
            m.set_param(p, 1.0);
        }
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();
        inputs.set_mono(GuildensTurn::<ScriptedNoise>::A_INPUT, 1.5);
        inputs.set_mono(GuildensTurn::<ScriptedNoise>::B_INPUT, -2.5);

        // No trigger yet: state A routes its input continuously
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(GuildensTurn::<ScriptedNoise>::OUT_OUTPUT, 0), 1.5);

        pulse(&mut inputs, GuildensTurn::<ScriptedNoise>::TRIG_INPUT, true);
        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(GuildensTurn::<ScriptedNoise>::OUT_OUTPUT, 0), -2.5);
    }

    #[test]
    fn test_guildensturn_polyphonic_states_independent() {
        // Channel 0 walks forward, channel 1 stays (Tr outside both bands)
        let noise = ScriptedNoise::new(vec![0.0, 0.99], vec![]);
        let mut m = GuildensTurn::with_noise(44100.0, noise);
        m.set_param(GuildensTurn::<ScriptedNoise>::PAB_PARAM, 0.5);
        m.set_param(GuildensTurn::<ScriptedNoise>::PAD_PARAM, 0.1);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        let mut trig = PolyValue::with_channels(2);
        trig.set_voltage(0, 5.0);
        trig.set_voltage(1, 5.0);
        inputs.set(GuildensTurn::<ScriptedNoise>::TRIG_INPUT, trig);

        m.tick(&args(), &inputs, &mut outputs);
        assert_eq!(outputs.voltage(GuildensTurn::<ScriptedNoise>::STATE_OUTPUT, 0), 2.0);
        assert_eq!(outputs.voltage(GuildensTurn::<ScriptedNoise>::STATE_OUTPUT, 1), 1.0);
    }
}
