//! Stochastic Mean-Reverting Generators
//!
//! Euler-Maruyama integrators over one to three scalar state variables per
//! polyphonic channel: the Ornstein-Uhlenbeck process, the integrated OU
//! variant, and two Brownian-bridge variants that differ in their clamping
//! behavior.
//!
//! The noise term of every process scales by `1/sqrt(sample_rate)`, the
//! Euler-Maruyama discretization of `dW`. That factor is recomputed on the
//! host's sample-rate notification, which keeps the accumulated variance per
//! unit wall-clock time independent of the audio rate.

use crate::dsp::{self, SchmittTrigger};
use crate::port::{
    ParamDef, ParamId, PolyModule, PolyValue, PortDef, PortId, PortSpec, PortValues, ProcessArgs,
    SignalKind,
};
use crate::rng::{NoiseSource, Rng};

/// Ornstein-Uhlenbeck process generator.
///
/// `dX = spring * (mean - X) dt + noise dW`, one scalar state per channel.
/// A trigger edge hard-resets the state to the current mean, discontinuously.
pub struct OrnsteinUhlenbeck<R: NoiseSource = Rng> {
    chan: Vec<OuChannel>,
    sqrt_delta: f64,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

#[derive(Debug, Clone, Copy, Default)]
struct OuChannel {
    x: f64,
    trigger: SchmittTrigger,
}

impl OrnsteinUhlenbeck {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_noise(sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> OrnsteinUhlenbeck<R> {
    pub const NOISE_PARAM: ParamId = 0;
    pub const SPRING_PARAM: ParamId = 1;
    pub const MEAN_PARAM: ParamId = 2;

    pub const NOISE_INPUT: PortId = 0;
    pub const SPRING_INPUT: PortId = 1;
    pub const MEAN_INPUT: PortId = 2;
    pub const TRIG_INPUT: PortId = 3;

    pub const SIG_OUTPUT: PortId = 10;

    pub fn with_noise(sample_rate: f64, noise: R) -> Self {
        Self {
            chan: Vec::new(),
            sqrt_delta: 1.0 / sample_rate.sqrt(),
            noise,
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::NOISE_PARAM, 0.0, 5.0, 0.0, "Noise level"),
                ParamDef::new(Self::SPRING_PARAM, 0.0, 10.0, 0.0, "Mean reverting strength"),
                ParamDef::new(Self::MEAN_PARAM, -10.0, 10.0, 1.0, "Mean"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::NOISE_INPUT, "noise", SignalKind::CvBipolar),
                    PortDef::new(Self::SPRING_INPUT, "spring", SignalKind::CvBipolar),
                    PortDef::new(Self::MEAN_INPUT, "mean", SignalKind::CvBipolar),
                    PortDef::new(Self::TRIG_INPUT, "trig", SignalKind::Trigger),
                ],
                outputs: vec![PortDef::new(Self::SIG_OUTPUT, "sig", SignalKind::CvBipolar)],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize_with(n, Default::default);
        }
    }
}

impl<R: NoiseSource> PolyModule for OrnsteinUhlenbeck<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[
            Self::TRIG_INPUT,
            Self::NOISE_INPUT,
            Self::SPRING_INPUT,
            Self::MEAN_INPUT,
        ]);
        self.ensure_channels(channels);

        let mut out = PolyValue::with_channels(channels);
        for c in 0..channels {
            let noise = self.params.get(Self::NOISE_PARAM) + inputs.voltage(Self::NOISE_INPUT, c) / 10.0;
            let spring = self.params.get(Self::SPRING_PARAM) + inputs.voltage(Self::SPRING_INPUT, c);
            let mean = self.params.get(Self::MEAN_PARAM) + inputs.voltage(Self::MEAN_INPUT, c);

            if self.chan[c].trigger.process(inputs.voltage(Self::TRIG_INPUT, c)) {
                self.chan[c].x = mean;
            }

            let r = self.noise.normal();
            let x = &mut self.chan[c].x;
            *x += self.sqrt_delta * r * noise;
            *x += spring * (mean - *x) * args.sample_time;
            out.set_voltage(c, *x);
        }
        outputs.set(Self::SIG_OUTPUT, out);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            ch.x = 0.0;
            ch.trigger.reset();
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
        "ornstein_uhlenbeck"
    }
}

/// Integrated Ornstein-Uhlenbeck generator.
///
/// Maintains the raw noise, the OU velocity, and its Euler quadrature per
/// channel, and exposes all three simultaneously, each crossfaded with an
/// external signal by the mix parameter.
pub struct Iou<R: NoiseSource = Rng> {
    chan: Vec<IouChannel>,
    sqrt_delta: f64,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

#[derive(Debug, Clone, Copy, Default)]
struct IouChannel {
    rand: f64,
    ou: f64,
    iou: f64,
}

impl Iou {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_noise(sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> Iou<R> {
    pub const NOISE_PARAM: ParamId = 0;
    pub const SPRING_PARAM: ParamId = 1;
    pub const DAMP_PARAM: ParamId = 2;
    pub const MEAN_PARAM: ParamId = 3;
    pub const MIX_PARAM: ParamId = 4;

    pub const NOISE_INPUT: PortId = 0;
    pub const SPRING_INPUT: PortId = 1;
    pub const DAMP_INPUT: PortId = 2;
    pub const MEAN_INPUT: PortId = 3;
    pub const EXT_INPUT: PortId = 4;

    pub const RAND_OUTPUT: PortId = 10;
    pub const OU_OUTPUT: PortId = 11;
    pub const IOU_OUTPUT: PortId = 12;

    pub fn with_noise(sample_rate: f64, noise: R) -> Self {
        Self {
            chan: Vec::new(),
            sqrt_delta: 1.0 / sample_rate.sqrt(),
            noise,
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::NOISE_PARAM, 0.0, 5.0, 2.0, "Noise level"),
                ParamDef::new(Self::SPRING_PARAM, 0.0, 10.0, 1.0, "Mean reverting strength"),
                ParamDef::new(Self::DAMP_PARAM, 0.0, 10.0, 1.0, "Velocity damping"),
                ParamDef::new(Self::MEAN_PARAM, -10.0, 10.0, 0.0, "Mean"),
                ParamDef::new(Self::MIX_PARAM, 0.0, 1.0, 0.0, "INT/EXT mix"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::NOISE_INPUT, "noise", SignalKind::CvBipolar),
                    PortDef::new(Self::SPRING_INPUT, "spring", SignalKind::CvBipolar),
                    PortDef::new(Self::DAMP_INPUT, "damp", SignalKind::CvBipolar),
                    PortDef::new(Self::MEAN_INPUT, "mean", SignalKind::CvBipolar),
                    PortDef::new(Self::EXT_INPUT, "ext", SignalKind::Audio),
                ],
                outputs: vec![
                    PortDef::new(Self::RAND_OUTPUT, "rand", SignalKind::CvBipolar),
                    PortDef::new(Self::OU_OUTPUT, "ou", SignalKind::CvBipolar),
                    PortDef::new(Self::IOU_OUTPUT, "iou", SignalKind::CvBipolar),
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

impl<R: NoiseSource> PolyModule for Iou<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[
            Self::SPRING_INPUT,
            Self::NOISE_INPUT,
            Self::DAMP_INPUT,
            Self::MEAN_INPUT,
            Self::EXT_INPUT,
        ]);
        self.ensure_channels(channels);

        let mix = self.params.get(Self::MIX_PARAM);
        let mut out_rand = PolyValue::with_channels(channels);
        let mut out_ou = PolyValue::with_channels(channels);
        let mut out_iou = PolyValue::with_channels(channels);

        for c in 0..channels {
            let noise = self.params.get(Self::NOISE_PARAM) + inputs.voltage(Self::NOISE_INPUT, c) / 10.0;
            let spring = self.params.get(Self::SPRING_PARAM) + inputs.voltage(Self::SPRING_INPUT, c);
            let mean = self.params.get(Self::MEAN_PARAM) + inputs.voltage(Self::MEAN_INPUT, c);
            let damp = self.params.get(Self::DAMP_PARAM) + inputs.voltage(Self::DAMP_INPUT, c);
            let ext = inputs.voltage(Self::EXT_INPUT, c);

            let r = self.noise.normal();
            let ch = &mut self.chan[c];
            ch.rand = r * noise;
            // Quadrature uses the OU value from before this step
            ch.iou += ch.ou * args.sample_time;
            ch.ou += self.sqrt_delta * ch.rand;
            ch.ou += (-spring * ch.ou + damp * (mean - ch.iou)) * args.sample_time;

            out_rand.set_voltage(c, ch.rand * (1.0 - mix) + mix * ext);
            out_ou.set_voltage(c, ch.ou * (1.0 - mix) + mix * ext);
            out_iou.set_voltage(c, ch.iou * (1.0 - mix) + mix * ext);
        }
        outputs.set(Self::RAND_OUTPUT, out_rand);
        outputs.set(Self::OU_OUTPUT, out_ou);
        outputs.set(Self::IOU_OUTPUT, out_iou);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = IouChannel::default();
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
        "iou"
    }
}

/// Brownian bridge generator, clamped variant.
///
/// A process pinned to start at `offset` and pulled toward `range + offset`
/// by the target horizon `T = 2^time + timeCV`. The drift divides by the
/// remaining time, so elapsed time is capped strictly below the horizon
/// (`0.999999 * T`) to keep the division bounded; past the cap the state is
/// pinned to the endpoint. Any change of the effective horizon, or a trigger
/// edge, restarts the bridge.
pub struct BrownianBridge<R: NoiseSource = Rng> {
    chan: Vec<BridgeChannel>,
    sqrt_delta: f64,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

#[derive(Debug, Clone, Copy)]
struct BridgeChannel {
    x: f64,
    t: f64,
    max_time: f64,
    trigger: SchmittTrigger,
}

impl Default for BridgeChannel {
    fn default() -> Self {
        Self {
            x: 0.0,
            t: 0.0,
            max_time: 5.0,
            trigger: SchmittTrigger::default(),
        }
    }
}

impl BrownianBridge {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_noise(sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> BrownianBridge<R> {
    pub const NOISE_PARAM: ParamId = 0;
    pub const RANGE_PARAM: ParamId = 1;
    pub const OFFSET_PARAM: ParamId = 2;
    pub const TIME_PARAM: ParamId = 3;

    pub const RANGE_INPUT: PortId = 0;
    pub const OFFSET_INPUT: PortId = 1;
    pub const NOISE_INPUT: PortId = 2;
    pub const TIME_INPUT: PortId = 3;
    pub const TRIG_INPUT: PortId = 4;

    pub const SIG_OUTPUT: PortId = 10;

    /// Fraction of the horizon past which the state is pinned to the endpoint
    const TIME_GUARD: f64 = 0.999999;

    pub fn with_noise(sample_rate: f64, noise: R) -> Self {
        Self {
            chan: Vec::new(),
            sqrt_delta: 1.0 / sample_rate.sqrt(),
            noise,
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::NOISE_PARAM, 0.0, 1.0, 0.0, "Noise level"),
                ParamDef::new(Self::RANGE_PARAM, 0.0, 10.0, 5.0, "Range"),
                ParamDef::new(Self::OFFSET_PARAM, -5.0, 5.0, 0.0, "Offset"),
                // Exponential knob: effective horizon is 2^value seconds
                ParamDef::new(Self::TIME_PARAM, -10.0, 10.0, 1.0, "Time"),
            ]),
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(Self::RANGE_INPUT, "range", SignalKind::CvBipolar),
                    PortDef::new(Self::OFFSET_INPUT, "offset", SignalKind::CvBipolar),
                    PortDef::new(Self::NOISE_INPUT, "noise", SignalKind::CvBipolar),
                    PortDef::new(Self::TIME_INPUT, "time", SignalKind::CvBipolar),
                    PortDef::new(Self::TRIG_INPUT, "trig", SignalKind::Trigger),
                ],
                outputs: vec![PortDef::new(Self::SIG_OUTPUT, "sig", SignalKind::CvBipolar)],
            },
        }
    }

    fn ensure_channels(&mut self, n: usize) {
        if self.chan.len() < n {
            self.chan.resize_with(n, Default::default);
        }
    }
}

impl<R: NoiseSource> PolyModule for BrownianBridge<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let channels = inputs.channels_max(&[
            Self::RANGE_INPUT,
            Self::OFFSET_INPUT,
            Self::NOISE_INPUT,
            Self::TIME_INPUT,
            Self::TRIG_INPUT,
        ]);
        self.ensure_channels(channels);

        let mut out = PolyValue::with_channels(channels);
        for c in 0..channels {
            let range = self.params.get(Self::RANGE_PARAM) + inputs.voltage(Self::RANGE_INPUT, c);
            let offset = self.params.get(Self::OFFSET_PARAM) + inputs.voltage(Self::OFFSET_INPUT, c);
            let noise = self.params.get(Self::NOISE_PARAM) + inputs.voltage(Self::NOISE_INPUT, c) / 10.0;
            let time_param =
                2.0f64.powf(self.params.get(Self::TIME_PARAM)) + inputs.voltage(Self::TIME_INPUT, c);

            let fired = self.chan[c].trigger.process(inputs.voltage(Self::TRIG_INPUT, c));
            let ch = &mut self.chan[c];
            if fired || time_param != ch.max_time {
                ch.t = 0.0;
                ch.x = offset;
                ch.max_time = time_param;
            }

            let r = self.noise.normal();
            let ch = &mut self.chan[c];
            ch.t += args.sample_time;
            ch.t = dsp::clamp(ch.t, 0.0, time_param);
            if ch.t < time_param * Self::TIME_GUARD {
                ch.x += self.sqrt_delta * r * noise * range;
                ch.x += args.sample_time * (range + offset - ch.x) / (time_param - ch.t);
                ch.x = dsp::clamp(ch.x, offset, range + offset);
            } else {
                ch.x = range + offset;
            }
            out.set_voltage(c, ch.x);
        }
        outputs.set(Self::SIG_OUTPUT, out);
    }

    fn reset(&mut self) {
        for ch in &mut self.chan {
            *ch = BridgeChannel::default();
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
        "brownian_bridge"
    }
}

/// The oldest Brownian-bridge variant, preserved as a distinct module.
///
/// Differences from [`BrownianBridge`]: knob-only parameters (a linear time
/// knob, no CV inputs), elapsed time capped at `0.99 * T` instead of the
/// tighter guard, the drift step always applied, the noise term not scaled by
/// range, and the output amplified by 5. Monophonic. State is per instance,
/// so two copies of the module never interfere.
pub struct BrownianBridgeClassic<R: NoiseSource = Rng> {
    x: f64,
    t: f64,
    max_time: f64,
    trigger: SchmittTrigger,
    sqrt_delta: f64,
    noise: R,
    params: crate::port::Params,
    spec: PortSpec,
}

impl BrownianBridgeClassic {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_noise(sample_rate, Rng::from_system_time())
    }
}

impl<R: NoiseSource> BrownianBridgeClassic<R> {
    pub const NOISE_PARAM: ParamId = 0;
    pub const RANGE_PARAM: ParamId = 1;
    pub const OFFSET_PARAM: ParamId = 2;
    pub const TIME_PARAM: ParamId = 3;

    pub const TRIG_INPUT: PortId = 0;

    pub const SIG_OUTPUT: PortId = 10;

    const TIME_GUARD: f64 = 0.99;

    pub fn with_noise(sample_rate: f64, noise: R) -> Self {
        Self {
            x: 0.0,
            t: 0.0,
            max_time: 5.0,
            trigger: SchmittTrigger::default(),
            sqrt_delta: 1.0 / sample_rate.sqrt(),
            noise,
            params: crate::port::Params::new(vec![
                ParamDef::new(Self::NOISE_PARAM, 0.0, 1.0, 0.0, "Noise level"),
                ParamDef::new(Self::RANGE_PARAM, 0.0, 10.0, 5.0, "Range"),
                ParamDef::new(Self::OFFSET_PARAM, -5.0, 5.0, 0.0, "Offset"),
                ParamDef::new(Self::TIME_PARAM, 0.1, 5.0, 1.0, "Time"),
            ]),
            spec: PortSpec {
                inputs: vec![PortDef::new(Self::TRIG_INPUT, "trig", SignalKind::Trigger)],
                outputs: vec![PortDef::new(Self::SIG_OUTPUT, "sig", SignalKind::CvBipolar)],
            },
        }
    }
}

impl<R: NoiseSource> PolyModule for BrownianBridgeClassic<R> {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, args: &ProcessArgs, inputs: &PortValues, outputs: &mut PortValues) {
        let range = self.params.get(Self::RANGE_PARAM);
        let offset = self.params.get(Self::OFFSET_PARAM);
        let noise = self.params.get(Self::NOISE_PARAM);
        let time_param = self.params.get(Self::TIME_PARAM);

        let fired = self.trigger.process(inputs.poly(Self::TRIG_INPUT).voltage_sum());
        if fired || time_param != self.max_time {
            self.t = 0.0;
            self.x = offset;
            self.max_time = time_param;
        }

        let r = self.noise.normal();
        self.t += args.sample_time;
        self.t = dsp::clamp(self.t, 0.0, time_param * Self::TIME_GUARD);
        self.x += self.sqrt_delta * r * noise;
        self.x += args.sample_time * (range + offset - self.x) / (time_param - self.t);
        self.x = dsp::clamp(self.x, offset, range + offset);

        outputs.set_mono(Self::SIG_OUTPUT, 5.0 * self.x);
    }

    fn reset(&mut self) {
        self.x = 0.0;
        self.t = 0.0;
        self.max_time = 5.0;
        self.trigger.reset();
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
        "brownian_bridge_classic"
    }
}
