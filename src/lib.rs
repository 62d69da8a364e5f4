//! # Aleator: Stochastic and Chaotic Signal Generators
//!
//! `aleator` is a library of randomness-driven signal generators for modular
//! synthesis hosts: mean-reverting noise walks, chaotic attractors run at
//! audio rate, coupled oscillator banks, and trigger-clocked probabilistic
//! state machines.
//!
//! ## Architecture
//!
//! Every generator implements the [`port::PolyModule`] trait: a per-sample
//! `tick` over named polyphonic voltage ports (up to 16 channels), knob-style
//! bounded parameters, an explicit sample-rate-change notification, and
//! optional key-value state persistence. The host owns the call schedule;
//! modules never block and complete each tick in bounded time.
//!
//! ## Module Families
//!
//! - **Random walks** ([`stochastic`]) - Ornstein-Uhlenbeck, integrated OU,
//!   and Brownian-bridge processes with Euler-Maruyama noise scaling
//! - **Chaos** ([`chaos`]) - Rossler-family attractors with pitch-scaled
//!   integration rate and soft saturation
//! - **Oscillator banks** ([`swarm`]) - phase-coupled wavetable swarms and
//!   detuned limit-cycle partials
//! - **State machines** ([`markov`]) - trigger-clocked Markov chains with
//!   probabilistic emission and signal routing
//!
//! ## Quick Start
//!
//! ```rust
//! use aleator::prelude::*;
//!
//! // A mean-reverting random walk at 44.1kHz
//! let mut walk = OrnsteinUhlenbeck::new(44100.0);
//! walk.set_param(OrnsteinUhlenbeck::<Rng>::NOISE_PARAM, 1.0);
//! walk.set_param(OrnsteinUhlenbeck::<Rng>::SPRING_PARAM, 2.0);
//!
//! let args = ProcessArgs::new(44100.0);
//! let inputs = PortValues::new();
//! let mut outputs = PortValues::new();
//!
//! for _ in 0..64 {
//!     walk.tick(&args, &inputs, &mut outputs);
//! }
//! let v = outputs.voltage(OrnsteinUhlenbeck::<Rng>::SIG_OUTPUT, 0);
//! assert!(v.is_finite());
//! ```

pub mod chaos;
pub mod dsp;
pub mod markov;
pub mod port;
pub mod rng;
pub mod serialize;
pub mod stochastic;
pub mod swarm;

/// Prelude module for convenient imports
pub mod prelude {
    // Port system
    pub use crate::port::{
        ParamDef, ParamId, PolyModule, PolyValue, PortDef, PortId, PortSpec, PortValues,
        ProcessArgs, SignalKind, MAX_CHANNELS,
    };

    // Random walks
    pub use crate::stochastic::{BrownianBridge, BrownianBridgeClassic, Iou, OrnsteinUhlenbeck};

    // Chaotic engines
    pub use crate::chaos::{Dynamo, ProcMode, RosslerRustler};

    // Oscillator banks
    pub use crate::swarm::{Firefly, Warbler};

    // State machines
    pub use crate::markov::{GuildensTurn, Rosenchance};

    // Randomness
    pub use crate::rng::{NoiseSource, NormalBuffer, Rng, ScriptedNoise};

    // Serialization
    pub use crate::serialize::{ModuleDef, ModuleMetadata, ModuleRegistry, RestoreError};
}
