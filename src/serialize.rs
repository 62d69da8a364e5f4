//! Serialization and Persistence
//!
//! Snapshot and restore of module instances: parameter values plus any
//! module-specific state (currently only the Rossler integration-mode flag),
//! and a registry for instantiating modules by type ID.

use crate::chaos::{Dynamo, RosslerRustler};
use crate::markov::{GuildensTurn, Rosenchance};
use crate::port::{ParamId, PolyModule, PortSpec};
use crate::stochastic::{BrownianBridge, BrownianBridgeClassic, Iou, OrnsteinUhlenbeck};
use crate::swarm::{Firefly, Warbler};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable module definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Unique instance name
    pub name: String,

    /// Module type identifier
    pub module_type: String,

    /// Parameter values by ID
    pub params: HashMap<ParamId, f64>,

    /// Module-specific state
    pub state: Option<serde_json::Value>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_type: module_type.into(),
            params: HashMap::new(),
            state: None,
        }
    }

    /// Capture a module instance's full persisted state
    pub fn snapshot(name: impl Into<String>, module: &dyn PolyModule) -> Self {
        Self {
            name: name.into(),
            module_type: module.type_id().to_string(),
            params: module
                .params()
                .iter()
                .map(|d| (d.id, module.get_param(d.id)))
                .collect(),
            state: module.serialize_state(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    UnknownModuleType(String),
}

impl std::fmt::Display for RestoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreError::UnknownModuleType(t) => write!(f, "Unknown module type: {}", t),
        }
    }
}

impl std::error::Error for RestoreError {}

/// Module factory function type
pub type ModuleFactory = Box<dyn Fn(f64) -> Box<dyn PolyModule> + Send + Sync>;

/// Metadata about a registered module type
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub type_id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub port_spec: PortSpec,
}

/// Registry of available module types for instantiation
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
    metadata: HashMap<String, ModuleMetadata>,
}

impl ModuleRegistry {
    /// Create a new registry with all built-in generators
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
            metadata: HashMap::new(),
        };

        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register_factory(
            "ornstein_uhlenbeck",
            "Ornstein-Uhlenbeck",
            "Random Walks",
            "Mean-reverting noise walk with trigger reset",
            |sr| Box::new(OrnsteinUhlenbeck::new(sr)),
        );

        self.register_factory(
            "iou",
            "Integrated OU",
            "Random Walks",
            "Noise, OU, and integrated-OU outputs with external mix",
            |sr| Box::new(Iou::new(sr)),
        );

        self.register_factory(
            "brownian_bridge",
            "Brownian Bridge",
            "Random Walks",
            "Noise walk pinned to reach a target by a time horizon",
            |sr| Box::new(BrownianBridge::new(sr)),
        );

        self.register_factory(
            "brownian_bridge_classic",
            "Brownian Bridge Classic",
            "Random Walks",
            "Classic monophonic bridge with its looser time guard",
            |sr| Box::new(BrownianBridgeClassic::new(sr)),
        );

        self.register_factory(
            "rossler_rustler",
            "Rossler Rustler",
            "Chaos",
            "Rossler attractor at audio rate with pitch-scaled integration",
            |sr| Box::new(RosslerRustler::new(sr)),
        );

        self.register_factory(
            "dynamo",
            "Dynamo",
            "Chaos",
            "Input-forced chaotic system with soft saturation",
            |sr| Box::new(Dynamo::new(sr)),
        );

        self.register_factory(
            "firefly",
            "Firefly",
            "Oscillator Banks",
            "Five phase-coupled wavetable oscillators",
            |sr| Box::new(Firefly::new(sr)),
        );

        self.register_factory(
            "warbler",
            "Warbler",
            "Oscillator Banks",
            "Eight detuned limit-cycle partials with noise drift",
            |sr| Box::new(Warbler::new(sr)),
        );

        self.register_factory(
            "rosenchance",
            "Rosenchance",
            "State Machines",
            "Two-state probabilistic emitter",
            |sr| Box::new(Rosenchance::new(sr)),
        );

        self.register_factory(
            "guildensturn",
            "GuildensTurn",
            "State Machines",
            "Four-state ring walk routing one of four inputs",
            |sr| Box::new(GuildensTurn::new(sr)),
        );
    }

    /// Register a module factory with metadata
    pub fn register_factory<F>(
        &mut self,
        type_id: &str,
        name: &str,
        category: &str,
        description: &str,
        factory: F,
    ) where
        F: Fn(f64) -> Box<dyn PolyModule> + Send + Sync + 'static,
    {
        // Port spec from a temporary instance
        let temp_instance = factory(44100.0);
        let port_spec = temp_instance.port_spec().clone();

        self.factories
            .insert(type_id.to_string(), Box::new(factory));

        self.metadata.insert(
            type_id.to_string(),
            ModuleMetadata {
                type_id: type_id.to_string(),
                name: name.to_string(),
                category: category.to_string(),
                description: description.to_string(),
                port_spec,
            },
        );
    }

    /// Instantiate a module by type ID
    pub fn instantiate(&self, type_id: &str, sample_rate: f64) -> Option<Box<dyn PolyModule>> {
        self.factories.get(type_id).map(|f| f(sample_rate))
    }

    /// Instantiate from a definition, applying saved parameters and state
    pub fn restore(
        &self,
        def: &ModuleDef,
        sample_rate: f64,
    ) -> Result<Box<dyn PolyModule>, RestoreError> {
        let mut module = self
            .instantiate(&def.module_type, sample_rate)
            .ok_or_else(|| RestoreError::UnknownModuleType(def.module_type.clone()))?;

        for (&id, &value) in &def.params {
            module.set_param(id, value);
        }
        if let Some(state) = &def.state {
            module.deserialize_state(state);
        }
        Ok(module)
    }

    /// List all registered module types
    pub fn list_modules(&self) -> impl Iterator<Item = &ModuleMetadata> {
        self.metadata.values()
    }

    /// Get metadata for a specific module type
    pub fn get_metadata(&self, type_id: &str) -> Option<&ModuleMetadata> {
        self.metadata.get(type_id)
    }

    /// List modules in a specific category
    pub fn list_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a ModuleMetadata> {
        self.metadata
            .values()
            .filter(move |m| m.category == category)
    }

    /// Get all unique categories
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<_> = self.metadata.values().map(|m| m.category.clone()).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
