//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::{
    consensus::{AdversaryKind, Order},
    error::ConfigError,
};

/// Default cap on relay-tree nodes per general.
pub const DEFAULT_MAX_TREE_NODES: u64 = 1 << 20;

fn default_max_tree_nodes() -> u64 {
    DEFAULT_MAX_TREE_NODES
}

/// One run of OM(m).
///
/// `traitors` holds one flag per general, commander first, so its length is
/// the number of generals. `recursion` is `m`, the number of relay rounds
/// after the commander's order. The protocol only guarantees agreement when
/// there are more than three times as many generals as traitors and `m`
/// equals the traitor count, but any `m` runs to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub order: Order,
    pub traitors: Vec<bool>,
    pub recursion: u32,
    #[serde(default)]
    pub adversary: AdversaryKind,
    #[serde(default = "default_max_tree_nodes")]
    pub max_tree_nodes: u64,
}

impl SimulationConfig {
    /// Configuration with `m` set to the number of traitors.
    pub fn new(order: Order, traitors: Vec<bool>) -> Self {
        let recursion = traitors.iter().filter(|&&traitor| traitor).count() as u32;
        SimulationConfig {
            order,
            traitors,
            recursion,
            adversary: AdversaryKind::default(),
            max_tree_nodes: DEFAULT_MAX_TREE_NODES,
        }
    }

    /// `loyal` honest lieutenants followed by `traitors` traitor lieutenants
    /// under a loyal commander.
    pub fn with_lieutenants(order: Order, loyal: usize, traitors: usize) -> Self {
        let mut flags = vec![false; 1 + loyal];
        flags.extend(std::iter::repeat(true).take(traitors));
        Self::new(order, flags)
    }

    pub fn with_recursion(mut self, recursion: u32) -> Self {
        self.recursion = recursion;
        self
    }

    pub fn with_adversary(mut self, adversary: AdversaryKind) -> Self {
        self.adversary = adversary;
        self
    }

    pub fn with_max_tree_nodes(mut self, max_tree_nodes: u64) -> Self {
        self.max_tree_nodes = max_tree_nodes;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generals(&self) -> usize {
        self.traitors.len()
    }

    pub fn lieutenants(&self) -> usize {
        self.traitors.len().saturating_sub(1)
    }

    pub fn traitor_count(&self) -> usize {
        self.traitors.iter().filter(|&&traitor| traitor).count()
    }

    pub fn commander_is_traitor(&self) -> bool {
        self.traitors.first().copied().unwrap_or(false)
    }

    /// `n > 3t` and `m == t`.
    pub fn safety_bound_holds(&self) -> bool {
        let traitors = self.traitor_count();
        self.generals() > 3 * traitors && self.recursion as usize == traitors
    }

    /// Relay rounds that can carry messages. A path never repeats a
    /// lieutenant, so nothing is relayed after round `k` for `k` lieutenants.
    pub fn rounds(&self) -> u32 {
        self.recursion.min(u32::try_from(self.lieutenants()).unwrap_or(u32::MAX))
    }

    /// Nodes in one lieutenant's finished tree: the root, then every ordered
    /// selection of up to `m` distinct lieutenants. Saturates at `u64::MAX`.
    pub fn estimated_tree_nodes(&self) -> u64 {
        let lieutenants = self.lieutenants() as u64;
        let mut total: u64 = 1;
        let mut level: u64 = 1;
        for hop in 0..u64::from(self.rounds()) {
            level = level.saturating_mul(lieutenants - hop);
            total = total.saturating_add(level);
        }
        total
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traitors.is_empty() {
            return Err(ConfigError::NoCommander);
        }
        if self.traitors.len() > u32::MAX as usize - 1 {
            return Err(ConfigError::TooManyGenerals(self.traitors.len()));
        }

        let estimated = self.estimated_tree_nodes();
        if estimated > self.max_tree_nodes {
            return Err(ConfigError::TreeTooLarge {
                lieutenants: self.lieutenants(),
                recursion: self.recursion,
                estimated,
                limit: self.max_tree_nodes,
            });
        }
        Ok(())
    }
}
