//! Oral messages simulation of the Byzantine Generals problem.
//!
//! A commander sends an order to its lieutenants, who relay what they heard
//! to each other for `m` synchronous rounds. Traitors may lie about what they
//! heard. Each loyal lieutenant then folds its relay tree by majority vote.
//! With more than three generals per traitor and `m` equal to the number of
//! traitors, every loyal lieutenant reaches the same decision, and that
//! decision is the commander's order whenever the commander is loyal.
//!
//! [`Simulation`] runs the rounds on the calling thread; [`run_mesh`] runs
//! one tokio task per lieutenant.

pub mod common;
pub mod config;
pub mod consensus;
pub mod error;
pub mod network;

pub use config::SimulationConfig;
pub use consensus::{AdversaryKind, GeneralId, Order, Outcome, Simulation};
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use network::{run_mesh, MeshRun};
