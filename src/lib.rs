//! # Concord - Decision Network Reconciliation
//!
//! Concord aligns two independently authored decision networks (influence
//! diagrams) so two agents can compare, merge, and negotiate toward a joint
//! recommendation: node and option transfer, table synthesis for freshly
//! introduced structure, preference blending under a tunable factor, and
//! consensus classification over each agent's optimal decision.
//!
//! ## Architecture
//!
//! The system is organized into several modules:
//!
//! - **network**: Graph data model with typed nodes, arcs, and tables
//! - **synth**: Uniform, noise-perturbed, and weighted-linear table synthesis
//! - **reconcile**: Structural alignment of two networks
//! - **blend**: Preference transfer and collective preference blending
//! - **eval**: Solver boundary, decision evaluation, consensus classification
//!
//! Inference itself stays outside the crate: callers supply a [`Solver`]
//! and the engine guarantees its preconditions before every query.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use concord::{reconcile, blend::BlendedPreference, eval};
//!
//! reconcile::merge_decision_options(&advisor, &mut student)?;
//! reconcile::transfer_chance_node("career", &advisor, &mut student)?;
//!
//! let joint = BlendedPreference::new(0.5, &student_prefs, &advisor_prefs)?;
//! joint.apply(&mut student)?;
//!
//! let utilities = eval::decision_utilities(&student, &solver)?;
//! ```

#![forbid(unsafe_code)]

pub mod network;
pub mod synth;
pub mod reconcile;
pub mod blend;
pub mod eval;

// Re-export commonly used types
pub use blend::BlendedPreference;
pub use eval::{ConsensusLevel, Evidence, MeuEstimate, Solver};
pub use network::{DecisionNet, NodeId, NodeKind, ReconcileError, Variable};
