//! Decision network data model: nodes, arcs, tables, and errors.

pub mod errors;
pub mod graph;
pub mod table;

pub use errors::ReconcileError;
pub use graph::{Arc, DecisionNet, NodeData, NodeId, NodeKind, Variable};
pub use table::{Cpt, ParentDim, UtilityTable, ROW_SUM_TOLERANCE};
