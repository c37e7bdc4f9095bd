//! Decision evaluation: per-option expected utilities and value of
//! evidence.
//!
//! The evaluator consumes a reconciled network read-only. All utility
//! numbers come from the external [`Solver`]; this module only orchestrates
//! queries and shapes the results for consensus classification.

pub mod consensus;
pub mod solver;

pub use consensus::{
    classify_by_rank, classify_by_threshold, ConsensusLevel, RankClassification,
    ThresholdClassification,
};
pub use solver::{ensure_solvable, validate_evidence, Evidence, MeuEstimate, Solver};

use std::cmp::Ordering;

use tracing::debug;

use crate::network::{DecisionNet, ReconcileError};

/// The change in maximum expected utility from observing one label of one
/// chance node.
#[derive(Debug, Clone, PartialEq)]
pub struct VoeEntry {
    pub node: String,
    pub label: String,
    /// Evidence-conditioned mean expected utility minus the base mean.
    pub delta: f64,
}

/// Expected utility of each decision option, in the decision node's
/// declared label order.
///
/// Each option is clamped as evidence in turn and the solver queried for
/// the mean expected utility of the remaining distribution. The result
/// feeds directly into [`classify_by_rank`] and [`classify_by_threshold`].
pub fn decision_utilities(
    net: &DecisionNet,
    solver: &impl Solver,
) -> Result<Vec<(String, f64)>, ReconcileError> {
    ensure_solvable(net)?;
    let decision = net.decision_node()?;
    let name = decision.var.name().to_string();
    let labels = decision.var.labels().to_vec();

    let mut utilities = Vec::with_capacity(labels.len());
    for label in labels {
        let evidence = Evidence::new().with(name.clone(), label.clone());
        let estimate = solver.max_expected_utility(net, &evidence)?;
        debug!(option = label.as_str(), mean = estimate.mean, "evaluated decision option");
        utilities.push((label, estimate.mean));
    }
    Ok(utilities)
}

/// Value of evidence for every chance node and every one of its labels.
///
/// The base mean expected utility with no evidence is computed once; each
/// entry's delta is the evidence-conditioned mean minus that base. Entries
/// are sorted by delta descending, so the first entry names the single
/// observation that would most improve the expected utility. Ties keep the
/// network's node order.
pub fn value_of_evidence(
    net: &DecisionNet,
    solver: &impl Solver,
) -> Result<Vec<VoeEntry>, ReconcileError> {
    ensure_solvable(net)?;
    let base = solver.max_expected_utility(net, &Evidence::new())?.mean;
    debug!(base, "computed base expected utility");

    let mut entries = Vec::new();
    for node in net.chance_node_names() {
        let labels = net
            .node_by_name(&node)
            .expect("chance node listed by the network")
            .var
            .labels()
            .to_vec();
        for label in labels {
            let evidence = Evidence::new().with(node.clone(), label.clone());
            let estimate = solver.max_expected_utility(net, &evidence)?;
            entries.push(VoeEntry {
                node: node.clone(),
                label,
                delta: estimate.mean - base,
            });
        }
    }
    entries.sort_by(|a, b| {
        b.delta.partial_cmp(&a.delta).unwrap_or(Ordering::Equal)
    });
    Ok(entries)
}
