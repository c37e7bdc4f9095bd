//! The external inference solver boundary.
//!
//! The engine never computes expected utilities itself. It prepares a
//! network until it meets the solver preconditions (no empty CPTs, exactly
//! one decision and one utility node, acyclic by construction) and then
//! hands it, read-only, to a [`Solver`] together with an optional
//! [`Evidence`] assignment. The solver is a synchronous pure function; no
//! timeout is imposed here.

use crate::network::{DecisionNet, NodeKind, ReconcileError};

/// An evidence assignment: a subset of chance or decision variables fixed
/// to one of their labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    entries: Vec<(String, String)>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entry addition.
    pub fn with(mut self, node: impl Into<String>, label: impl Into<String>) -> Self {
        self.entries.push((node.into(), label.into()));
        self
    }

    pub fn set(&mut self, node: impl Into<String>, label: impl Into<String>) {
        self.entries.push((node.into(), label.into()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The solver's answer to a maximum-expected-utility query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeuEstimate {
    /// Mean expected utility over the randomness remaining after evidence.
    pub mean: f64,
    /// Variance of the expected utility, where the solver supports it.
    pub variance: Option<f64>,
}

/// The inference solver contract.
///
/// Implementations receive a fully specified network and evidence, and
/// return the maximum expected utility. The engine guarantees the
/// preconditions of [`ensure_solvable`] before every invocation.
pub trait Solver {
    /// Maximum expected utility of the network under the given evidence.
    fn max_expected_utility(
        &self,
        net: &DecisionNet,
        evidence: &Evidence,
    ) -> Result<MeuEstimate, ReconcileError>;

    /// Expected utility per decision option, in the decision node's declared
    /// label order.
    ///
    /// The provided implementation issues one MEU query per option with the
    /// decision clamped as evidence; solvers with a native posterior query
    /// may override it.
    fn decision_posterior(&self, net: &DecisionNet) -> Result<Vec<f64>, ReconcileError> {
        let decision = net.decision_node()?;
        let name = decision.var.name().to_string();
        let labels = decision.var.labels().to_vec();

        let mut posterior = Vec::with_capacity(labels.len());
        for label in labels {
            let evidence = Evidence::new().with(name.clone(), label);
            posterior.push(self.max_expected_utility(net, &evidence)?.mean);
        }
        Ok(posterior)
    }
}

/// Checks the solver preconditions the engine promises to uphold: exactly
/// one decision node, exactly one utility node, and no empty CPT.
///
/// Empty CPTs are a precondition failure (the caller skipped a synthesis
/// step), while a missing or duplicated decision or utility node is
/// structural.
pub fn ensure_solvable(net: &DecisionNet) -> Result<(), ReconcileError> {
    net.decision_node()?;
    net.utility_node()?;
    if net.has_empty_cpts() {
        return Err(ReconcileError::Precondition(
            "network has empty CPTs; fill or synthesize them before evaluation".into(),
        ));
    }
    Ok(())
}

/// Validates a caller-supplied evidence assignment against a network:
/// every entry must name an existing chance or decision node, assign it at
/// most once, and use one of its labels.
pub fn validate_evidence(
    net: &DecisionNet,
    evidence: &Evidence,
) -> Result<(), ReconcileError> {
    for (i, (node, label)) in evidence.entries().iter().enumerate() {
        let data = net.node_by_name(node).ok_or_else(|| {
            ReconcileError::Lookup(format!("evidence names unknown node '{}'", node))
        })?;
        if data.kind == NodeKind::Utility {
            return Err(ReconcileError::Structural(format!(
                "evidence cannot be set on utility node '{}'",
                node
            )));
        }
        if evidence.entries()[..i].iter().any(|(n, _)| n == node) {
            return Err(ReconcileError::Consistency(format!(
                "evidence assigns node '{}' more than once",
                node
            )));
        }
        data.var.label_index(label)?;
    }
    Ok(())
}
