//! Structural reconciliation between two decision networks.
//!
//! The reconciler aligns two independently authored networks so that
//! cross-network transfer, blending, and comparison are well-defined:
//! node transfer with transitive parent seeding, decision-option merging,
//! arc mirroring per node kind, and pruning of unshared utility parents.
//!
//! Every primitive is idempotent: once the structures match, repeating the
//! operation is a no-op. No-op outcomes are reported through status values,
//! never swallowed. Cross-network operations address nodes by name; ids stay
//! local to each arena.

mod arcs;

pub use arcs::{
    mirror_chance_arcs, mirror_decision_arcs, mirror_utility_arcs,
    prune_unshared_utility_arcs,
};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::network::{Cpt, DecisionNet, NodeKind, ReconcileError};
use crate::synth;

/// Whether a transfer found its node already in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The node was copied into the target.
    Transferred,
    /// The node was already present; only structure and tables were synced.
    AlreadyPresent,
}

/// What a [`transfer_chance_node`] call did to the target network.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    /// Parents newly introduced into the target, in source order.
    pub added_parents: Vec<String>,
    /// Arcs added to the target (parent arcs of the transferred node).
    pub arcs_added: usize,
}

/// Copies a named chance node from `source` into `target`, preserving its
/// parent relationships.
///
/// Parents missing from the target are introduced transitively: chance
/// parents are seeded with a uniform CPT, decision parents are copied as-is.
/// Parent arcs present in the target but absent in the source are removed,
/// then the node's CPT is copied row by row, matched by label, so parent
/// declaration order may differ between the two networks.
///
/// Utility nodes are never transferred; each network keeps its own.
pub fn transfer_chance_node(
    name: &str,
    source: &DecisionNet,
    target: &mut DecisionNet,
) -> Result<TransferOutcome, ReconcileError> {
    if !source.is_chance(name) {
        return Err(ReconcileError::Structural(format!(
            "cannot transfer '{}': expected a chance node in the source network",
            name
        )));
    }

    let status = if target.exists(name) {
        TransferStatus::AlreadyPresent
    } else {
        let var = source
            .node_by_name(name)
            .expect("source chance node exists")
            .var
            .clone();
        target.add_chance_node(var)?;
        debug!(node = name, "transferred chance node");
        TransferStatus::Transferred
    };

    // Drop target parent arcs the source does not have, so the CPT shapes
    // can line up.
    for parent in target.parent_names(name)? {
        if !source.exists(&parent) || !source.arc_exists(&parent, name) {
            target.remove_arc(&parent, name)?;
            debug!(node = name, parent = parent.as_str(), "dropped stale parent arc");
        }
    }

    let mut added_parents = Vec::new();
    let mut arcs_added = 0;
    for parent in source.parent_names(name)? {
        if !target.exists(&parent) {
            let parent_node = source.node_by_name(&parent).expect("source parent exists");
            match parent_node.kind {
                NodeKind::Chance => {
                    target.add_chance_node(parent_node.var.clone())?;
                    synth::fill_uniform_cpt(target, &parent)?;
                }
                NodeKind::Decision => {
                    target.add_decision_node(parent_node.var.clone())?;
                }
                NodeKind::Utility => {
                    return Err(ReconcileError::Structural(format!(
                        "parent '{}' of '{}' is neither a decision nor a chance node",
                        parent, name
                    )));
                }
            }
            debug!(node = name, parent = parent.as_str(), "introduced missing parent");
            added_parents.push(parent.clone());
        }
        if !target.arc_exists(&parent, name) {
            target.add_arc(&parent, name)?;
            arcs_added += 1;
        }
    }

    let source_cpt = source.cpt(name)?;
    let mut copied = target.cpt(name)?.clone();
    copy_cpt_by_label(source_cpt, &mut copied)?;
    *target.cpt_mut(name)? = copied;

    Ok(TransferOutcome {
        status,
        added_parents,
        arcs_added,
    })
}

/// Merges the peer's decision options into `target`'s decision node.
///
/// Options present in `source` but absent in `target` are appended after the
/// existing options, preserving both networks' declared orders. Child CPT
/// rows for pre-existing options are untouched (the rebuild is additive and
/// keyed by label); rows for the appended options are left zero-filled for
/// the synthesizer or explicit caller data.
///
/// Returns the appended options. An empty result means the option sets
/// already matched and nothing changed.
pub fn merge_decision_options(
    source: &DecisionNet,
    target: &mut DecisionNet,
) -> Result<Vec<String>, ReconcileError> {
    let source_options = source.decision_node()?.var.labels().to_vec();
    let target_decision = target.decision_node()?.var.name().to_string();
    let target_options = target.decision_node()?.var.labels().to_vec();

    let missing: Vec<String> = source_options
        .into_iter()
        .filter(|o| !target_options.contains(o))
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }
    debug!(decision = target_decision.as_str(), added = ?missing, "merged decision options");
    target.extend_decision_options(&target_decision, &missing)?;
    Ok(missing)
}

/// Names present in `source` but absent from `target`, excluding utility
/// nodes, in source declaration order.
pub fn unmatched_nodes(source: &DecisionNet, target: &DecisionNet) -> Vec<String> {
    source
        .names()
        .into_iter()
        .filter(|n| !source.is_utility(n) && !target.exists(n))
        .collect()
}

/// Utility parents shared by both networks, in `a`'s arc order.
pub fn matched_utility_parents(
    a: &DecisionNet,
    b: &DecisionNet,
) -> Result<Vec<String>, ReconcileError> {
    let a_parents = a.parent_names(a.utility_node()?.var.name())?;
    let b_parents = b.parent_names(b.utility_node()?.var.name())?;
    Ok(a_parents
        .into_iter()
        .filter(|p| b_parents.contains(p))
        .collect())
}

/// Utility parents of `a` that `b` lacks, in `a`'s arc order.
pub fn unmatched_utility_parents(
    a: &DecisionNet,
    b: &DecisionNet,
) -> Result<Vec<String>, ReconcileError> {
    let a_parents = a.parent_names(a.utility_node()?.var.name())?;
    let b_parents = b.parent_names(b.utility_node()?.var.name())?;
    Ok(a_parents
        .into_iter()
        .filter(|p| !b_parents.contains(p))
        .collect())
}

/// Transfers a sampled fraction of the source's unmatched chance nodes.
///
/// `exchange_level` is the fraction of unmatched nodes to move, in [0, 1];
/// level 1.0 transfers every unmatched chance node deterministically, lower
/// levels sample without replacement from the caller-seeded `rng`.
///
/// Returns the transferred node names.
pub fn transfer_nodes_sampled(
    source: &DecisionNet,
    target: &mut DecisionNet,
    exchange_level: f64,
    rng: &mut impl Rng,
) -> Result<Vec<String>, ReconcileError> {
    if !(0.0..=1.0).contains(&exchange_level) {
        return Err(ReconcileError::Consistency(format!(
            "exchange level must be in [0, 1], got {}",
            exchange_level
        )));
    }
    let candidates: Vec<String> = unmatched_nodes(source, target)
        .into_iter()
        .filter(|n| source.is_chance(n))
        .collect();

    let chosen: Vec<String> = if exchange_level >= 1.0 {
        candidates
    } else {
        let count = (candidates.len() as f64 * exchange_level) as usize;
        candidates
            .choose_multiple(rng, count)
            .cloned()
            .collect()
    };

    for node in &chosen {
        transfer_chance_node(node, source, target)?;
    }
    debug!(count = chosen.len(), level = exchange_level, "sampled node transfer");
    Ok(chosen)
}

/// Reseeds the named nodes' CPTs in `target` from the source's tables with
/// Gaussian noise, so transferred beliefs are close to the peer's without
/// being exact copies.
///
/// Nodes that are not chance nodes in the source, or absent from the target,
/// are skipped. Returns the number of CPTs rewritten.
pub fn seed_cpts_with_noise(
    source: &DecisionNet,
    target: &mut DecisionNet,
    nodes: &[String],
    noise_factor: f64,
    rng: &mut impl Rng,
) -> Result<usize, ReconcileError> {
    let mut seeded = 0;
    for node in nodes {
        if !source.is_chance(node) || !target.exists(node) {
            warn!(node = node.as_str(), "skipping node not eligible for noisy seeding");
            continue;
        }
        let noisy = synth::perturb_cpt(source.cpt(node)?, noise_factor, rng)?;
        let mut copied = target.cpt(node)?.clone();
        copy_cpt_by_label(&noisy, &mut copied)?;
        *target.cpt_mut(node)? = copied;
        seeded += 1;
    }
    Ok(seeded)
}

/// Copies every row of `src` into `dst`, matching parents and child states
/// by label so declaration order may differ.
///
/// The two tables must agree on the child domain and on each parent's
/// domain as a set; any difference is a shape mismatch.
pub(crate) fn copy_cpt_by_label(src: &Cpt, dst: &mut Cpt) -> Result<(), ReconcileError> {
    if !same_label_set(src.child_labels(), dst.child_labels()) {
        return Err(ReconcileError::Consistency(
            "CPT copy: child domains differ".into(),
        ));
    }
    if src.parents().len() != dst.parents().len() {
        return Err(ReconcileError::Consistency(format!(
            "CPT copy: source has {} parents, target has {}",
            src.parents().len(),
            dst.parents().len()
        )));
    }
    for dim in dst.parents() {
        let src_dim = src
            .parents()
            .iter()
            .find(|p| p.name == dim.name)
            .ok_or_else(|| {
                ReconcileError::Consistency(format!(
                    "CPT copy: target parent '{}' missing from source",
                    dim.name
                ))
            })?;
        if !same_label_set(&src_dim.labels, &dim.labels) {
            return Err(ReconcileError::Consistency(format!(
                "CPT copy: parent '{}' domains differ",
                dim.name
            )));
        }
    }

    let dst_parent_names: Vec<String> =
        dst.parents().iter().map(|p| p.name.clone()).collect();
    let src_child = src.child_labels().to_vec();
    let dst_child = dst.child_labels().to_vec();

    for key in dst.assignment_keys() {
        let assignment: Vec<(&str, &str)> = dst_parent_names
            .iter()
            .zip(key.iter())
            .map(|(n, l)| (n.as_str(), l.as_str()))
            .collect();
        let src_row = src.row(&assignment)?;
        let row: Vec<f64> = dst_child
            .iter()
            .map(|label| {
                let idx = src_child
                    .iter()
                    .position(|l| l == label)
                    .expect("child domains checked equal");
                src_row[idx]
            })
            .collect();
        dst.set_row(&assignment, &row)?;
    }
    Ok(())
}

fn same_label_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|l| b.contains(l))
}
