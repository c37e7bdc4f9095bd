//! Preference transfer and collective preference blending.
//!
//! A *preference map* is an ordered list of `(criterion, weight)` pairs,
//! each criterion naming a chance node that feeds the utility node. Applying
//! a preference map rewrites the network's utility table with the
//! weighted-linear synthesis, after renormalizing the weights to sum to 1
//! and wiring any missing criterion-to-utility arcs.
//!
//! Two agents' maps are merged by [`BlendedPreference`]: a convex
//! combination under a blend factor `alpha` over the union of their
//! criteria, computed once at construction and reused for every apply.

use tracing::debug;

use crate::network::{DecisionNet, ReconcileError};
use crate::synth::{self, PreferenceRow};

/// Per-rank utility increment used by preference transfer.
const UTILITY_INCREMENT: f64 = 100.0;

/// Rewrites the network's utility table from a preference map.
///
/// Every criterion must name an existing chance node; the arc from the
/// criterion to the utility node is added when missing, so a bare weight
/// assignment is enough to promote a chance node into a utility criterion.
/// Weights are renormalized to sum to 1 before synthesis. Utility parents
/// not named in the map keep a weight of 0.0, so their rank stops
/// influencing the payoff without their arc being disturbed.
pub fn transfer_preference(
    net: &mut DecisionNet,
    preferences: &[(String, f64)],
) -> Result<(), ReconcileError> {
    validate_preferences(preferences)?;

    for (criterion, _) in preferences {
        if !net.exists(criterion) {
            return Err(ReconcileError::Lookup(format!(
                "preference names unknown node '{}'",
                criterion
            )));
        }
        if !net.is_chance(criterion) {
            return Err(ReconcileError::Structural(format!(
                "preference criterion '{}' is not a chance node",
                criterion
            )));
        }
    }

    let utility = net.utility_node()?.var.name().to_string();
    for (criterion, _) in preferences {
        if !net.arc_exists(criterion, &utility) {
            net.add_arc(criterion, &utility)?;
            debug!(criterion = criterion.as_str(), "promoted criterion to utility parent");
        }
    }

    let total: f64 = preferences.iter().map(|(_, w)| w).sum();
    let rows: Vec<PreferenceRow> = net
        .utility_table()?
        .parents()
        .iter()
        .map(|dim| {
            let weight = preferences
                .iter()
                .find(|(name, _)| *name == dim.name)
                .map(|(_, w)| w / total)
                .unwrap_or(0.0);
            PreferenceRow::new(dim.name.clone(), weight, UTILITY_INCREMENT)
        })
        .collect();

    synth::weighted_linear_utility(net, &rows)
}

/// A convex combination of two agents' preference maps.
///
/// The combined weights cover the union of both maps' criteria, host
/// criteria first in their declared order, then peer-only criteria in the
/// peer's order. A criterion absent from one map contributes 0.0 from that
/// side. The combination is computed once at construction; applying it to
/// several networks reuses the same weights.
#[derive(Debug, Clone)]
pub struct BlendedPreference {
    alpha: f64,
    combined: Vec<(String, f64)>,
}

impl BlendedPreference {
    /// Blends `host` and `peer` maps under `alpha` in [0, 1]: each combined
    /// weight is `alpha * host + (1 - alpha) * peer`.
    ///
    /// `alpha = 1.0` reproduces the host's weights, `alpha = 0.0` the
    /// peer's.
    pub fn new(
        alpha: f64,
        host: &[(String, f64)],
        peer: &[(String, f64)],
    ) -> Result<Self, ReconcileError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ReconcileError::Consistency(format!(
                "blend factor must be in [0, 1], got {}",
                alpha
            )));
        }
        validate_preferences(host)?;
        validate_preferences(peer)?;

        let mut combined: Vec<(String, f64)> = Vec::with_capacity(host.len() + peer.len());
        for (criterion, host_weight) in host {
            let peer_weight = lookup(peer, criterion).unwrap_or(0.0);
            combined.push((
                criterion.clone(),
                alpha * host_weight + (1.0 - alpha) * peer_weight,
            ));
        }
        for (criterion, peer_weight) in peer {
            if lookup(host, criterion).is_none() {
                combined.push((criterion.clone(), (1.0 - alpha) * peer_weight));
            }
        }
        debug!(alpha, criteria = combined.len(), "blended preference maps");
        Ok(Self { alpha, combined })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The cached combined weights, host criteria first.
    pub fn weights(&self) -> &[(String, f64)] {
        &self.combined
    }

    /// Applies the combined map to a network via [`transfer_preference`].
    ///
    /// The network must already contain every combined criterion as a
    /// chance node; reconcile node transfer runs first in the usual
    /// pipeline.
    pub fn apply(&self, net: &mut DecisionNet) -> Result<(), ReconcileError> {
        transfer_preference(net, &self.combined)
    }
}

fn lookup(map: &[(String, f64)], criterion: &str) -> Option<f64> {
    map.iter()
        .find(|(name, _)| name == criterion)
        .map(|(_, w)| *w)
}

/// Shared well-formedness checks for a preference map: non-empty, no
/// duplicate criteria, finite non-negative weights with a positive sum.
fn validate_preferences(preferences: &[(String, f64)]) -> Result<(), ReconcileError> {
    if preferences.is_empty() {
        return Err(ReconcileError::Precondition(
            "preference map must not be empty".into(),
        ));
    }
    for (i, (criterion, weight)) in preferences.iter().enumerate() {
        if preferences[..i].iter().any(|(name, _)| name == criterion) {
            return Err(ReconcileError::Consistency(format!(
                "duplicate preference criterion '{}'",
                criterion
            )));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ReconcileError::Consistency(format!(
                "weight for '{}' must be finite and non-negative, got {}",
                criterion, weight
            )));
        }
    }
    let total: f64 = preferences.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Err(ReconcileError::Consistency(
            "preference weights must have a positive sum".into(),
        ));
    }
    Ok(())
}
