//! Arc mirroring between two networks.
//!
//! After node transfer the two networks share variables but may still
//! disagree on which arcs connect them. Mirroring copies arcs from a source
//! network into a target wherever both endpoints exist, split by the kind of
//! the child node so each pass has one concern. An addition that would close
//! a directed cycle in the target is rejected by the arc layer and the error
//! propagates; mirroring never forces an arc in.

use tracing::debug;

use crate::network::{DecisionNet, ReconcileError};

/// Mirrors arcs whose child is a chance node.
///
/// For every chance node present in both networks, each of its source
/// parents that also exists in the target gains an arc there. Child tables
/// grow through the arc layer as usual. Returns the number of arcs added.
pub fn mirror_chance_arcs(
    source: &DecisionNet,
    target: &mut DecisionNet,
) -> Result<usize, ReconcileError> {
    let mut added = 0;
    for node in source.chance_node_names() {
        if !target.is_chance(&node) {
            continue;
        }
        for parent in source.parent_names(&node)? {
            if target.exists(&parent) && !target.arc_exists(&parent, &node) {
                target.add_arc(&parent, &node)?;
                debug!(parent = parent.as_str(), child = node.as_str(), "mirrored chance arc");
                added += 1;
            }
        }
    }
    Ok(added)
}

/// Mirrors arcs incident to the decision node, in both directions.
///
/// The two decision nodes are matched by kind, not by name, since each
/// network names its own. Informational parents of the source decision that
/// exist in the target become parents of the target decision, and children
/// of the source decision that exist in the target gain an arc from the
/// target decision, extending their tables with the target decision's
/// options. Returns the number of arcs added.
pub fn mirror_decision_arcs(
    source: &DecisionNet,
    target: &mut DecisionNet,
) -> Result<usize, ReconcileError> {
    let source_decision = source.decision_node()?.var.name().to_string();
    let target_decision = target.decision_node()?.var.name().to_string();

    let mut added = 0;
    for parent in source.parent_names(&source_decision)? {
        if target.exists(&parent) && !target.arc_exists(&parent, &target_decision) {
            target.add_arc(&parent, &target_decision)?;
            debug!(parent = parent.as_str(), "mirrored decision parent arc");
            added += 1;
        }
    }
    for child in source.child_names(&source_decision)? {
        if target.exists(&child) && !target.arc_exists(&target_decision, &child) {
            target.add_arc(&target_decision, &child)?;
            debug!(child = child.as_str(), "mirrored decision child arc");
            added += 1;
        }
    }
    Ok(added)
}

/// Mirrors arcs whose child is the utility node.
///
/// The two utility nodes are matched by kind. Source utility parents present
/// in the target become parents of the target's utility node, extending its
/// table with replicated entries. Utility nodes have no children to mirror.
/// Returns the number of arcs added.
pub fn mirror_utility_arcs(
    source: &DecisionNet,
    target: &mut DecisionNet,
) -> Result<usize, ReconcileError> {
    let source_utility = source.utility_node()?.var.name().to_string();
    let target_utility = target.utility_node()?.var.name().to_string();

    let mut added = 0;
    for parent in source.parent_names(&source_utility)? {
        if target.exists(&parent) && !target.arc_exists(&parent, &target_utility) {
            target.add_arc(&parent, &target_utility)?;
            debug!(parent = parent.as_str(), "mirrored utility arc");
            added += 1;
        }
    }
    Ok(added)
}

/// Removes `net`'s utility arcs whose parent the peer's utility node lacks,
/// so both utility tables range over the same criteria before blending.
///
/// Returns the removed parent names, in `net`'s arc order.
pub fn prune_unshared_utility_arcs(
    net: &mut DecisionNet,
    peer: &DecisionNet,
) -> Result<Vec<String>, ReconcileError> {
    let utility = net.utility_node()?.var.name().to_string();
    let peer_parents = peer.parent_names(peer.utility_node()?.var.name())?;

    let mut removed = Vec::new();
    for parent in net.parent_names(&utility)? {
        if !peer_parents.contains(&parent) {
            net.remove_arc(&parent, &utility)?;
            debug!(parent = parent.as_str(), "pruned unshared utility arc");
            removed.push(parent);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Variable;

    fn var(name: &str, labels: &[&str]) -> Variable {
        Variable::new(name, labels.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn base_pair() -> (DecisionNet, DecisionNet) {
        let mut a = DecisionNet::new();
        a.add_decision_node(var("course", &["Course1", "Course2"])).unwrap();
        a.add_chance_node(var("difficulty", &["high", "low"])).unwrap();
        a.add_chance_node(var("grade", &["pass", "fail"])).unwrap();
        a.add_utility_node("UA").unwrap();
        a.add_arc("course", "difficulty").unwrap();
        a.add_arc("difficulty", "grade").unwrap();
        a.add_arc("grade", "UA").unwrap();

        let mut b = DecisionNet::new();
        b.add_decision_node(var("course", &["Course1", "Course2"])).unwrap();
        b.add_chance_node(var("difficulty", &["high", "low"])).unwrap();
        b.add_chance_node(var("grade", &["pass", "fail"])).unwrap();
        b.add_utility_node("UB").unwrap();
        b.add_arc("course", "difficulty").unwrap();
        b.add_arc("grade", "UB").unwrap();
        (a, b)
    }

    #[test]
    fn chance_arc_mirroring_fills_missing_arcs_only() {
        let (a, mut b) = base_pair();
        let added = mirror_chance_arcs(&a, &mut b).unwrap();
        assert_eq!(added, 1);
        assert!(b.arc_exists("difficulty", "grade"));

        // second pass is a no-op
        assert_eq!(mirror_chance_arcs(&a, &mut b).unwrap(), 0);
    }

    #[test]
    fn chance_arc_mirroring_skips_absent_endpoints() {
        let (mut a, mut b) = base_pair();
        a.add_chance_node(var("workload", &["high", "low"])).unwrap();
        a.add_arc("workload", "grade").unwrap();

        // workload does not exist in b, so its arc cannot be mirrored
        let added = mirror_chance_arcs(&a, &mut b).unwrap();
        assert_eq!(added, 1);
        assert!(!b.arc_exists("workload", "grade"));
    }

    #[test]
    fn decision_arcs_are_matched_across_differently_named_decisions() {
        let mut a = DecisionNet::new();
        a.add_decision_node(var("pick", &["x", "y"])).unwrap();
        a.add_chance_node(var("budget", &["high", "low"])).unwrap();
        a.add_utility_node("UA").unwrap();
        a.add_arc("budget", "pick").unwrap();

        let mut b = DecisionNet::new();
        b.add_decision_node(var("choose", &["x", "y"])).unwrap();
        b.add_chance_node(var("budget", &["high", "low"])).unwrap();
        b.add_utility_node("UB").unwrap();

        let added = mirror_decision_arcs(&a, &mut b).unwrap();
        assert_eq!(added, 1);
        assert!(b.arc_exists("budget", "choose"));
    }

    #[test]
    fn decision_child_arcs_are_mirrored_by_kind() {
        let mut a = DecisionNet::new();
        a.add_decision_node(var("pick", &["x", "y"])).unwrap();
        a.add_chance_node(var("budget", &["high", "low"])).unwrap();
        a.add_utility_node("UA").unwrap();
        a.add_arc("pick", "budget").unwrap();

        let mut b = DecisionNet::new();
        b.add_decision_node(var("choose", &["x", "y"])).unwrap();
        b.add_chance_node(var("budget", &["high", "low"])).unwrap();
        b.add_utility_node("UB").unwrap();

        let added = mirror_decision_arcs(&a, &mut b).unwrap();
        assert_eq!(added, 1);
        assert!(b.arc_exists("choose", "budget"));
        // budget's CPT grew a row per option of the target's own decision
        let cpt = b.cpt("budget").unwrap();
        assert_eq!(cpt.parents()[0].name, "choose");
        assert_eq!(cpt.assignment_keys().len(), 2);

        // second pass is a no-op
        assert_eq!(mirror_decision_arcs(&a, &mut b).unwrap(), 0);
    }

    #[test]
    fn utility_arc_mirroring_extends_target_table() {
        let (mut a, mut b) = base_pair();
        a.add_arc("difficulty", "UA").unwrap();

        let added = mirror_utility_arcs(&a, &mut b).unwrap();
        assert_eq!(added, 1);
        assert!(b.arc_exists("difficulty", "UB"));
        let parents: Vec<&str> = b
            .utility_table()
            .unwrap()
            .parents()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(parents, vec!["grade", "difficulty"]);
    }

    #[test]
    fn pruning_removes_only_unshared_utility_parents() {
        let (mut a, b) = base_pair();
        a.add_arc("difficulty", "UA").unwrap();

        let removed = prune_unshared_utility_arcs(&mut a, &b).unwrap();
        assert_eq!(removed, vec!["difficulty".to_string()]);
        assert!(a.arc_exists("grade", "UA"));
        assert!(!a.arc_exists("difficulty", "UA"));
    }

    #[test]
    fn pruning_is_idempotent() {
        let (mut a, b) = base_pair();
        a.add_arc("difficulty", "UA").unwrap();
        prune_unshared_utility_arcs(&mut a, &b).unwrap();
        let removed = prune_unshared_utility_arcs(&mut a, &b).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn mirroring_reports_would_be_cycles() {
        let mut a = DecisionNet::new();
        a.add_decision_node(var("d", &["x"])).unwrap();
        a.add_chance_node(var("p", &["t", "f"])).unwrap();
        a.add_chance_node(var("q", &["t", "f"])).unwrap();
        a.add_utility_node("UA").unwrap();
        a.add_arc("p", "q").unwrap();

        let mut b = DecisionNet::new();
        b.add_decision_node(var("d", &["x"])).unwrap();
        b.add_chance_node(var("p", &["t", "f"])).unwrap();
        b.add_chance_node(var("q", &["t", "f"])).unwrap();
        b.add_utility_node("UB").unwrap();
        b.add_arc("q", "p").unwrap();

        let err = mirror_chance_arcs(&a, &mut b).unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
    }
}
