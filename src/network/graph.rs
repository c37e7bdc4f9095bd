//! Decision network data model.
//!
//! A [`DecisionNet`] is an arena of typed nodes (chance, decision, utility)
//! keyed by stable [`NodeId`]s with a name→id index, a directed arc list kept
//! acyclic at all times, and the tables attached to chance and utility nodes.
//!
//! Cross-network operations (reconciliation, blending) address nodes by name
//! and resolve to local ids internally; ids are never shared between two
//! networks.

use rustc_hash::FxHashMap;

use crate::network::errors::ReconcileError;
use crate::network::table::{Cpt, ParentDim, UtilityTable};

/// A unique identifier for a node within one network's arena.
///
/// Ids are stable for the lifetime of the node and are never reused across
/// networks.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// A named, finite discrete domain.
///
/// Label order is semantically meaningful: it fixes table row order and the
/// positional state index used by weighted-linear utility synthesis (the
/// first label is the "best" state).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    name: String,
    labels: Vec<String>,
}

impl Variable {
    /// Creates a variable. The domain must have at least one label and the
    /// labels must be distinct.
    pub fn new(
        name: impl Into<String>,
        labels: Vec<String>,
    ) -> Result<Self, ReconcileError> {
        let name = name.into();
        if labels.is_empty() {
            return Err(ReconcileError::Structural(format!(
                "variable '{}' must have at least one label",
                name
            )));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(ReconcileError::Structural(format!(
                    "variable '{}' has duplicate label '{}'",
                    name, label
                )));
            }
        }
        Ok(Self { name, labels })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Positional index of a label in the declared order.
    pub fn label_index(&self, label: &str) -> Result<usize, ReconcileError> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!(
                    "variable '{}' has no label '{}'",
                    self.name, label
                ))
            })
    }
}

/// The role a node plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Chance,
    Decision,
    Utility,
}

/// A node in the network: a variable tagged with its kind.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeData {
    pub id: NodeId,
    pub kind: NodeKind,
    pub var: Variable,
}

/// A directed arc between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arc {
    pub from: NodeId,
    pub to: NodeId,
}

/// A decision network: nodes, arcs, CPTs, and the utility table.
///
/// A well-formed network has exactly one decision node and exactly one
/// utility node; both are discovered by kind, not by name. The arc set is
/// kept acyclic by construction, and arc additions/removals keep the child
/// tables' parent dimensions in sync, so the network never carries a table
/// that disagrees with its structure.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionNet {
    nodes: Vec<NodeData>,
    node_index: FxHashMap<NodeId, usize>,
    name_index: FxHashMap<String, NodeId>,
    arcs: Vec<Arc>,
    cpts: FxHashMap<NodeId, Cpt>,
    utilities: FxHashMap<NodeId, UtilityTable>,
    next_id: u32,
}

impl DecisionNet {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_node(&mut self, kind: NodeKind, var: Variable) -> Result<NodeId, ReconcileError> {
        if self.name_index.contains_key(var.name()) {
            return Err(ReconcileError::Structural(format!(
                "node '{}' already exists",
                var.name()
            )));
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.node_index.insert(id, self.nodes.len());
        self.name_index.insert(var.name().to_string(), id);
        self.nodes.push(NodeData { id, kind, var });
        Ok(id)
    }

    /// Adds a chance node with a zero-filled, parentless CPT.
    pub fn add_chance_node(&mut self, var: Variable) -> Result<NodeId, ReconcileError> {
        let labels = var.labels().to_vec();
        let id = self.alloc_node(NodeKind::Chance, var)?;
        self.cpts.insert(id, Cpt::new(labels, Vec::new()));
        Ok(id)
    }

    /// Adds a decision node. Decision nodes carry no table; arcs into them
    /// are informational.
    pub fn add_decision_node(&mut self, var: Variable) -> Result<NodeId, ReconcileError> {
        self.alloc_node(NodeKind::Decision, var)
    }

    /// Adds a utility node with a zero-filled, parentless utility table.
    ///
    /// The node's domain is a singleton placeholder; the real payload is the
    /// table.
    pub fn add_utility_node(&mut self, name: impl Into<String>) -> Result<NodeId, ReconcileError> {
        let var = Variable::new(name, vec!["utility".to_string()])?;
        let id = self.alloc_node(NodeKind::Utility, var)?;
        self.utilities.insert(id, UtilityTable::new(Vec::new()));
        Ok(id)
    }

    /// Removes a node and all incident arcs in one operation.
    ///
    /// Tables of the removed node's children are updated to drop the parent
    /// dimension, so no dangling reference survives.
    pub fn remove_node(&mut self, name: &str) -> Result<(), ReconcileError> {
        let id = self.id_from_name(name)?;
        let incident: Vec<Arc> = self
            .arcs
            .iter()
            .copied()
            .filter(|a| a.from == id || a.to == id)
            .collect();
        for arc in incident {
            let from_name = self.node(arc.from).var.name().to_string();
            let to_name = self.node(arc.to).var.name().to_string();
            self.remove_arc(&from_name, &to_name)?;
        }
        self.cpts.remove(&id);
        self.utilities.remove(&id);
        self.name_index.remove(name);
        let idx = self.node_index.remove(&id).expect("indexed node");
        self.nodes.swap_remove(idx);
        if let Some(moved) = self.nodes.get(idx) {
            self.node_index.insert(moved.id, idx);
        }
        Ok(())
    }

    /// Looks up a node by id. Panics only on ids not minted by this arena,
    /// which callers cannot obtain through the public API.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[self.node_index[&id]]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodeData> {
        self.name_index.get(name).map(|id| self.node(*id))
    }

    /// Resolves a name to this arena's id.
    pub fn id_from_name(&self, name: &str) -> Result<NodeId, ReconcileError> {
        self.name_index
            .get(name)
            .copied()
            .ok_or_else(|| ReconcileError::Lookup(format!("no node named '{}'", name)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// The kind of a named node.
    pub fn kind(&self, name: &str) -> Result<NodeKind, ReconcileError> {
        Ok(self.node(self.id_from_name(name)?).kind)
    }

    pub fn is_chance(&self, name: &str) -> bool {
        matches!(self.node_by_name(name), Some(n) if n.kind == NodeKind::Chance)
    }

    pub fn is_decision(&self, name: &str) -> bool {
        matches!(self.node_by_name(name), Some(n) if n.kind == NodeKind::Decision)
    }

    pub fn is_utility(&self, name: &str) -> bool {
        matches!(self.node_by_name(name), Some(n) if n.kind == NodeKind::Utility)
    }

    /// All node names, in arena order.
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.var.name().to_string()).collect()
    }

    /// Names of all chance nodes, in arena order.
    pub fn chance_node_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Chance)
            .map(|n| n.var.name().to_string())
            .collect()
    }

    /// The single decision node. Zero or multiple decision nodes is a
    /// structural error.
    pub fn decision_node(&self) -> Result<&NodeData, ReconcileError> {
        self.unique_node_of_kind(NodeKind::Decision, "decision")
    }

    /// The single utility node. Zero or multiple utility nodes is a
    /// structural error.
    pub fn utility_node(&self) -> Result<&NodeData, ReconcileError> {
        self.unique_node_of_kind(NodeKind::Utility, "utility")
    }

    fn unique_node_of_kind(
        &self,
        kind: NodeKind,
        what: &str,
    ) -> Result<&NodeData, ReconcileError> {
        let mut found = None;
        for node in &self.nodes {
            if node.kind == kind {
                if found.is_some() {
                    return Err(ReconcileError::Structural(format!(
                        "network has more than one {} node",
                        what
                    )));
                }
                found = Some(node);
            }
        }
        found.ok_or_else(|| {
            ReconcileError::Structural(format!("network has no {} node", what))
        })
    }

    /// Parent ids of a node, in arc insertion order.
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.arcs
            .iter()
            .filter(|a| a.to == id)
            .map(|a| a.from)
            .collect()
    }

    /// Child ids of a node, in arc insertion order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.arcs
            .iter()
            .filter(|a| a.from == id)
            .map(|a| a.to)
            .collect()
    }

    /// Parent names of a named node, in arc insertion order.
    pub fn parent_names(&self, name: &str) -> Result<Vec<String>, ReconcileError> {
        let id = self.id_from_name(name)?;
        Ok(self
            .parents(id)
            .into_iter()
            .map(|p| self.node(p).var.name().to_string())
            .collect())
    }

    /// Child names of a named node, in arc insertion order.
    pub fn child_names(&self, name: &str) -> Result<Vec<String>, ReconcileError> {
        let id = self.id_from_name(name)?;
        Ok(self
            .children(id)
            .into_iter()
            .map(|c| self.node(c).var.name().to_string())
            .collect())
    }

    /// Whether an arc exists between two named nodes. False when either
    /// endpoint is absent.
    pub fn arc_exists(&self, from: &str, to: &str) -> bool {
        match (self.name_index.get(from), self.name_index.get(to)) {
            (Some(&f), Some(&t)) => self.arcs.iter().any(|a| a.from == f && a.to == t),
            _ => false,
        }
    }

    /// Adds a directed arc, keeping the child's table in sync.
    ///
    /// Fails on missing endpoints, self-loops, duplicate arcs, arcs out of a
    /// utility node, and additions that would create a directed cycle. The
    /// cycle check runs before any mutation, so a rejected addition leaves
    /// the network untouched.
    ///
    /// When the child is a chance or utility node, the new parent dimension
    /// is added to its table with existing rows replicated (see
    /// [`Cpt::add_parent`]).
    pub fn add_arc(&mut self, from: &str, to: &str) -> Result<(), ReconcileError> {
        let from_id = self.id_from_name(from)?;
        let to_id = self.id_from_name(to)?;
        if from_id == to_id {
            return Err(ReconcileError::Structural(format!(
                "self-loop on '{}' is not allowed",
                from
            )));
        }
        if self.node(from_id).kind == NodeKind::Utility {
            return Err(ReconcileError::Structural(format!(
                "utility node '{}' cannot have children",
                from
            )));
        }
        if self.arcs.iter().any(|a| a.from == from_id && a.to == to_id) {
            return Err(ReconcileError::Structural(format!(
                "arc {} -> {} already exists",
                from, to
            )));
        }
        if self.reaches(to_id, from_id) {
            return Err(ReconcileError::Structural(format!(
                "arc {} -> {} would create a cycle",
                from, to
            )));
        }

        let dim = ParentDim {
            name: from.to_string(),
            labels: self.node(from_id).var.labels().to_vec(),
        };
        match self.node(to_id).kind {
            NodeKind::Chance => {
                self.cpts
                    .get_mut(&to_id)
                    .expect("chance node has a CPT")
                    .add_parent(dim)?;
            }
            NodeKind::Utility => {
                self.utilities
                    .get_mut(&to_id)
                    .expect("utility node has a table")
                    .add_parent(dim)?;
            }
            NodeKind::Decision => {}
        }
        self.arcs.push(Arc { from: from_id, to: to_id });
        Ok(())
    }

    /// Removes a directed arc, dropping the parent dimension from the
    /// child's table (see [`Cpt::remove_parent`]).
    pub fn remove_arc(&mut self, from: &str, to: &str) -> Result<(), ReconcileError> {
        let from_id = self.id_from_name(from)?;
        let to_id = self.id_from_name(to)?;
        let pos = self
            .arcs
            .iter()
            .position(|a| a.from == from_id && a.to == to_id)
            .ok_or_else(|| {
                ReconcileError::Structural(format!("no arc {} -> {}", from, to))
            })?;
        match self.node(to_id).kind {
            NodeKind::Chance => {
                self.cpts
                    .get_mut(&to_id)
                    .expect("chance node has a CPT")
                    .remove_parent(from)?;
            }
            NodeKind::Utility => {
                self.utilities
                    .get_mut(&to_id)
                    .expect("utility node has a table")
                    .remove_parent(from)?;
            }
            NodeKind::Decision => {}
        }
        self.arcs.remove(pos);
        Ok(())
    }

    /// True if `target` is reachable from `start` by following arcs.
    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen: Vec<NodeId> = Vec::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            stack.extend(self.children(id));
        }
        false
    }

    /// Appends new option labels to the decision node's domain.
    ///
    /// This is the additive option rebuild: every child table gains
    /// zero-filled rows for the new options and keeps its existing rows by
    /// label, so no snapshot/restore step is needed. The node's identity,
    /// arcs, and existing label order are preserved.
    pub fn extend_decision_options(
        &mut self,
        name: &str,
        added: &[String],
    ) -> Result<(), ReconcileError> {
        let id = self.id_from_name(name)?;
        if self.node(id).kind != NodeKind::Decision {
            return Err(ReconcileError::Structural(format!(
                "'{}' is not a decision node",
                name
            )));
        }
        {
            let idx = self.node_index[&id];
            let var = &mut self.nodes[idx].var;
            for label in added {
                if var.labels.contains(label) {
                    return Err(ReconcileError::Structural(format!(
                        "decision node '{}' already has option '{}'",
                        name, label
                    )));
                }
                var.labels.push(label.clone());
            }
        }
        for child in self.children(id) {
            match self.node(child).kind {
                NodeKind::Chance => {
                    self.cpts
                        .get_mut(&child)
                        .expect("chance node has a CPT")
                        .extend_parent_domain(name, added)?;
                }
                NodeKind::Utility => {
                    self.utilities
                        .get_mut(&child)
                        .expect("utility node has a table")
                        .extend_parent_domain(name, added)?;
                }
                NodeKind::Decision => {}
            }
        }
        Ok(())
    }

    /// The CPT of a named chance node.
    pub fn cpt(&self, name: &str) -> Result<&Cpt, ReconcileError> {
        let id = self.id_from_name(name)?;
        self.cpts.get(&id).ok_or_else(|| {
            ReconcileError::Structural(format!("'{}' is not a chance node", name))
        })
    }

    /// Mutable access to the CPT of a named chance node.
    pub fn cpt_mut(&mut self, name: &str) -> Result<&mut Cpt, ReconcileError> {
        let id = self.id_from_name(name)?;
        self.cpts.get_mut(&id).ok_or_else(|| {
            ReconcileError::Structural(format!("'{}' is not a chance node", name))
        })
    }

    /// The utility node's table.
    pub fn utility_table(&self) -> Result<&UtilityTable, ReconcileError> {
        let id = self.utility_node()?.id;
        Ok(self.utilities.get(&id).expect("utility node has a table"))
    }

    /// Mutable access to the utility node's table.
    pub fn utility_table_mut(&mut self) -> Result<&mut UtilityTable, ReconcileError> {
        let id = self.utility_node()?.id;
        Ok(self
            .utilities
            .get_mut(&id)
            .expect("utility node has a table"))
    }

    /// True if any chance node's CPT is still all-zero.
    pub fn has_empty_cpts(&self) -> bool {
        self.cpts.values().any(Cpt::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, labels: &[&str]) -> Variable {
        Variable::new(name, labels.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn small_net() -> DecisionNet {
        let mut net = DecisionNet::new();
        net.add_decision_node(var("course", &["Course1", "Course2"])).unwrap();
        net.add_chance_node(var("difficulty", &["high", "medium", "low"])).unwrap();
        net.add_chance_node(var("grade", &[">C", "D", "F"])).unwrap();
        net.add_utility_node("StudentU").unwrap();
        net.add_arc("course", "difficulty").unwrap();
        net.add_arc("difficulty", "grade").unwrap();
        net.add_arc("grade", "StudentU").unwrap();
        net
    }

    #[test]
    fn variable_rejects_empty_and_duplicate_labels() {
        assert!(Variable::new("x", vec![]).is_err());
        assert!(Variable::new("x", vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let mut net = DecisionNet::new();
        net.add_chance_node(var("x", &["a"])).unwrap();
        let err = net.add_chance_node(var("x", &["b"])).unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
    }

    #[test]
    fn arc_to_missing_endpoint_is_rejected() {
        let mut net = DecisionNet::new();
        net.add_chance_node(var("x", &["a"])).unwrap();
        assert!(net.add_arc("x", "ghost").is_err());
        assert!(net.add_arc("ghost", "x").is_err());
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut net = DecisionNet::new();
        net.add_chance_node(var("x", &["a"])).unwrap();
        assert!(net.add_arc("x", "x").is_err());
    }

    #[test]
    fn cycle_is_rejected_and_network_unchanged() {
        let mut net = DecisionNet::new();
        net.add_chance_node(var("a", &["t", "f"])).unwrap();
        net.add_chance_node(var("b", &["t", "f"])).unwrap();
        net.add_chance_node(var("c", &["t", "f"])).unwrap();
        net.add_arc("a", "b").unwrap();
        net.add_arc("b", "c").unwrap();

        let err = net.add_arc("c", "a").unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
        assert!(!net.arc_exists("c", "a"));
        // the rejected parent never reached a's CPT
        assert!(net.cpt("a").unwrap().parents().is_empty());
    }

    #[test]
    fn arc_addition_extends_child_cpt() {
        let net = small_net();
        let cpt = net.cpt("difficulty").unwrap();
        assert_eq!(cpt.parents().len(), 1);
        assert_eq!(cpt.parents()[0].name, "course");
        assert_eq!(cpt.assignment_keys().len(), 2);
    }

    #[test]
    fn arc_into_utility_extends_utility_table() {
        let net = small_net();
        let table = net.utility_table().unwrap();
        assert_eq!(table.parents().len(), 1);
        assert_eq!(table.parents()[0].name, "grade");
    }

    #[test]
    fn utility_node_cannot_have_children() {
        let mut net = small_net();
        let err = net.add_arc("StudentU", "grade").unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
    }

    #[test]
    fn decision_and_utility_nodes_found_by_kind() {
        let net = small_net();
        assert_eq!(net.decision_node().unwrap().var.name(), "course");
        assert_eq!(net.utility_node().unwrap().var.name(), "StudentU");
    }

    #[test]
    fn missing_decision_node_is_a_structural_error() {
        let net = DecisionNet::new();
        assert!(matches!(
            net.decision_node().unwrap_err(),
            ReconcileError::Structural(_)
        ));
    }

    #[test]
    fn multiple_utility_nodes_is_a_structural_error() {
        let mut net = DecisionNet::new();
        net.add_utility_node("U1").unwrap();
        net.add_utility_node("U2").unwrap();
        assert!(matches!(
            net.utility_node().unwrap_err(),
            ReconcileError::Structural(_)
        ));
    }

    #[test]
    fn parent_and_child_queries_follow_arcs() {
        let net = small_net();
        assert_eq!(net.parent_names("grade").unwrap(), vec!["difficulty"]);
        assert_eq!(net.child_names("difficulty").unwrap(), vec!["grade"]);
        assert_eq!(net.parent_names("course").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn remove_node_clears_incident_arcs_and_tables() {
        let mut net = small_net();
        net.remove_node("difficulty").unwrap();
        assert!(!net.exists("difficulty"));
        assert!(!net.arc_exists("course", "difficulty"));
        assert!(!net.arc_exists("difficulty", "grade"));
        // grade lost its only parent; its CPT has a single unconditioned row
        assert!(net.cpt("grade").unwrap().parents().is_empty());
    }

    #[test]
    fn remove_arc_shrinks_child_table() {
        let mut net = small_net();
        net.remove_arc("difficulty", "grade").unwrap();
        assert!(net.cpt("grade").unwrap().parents().is_empty());
        assert!(!net.arc_exists("difficulty", "grade"));
    }

    #[test]
    fn extend_decision_options_preserves_existing_rows() {
        let mut net = small_net();
        net.cpt_mut("difficulty")
            .unwrap()
            .set_row(&[("course", "Course1")], &[0.6, 0.3, 0.1])
            .unwrap();
        net.extend_decision_options("course", &["Course3".to_string()]).unwrap();

        let node = net.node_by_name("course").unwrap();
        assert_eq!(node.var.labels(), &["Course1", "Course2", "Course3"]);
        let cpt = net.cpt("difficulty").unwrap();
        assert_eq!(cpt.row(&[("course", "Course1")]).unwrap(), &[0.6, 0.3, 0.1]);
        assert_eq!(cpt.row(&[("course", "Course3")]).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn extend_decision_options_rejects_non_decision_nodes() {
        let mut net = small_net();
        let err = net
            .extend_decision_options("grade", &["x".to_string()])
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
    }

    #[test]
    fn has_empty_cpts_reflects_fill_state() {
        let mut net = small_net();
        assert!(net.has_empty_cpts());
        net.cpt_mut("difficulty")
            .unwrap()
            .set_row(&[("course", "Course1")], &[0.6, 0.3, 0.1])
            .unwrap();
        // one filled row is not enough; other tables are still empty
        assert!(net.has_empty_cpts());
    }
}
