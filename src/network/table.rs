//! Conditional probability tables and utility tables.
//!
//! Tables are keyed by parent *label assignments* rather than positional
//! indices. A row key is the vector of chosen labels, one per parent, in the
//! table's declared parent order. Keying by label means rows survive additive
//! structural changes (a parent domain growing, a new parent appearing) and
//! can be copied between networks whose parents were declared in a different
//! order, with no snapshot/restore step.

use rustc_hash::FxHashMap;

use crate::network::errors::ReconcileError;

/// Tolerance for CPT row normalization checks.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// One parent dimension of a table: the parent's name and its ordered labels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParentDim {
    pub name: String,
    pub labels: Vec<String>,
}

/// A conditional probability table attached to a chance node.
///
/// Maps each joint parent assignment to a distribution over the child's own
/// labels. A freshly constructed table is zero-filled ("empty") and must be
/// filled before inference.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cpt {
    child_labels: Vec<String>,
    parents: Vec<ParentDim>,
    rows: FxHashMap<Vec<String>, Vec<f64>>,
}

impl Cpt {
    /// Creates a zero-filled CPT over the given child labels and parents.
    pub fn new(child_labels: Vec<String>, parents: Vec<ParentDim>) -> Self {
        let mut cpt = Self {
            child_labels,
            parents,
            rows: FxHashMap::default(),
        };
        let zero = vec![0.0; cpt.child_labels.len()];
        for key in cpt.assignment_keys() {
            cpt.rows.insert(key, zero.clone());
        }
        cpt
    }

    /// The child domain labels, in declared order.
    pub fn child_labels(&self) -> &[String] {
        &self.child_labels
    }

    /// The parent dimensions, in declared order.
    pub fn parents(&self) -> &[ParentDim] {
        &self.parents
    }

    /// Enumerates all row keys in declared label order (Cartesian product of
    /// parent domains, last parent varying fastest).
    ///
    /// A table with no parents has exactly one row, keyed by the empty
    /// assignment.
    pub fn assignment_keys(&self) -> Vec<Vec<String>> {
        cartesian_keys(&self.parents)
    }

    /// Resolves a caller assignment (`(parent, label)` pairs in any order)
    /// into this table's row key.
    ///
    /// Every parent must be assigned exactly once; unknown parent names and
    /// unknown labels are lookup errors, not silent defaults.
    fn resolve_key(&self, assignment: &[(&str, &str)]) -> Result<Vec<String>, ReconcileError> {
        resolve_key(&self.parents, assignment)
    }

    /// Returns the distribution row for a parent assignment.
    pub fn row(&self, assignment: &[(&str, &str)]) -> Result<&[f64], ReconcileError> {
        let key = self.resolve_key(assignment)?;
        self.rows
            .get(&key)
            .map(Vec::as_slice)
            .ok_or_else(|| ReconcileError::Lookup(format!("no CPT row for key {:?}", key)))
    }

    /// Sets the distribution row for a parent assignment.
    ///
    /// The row must have one entry per child label and contain only finite,
    /// non-negative values. Normalization is checked by [`Cpt::validate`],
    /// not here, so synthesis can build rows incrementally.
    pub fn set_row(
        &mut self,
        assignment: &[(&str, &str)],
        values: &[f64],
    ) -> Result<(), ReconcileError> {
        if values.len() != self.child_labels.len() {
            return Err(ReconcileError::Consistency(format!(
                "row has {} entries but child domain has {} labels",
                values.len(),
                self.child_labels.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ReconcileError::Consistency(
                "row entries must be finite and non-negative".into(),
            ));
        }
        let key = self.resolve_key(assignment)?;
        if !self.rows.contains_key(&key) {
            return Err(ReconcileError::Lookup(format!("no CPT row for key {:?}", key)));
        }
        self.rows.insert(key, values.to_vec());
        Ok(())
    }

    /// True if every entry in the table is still at its initial zero value.
    ///
    /// An empty table must be filled before it can reach a solver.
    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|row| row.iter().all(|v| *v == 0.0))
    }

    /// Checks the CPT invariant: every row sums to 1 within
    /// [`ROW_SUM_TOLERANCE`] and every entry lies in [0, 1].
    pub fn validate(&self) -> Result<(), ReconcileError> {
        for (key, row) in &self.rows {
            if row.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(ReconcileError::Consistency(format!(
                    "CPT row {:?} has an entry outside [0, 1]",
                    key
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ReconcileError::Consistency(format!(
                    "CPT row {:?} sums to {} instead of 1",
                    key, sum
                )));
            }
        }
        Ok(())
    }

    /// Adds a new parent dimension, replicating each existing row across the
    /// new parent's labels.
    ///
    /// Replication keeps previously valid rows row-stochastic; callers that
    /// have real data for the new dimension overwrite the rows afterwards.
    pub fn add_parent(&mut self, dim: ParentDim) -> Result<(), ReconcileError> {
        if self.parents.iter().any(|p| p.name == dim.name) {
            return Err(ReconcileError::Structural(format!(
                "parent '{}' already present in table",
                dim.name
            )));
        }
        let old_rows = std::mem::take(&mut self.rows);
        for (key, row) in old_rows {
            for label in &dim.labels {
                let mut new_key = key.clone();
                new_key.push(label.clone());
                self.rows.insert(new_key, row.clone());
            }
        }
        self.parents.push(dim);
        Ok(())
    }

    /// Removes a parent dimension.
    ///
    /// The surviving rows are those where the removed parent took its first
    /// label; the other slices are discarded. Callers removing a parent as
    /// part of a transfer overwrite the table immediately afterwards.
    pub fn remove_parent(&mut self, name: &str) -> Result<(), ReconcileError> {
        let pos = self
            .parents
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!("parent '{}' not present in table", name))
            })?;
        let first_label = self.parents[pos].labels[0].clone();
        let old_rows = std::mem::take(&mut self.rows);
        for (mut key, row) in old_rows {
            if key[pos] == first_label {
                key.remove(pos);
                self.rows.insert(key, row);
            }
        }
        self.parents.remove(pos);
        Ok(())
    }

    /// Extends an existing parent's domain with appended labels, adding
    /// zero-filled rows for the new combinations and leaving existing rows
    /// untouched.
    pub fn extend_parent_domain(
        &mut self,
        name: &str,
        added: &[String],
    ) -> Result<(), ReconcileError> {
        let pos = self
            .parents
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!("parent '{}' not present in table", name))
            })?;
        for label in added {
            if self.parents[pos].labels.contains(label) {
                return Err(ReconcileError::Structural(format!(
                    "label '{}' already present in parent '{}'",
                    label, name
                )));
            }
            self.parents[pos].labels.push(label.clone());
        }
        let zero = vec![0.0; self.child_labels.len()];
        for key in self.assignment_keys() {
            self.rows.entry(key).or_insert_with(|| zero.clone());
        }
        Ok(())
    }
}

/// A real-valued utility table attached to the utility node.
///
/// Maps each joint parent assignment to a payoff. No normalization invariant
/// applies.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtilityTable {
    parents: Vec<ParentDim>,
    values: FxHashMap<Vec<String>, f64>,
}

impl UtilityTable {
    /// Creates a zero-filled utility table over the given parents.
    pub fn new(parents: Vec<ParentDim>) -> Self {
        let mut table = Self {
            parents,
            values: FxHashMap::default(),
        };
        for key in table.assignment_keys() {
            table.values.insert(key, 0.0);
        }
        table
    }

    pub fn parents(&self) -> &[ParentDim] {
        &self.parents
    }

    /// Enumerates all assignment keys in declared label order.
    pub fn assignment_keys(&self) -> Vec<Vec<String>> {
        cartesian_keys(&self.parents)
    }

    /// Returns the utility for a parent assignment.
    pub fn value(&self, assignment: &[(&str, &str)]) -> Result<f64, ReconcileError> {
        let key = resolve_key(&self.parents, assignment)?;
        self.values
            .get(&key)
            .copied()
            .ok_or_else(|| ReconcileError::Lookup(format!("no utility entry for key {:?}", key)))
    }

    /// Sets the utility for a parent assignment.
    pub fn set_value(
        &mut self,
        assignment: &[(&str, &str)],
        value: f64,
    ) -> Result<(), ReconcileError> {
        if !value.is_finite() {
            return Err(ReconcileError::Consistency(
                "utility values must be finite".into(),
            ));
        }
        let key = resolve_key(&self.parents, assignment)?;
        if !self.values.contains_key(&key) {
            return Err(ReconcileError::Lookup(format!(
                "no utility entry for key {:?}",
                key
            )));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Sets the utility by precomputed row key (labels in parent order).
    /// Internal fast path for full-table synthesis.
    pub(crate) fn set_by_key(&mut self, key: Vec<String>, value: f64) {
        self.values.insert(key, value);
    }

    /// Adds a new parent dimension, replicating existing entries across the
    /// new parent's labels.
    pub fn add_parent(&mut self, dim: ParentDim) -> Result<(), ReconcileError> {
        if self.parents.iter().any(|p| p.name == dim.name) {
            return Err(ReconcileError::Structural(format!(
                "parent '{}' already present in table",
                dim.name
            )));
        }
        let old_values = std::mem::take(&mut self.values);
        for (key, value) in old_values {
            for label in &dim.labels {
                let mut new_key = key.clone();
                new_key.push(label.clone());
                self.values.insert(new_key, value);
            }
        }
        self.parents.push(dim);
        Ok(())
    }

    /// Removes a parent dimension, keeping the entries where it took its
    /// first label.
    pub fn remove_parent(&mut self, name: &str) -> Result<(), ReconcileError> {
        let pos = self
            .parents
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!("parent '{}' not present in table", name))
            })?;
        let first_label = self.parents[pos].labels[0].clone();
        let old_values = std::mem::take(&mut self.values);
        for (mut key, value) in old_values {
            if key[pos] == first_label {
                key.remove(pos);
                self.values.insert(key, value);
            }
        }
        self.parents.remove(pos);
        Ok(())
    }

    /// Extends an existing parent's domain, adding zero entries for the new
    /// combinations.
    pub fn extend_parent_domain(
        &mut self,
        name: &str,
        added: &[String],
    ) -> Result<(), ReconcileError> {
        let pos = self
            .parents
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!("parent '{}' not present in table", name))
            })?;
        for label in added {
            if self.parents[pos].labels.contains(label) {
                return Err(ReconcileError::Structural(format!(
                    "label '{}' already present in parent '{}'",
                    label, name
                )));
            }
            self.parents[pos].labels.push(label.clone());
        }
        for key in self.assignment_keys() {
            self.values.entry(key).or_insert(0.0);
        }
        Ok(())
    }
}

/// Cartesian product of parent domains, last parent varying fastest.
fn cartesian_keys(parents: &[ParentDim]) -> Vec<Vec<String>> {
    let mut keys = vec![Vec::new()];
    for dim in parents {
        let mut next = Vec::with_capacity(keys.len() * dim.labels.len());
        for key in &keys {
            for label in &dim.labels {
                let mut k = key.clone();
                k.push(label.clone());
                next.push(k);
            }
        }
        keys = next;
    }
    keys
}

fn resolve_key(
    parents: &[ParentDim],
    assignment: &[(&str, &str)],
) -> Result<Vec<String>, ReconcileError> {
    for (name, _) in assignment {
        if !parents.iter().any(|p| p.name == *name) {
            return Err(ReconcileError::Lookup(format!(
                "assignment names unknown parent '{}'",
                name
            )));
        }
    }
    let mut key = Vec::with_capacity(parents.len());
    for dim in parents {
        let mut chosen: Option<&str> = None;
        for (name, label) in assignment {
            if *name == dim.name {
                if chosen.is_some() {
                    return Err(ReconcileError::Lookup(format!(
                        "parent '{}' assigned more than once",
                        dim.name
                    )));
                }
                chosen = Some(label);
            }
        }
        let label = chosen.ok_or_else(|| {
            ReconcileError::Lookup(format!("assignment omits required parent '{}'", dim.name))
        })?;
        if !dim.labels.iter().any(|l| l == label) {
            return Err(ReconcileError::Lookup(format!(
                "parent '{}' has no label '{}'",
                dim.name, label
            )));
        }
        key.push(label.to_string());
    }
    Ok(key)
}
