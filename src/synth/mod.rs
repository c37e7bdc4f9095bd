//! Table synthesis for nodes whose structure just changed.
//!
//! Three strategies, used by the reconciler and the blender:
//!
//! - **Uniform**: fill rows with `1/|domain|` when no real data exists yet,
//!   e.g. for a freshly transferred parent or a newly appended decision
//!   option.
//! - **Noise-perturbed**: seed a node from the peer network's CPT with
//!   elementwise Gaussian noise, so the transferred belief is plausible but
//!   not an exact foreign copy. Clipping to [0, 1] precedes renormalization,
//!   so the output is always row-stochastic.
//! - **Weighted-linear**: rebuild the utility table from per-parent
//!   `(weight, increment)` parameters, linear in each parent's rank position.
//!
//! All randomness flows through a caller-supplied [`rand::Rng`]; tests seed
//! explicitly to make scenarios reproducible.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::network::{Cpt, DecisionNet, NodeKind, ReconcileError};

/// One row of weighted-linear utility parameters: the utility-node parent it
/// applies to, its weight, and the per-rank increment.
///
/// Transient caller-owned data; not persisted in the network.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceRow {
    pub parent: String,
    pub weight: f64,
    pub increment: f64,
}

impl PreferenceRow {
    pub fn new(parent: impl Into<String>, weight: f64, increment: f64) -> Self {
        Self {
            parent: parent.into(),
            weight,
            increment,
        }
    }
}

/// Fills every row of a chance node's CPT with the uniform distribution over
/// its own domain.
///
/// Used to seed parents introduced by a node transfer before any real data
/// is available.
pub fn fill_uniform_cpt(net: &mut DecisionNet, node: &str) -> Result<(), ReconcileError> {
    let cpt = net.cpt_mut(node)?;
    let n = cpt.child_labels().len();
    let uniform = vec![1.0 / n as f64; n];
    for key in cpt.assignment_keys() {
        set_row_by_key(cpt, &key, &uniform)?;
    }
    Ok(())
}

/// Fills the CPT rows of every chance child of the decision node with a
/// uniform distribution, for exactly the rows where the decision takes
/// `option`.
///
/// Rows for pre-existing options are untouched. Returns the number of rows
/// written.
pub fn fill_uniform_option_rows(
    net: &mut DecisionNet,
    option: &str,
) -> Result<usize, ReconcileError> {
    let decision = net.decision_node()?.var.name().to_string();
    net.decision_node()?.var.label_index(option)?;

    let mut written = 0;
    for child in net.child_names(&decision)? {
        if net.kind(&child)? != NodeKind::Chance {
            continue;
        }
        let cpt = net.cpt_mut(&child)?;
        let pos = cpt
            .parents()
            .iter()
            .position(|p| p.name == decision)
            .ok_or_else(|| {
                ReconcileError::Consistency(format!(
                    "CPT of '{}' lacks decision parent '{}'",
                    child, decision
                ))
            })?;
        let n = cpt.child_labels().len();
        let uniform = vec![1.0 / n as f64; n];
        for key in cpt.assignment_keys() {
            if key[pos] == option {
                set_row_by_key(cpt, &key, &uniform)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Produces a noise-perturbed copy of a CPT.
///
/// Each row gets independent Gaussian noise (mean 0, std `sigma`)
/// elementwise, is clipped to [0, 1], then renormalized to sum to 1. A row
/// driven entirely to zero by clipping falls back to the uniform
/// distribution instead of dividing by zero.
///
/// `sigma == 0` is an identity transfer: the source table is returned
/// unchanged, bit for bit.
pub fn perturb_cpt(
    source: &Cpt,
    sigma: f64,
    rng: &mut impl Rng,
) -> Result<Cpt, ReconcileError> {
    if !(sigma >= 0.0) || !sigma.is_finite() {
        return Err(ReconcileError::Consistency(format!(
            "noise factor must be a finite non-negative number, got {}",
            sigma
        )));
    }
    if sigma == 0.0 {
        return Ok(source.clone());
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| ReconcileError::Consistency(format!("invalid noise factor: {}", e)))?;

    let mut out = source.clone();
    for key in source.assignment_keys() {
        let assignment = borrow_assignment(source, &key);
        let mut row: Vec<f64> = source.row(&assignment)?.to_vec();
        for v in &mut row {
            *v += normal.sample(rng);
        }
        clip_and_renormalize(&mut row);
        set_row_by_key(&mut out, &key, &row)?;
    }
    Ok(out)
}

/// Clips to [0, 1] and renormalizes in place. Falls back to uniform when the
/// clipped row is all zero. Returns true when the fallback fired.
fn clip_and_renormalize(row: &mut [f64]) -> bool {
    for v in row.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }
    let sum: f64 = row.iter().sum();
    if sum == 0.0 {
        let uniform = 1.0 / row.len() as f64;
        for v in row.iter_mut() {
            *v = uniform;
        }
        return true;
    }
    for v in row.iter_mut() {
        *v /= sum;
    }
    false
}

/// Rewrites the utility table from weighted-linear parameters.
///
/// For every joint parent assignment the utility is
/// `Σ_i weight_i · (num_states_i − state_index_i − 1) · increment_i`,
/// so a parent's *first* label contributes the most and its last contributes
/// zero. Every utility parent must have a matching [`PreferenceRow`];
/// a missing row is a hard lookup error, never a silent zero.
pub fn weighted_linear_utility(
    net: &mut DecisionNet,
    parameters: &[PreferenceRow],
) -> Result<(), ReconcileError> {
    let table = net.utility_table_mut()?;

    let mut weights = Vec::with_capacity(table.parents().len());
    let mut increments = Vec::with_capacity(table.parents().len());
    for dim in table.parents() {
        let row = parameters
            .iter()
            .find(|r| r.parent == dim.name)
            .ok_or_else(|| {
                ReconcileError::Lookup(format!(
                    "no utility parameters for parent '{}'",
                    dim.name
                ))
            })?;
        weights.push(row.weight);
        increments.push(row.increment);
    }

    let dims: Vec<(usize, Vec<String>)> = table
        .parents()
        .iter()
        .map(|p| (p.labels.len(), p.labels.clone()))
        .collect();

    for key in table.assignment_keys() {
        let mut utility = 0.0;
        for (i, label) in key.iter().enumerate() {
            let (num_states, labels) = &dims[i];
            let state_index = labels
                .iter()
                .position(|l| l == label)
                .expect("key labels come from the table's own domains");
            utility += weights[i] * (num_states - state_index - 1) as f64 * increments[i];
        }
        table.set_by_key(key, utility);
    }
    Ok(())
}

/// Writes a row addressed by a precomputed key (labels in parent order).
fn set_row_by_key(cpt: &mut Cpt, key: &[String], values: &[f64]) -> Result<(), ReconcileError> {
    let names: Vec<String> = cpt.parents().iter().map(|p| p.name.clone()).collect();
    let assignment: Vec<(&str, &str)> = names
        .iter()
        .zip(key.iter())
        .map(|(n, l)| (n.as_str(), l.as_str()))
        .collect();
    cpt.set_row(&assignment, values)
}

fn borrow_assignment<'a>(cpt: &'a Cpt, key: &'a [String]) -> Vec<(&'a str, &'a str)> {
    cpt.parents()
        .iter()
        .zip(key.iter())
        .map(|(p, l)| (p.name.as_str(), l.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ParentDim, Variable};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn var(name: &str, labels: &[&str]) -> Variable {
        Variable::new(name, labels.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn course_net() -> DecisionNet {
        let mut net = DecisionNet::new();
        net.add_decision_node(var("course", &["Course1", "Course2"])).unwrap();
        net.add_chance_node(var("difficulty", &["high", "medium", "low"])).unwrap();
        net.add_chance_node(var("friends", &["yes", "no"])).unwrap();
        net.add_utility_node("StudentU").unwrap();
        net.add_arc("course", "difficulty").unwrap();
        net.add_arc("course", "friends").unwrap();
        net.add_arc("friends", "StudentU").unwrap();
        net
    }

    #[test]
    fn fill_uniform_cpt_produces_valid_rows() {
        let mut net = course_net();
        fill_uniform_cpt(&mut net, "difficulty").unwrap();
        let cpt = net.cpt("difficulty").unwrap();
        cpt.validate().unwrap();
        let row = cpt.row(&[("course", "Course1")]).unwrap();
        for v in row {
            assert!((v - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn fill_uniform_option_rows_touches_only_the_new_option() {
        let mut net = course_net();
        net.cpt_mut("difficulty")
            .unwrap()
            .set_row(&[("course", "Course1")], &[0.6, 0.3, 0.1])
            .unwrap();
        net.cpt_mut("difficulty")
            .unwrap()
            .set_row(&[("course", "Course2")], &[0.4, 0.4, 0.2])
            .unwrap();
        net.extend_decision_options("course", &["Course3".to_string()]).unwrap();

        let written = fill_uniform_option_rows(&mut net, "Course3").unwrap();
        // difficulty and friends each gained one row
        assert_eq!(written, 2);

        let cpt = net.cpt("difficulty").unwrap();
        assert_eq!(cpt.row(&[("course", "Course1")]).unwrap(), &[0.6, 0.3, 0.1]);
        let new_row = cpt.row(&[("course", "Course3")]).unwrap();
        for v in new_row {
            assert!((v - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn fill_uniform_option_rows_rejects_unknown_option() {
        let mut net = course_net();
        let err = fill_uniform_option_rows(&mut net, "Course9").unwrap_err();
        assert!(matches!(err, ReconcileError::Lookup(_)));
    }

    #[test]
    fn zero_noise_is_an_identity_transfer() {
        let mut cpt = Cpt::new(
            vec!["high".into(), "low".into()],
            vec![ParentDim {
                name: "p".into(),
                labels: vec!["1".into()],
            }],
        );
        cpt.set_row(&[("p", "1")], &[0.9, 0.1]).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let out = perturb_cpt(&cpt, 0.0, &mut rng).unwrap();
        assert_eq!(out.row(&[("p", "1")]).unwrap(), &[0.9, 0.1]);
    }

    #[test]
    fn perturbed_cpt_is_always_row_stochastic() {
        let mut cpt = Cpt::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![ParentDim {
                name: "p".into(),
                labels: vec!["x".into(), "y".into()],
            }],
        );
        cpt.set_row(&[("p", "x")], &[0.5, 0.3, 0.2]).unwrap();
        cpt.set_row(&[("p", "y")], &[0.1, 0.1, 0.8]).unwrap();

        // large noise exercises the clipping path
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = perturb_cpt(&cpt, 5.0, &mut rng).unwrap();
            out.validate().unwrap();
        }
    }

    #[test]
    fn same_seed_gives_same_perturbation() {
        let mut cpt = Cpt::new(vec!["a".into(), "b".into()], Vec::new());
        cpt.set_row(&[], &[0.7, 0.3]).unwrap();

        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        let out1 = perturb_cpt(&cpt, 0.1, &mut rng1).unwrap();
        let out2 = perturb_cpt(&cpt, 0.1, &mut rng2).unwrap();
        assert_eq!(out1.row(&[]).unwrap(), out2.row(&[]).unwrap());
    }

    #[test]
    fn negative_noise_factor_is_rejected() {
        let cpt = Cpt::new(vec!["a".into(), "b".into()], Vec::new());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(perturb_cpt(&cpt, -0.1, &mut rng).is_err());
    }

    #[test]
    fn all_zero_row_falls_back_to_uniform() {
        let mut row = vec![-0.4, -0.2, -0.9];
        let fell_back = clip_and_renormalize(&mut row);
        assert!(fell_back);
        for v in &row {
            assert!((v - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn clipping_precedes_renormalization() {
        let mut row = vec![1.5, 0.5];
        let fell_back = clip_and_renormalize(&mut row);
        assert!(!fell_back);
        // 1.5 clips to 1.0 first, then [1.0, 0.5] normalizes
        assert!((row[0] - 1.0 / 1.5).abs() < 1e-9);
        assert!((row[1] - 0.5 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn weighted_linear_utility_ranks_first_label_highest() {
        let mut net = course_net();
        net.add_chance_node(var("grade", &[">C", "D", "F"])).unwrap();
        net.add_arc("grade", "StudentU").unwrap();

        weighted_linear_utility(
            &mut net,
            &[
                PreferenceRow::new("friends", 0.4, 100.0),
                PreferenceRow::new("grade", 0.6, 100.0),
            ],
        )
        .unwrap();

        let table = net.utility_table().unwrap();
        // friends=yes (idx 0 of 2), grade=>C (idx 0 of 3):
        // 0.4*(2-0-1)*100 + 0.6*(3-0-1)*100 = 40 + 120
        let best = table.value(&[("friends", "yes"), ("grade", ">C")]).unwrap();
        assert!((best - 160.0).abs() < 1e-9);
        // last labels contribute zero
        let worst = table.value(&[("friends", "no"), ("grade", "F")]).unwrap();
        assert!(worst.abs() < 1e-9);
    }

    #[test]
    fn missing_parameter_row_is_a_hard_error() {
        let mut net = course_net();
        let err = weighted_linear_utility(&mut net, &[]).unwrap_err();
        assert!(matches!(err, ReconcileError::Lookup(_)));
    }
}
