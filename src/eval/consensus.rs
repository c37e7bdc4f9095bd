//! Consensus classification between two agents' decision rankings.
//!
//! Both strategies take the per-option expected utilities of two agents
//! over the *same* option set and categorize their agreement. They answer
//! different questions and can disagree on the same input, so they are kept
//! as two separate entry points rather than one algorithm:
//!
//! - [`classify_by_rank`] compares first and second choices by rank only.
//! - [`classify_by_threshold`] looks at the numeric gap between the two
//!   utility maps and nominates the option with the smallest gap as a
//!   compromise candidate.

use crate::network::ReconcileError;

/// The level of agreement between two agents' rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConsensusLevel {
    /// First choices match.
    Full,
    /// First choices differ but the top-two sets overlap, or the numeric
    /// gap is within the caller's threshold.
    Partial,
    /// No overlap within the compared depth.
    NoAgreement,
}

/// Result of rank-based classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RankClassification {
    pub level: ConsensusLevel,
    /// The first agent's arg-max option.
    pub first_choice_a: String,
    /// The second agent's arg-max option.
    pub first_choice_b: String,
}

/// Result of threshold-based classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdClassification {
    pub level: ConsensusLevel,
    /// The smallest cross-agent utility difference over all options.
    pub min_difference: f64,
    /// The option achieving that minimal difference. Reported only for
    /// partial agreement; full agreement needs no compromise and no
    /// agreement offers none.
    pub compromise: Option<String>,
}

/// Classifies agreement by first and second choices.
///
/// Full consensus when both arg-max options match; partial when the first
/// choices differ but either agent's second choice equals the other's
/// first, or the two second choices match; no agreement otherwise. With a
/// single shared option the ranking is trivially full.
///
/// The classification is symmetric in its two arguments.
pub fn classify_by_rank(
    a: &[(String, f64)],
    b: &[(String, f64)],
) -> Result<RankClassification, ReconcileError> {
    check_shared_options(a, b)?;

    let (first_a, second_a) = top_two(a);
    let (first_b, second_b) = top_two(b);

    let level = if first_a == first_b {
        ConsensusLevel::Full
    } else {
        let overlap = match (&second_a, &second_b) {
            (Some(sa), Some(sb)) => sa == &first_b || sb == &first_a || sa == sb,
            (Some(sa), None) => sa == &first_b,
            (None, Some(sb)) => sb == &first_a,
            (None, None) => false,
        };
        if overlap {
            ConsensusLevel::Partial
        } else {
            ConsensusLevel::NoAgreement
        }
    };

    Ok(RankClassification {
        level,
        first_choice_a: first_a,
        first_choice_b: first_b,
    })
}

/// Classifies agreement by the numeric gap between the two utility maps.
///
/// Full consensus when the arg-max options match. Otherwise, if the
/// smallest per-option utility difference falls below `threshold`, the
/// agents are close enough on that option to treat it as a compromise and
/// the result is partial; no agreement when every gap is at least the
/// threshold.
pub fn classify_by_threshold(
    a: &[(String, f64)],
    b: &[(String, f64)],
    threshold: f64,
) -> Result<ThresholdClassification, ReconcileError> {
    if !(threshold >= 0.0) || !threshold.is_finite() {
        return Err(ReconcileError::Consistency(format!(
            "threshold must be a finite non-negative number, got {}",
            threshold
        )));
    }
    check_shared_options(a, b)?;

    let mut min_difference = f64::INFINITY;
    let mut closest = None;
    for (option, ua) in a {
        let ub = lookup(b, option).expect("option sets checked equal");
        let diff = (ua - ub).abs();
        if diff < min_difference {
            min_difference = diff;
            closest = Some(option.clone());
        }
    }

    let (first_a, _) = top_two(a);
    let (first_b, _) = top_two(b);

    if first_a == first_b {
        return Ok(ThresholdClassification {
            level: ConsensusLevel::Full,
            min_difference,
            compromise: None,
        });
    }
    if min_difference < threshold {
        return Ok(ThresholdClassification {
            level: ConsensusLevel::Partial,
            min_difference,
            compromise: closest,
        });
    }
    Ok(ThresholdClassification {
        level: ConsensusLevel::NoAgreement,
        min_difference,
        compromise: None,
    })
}

/// Arg-max option and, when there are at least two options, the runner-up.
/// Ties break toward the earlier entry.
fn top_two(utilities: &[(String, f64)]) -> (String, Option<String>) {
    let mut best = 0;
    for i in 1..utilities.len() {
        if utilities[i].1 > utilities[best].1 {
            best = i;
        }
    }
    let mut second: Option<usize> = None;
    for i in 0..utilities.len() {
        if i == best {
            continue;
        }
        match second {
            Some(s) if utilities[i].1 <= utilities[s].1 => {}
            _ => second = Some(i),
        }
    }
    (
        utilities[best].0.clone(),
        second.map(|s| utilities[s].0.clone()),
    )
}

fn lookup(map: &[(String, f64)], option: &str) -> Option<f64> {
    map.iter().find(|(name, _)| name == option).map(|(_, u)| *u)
}

fn check_shared_options(
    a: &[(String, f64)],
    b: &[(String, f64)],
) -> Result<(), ReconcileError> {
    if a.is_empty() || b.is_empty() {
        return Err(ReconcileError::Precondition(
            "cannot classify consensus over empty utility maps".into(),
        ));
    }
    if a.len() != b.len()
        || a.iter().any(|(name, _)| lookup(b, name).is_none())
    {
        return Err(ReconcileError::Consistency(
            "consensus classification requires the same option set on both sides".into(),
        ));
    }
    Ok(())
}
