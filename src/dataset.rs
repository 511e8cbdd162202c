use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Seed used by `split_train_test` so repeated splits agree.
pub const DEFAULT_SPLIT_SEED: u64 = 0;

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("record must have exactly 2 fields, got {0}")]
    FieldCount(usize),

    #[error("fraction must be within [0, 1], got {0}")]
    Fraction(f64),
}

/// One biometric record: an image path and its subject label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabeledSample {
    pub path: String,
    pub label: String,
}

impl LabeledSample {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }
}

impl TryFrom<Vec<String>> for LabeledSample {
    type Error = DatasetError;

    fn try_from(record: Vec<String>) -> Result<Self, Self::Error> {
        let fields = record.len();
        let mut it = record.into_iter();
        match (it.next(), it.next(), it.next()) {
            (Some(path), Some(label), None) => Ok(Self { path, label }),
            _ => Err(DatasetError::FieldCount(fields)),
        }
    }
}

/// Samples split by subject: `known` subjects are enrolled, `unknown` are not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelPartition {
    pub known: Vec<LabeledSample>,
    pub unknown: Vec<LabeledSample>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<LabeledSample>,
    pub test: Vec<LabeledSample>,
}

/// Read a whitespace-delimited list file, one record per non-empty line.
pub fn load_labeled_list(path: &Path) -> Result<Vec<Vec<String>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading list file {}", path.display()))?;
    Ok(parse_records(&raw))
}

fn parse_records(raw: &str) -> Vec<Vec<String>> {
    raw.lines()
        .map(|line| {
            line.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|fields| !fields.is_empty())
        .collect()
}

/// Load a two-column `<path> <label>` list file.
pub fn load_samples(path: &Path) -> Result<Vec<LabeledSample>> {
    let samples = load_labeled_list(path)?
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            LabeledSample::try_from(record)
                .with_context(|| format!("record {} of {}", idx + 1, path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!("loaded {} sample(s) from {}", samples.len(), path.display());
    Ok(samples)
}

fn check_fraction(fraction: f64) -> Result<(), DatasetError> {
    if fraction.is_finite() && (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(DatasetError::Fraction(fraction))
    }
}

/// Pick `floor(known_fraction * labels)` distinct labels at random as known
/// and partition all samples by label membership, preserving input order.
pub fn split_by_label_membership<R: Rng + ?Sized>(
    samples: &[LabeledSample],
    known_fraction: f64,
    rng: &mut R,
) -> Result<LabelPartition, DatasetError> {
    check_fraction(known_fraction)?;

    // sorted so that a seeded rng always draws the same subjects
    let labels: Vec<&str> = samples
        .iter()
        .map(|s| s.label.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let amount = ((known_fraction * labels.len() as f64).floor() as usize).min(labels.len());
    let known: BTreeSet<&str> = index::sample(rng, labels.len(), amount)
        .into_iter()
        .map(|i| labels[i])
        .collect();

    let (known_samples, unknown_samples): (Vec<_>, Vec<_>) = samples
        .iter()
        .cloned()
        .partition(|s| known.contains(s.label.as_str()));

    log::debug!(
        "label split: {}/{} subjects known, {} known / {} unknown samples",
        known.len(),
        labels.len(),
        known_samples.len(),
        unknown_samples.len()
    );

    Ok(LabelPartition {
        known: known_samples,
        unknown: unknown_samples,
    })
}

/// Deterministic random train/test split with `DEFAULT_SPLIT_SEED`.
pub fn split_train_test(
    samples: &[LabeledSample],
    train_fraction: f64,
) -> Result<TrainTestSplit, DatasetError> {
    split_train_test_seeded(samples, train_fraction, DEFAULT_SPLIT_SEED)
}

/// Shuffle with a generator seeded from `seed`, then take the first
/// `floor(train_fraction * n)` samples as train and the rest as test.
pub fn split_train_test_seeded(
    samples: &[LabeledSample],
    train_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, DatasetError> {
    check_fraction(train_fraction)?;

    let mut shuffled = samples.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n_train = ((train_fraction * samples.len() as f64).floor() as usize).min(samples.len());
    let test = shuffled.split_off(n_train);

    Ok(TrainTestSplit {
        train: shuffled,
        test,
    })
}

/// Randomly mark half of `labels` as negatives (`-1`) and the rest as
/// positives (`+1`).
pub fn assign_pos_neg<R: Rng + ?Sized>(labels: &[String], rng: &mut R) -> BTreeMap<String, i32> {
    let mut shuffled = labels.to_vec();
    shuffled.shuffle(rng);

    let half = shuffled.len() / 2;
    shuffled
        .into_iter()
        .enumerate()
        .map(|(i, label)| (label, if i < half { -1 } else { 1 }))
        .collect()
}
