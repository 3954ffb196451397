use std::collections::BTreeMap;

use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

use crate::error::{AppError, AppResult};

/// Row indices on each side of a train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits row indices so every class keeps its share on both sides
///
/// Each class is shuffled on its own and gives `round(test_size * n)` rows to
/// the test side. Both sides come back sorted.
pub fn stratified_split(labels: &[usize], test_size: f64, seed: u64) -> AppResult<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Training(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    if by_class.len() < 2 {
        return Err(AppError::Training(format!(
            "Stratified split needs at least two classes, found {}",
            by_class.len()
        )));
    }

    let ref mut rng = SmallRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, mut rows) in by_class {
        if rows.len() < 2 {
            return Err(AppError::Training(format!(
                "Class {} has only {} row; each class needs at least two",
                label,
                rows.len()
            )));
        }
        rows.shuffle(rng);
        let n_test = ((rows.len() as f64 * test_size).round() as usize).clamp(1, rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}
