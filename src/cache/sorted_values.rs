// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use crate::data::{DataVector, IndexSet};
use crate::error::Result;

/// Non-missing values of a numeric node with their rows, by increasing value
///
/// Equal values keep increasing row order. Used for threshold scans where
/// candidate split points are walked in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedDoubleValues {
    entries: Vec<(usize, f64)>,
}

impl SortedDoubleValues {
    pub fn from_samples(samples: &DataVector) -> Result<Self> {
        let mut entries: Vec<(usize, f64)> = samples
            .row_ids()
            .zip(samples.numbers()?)
            .filter(|(_, x)| !x.is_nan())
            .collect();
        entries.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Ok(Self { entries })
    }

    /// Restriction to the rows of `indices`, keeping the sort order
    pub fn subset(&self, indices: &IndexSet, num_rows: usize) -> Self {
        let mut selected = vec![false; num_rows.max(indices.row_bound())];
        for row in indices {
            selected[row] = true;
        }
        let entries = self
            .entries
            .iter()
            .filter(|(row, _)| selected.get(*row).copied().unwrap_or(false))
            .copied()
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(row, value)` pairs in value order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, x)| *x)
    }

    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(row, _)| *row)
    }

    pub fn min(&self) -> Option<f64> {
        self.entries.first().map(|(_, x)| *x)
    }

    pub fn max(&self) -> Option<f64> {
        self.entries.last().map(|(_, x)| *x)
    }

    /// Number of entries with a value not greater than `threshold`
    pub fn count_at_most(&self, threshold: f64) -> usize {
        self.entries.partition_point(|(_, x)| *x <= threshold)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<(usize, f64)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Vector;
    use std::sync::Arc;

    fn sample() -> SortedDoubleValues {
        let indices = Arc::new(IndexSet::range(0, 5));
        let samples = DataVector::owned(
            indices,
            Vector::Double(vec![3.0, f64::NAN, -1.0, 3.0, 0.5]),
        );
        SortedDoubleValues::from_samples(&samples).unwrap()
    }

    #[test]
    fn test_sorted_skips_missing() {
        let sorted = sample();
        assert_eq!(sorted.len(), 4);
        assert_eq!(sorted.rows().collect::<Vec<_>>(), vec![2, 4, 0, 3]);
        assert_eq!(sorted.min(), Some(-1.0));
        assert_eq!(sorted.max(), Some(3.0));
        assert_eq!(sorted.count_at_most(0.5), 2);
    }

    #[test]
    fn test_subset_keeps_order() {
        let sorted = sample();
        let subset = sorted.subset(&IndexSet::from_iter([3, 1, 2]), 5);
        assert_eq!(subset.iter().collect::<Vec<_>>(), vec![(2, -1.0), (3, 3.0)]);
    }

    #[test]
    fn test_integers_are_widened() {
        let indices = Arc::new(IndexSet::from_iter([1, 0]));
        let data = Arc::new(Vector::Integer(vec![Some(4), Some(-2)]));
        let sorted = SortedDoubleValues::from_samples(&DataVector::cached(indices, data)).unwrap();
        assert_eq!(sorted.iter().collect::<Vec<_>>(), vec![(1, -2.0), (0, 4.0)]);
    }
}
