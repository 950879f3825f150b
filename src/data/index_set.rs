// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ordered sets of row identifiers

use std::ops::Range;

/// Ordered sequence of unique row identifiers
///
/// Built incrementally by appending rows in encounter order, then shared
/// immutably (behind an `Arc`) with every computation that reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    indices: Vec<usize>,
    sorted: bool,
}

impl IndexSet {
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
            sorted: true,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            sorted: true,
        }
    }

    /// All rows in `[begin, end)`
    pub fn range(begin: usize, end: usize) -> Self {
        Self {
            indices: (begin..end).collect(),
            sorted: true,
        }
    }

    pub fn append(&mut self, index: usize) {
        if let Some(&last) = self.indices.last() {
            if index <= last {
                debug_assert!(
                    !(self.sorted && index == last),
                    "row {} appended twice",
                    index
                );
                self.sorted = false;
            }
        }
        self.indices.push(index);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.indices.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, usize>> {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn first(&self) -> Option<usize> {
        self.indices.first().copied()
    }

    pub fn last(&self) -> Option<usize> {
        self.indices.last().copied()
    }

    /// Whether identifiers were appended in increasing order
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn contains(&self, index: usize) -> bool {
        if self.sorted {
            self.indices.binary_search(&index).is_ok()
        } else {
            self.indices.contains(&index)
        }
    }

    /// True when this set is exactly `0..num_rows` in order, which lets a
    /// positional result double as a full-table vector
    pub fn covers_all(&self, num_rows: usize) -> bool {
        self.sorted
            && self.indices.len() == num_rows
            && self.indices.last().map_or(true, |&last| last + 1 == num_rows)
    }

    /// Largest row identifier plus one
    pub fn row_bound(&self) -> usize {
        if self.sorted {
            self.last().map_or(0, |last| last + 1)
        } else {
            self.indices.iter().max().map_or(0, |max| max + 1)
        }
    }
}

impl From<Range<usize>> for IndexSet {
    fn from(range: Range<usize>) -> Self {
        IndexSet::range(range.start, range.end)
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut res = IndexSet::with_capacity(iter.size_hint().0);
        for index in iter {
            res.append(index);
        }
        res
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
