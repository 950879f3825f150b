// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Lazily represented result of one expression over one index set

use super::{IndexSet, Value, ValueType, Vector};
use crate::error::{EngineError, Result};
use rand::Rng;
use std::sync::Arc;

/// Storage strategy behind a [`DataVector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    /// One value shared by every index
    Constant,
    /// Dense vector addressed by position `0..len`
    Owned,
    /// Full-table vector addressed by row identifier
    Cached,
}

#[derive(Debug, Clone)]
enum Repr {
    Constant(Value),
    Owned(Arc<Vector>),
    Cached(Arc<Vector>),
}

/// Values of one node for every row of an [`IndexSet`], in index-set order
#[derive(Debug, Clone)]
pub struct DataVector {
    indices: Arc<IndexSet>,
    ty: ValueType,
    repr: Repr,
}

impl DataVector {
    /// One value standing for every index; storage is O(1) whatever the size
    pub fn constant(indices: Arc<IndexSet>, ty: ValueType, value: Value) -> Self {
        let value = match (ty, &value) {
            (ValueType::Double, Value::Integer(i)) => Value::Double(*i as f64),
            _ => value,
        };
        debug_assert!(value.fits(ty), "constant {} does not fit {}", value, ty);
        Self {
            indices,
            ty,
            repr: Repr::Constant(value),
        }
    }

    /// Missing value for every index
    pub fn missing(indices: Arc<IndexSet>, ty: ValueType) -> Self {
        Self::constant(indices, ty, Value::Missing)
    }

    /// Freshly computed values, one per position of `indices`
    pub fn owned(indices: Arc<IndexSet>, vector: Vector) -> Self {
        debug_assert_eq!(indices.len(), vector.len());
        Self {
            indices,
            ty: vector.value_type(),
            repr: Repr::Owned(Arc::new(vector)),
        }
    }

    /// View of a full-table vector restricted to `indices`
    pub fn cached(indices: Arc<IndexSet>, vector: Arc<Vector>) -> Self {
        debug_assert!(indices.row_bound() <= vector.len());
        Self {
            indices,
            ty: vector.value_type(),
            repr: Repr::Cached(vector),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &Arc<IndexSet> {
        &self.indices
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn implementation(&self) -> Implementation {
        match self.repr {
            Repr::Constant(_) => Implementation::Constant,
            Repr::Owned(_) => Implementation::Owned,
            Repr::Cached(_) => Implementation::Cached,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.repr, Repr::Constant(_))
    }

    /// The shared value of a constant vector
    pub fn constant_value(&self) -> Option<&Value> {
        match &self.repr {
            Repr::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Backing storage of owned and cached vectors
    pub fn vector(&self) -> Option<&Arc<Vector>> {
        match &self.repr {
            Repr::Constant(_) => None,
            Repr::Owned(v) | Repr::Cached(v) => Some(v),
        }
    }

    /// Boxed value at `position` (not a row identifier)
    pub fn get(&self, position: usize) -> Value {
        match &self.repr {
            Repr::Constant(value) => value.clone(),
            Repr::Owned(v) => v.get(position),
            Repr::Cached(v) => v.get(self.indices.as_slice()[position]),
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            owner: self,
            position: 0,
        }
    }

    /// Row identifiers, in iteration order
    pub fn row_ids(&self) -> std::iter::Copied<std::slice::Iter<'_, usize>> {
        self.indices.iter()
    }

    /// Tri-state booleans; fails unless the declared type is boolean
    pub fn booleans(&self) -> Result<RawIter<'_, u8>> {
        self.raw(ValueType::Boolean, Value::to_tri_state, Vector::as_booleans)
    }

    pub fn integers(&self) -> Result<RawIter<'_, Option<i64>>> {
        self.raw(ValueType::Integer, Value::as_i64, Vector::as_integers)
    }

    /// Doubles with NaN for missing; fails unless the declared type is double
    pub fn doubles(&self) -> Result<RawIter<'_, f64>> {
        self.raw(
            ValueType::Double,
            |v| v.as_f64().unwrap_or(f64::NAN),
            Vector::as_doubles,
        )
    }

    pub fn symbols(&self) -> Result<RawIter<'_, Option<Arc<str>>>> {
        self.raw(ValueType::Symbol, |v| v.as_symbol().cloned(), Vector::as_symbols)
    }

    /// Numeric view of any non-symbol vector, NaN for missing
    pub fn numbers(&self) -> Result<Box<dyn Iterator<Item = f64> + '_>> {
        match self.ty {
            ValueType::Double => Ok(Box::new(self.doubles()?)),
            ValueType::Integer => Ok(Box::new(
                self.integers()?.map(|v| v.map_or(f64::NAN, |i| i as f64)),
            )),
            ValueType::Boolean => Ok(Box::new(self.booleans()?.map(|b| match b {
                0 => 0.0,
                1 => 1.0,
                _ => f64::NAN,
            }))),
            ValueType::Symbol => Err(EngineError::type_mismatch(
                ValueType::Double,
                ValueType::Symbol,
                "numeric view",
            )),
        }
    }

    fn raw<'a, T: Clone>(
        &'a self,
        ty: ValueType,
        from_value: impl FnOnce(&Value) -> T,
        slice: impl Fn(&'a Vector) -> Option<&'a [T]>,
    ) -> Result<RawIter<'a, T>> {
        let mismatch = || EngineError::type_mismatch(ty, self.ty, "raw data vector access");
        if self.ty != ty {
            return Err(mismatch());
        }
        let source = match &self.repr {
            Repr::Constant(value) => RawSource::Constant {
                value: from_value(value),
                remaining: self.len(),
            },
            Repr::Owned(v) => RawSource::Dense(slice(&**v).ok_or_else(mismatch)?.iter()),
            Repr::Cached(v) => RawSource::Indexed {
                values: slice(&**v).ok_or_else(mismatch)?,
                rows: self.indices.as_slice().iter(),
            },
        };
        Ok(RawIter { source })
    }

    /// Draw one value uniformly among the represented rows
    pub fn sample_element<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        match &self.repr {
            Repr::Constant(value) => Some(value.clone()),
            _ => Some(self.get(rng.gen_range(0..self.len()))),
        }
    }

    /// Materialise into a dense vector addressed by position
    pub fn to_vector(&self) -> Vector {
        match &self.repr {
            Repr::Owned(v) => (**v).clone(),
            _ => {
                let mut res = Vector::with_capacity(self.ty, self.len());
                for value in self.iter() {
                    // values already carry the declared type
                    let _ = res.push(&value);
                }
                res
            }
        }
    }

    /// Like [`Self::to_vector`], reusing owned storage when unshared
    pub fn into_vector(self) -> Vector {
        match self.repr {
            Repr::Owned(v) => Arc::try_unwrap(v).unwrap_or_else(|shared| (*shared).clone()),
            _ => self.to_vector(),
        }
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.iter().collect()
    }
}

/// Boxed iteration over a [`DataVector`]
pub struct Iter<'a> {
    owner: &'a DataVector,
    position: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.position >= self.owner.len() {
            return None;
        }
        let value = self.owner.get(self.position);
        self.position += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.owner.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a DataVector {
    type Item = Value;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

enum RawSource<'a, T> {
    Constant { value: T, remaining: usize },
    Dense(std::slice::Iter<'a, T>),
    Indexed {
        values: &'a [T],
        rows: std::slice::Iter<'a, usize>,
    },
}

/// Unboxed iteration whose element type was checked once up front
pub struct RawIter<'a, T> {
    source: RawSource<'a, T>,
}

impl<'a, T: Clone> Iterator for RawIter<'a, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        match &mut self.source {
            RawSource::Constant { value, remaining } => {
                if *remaining == 0 {
                    None
                } else {
                    *remaining -= 1;
                    Some(value.clone())
                }
            }
            RawSource::Dense(it) => it.next().cloned(),
            RawSource::Indexed { values, rows } => rows.next().map(|&row| values[row].clone()),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.source {
            RawSource::Constant { remaining, .. } => *remaining,
            RawSource::Dense(it) => it.len(),
            RawSource::Indexed { rows, .. } => rows.len(),
        };
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for RawIter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn full_vector() -> Arc<Vector> {
        Arc::new(Vector::Double(vec![0.0, 10.0, 20.0, f64::NAN, 40.0]))
    }

    #[test]
    fn test_constant_has_index_size() {
        let indices = Arc::new(IndexSet::range(0, 1000));
        let dv = DataVector::constant(indices, ValueType::Double, Value::Double(7.0));
        assert_eq!(dv.len(), 1000);
        assert_eq!(dv.implementation(), Implementation::Constant);
        assert!(dv.vector().is_none());
        assert!(dv.doubles().unwrap().all(|d| d == 7.0));
    }

    #[test]
    fn test_cached_follows_row_ids() {
        let indices: Arc<IndexSet> = Arc::new([4, 1, 3].into_iter().collect());
        let dv = DataVector::cached(indices, full_vector());
        assert_eq!(dv.implementation(), Implementation::Cached);
        let raw: Vec<f64> = dv.doubles().unwrap().collect();
        assert_eq!(raw[0], 40.0);
        assert_eq!(raw[1], 10.0);
        assert!(raw[2].is_nan());
        assert_eq!(
            dv.to_values(),
            vec![Value::Double(40.0), Value::Double(10.0), Value::Missing]
        );
    }

    #[test]
    fn test_owned_is_positional() {
        let indices: Arc<IndexSet> = Arc::new([7, 2].into_iter().collect());
        let dv = DataVector::owned(indices, Vector::Boolean(vec![1, 2]));
        assert_eq!(dv.booleans().unwrap().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(dv.row_ids().collect::<Vec<_>>(), vec![7, 2]);
    }

    #[test]
    fn test_raw_access_is_type_checked() {
        let dv = DataVector::cached(Arc::new(IndexSet::range(0, 2)), full_vector());
        assert!(matches!(dv.booleans(), Err(EngineError::TypeMismatch { .. })));
        assert!(dv.integers().is_err());
        assert_eq!(dv.numbers().unwrap().count(), 2);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let dv = DataVector::cached(Arc::new(IndexSet::range(0, 5)), full_vector());
        assert_eq!(dv.iter().count(), 5);
        assert_eq!(dv.iter().count(), 5);
        assert_eq!(dv.iter().len(), 5);
    }

    #[test]
    fn test_sample_element() {
        let mut rng = StdRng::seed_from_u64(7);
        let empty = DataVector::missing(Arc::new(IndexSet::new()), ValueType::Double);
        assert!(empty.sample_element(&mut rng).is_none());

        let dv = DataVector::cached(Arc::new([1, 2].into_iter().collect()), full_vector());
        for _ in 0..20 {
            let v = dv.sample_element(&mut rng).unwrap();
            assert!(v == Value::Double(10.0) || v == Value::Double(20.0));
        }
    }

    #[test]
    fn test_into_vector_materialises_in_order() {
        let indices: Arc<IndexSet> = Arc::new([2, 0].into_iter().collect());
        let dv = DataVector::cached(indices, full_vector());
        assert_eq!(dv.into_vector(), Vector::Double(vec![20.0, 0.0]));
    }
}
