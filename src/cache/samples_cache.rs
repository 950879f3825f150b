// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Byte-budgeted cache of full-table node results

use super::eviction::{select_victims, EntryStats, EvictionPolicy};
use super::sorted_values::SortedDoubleValues;
use crate::config::CacheConfig;
use crate::data::{DataVector, Implementation, IndexSet, Table, Vector};
use crate::error::{EngineError, Result};
use crate::expression::{ExecutionContext, Expr, ExprId, ExprKind};
use ahash::AHashMap;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Fixed bookkeeping cost charged per tracked entry, resident or not
pub const ENTRY_OVERHEAD_BYTES: usize = 128;

struct NodeCache {
    expr: Expr,
    samples: Option<Arc<Vector>>,
    sorted: Option<Arc<SortedDoubleValues>>,
    requests: AtomicU64,
    removable: bool,
}

impl NodeCache {
    fn new(expr: Expr) -> Self {
        Self {
            expr,
            samples: None,
            sorted: None,
            requests: AtomicU64::new(0),
            removable: true,
        }
    }

    fn is_resident(&self) -> bool {
        self.samples.is_some()
    }

    fn size_in_bytes(&self) -> usize {
        ENTRY_OVERHEAD_BYTES
            + self.samples.as_ref().map_or(0, |s| s.size_in_bytes())
            + self.sorted.as_ref().map_or(0, |s| s.size_in_bytes())
    }

    fn stats(&self) -> EntryStats {
        EntryStats {
            requests: self.requests.load(Ordering::Relaxed),
            size_in_bytes: self.size_in_bytes(),
        }
    }
}

/// Entries plus the running total of their bytes
#[derive(Default)]
struct CacheState {
    entries: AHashMap<ExprId, NodeCache>,
    size_in_bytes: usize,
}

impl CacheState {
    /// Entry of `expr`, created with no samples when absent
    fn track(&mut self, expr: &Expr) -> &NodeCache {
        let id = expr.id();
        if !self.entries.contains_key(&id) {
            self.size_in_bytes += ENTRY_OVERHEAD_BYTES;
        }
        self.entries
            .entry(id)
            .or_insert_with(|| NodeCache::new(expr.clone()))
    }

    fn modify(&mut self, id: ExprId, f: impl FnOnce(&mut NodeCache)) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                let before = entry.size_in_bytes();
                f(entry);
                self.size_in_bytes = self.size_in_bytes - before + entry.size_in_bytes();
                true
            }
            None => false,
        }
    }

    /// Remove the entry of `id` with its samples and request count
    fn release(&mut self, id: ExprId) -> Option<NodeCache> {
        let entry = self.entries.remove(&id)?;
        self.size_in_bytes -= entry.size_in_bytes();
        Some(entry)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Nodes with a request counter
    pub tracked_nodes: usize,
    /// Nodes whose samples are resident
    pub cached_nodes: usize,
    pub size_in_bytes: usize,
    pub max_size_in_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// Sorted projections served without sorting again
    pub sorted_hits: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32 / total as f32) * 100.0
        }
    }
}

/// Memoises full-table node results over one input table
///
/// Resident vectors are indexed by row identifier, so any index set is
/// served as a view without copying. Entries are evicted by the configured
/// [`EvictionPolicy`] whenever the resident size exceeds the byte budget;
/// entries stored as non-removable are never evicted.
///
/// Node results must be pure functions of the table: the table is owned by
/// the cache and never changes underneath it.
pub struct SamplesCache {
    table: Arc<Table>,
    all_indices: Arc<IndexSet>,
    config: CacheConfig,
    max_size_in_bytes: AtomicUsize,
    policy: Box<dyn EvictionPolicy>,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    sorted_hits: AtomicU64,
    evictions: AtomicU64,
}

impl SamplesCache {
    pub fn new(table: Arc<Table>, config: &CacheConfig) -> Self {
        let all_indices = table.all_indices();
        Self {
            table,
            all_indices,
            config: config.clone(),
            max_size_in_bytes: AtomicUsize::new(config.max_size_in_bytes),
            policy: config.eviction.build(),
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sorted_hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Replace the eviction policy built from the configuration
    pub fn with_policy(mut self, policy: Box<dyn EvictionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn all_indices(&self) -> &Arc<IndexSet> {
        &self.all_indices
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Evaluation context routing sub-expressions through this cache
    pub fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext::with_cache(&self.table, self)
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Values of `expr` over `indices`
    ///
    /// Served from the resident vector when there is one. Otherwise the
    /// node is computed, and cached when it was computed over the whole
    /// table anyway (opportunism) or has been requested often enough
    /// (promotion).
    pub fn get_samples(&self, expr: &Expr, indices: &Arc<IndexSet>) -> Result<DataVector> {
        if let Some(samples) = expr.table_samples(&self.table, indices) {
            return samples;
        }
        if indices.is_empty() {
            return Ok(DataVector::missing(indices.clone(), expr.value_type()));
        }

        let requests = {
            let state = self.read();
            match state.entries.get(&expr.id()) {
                Some(entry) => {
                    let requests = entry.requests.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(samples) = &entry.samples {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(DataVector::cached(indices.clone(), samples.clone()));
                    }
                    Some(requests)
                }
                None => None,
            }
        };
        if requests.is_none() && !self.is_candidate_for_caching(expr) {
            return expr.compute_samples(&self.context(), indices);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let requests = match requests {
            Some(requests) => requests,
            None => self.track(expr),
        };

        if self.should_promote(expr, requests) {
            debug!(node = %expr.id(), requests, "promoting node into the cache");
            let vector = Arc::new(self.compute_full(expr)?);
            self.store(expr, vector.clone(), true);
            return Ok(DataVector::cached(indices.clone(), vector));
        }

        let samples = expr.compute_samples(&self.context(), indices)?;
        if self.config.cache_by_opportunism
            && samples.implementation() == Implementation::Owned
            && indices.covers_all(self.table.num_rows())
            && self.is_candidate_for_caching(expr)
            && !self.is_over_budget()
        {
            if let Some(vector) = samples.vector() {
                self.store(expr, vector.clone(), true);
            }
        }
        Ok(samples)
    }

    /// Create the request counter of `expr`, counting this request
    ///
    /// Counters are charged against the budget like samples; nothing is
    /// tracked when a bare entry alone would not fit.
    fn track(&self, expr: &Expr) -> u64 {
        let max = self.max_size_in_bytes();
        if max > 0 && ENTRY_OVERHEAD_BYTES > max {
            return 1;
        }
        let id = expr.id();
        let mut state = self.write();
        let requests = state.track(expr).requests.fetch_add(1, Ordering::Relaxed) + 1;
        self.evict(&mut state, Some(id));
        requests
    }

    fn should_promote(&self, expr: &Expr, requests: u64) -> bool {
        match self.config.promote_after_requests {
            Some(threshold) => requests >= threshold && self.is_candidate_for_caching(expr),
            None => false,
        }
    }

    fn is_over_budget(&self) -> bool {
        let max = self.max_size_in_bytes();
        max > 0 && self.size_in_bytes() >= max
    }

    fn compute_full(&self, expr: &Expr) -> Result<Vector> {
        Ok(expr
            .compute_samples(&self.context(), &self.all_indices)?
            .into_vector())
    }

    /// Store the full-table values of `expr`, computing them when `values`
    /// is `None`
    ///
    /// Returns `Ok(false)` when a removable vector alone exceeds the byte
    /// budget. An existing entry is replaced.
    pub fn cache_node(&self, expr: &Expr, values: Option<Vector>, removable: bool) -> Result<bool> {
        let vector = match values {
            Some(vector) => {
                if vector.len() != self.table.num_rows() {
                    return Err(EngineError::RowArity {
                        expected: self.table.num_rows(),
                        found: vector.len(),
                    });
                }
                if vector.value_type() != expr.value_type() {
                    return Err(EngineError::type_mismatch(
                        expr.value_type(),
                        vector.value_type(),
                        format!("cached values of node {}", expr.id()),
                    ));
                }
                vector
            }
            None => self.compute_full(expr)?,
        };
        Ok(self.store(expr, Arc::new(vector), removable))
    }

    fn store(&self, expr: &Expr, vector: Arc<Vector>, removable: bool) -> bool {
        let size = vector.size_in_bytes() + ENTRY_OVERHEAD_BYTES;
        let max = self.max_size_in_bytes();
        if removable && max > 0 && size > max {
            warn!(
                node = %expr.id(),
                size,
                max,
                "samples larger than the whole cache budget, not cached"
            );
            return false;
        }

        let id = expr.id();
        let mut state = self.write();
        state.track(expr);
        state.modify(id, |entry| {
            entry.samples = Some(vector);
            entry.sorted = None;
            entry.removable = removable;
        });
        debug!(node = %id, kind = expr.kind_name(), size, removable, "cached node");
        self.evict(&mut state, Some(id));
        true
    }

    /// Remove removable entries until the size fits the budget; `protect`
    /// is never chosen
    ///
    /// Returns the number of resident entries evicted. Stops early when a
    /// round frees nothing.
    fn evict(&self, state: &mut CacheState, protect: Option<ExprId>) -> usize {
        let max = self.max_size_in_bytes();
        if max == 0 {
            return 0;
        }
        let batch = self.config.eviction_batch.max(1);
        let mut evicted = 0;
        while state.size_in_bytes > max {
            let candidates: Vec<(ExprId, EntryStats)> = state
                .entries
                .iter()
                .filter(|(id, entry)| entry.removable && Some(**id) != protect)
                .map(|(id, entry)| (*id, entry.stats()))
                .collect();
            if candidates.is_empty() {
                debug!(
                    size = state.size_in_bytes,
                    max, "cache over budget with nothing removable left"
                );
                break;
            }
            let before = state.size_in_bytes;
            for id in select_victims(self.policy.as_ref(), candidates, batch) {
                if state.size_in_bytes <= max {
                    break;
                }
                if let Some(entry) = state.release(id) {
                    if entry.is_resident() {
                        debug!(node = %id, "evicted node");
                        evicted += 1;
                    }
                }
            }
            if state.size_in_bytes >= before {
                debug!(size = state.size_in_bytes, max, "eviction round freed nothing");
                break;
            }
        }
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Evict until the resident size is within budget; returns the number
    /// of released entries
    pub fn ensure_size_lower_than_max_size(&self) -> usize {
        let mut state = self.write();
        self.evict(&mut state, None)
    }

    /// Forget `expr`: its samples, sorted values and request count
    pub fn uncache_node(&self, expr: &Expr) -> bool {
        let released = self.write().release(expr.id()).is_some();
        if released {
            debug!(node = %expr.id(), "uncached node");
        }
        released
    }

    pub fn is_cached(&self, expr: &Expr) -> bool {
        self.read()
            .entries
            .get(&expr.id())
            .map_or(false, NodeCache::is_resident)
    }

    pub fn cached_vector(&self, expr: &Expr) -> Option<Arc<Vector>> {
        self.read()
            .entries
            .get(&expr.id())
            .and_then(|entry| entry.samples.clone())
    }

    pub fn num_requests(&self, expr: &Expr) -> u64 {
        self.read()
            .entries
            .get(&expr.id())
            .map_or(0, |entry| entry.requests.load(Ordering::Relaxed))
    }

    /// Constants and variables are already O(1) or a table column
    pub fn is_candidate_for_caching(&self, expr: &Expr) -> bool {
        match expr.kind() {
            ExprKind::Constant(_) | ExprKind::Variable { .. } => false,
            _ => expr.table_samples(&self.table, &self.all_indices).is_none(),
        }
    }

    pub fn max_size_in_bytes(&self) -> usize {
        self.max_size_in_bytes.load(Ordering::Relaxed)
    }

    /// Change the budget, evicting right away if it shrank below the
    /// current size
    pub fn set_max_size_in_bytes(&self, max: usize) {
        self.max_size_in_bytes.store(max, Ordering::Relaxed);
        self.ensure_size_lower_than_max_size();
    }

    pub fn size_in_bytes(&self) -> usize {
        self.read().size_in_bytes
    }

    /// Sorted non-missing values of a numeric node over `indices`
    ///
    /// The full-table ordering is kept alongside resident samples; other
    /// index sets are answered by filtering it.
    pub fn get_sorted_double_values(
        &self,
        expr: &Expr,
        indices: &Arc<IndexSet>,
    ) -> Result<Arc<SortedDoubleValues>> {
        if indices.is_empty() {
            return Ok(Arc::default());
        }
        let num_rows = self.table.num_rows();
        let full = indices.covers_all(num_rows);

        let sorted = self
            .read()
            .entries
            .get(&expr.id())
            .and_then(|entry| entry.sorted.clone());
        if let Some(sorted) = sorted {
            self.sorted_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(if full {
                sorted
            } else {
                Arc::new(sorted.subset(indices, num_rows))
            });
        }

        if !full && self.is_cached(expr) {
            let all = self.get_sorted_double_values(expr, &self.all_indices)?;
            return Ok(Arc::new(all.subset(indices, num_rows)));
        }

        let samples = self.get_samples(expr, indices)?;
        let sorted = Arc::new(SortedDoubleValues::from_samples(&samples)?);
        if full {
            let id = expr.id();
            let mut state = self.write();
            if state.entries.get(&id).map_or(false, NodeCache::is_resident) {
                state.modify(id, |entry| entry.sorted = Some(sorted.clone()));
                self.evict(&mut state, Some(id));
            }
        }
        Ok(sorted)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        CacheStats {
            tracked_nodes: state.entries.len(),
            cached_nodes: state.entries.values().filter(|e| e.is_resident()).count(),
            size_in_bytes: state.size_in_bytes,
            max_size_in_bytes: self.max_size_in_bytes(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sorted_hits: self.sorted_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Compare the samples served for `expr` and its descendants against
    /// row-wise evaluation of their definitions
    pub fn check_cache_is_correct(&self, expr: &Expr) -> Result<bool> {
        let samples = self.get_samples(expr, &self.all_indices)?;
        for (position, row) in samples.row_ids().enumerate() {
            let expected = expr.evaluate_row(&self.table, row)?;
            let actual = samples.get(position);
            if actual != expected {
                error!(
                    node = %expr.id(),
                    row,
                    %expected,
                    %actual,
                    "cached samples disagree with row-wise evaluation"
                );
                return Ok(false);
            }
        }
        for child in expr.sub_nodes() {
            if !self.check_cache_is_correct(child)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Log a summary plus the most and least requested resident nodes
    pub fn log_cache_information(&self) {
        let stats = self.stats();
        info!(
            tracked = stats.tracked_nodes,
            resident = stats.cached_nodes,
            size = stats.size_in_bytes,
            max = stats.max_size_in_bytes,
            hit_rate = f64::from(stats.hit_rate()),
            sorted_hits = stats.sorted_hits,
            evictions = stats.evictions,
            policy = self.policy.name(),
            "samples cache"
        );

        let state = self.read();
        let mut resident: Vec<&NodeCache> =
            state.entries.values().filter(|e| e.is_resident()).collect();
        resident.sort_by_key(|e| (Reverse(e.requests.load(Ordering::Relaxed)), e.expr.id()));
        for entry in resident.iter().take(5) {
            info!(
                requests = entry.requests.load(Ordering::Relaxed),
                bytes = entry.size_in_bytes(),
                "most requested: {}",
                entry.expr
            );
        }
        for entry in resident.iter().rev().take(5) {
            info!(
                requests = entry.requests.load(Ordering::Relaxed),
                bytes = entry.size_in_bytes(),
                "least requested: {}",
                entry.expr
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LeastRequested;
    use crate::data::{Value, ValueType};
    use crate::expression::{Function, Universe};

    fn table(rows: usize) -> Arc<Table> {
        let mut table = Table::new();
        table.add_column("x", ValueType::Double).unwrap();
        for i in 0..rows {
            table.add_row(&[Value::Double(i as f64)]).unwrap();
        }
        Arc::new(table)
    }

    fn config(max_size_in_bytes: usize) -> CacheConfig {
        CacheConfig {
            max_size_in_bytes,
            ..CacheConfig::default()
        }
    }

    fn negate(universe: &Universe, table: &Table) -> Expr {
        let x = universe.variable_for(table, "x").unwrap();
        universe.function(Function::Neg, vec![x]).unwrap()
    }

    #[test]
    fn test_cache_node_and_serve_subsets() {
        let table = table(10);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));

        assert!(cache.cache_node(&neg, None, true).unwrap());
        assert!(cache.is_cached(&neg));
        let subset = Arc::new(IndexSet::from_iter([7, 2]));
        let samples = cache.get_samples(&neg, &subset).unwrap();
        assert_eq!(samples.implementation(), Implementation::Cached);
        assert_eq!(samples.to_values(), vec![Value::Double(-7.0), Value::Double(-2.0)]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_oversized_removable_entry_is_refused() {
        let table = table(1000);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(1024));

        assert!(!cache.cache_node(&neg, None, true).unwrap());
        assert!(!cache.is_cached(&neg));
        assert_eq!(cache.size_in_bytes(), 0);

        // non-removable entries may exceed the budget
        assert!(cache.cache_node(&neg, None, false).unwrap());
        assert!(cache.size_in_bytes() > cache.max_size_in_bytes());
        assert_eq!(cache.ensure_size_lower_than_max_size(), 0);
        assert!(cache.is_cached(&neg));
    }

    #[test]
    fn test_cache_node_checks_supplied_values() {
        let table = table(3);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        assert!(matches!(
            cache.cache_node(&neg, Some(Vector::Double(vec![1.0])), true),
            Err(EngineError::RowArity { .. })
        ));
        assert!(matches!(
            cache.cache_node(&neg, Some(Vector::Boolean(vec![0, 1, 2])), true),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_opportunistic_caching_of_full_computations() {
        let table = table(16);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));

        let half = Arc::new(IndexSet::range(0, 8));
        cache.get_samples(&neg, &half).unwrap();
        assert!(!cache.is_cached(&neg));

        let all = cache.all_indices().clone();
        let first = cache.get_samples(&neg, &all).unwrap();
        assert_eq!(first.implementation(), Implementation::Owned);
        assert!(cache.is_cached(&neg));
        let second = cache.get_samples(&neg, &all).unwrap();
        assert_eq!(second.implementation(), Implementation::Cached);
        assert_eq!(cache.num_requests(&neg), 3);
    }

    #[test]
    fn test_promotion_after_requests() {
        let table = table(8);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(
            table,
            &CacheConfig {
                max_size_in_bytes: 0,
                cache_by_opportunism: false,
                promote_after_requests: Some(2),
                ..CacheConfig::default()
            },
        );
        let subset = Arc::new(IndexSet::from_iter([1, 3]));
        cache.get_samples(&neg, &subset).unwrap();
        assert!(!cache.is_cached(&neg));
        let samples = cache.get_samples(&neg, &subset).unwrap();
        assert!(cache.is_cached(&neg));
        assert_eq!(samples.to_values(), vec![Value::Double(-1.0), Value::Double(-3.0)]);
    }

    #[test]
    fn test_eviction_follows_policy() {
        let table = table(100);
        let universe = Universe::new();
        let x = universe.variable_for(&table, "x").unwrap();
        let nodes: Vec<Expr> = [Function::Neg, Function::Abs, Function::Exp]
            .into_iter()
            .map(|f| universe.function(f, vec![x.clone()]).unwrap())
            .collect();
        let cache = SamplesCache::new(table, &config(0)).with_policy(Box::new(LeastRequested));
        assert_eq!(cache.policy_name(), "least_requested");

        for node in &nodes {
            assert!(cache.cache_node(node, None, true).unwrap());
        }
        let all = cache.all_indices().clone();
        for _ in 0..3 {
            cache.get_samples(&nodes[0], &all).unwrap();
            cache.get_samples(&nodes[2], &all).unwrap();
        }

        let one_entry = cache.size_in_bytes() / 3;
        cache.set_max_size_in_bytes(2 * one_entry);
        assert!(cache.is_cached(&nodes[0]));
        assert!(!cache.is_cached(&nodes[1]));
        assert!(cache.is_cached(&nodes[2]));
        assert!(cache.size_in_bytes() <= cache.max_size_in_bytes());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_uncache_forgets_the_node() {
        let table = table(4);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        let all = cache.all_indices().clone();
        cache.get_samples(&neg, &all).unwrap();
        assert!(cache.uncache_node(&neg));
        assert!(!cache.uncache_node(&neg));
        assert_eq!(cache.size_in_bytes(), 0);
        assert_eq!(cache.num_requests(&neg), 0);
        assert_eq!(cache.stats().tracked_nodes, 0);
    }

    #[test]
    fn test_request_counters_stay_within_budget() {
        let table = table(50);
        let universe = Universe::new();
        let x = universe.variable_for(&table, "x").unwrap();
        let max = 3 * ENTRY_OVERHEAD_BYTES;
        let cache = SamplesCache::new(
            table,
            &CacheConfig {
                max_size_in_bytes: max,
                cache_by_opportunism: false,
                ..CacheConfig::default()
            },
        );
        let subset = Arc::new(IndexSet::from_iter([1, 2, 3]));

        for i in 0..100 {
            let c = universe.constant(i as f64).unwrap();
            let node = universe.function(Function::Add, vec![x.clone(), c]).unwrap();
            cache.get_samples(&node, &subset).unwrap();
            assert!(cache.size_in_bytes() <= max);
        }
        let stats = cache.stats();
        assert!(stats.tracked_nodes <= 3);
        assert_eq!(stats.size_in_bytes, stats.tracked_nodes * ENTRY_OVERHEAD_BYTES);
        assert_eq!(stats.misses, 100);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_variables_and_constants_are_not_tracked() {
        let table = table(4);
        let universe = Universe::new();
        let x = universe.variable_for(&table, "x").unwrap();
        let one = universe.constant(1.0).unwrap();
        let cache = SamplesCache::new(table, &config(0));
        let all = cache.all_indices().clone();
        cache.get_samples(&x, &all).unwrap();
        cache.get_samples(&one, &all).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.tracked_nodes, 0);
        assert_eq!(stats.size_in_bytes, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_nodes_of_another_universe_are_not_served() {
        let table = table(6);
        let first = Universe::new();
        let second = Universe::new();
        let neg = negate(&first, &table);
        let x = second.variable_for(&table, "x").unwrap();
        let abs = second.function(Function::Abs, vec![x]).unwrap();
        assert_eq!(neg.id().index(), abs.id().index());

        let cache = SamplesCache::new(table, &config(0));
        assert!(cache.cache_node(&neg, None, true).unwrap());
        let subset = Arc::new(IndexSet::from_iter([2, 5]));
        let samples = cache.get_samples(&abs, &subset).unwrap();
        assert_eq!(samples.to_values(), vec![Value::Double(2.0), Value::Double(5.0)]);
        assert!(!cache.is_cached(&abs));
        assert!(cache.is_cached(&neg));
    }

    #[test]
    fn test_expression_columns_of_another_universe_are_ignored() {
        let first = Universe::new();
        let second = Universe::new();
        let mut table = (*table(3)).clone();
        let neg = negate(&first, &table);
        table
            .set_expression_column(neg.id(), Vector::Double(vec![9.0; 3]))
            .unwrap();
        let table = Arc::new(table);
        let x = second.variable_for(&table, "x").unwrap();
        let abs = second.function(Function::Abs, vec![x]).unwrap();
        assert_eq!(neg.id().index(), abs.id().index());

        let cache = SamplesCache::new(table, &config(0));
        let all = cache.all_indices().clone();
        assert_eq!(
            cache.get_samples(&neg, &all).unwrap().to_values(),
            vec![Value::Double(9.0); 3]
        );
        assert_eq!(
            cache.get_samples(&abs, &all).unwrap().to_values(),
            vec![Value::Double(0.0), Value::Double(1.0), Value::Double(2.0)]
        );
    }

    #[test]
    fn test_zero_eviction_batch_still_evicts() {
        let table = table(20);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let x = universe.variable_for(&table, "x").unwrap();
        let abs = universe.function(Function::Abs, vec![x]).unwrap();
        let cache = SamplesCache::new(
            table,
            &CacheConfig {
                max_size_in_bytes: 0,
                eviction_batch: 0,
                ..CacheConfig::default()
            },
        );
        assert!(cache.cache_node(&neg, None, true).unwrap());
        assert!(cache.cache_node(&abs, None, true).unwrap());

        cache.set_max_size_in_bytes(cache.size_in_bytes() - 1);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().cached_nodes, 1);
        assert!(cache.size_in_bytes() <= cache.max_size_in_bytes());
    }

    #[test]
    fn test_eviction_stops_when_nothing_is_removable() {
        let table = table(20);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let x = universe.variable_for(&table, "x").unwrap();
        let abs = universe.function(Function::Abs, vec![x]).unwrap();
        let cache = SamplesCache::new(table, &config(0));
        assert!(cache.cache_node(&neg, None, false).unwrap());
        assert!(cache.cache_node(&abs, None, false).unwrap());

        cache.set_max_size_in_bytes(ENTRY_OVERHEAD_BYTES);
        assert_eq!(cache.ensure_size_lower_than_max_size(), 0);
        assert!(cache.is_cached(&neg));
        assert!(cache.is_cached(&abs));
        assert!(cache.size_in_bytes() > cache.max_size_in_bytes());
    }

    #[test]
    fn test_candidates_for_caching() {
        let table = table(4);
        let universe = Universe::new();
        let x = universe.variable_for(&table, "x").unwrap();
        let one = universe.constant(1.0).unwrap();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        assert!(!cache.is_candidate_for_caching(&x));
        assert!(!cache.is_candidate_for_caching(&one));
        assert!(cache.is_candidate_for_caching(&neg));
    }

    #[test]
    fn test_sorted_values_are_kept_with_samples() {
        let table = table(6);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        cache.cache_node(&neg, None, true).unwrap();
        let before = cache.size_in_bytes();

        let all = cache.all_indices().clone();
        let sorted = cache.get_sorted_double_values(&neg, &all).unwrap();
        assert_eq!(sorted.rows().collect::<Vec<_>>(), vec![5, 4, 3, 2, 1, 0]);
        assert!(cache.size_in_bytes() > before);

        let again = cache.get_sorted_double_values(&neg, &all).unwrap();
        assert!(Arc::ptr_eq(&sorted, &again));

        let subset = Arc::new(IndexSet::from_iter([0, 4]));
        let partial = cache.get_sorted_double_values(&neg, &subset).unwrap();
        assert_eq!(partial.iter().collect::<Vec<_>>(), vec![(4, -4.0), (0, 0.0)]);
    }

    #[test]
    fn test_sorted_hits_are_counted_apart() {
        let table = table(6);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        cache.cache_node(&neg, None, true).unwrap();

        let all = cache.all_indices().clone();
        cache.get_sorted_double_values(&neg, &all).unwrap();
        cache.get_sorted_double_values(&neg, &all).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.sorted_hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_empty_index_set() {
        let table = table(4);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        let empty = Arc::new(IndexSet::new());
        let samples = cache.get_samples(&neg, &empty).unwrap();
        assert!(samples.is_empty());
        assert!(cache.get_sorted_double_values(&neg, &empty).unwrap().is_empty());
        assert_eq!(cache.stats().tracked_nodes, 0);
    }

    #[test]
    fn test_check_cache_is_correct() {
        let table = table(5);
        let universe = Universe::new();
        let neg = negate(&universe, &table);
        let cache = SamplesCache::new(table, &config(0));
        cache.cache_node(&neg, None, true).unwrap();
        assert!(cache.check_cache_is_correct(&neg).unwrap());

        cache
            .cache_node(&neg, Some(Vector::Double(vec![0.0; 5])), true)
            .unwrap();
        assert!(!cache.check_cache_is_correct(&neg).unwrap());
    }
}
