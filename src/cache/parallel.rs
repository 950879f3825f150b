// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parallel batch evaluation using rayon

use super::SamplesCache;
use crate::data::{DataVector, IndexSet, Table};
use crate::error::{EngineError, Result};
use crate::expression::{ExecutionContext, Expr};
use rayon::prelude::*;
use std::sync::Arc;

/// One evaluation request: a node and the rows wanted
pub type Request = (Expr, Arc<IndexSet>);

/// Evaluates independent requests concurrently
///
/// Requests sharing a cache see each other's cached nodes; results come
/// back in request order.
#[derive(Default)]
pub struct ParallelEvaluator {
    pool: Option<rayon::ThreadPool>,
}

impl ParallelEvaluator {
    /// Run on the global rayon pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Run on a dedicated pool of `threads` workers
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tabexpr-worker-{}", i))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build thread pool: {}", e)))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    pub fn compute_batch(&self, cache: &SamplesCache, requests: &[Request]) -> Vec<Result<DataVector>> {
        self.install(|| {
            requests
                .par_iter()
                .map(|(expr, indices)| cache.get_samples(expr, indices))
                .collect()
        })
    }

    /// Like [`Self::compute_batch`] without any caching
    pub fn compute_uncached(&self, table: &Table, requests: &[Request]) -> Vec<Result<DataVector>> {
        let ctx = ExecutionContext::new(table);
        self.install(|| {
            requests
                .par_iter()
                .map(|(expr, indices)| expr.compute(&ctx, indices))
                .collect()
        })
    }

    fn install<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
