// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Caching of node results and batch evaluation

mod eviction;
mod parallel;
mod samples_cache;
mod sorted_values;

pub use eviction::{select_victims, EntryStats, EvictionPolicy, EvictionStrategy, LeastRequested, RequestsPerByte};
pub use parallel::{ParallelEvaluator, Request};
pub use samples_cache::{CacheStats, SamplesCache, ENTRY_OVERHEAD_BYTES};
pub use sorted_values::SortedDoubleValues;
