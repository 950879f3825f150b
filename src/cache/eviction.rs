// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Eviction policies ranking resident cache entries

use crate::expression::ExprId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// What a policy may look at when scoring an entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryStats {
    pub requests: u64,
    pub size_in_bytes: usize,
}

/// Ranks entries for eviction; the lowest score goes first
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn score(&self, stats: &EntryStats) -> f64;
}

/// Requests served per byte held: big, rarely used vectors go first
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestsPerByte;

impl EvictionPolicy for RequestsPerByte {
    fn name(&self) -> &'static str {
        "requests_per_byte"
    }

    fn score(&self, stats: &EntryStats) -> f64 {
        stats.requests as f64 / stats.size_in_bytes.max(1) as f64
    }
}

/// Plain request count, ignoring size
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRequested;

impl EvictionPolicy for LeastRequested {
    fn name(&self) -> &'static str {
        "least_requested"
    }

    fn score(&self, stats: &EntryStats) -> f64 {
        stats.requests as f64
    }
}

/// Serializable choice of built-in policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    #[default]
    RequestsPerByte,
    LeastRequested,
}

impl EvictionStrategy {
    pub fn build(self) -> Box<dyn EvictionPolicy> {
        match self {
            EvictionStrategy::RequestsPerByte => Box::new(RequestsPerByte),
            EvictionStrategy::LeastRequested => Box::new(LeastRequested),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "requests_per_byte" => Some(EvictionStrategy::RequestsPerByte),
            "least_requested" => Some(EvictionStrategy::LeastRequested),
            _ => None,
        }
    }
}

/// Up to `count` entries in eviction order
///
/// Ties go to the larger entry, then to the older id.
pub fn select_victims(
    policy: &dyn EvictionPolicy,
    candidates: Vec<(ExprId, EntryStats)>,
    count: usize,
) -> Vec<ExprId> {
    let mut scored: Vec<(f64, ExprId, EntryStats)> = candidates
        .into_iter()
        .map(|(id, stats)| (policy.score(&stats), id, stats))
        .collect();
    scored.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.2.size_in_bytes.cmp(&a.2.size_in_bytes))
            .then_with(|| a.1.cmp(&b.1))
    });
    scored.into_iter().take(count).map(|(_, id, _)| id).collect()
}
