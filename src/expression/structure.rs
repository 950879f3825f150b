// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Structural queries over the expression DAG
//!
//! Tree-oriented operations (`tree_size`, `node_by_tree_index`, sampling)
//! view the DAG as the tree obtained by unfolding shared sub-expressions,
//! so a node reachable through two parents counts twice.

use super::node::{Expr, ExprKind, ExpressionNode, Universe};
use crate::error::Result;
use rand::Rng;
use std::sync::Arc;

impl ExpressionNode {
    pub fn num_sub_nodes(&self) -> usize {
        match self.kind() {
            ExprKind::Function { arguments, .. } => arguments.len(),
            ExprKind::Aggregator { nodes, .. } => nodes.len(),
            ExprKind::Test { missing, .. } => 3 + usize::from(missing.is_some()),
            _ => 0,
        }
    }

    /// Child `index`; test children are ordered condition, success,
    /// failure, missing
    pub fn sub_node(&self, index: usize) -> Option<&Expr> {
        match self.kind() {
            ExprKind::Function { arguments, .. } => arguments.get(index),
            ExprKind::Aggregator { nodes, .. } => nodes.get(index),
            ExprKind::Test {
                condition,
                success,
                failure,
                missing,
            } => match index {
                0 => Some(condition),
                1 => Some(success),
                2 => Some(failure),
                3 => missing.as_ref(),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn sub_nodes(&self) -> impl Iterator<Item = &Expr> + '_ {
        (0..self.num_sub_nodes()).filter_map(move |i| self.sub_node(i))
    }

    pub fn is_leaf(&self) -> bool {
        self.num_sub_nodes() == 0
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn depth(&self) -> usize {
        1 + self.sub_nodes().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Shallowest depth of `node` below this one, counted in nodes like
    /// [`Self::depth`] (this node is 1)
    pub fn node_depth(&self, node: &ExpressionNode) -> Option<usize> {
        if self.id() == node.id() {
            return Some(1);
        }
        self.sub_nodes()
            .filter_map(|c| c.node_depth(node))
            .min()
            .map(|d| d + 1)
    }

    /// Number of nodes of the unfolded tree
    pub fn tree_size(&self) -> usize {
        1 + self.sub_nodes().map(|c| c.tree_size()).sum::<usize>()
    }

    /// Node at pre-order position `index` of the unfolded tree
    pub fn node_by_tree_index(self: &Arc<Self>, mut index: usize) -> Option<Expr> {
        if index == 0 {
            return Some(self.clone());
        }
        index -= 1;
        for child in self.sub_nodes() {
            let size = child.tree_size();
            if index < size {
                return child.node_by_tree_index(index);
            }
            index -= size;
        }
        None
    }

    /// Nodes with children, in pre-order, duplicates included
    pub fn internal_nodes(self: &Arc<Self>) -> Vec<Expr> {
        let mut res = Vec::new();
        self.collect_nodes(&mut res, |n| !n.is_leaf());
        res
    }

    /// Childless nodes, in pre-order, duplicates included
    pub fn leaf_nodes(self: &Arc<Self>) -> Vec<Expr> {
        let mut res = Vec::new();
        self.collect_nodes(&mut res, ExpressionNode::is_leaf);
        res
    }

    fn collect_nodes(self: &Arc<Self>, res: &mut Vec<Expr>, keep: fn(&ExpressionNode) -> bool) {
        if keep(self) {
            res.push(self.clone());
        }
        for child in self.sub_nodes() {
            child.collect_nodes(res, keep);
        }
    }

    /// Uniform draw among the nodes of the unfolded tree
    pub fn sample_node<R: Rng + ?Sized>(self: &Arc<Self>, rng: &mut R) -> Expr {
        let index = rng.gen_range(0..self.tree_size());
        self.node_by_tree_index(index).unwrap_or_else(|| self.clone())
    }

    /// Draw an internal node with probability `p_internal` (when any
    /// exist), a leaf otherwise
    pub fn sample_node_biased<R: Rng + ?Sized>(self: &Arc<Self>, rng: &mut R, p_internal: f64) -> Expr {
        let internal = self.internal_nodes();
        if !internal.is_empty() && rng.gen_bool(p_internal.clamp(0.0, 1.0)) {
            return internal[rng.gen_range(0..internal.len())].clone();
        }
        let leaves = self.leaf_nodes();
        leaves[rng.gen_range(0..leaves.len())].clone()
    }

    /// Uniform draw among the direct children
    pub fn sample_sub_node<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Expr> {
        match self.num_sub_nodes() {
            0 => None,
            n => self.sub_node(rng.gen_range(0..n)),
        }
    }
}

impl Universe {
    /// Copy of `root` where every occurrence of `source` is replaced by
    /// `target`
    ///
    /// Untouched sub-structure is shared with `root`; only the ancestors of
    /// a replaced occurrence are rebuilt, with fresh ids. Fails when the
    /// replacement changes a type its parent cannot accept.
    pub fn clone_and_substitute(&self, root: &Expr, source: &Expr, target: &Expr) -> Result<Expr> {
        if root.id() == source.id() {
            return Ok(target.clone());
        }
        if root.is_leaf() {
            return Ok(root.clone());
        }
        let mut changed = false;
        let mut children = Vec::with_capacity(root.num_sub_nodes());
        for child in root.sub_nodes() {
            let res = self.clone_and_substitute(child, source, target)?;
            changed |= !Arc::ptr_eq(&res, child);
            children.push(res);
        }
        if changed {
            self.rebuild(root, children)
        } else {
            Ok(root.clone())
        }
    }
}
