// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Property tests: vectorised evaluation against row-wise evaluation

use approx::relative_eq;
use proptest::prelude::*;
use std::sync::Arc;
use tabexpr::data::Implementation;
use tabexpr::expression::dispatch_indices;
use tabexpr::{
    evaluate, parse_expression, CacheConfig, ExecutionContext, IndexSet, SamplesCache, Table,
    Universe, Value, ValueType,
};

const SOURCES: &[&str] = &[
    "add(mul(x, 2.0), z)",
    "(flag ? x : neg(z) : 1.0)",
    "(gt(x, 0.5) ? sum[x, z] : mean[x, z, 1.0])",
    "(and(flag, gt(z, 0.0)) ? log(abs(x)) : sqrt(z))",
    "max[x, z]",
    "is_missing(x)",
    "(or(flag, gt(x, 1.0)) ? true : false)",
    "linear([1.0, 0.5, -0.5], x, z)",
];

type Row = (Option<f64>, Option<f64>, Option<bool>);

fn cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![1 => Just(None), 4 => (-10.0f64..10.0).prop_map(Some)]
}

fn rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec((cell(), cell(), any::<Option<bool>>()), 1..40)
}

fn build_table(rows: &[Row]) -> Table {
    let mut table = Table::new();
    table.add_column("x", ValueType::Double).unwrap();
    table.add_column("z", ValueType::Double).unwrap();
    table.add_column("flag", ValueType::Boolean).unwrap();
    for (x, z, flag) in rows {
        table
            .add_row(&[
                x.map_or(Value::Missing, Value::Double),
                z.map_or(Value::Missing, Value::Double),
                flag.map_or(Value::Missing, Value::Boolean),
            ])
            .unwrap();
    }
    table
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Double(a), Value::Double(b)) => relative_eq!(*a, *b, max_relative = 1e-12),
        (a, b) => a == b,
    }
}

proptest! {
    #[test]
    fn prop_vectorised_matches_row_wise(rows in rows()) {
        let table = build_table(&rows);
        let universe = Universe::new();
        for source in SOURCES {
            let expr = parse_expression(source, &table, &universe).unwrap();
            let samples = evaluate(&expr, &table).unwrap();
            prop_assert_eq!(samples.len(), table.num_rows());
            for row in 0..table.num_rows() {
                let expected = expr.evaluate_row(&table, row).unwrap();
                let actual = samples.get(row);
                prop_assert!(same(&actual, &expected), "{} row {}: {} != {}", source, row, actual, expected);
            }
        }
    }

    #[test]
    fn prop_subsets_keep_their_order(
        (rows, order) in rows().prop_flat_map(|rows| {
            let n = rows.len();
            (Just(rows), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        }),
        keep in 0usize..40,
    ) {
        let table = build_table(&rows);
        let universe = Universe::new();
        let subset: IndexSet = order.iter().copied().take(keep.min(order.len())).collect();
        let subset = Arc::new(subset);
        let ctx = ExecutionContext::new(&table);
        for source in SOURCES {
            let expr = parse_expression(source, &table, &universe).unwrap();
            let full = evaluate(&expr, &table).unwrap();
            let partial = expr.compute(&ctx, &subset).unwrap();
            prop_assert_eq!(partial.len(), subset.len());
            for (position, row) in subset.iter().enumerate() {
                prop_assert!(same(&partial.get(position), &full.get(row)));
            }
        }
    }

    #[test]
    fn prop_dispatch_partitions_every_row(rows in rows()) {
        let table = build_table(&rows);
        let universe = Universe::new();
        let flag = parse_expression("flag", &table, &universe).unwrap();
        let partition = dispatch_indices(&evaluate(&flag, &table).unwrap()).unwrap();
        prop_assert_eq!(partition.len(), rows.len());

        for (branch, expected) in [
            (&partition.success, Some(true)),
            (&partition.failure, Some(false)),
            (&partition.missing, None),
        ] {
            prop_assert!(branch.is_sorted());
            for row in branch.iter() {
                prop_assert_eq!(rows[row].2, expected);
            }
        }
    }

    #[test]
    fn prop_cache_is_transparent(rows in rows(), max_size in 0usize..4096) {
        let table = Arc::new(build_table(&rows));
        let universe = Universe::new();
        let cache = SamplesCache::new(
            table.clone(),
            &CacheConfig { max_size_in_bytes: max_size, ..CacheConfig::default() },
        );
        let all = table.all_indices();
        for source in SOURCES {
            let expr = parse_expression(source, &table, &universe).unwrap();
            let expected = evaluate(&expr, &table).unwrap().to_values();
            for _ in 0..2 {
                let samples = expr.compute(&cache.context(), &all).unwrap();
                let values = samples.to_values();
                prop_assert!(values.iter().zip(&expected).all(|(a, b)| same(a, b)));
            }
            if max_size > 0 {
                prop_assert!(cache.size_in_bytes() <= max_size);
            }
        }
    }

    #[test]
    fn prop_constants_fold_for_any_index_set(rows in rows(), keep in 0usize..40) {
        let table = build_table(&rows);
        let universe = Universe::new();
        let expr = parse_expression("add(mul(2.0, 3.0), 1.0)", &table, &universe).unwrap();
        let indices = Arc::new(IndexSet::range(0, keep.min(rows.len())));
        let samples = expr.compute(&ExecutionContext::new(&table), &indices).unwrap();
        prop_assert_eq!(samples.implementation(), Implementation::Constant);
        prop_assert_eq!(samples.len(), indices.len());
        prop_assert_eq!(samples.constant_value(), Some(&Value::Double(7.0)));
    }
}
