// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression parser using pest

use crate::data::{Table, Value, ValueType};
use crate::error::{EngineError, Result};
use crate::expression::{Aggregator, Expr, Function, Model, TreeModel, Universe};
use ahash::AHashMap;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "io/expression.pest"]
struct ExpressionParser;

/// Parse an expression over the columns of `table`
///
/// Identifiers name table columns; every occurrence of one name resolves to
/// the same variable node.
pub fn parse_expression(source: &str, table: &Table, universe: &Universe) -> Result<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::expression, source)
        .map_err(|e| EngineError::Parse(e.to_string()))?;
    let root = pairs
        .next()
        .and_then(|expression| expression.into_inner().next())
        .ok_or_else(|| EngineError::Parse("empty expression".to_string()))?;

    let mut builder = Builder {
        table,
        universe,
        variables: AHashMap::new(),
    };
    builder.build(root)
}

struct Builder<'a> {
    table: &'a Table,
    universe: &'a Universe,
    variables: AHashMap<String, Expr>,
}

impl Builder<'_> {
    fn build(&mut self, pair: Pair<'_, Rule>) -> Result<Expr> {
        match pair.as_rule() {
            Rule::test => {
                let mut parts = pair
                    .into_inner()
                    .map(|p| self.build(p))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(condition), Some(success), Some(failure)) => {
                        self.universe.test(condition, success, failure, parts.next())
                    }
                    _ => Err(EngineError::Parse("incomplete test".to_string())),
                }
            }
            Rule::aggregate => {
                let mut inner = pair.into_inner();
                let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
                let aggregator = Aggregator::from_name(name)
                    .ok_or_else(|| EngineError::Parse(format!("unknown aggregator '{}'", name)))?;
                let nodes = inner.map(|p| self.build(p)).collect::<Result<Vec<_>>>()?;
                self.universe.aggregator(aggregator, nodes)
            }
            Rule::call => self.build_call(pair),
            Rule::missing => {
                let name = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str())
                    .unwrap_or_default();
                let ty = ValueType::from_name(name)
                    .ok_or_else(|| EngineError::Parse(format!("unknown type '{}'", name)))?;
                Ok(self.universe.missing(ty))
            }
            Rule::boolean | Rule::number | Rule::string => {
                self.universe.constant(literal(pair)?)
            }
            Rule::identifier => self.variable(pair.as_str()),
            rule => Err(EngineError::Parse(format!(
                "unexpected {:?} at '{}'",
                rule,
                pair.as_str()
            ))),
        }
    }

    fn variable(&mut self, name: &str) -> Result<Expr> {
        if let Some(expr) = self.variables.get(name) {
            return Ok(expr.clone());
        }
        let expr = self.universe.variable_for(self.table, name)?;
        self.variables.insert(name.to_string(), expr.clone());
        Ok(expr)
    }

    fn build_call(&mut self, pair: Pair<'_, Rule>) -> Result<Expr> {
        let mut inner = pair.into_inner();
        let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
        let args: Vec<Pair<'_, Rule>> = inner.collect();

        match name {
            "gt" => {
                let [x, threshold] = two_args(name, args)?;
                let threshold = literal(threshold)?.as_f64().ok_or_else(|| {
                    EngineError::Parse("gt threshold must be a number".to_string())
                })?;
                let x = self.build(x)?;
                self.universe.function(Function::GreaterThan(threshold), vec![x])
            }
            "eq" => {
                let [x, value] = two_args(name, args)?;
                let value = literal(value)?;
                let x = self.build(x)?;
                let value = match (x.value_type(), value) {
                    (ValueType::Double, Value::Integer(i)) => Value::Double(i as f64),
                    (_, value) => value,
                };
                self.universe.function(Function::Equals(value), vec![x])
            }
            "linear" => {
                let mut args = args.into_iter();
                let weights = number_list(args.next())?;
                let inputs = input_names(args)?;
                self.universe.model(Model::Linear { inputs, weights })
            }
            "perceptron" => {
                let mut args = args.into_iter();
                let weights = number_list(args.next())?;
                let means = number_list(args.next())?;
                let std_devs = number_list(args.next())?;
                let inputs = input_names(args)?;
                self.universe.model(Model::Perceptron {
                    inputs,
                    weights,
                    means,
                    std_devs,
                })
            }
            "tree" => {
                let mut args = args.into_iter();
                let root = args
                    .next()
                    .ok_or_else(|| EngineError::Parse("tree needs a root".to_string()))
                    .and_then(tree_model)?;
                let inputs = input_names(args)?;
                self.universe.model(Model::DecisionTree { inputs, root })
            }
            _ => {
                let function = Function::from_name(name)
                    .ok_or_else(|| EngineError::Parse(format!("unknown function '{}'", name)))?;
                let arguments = args
                    .into_iter()
                    .map(|p| self.build(p))
                    .collect::<Result<Vec<_>>>()?;
                self.universe.function(function, arguments)
            }
        }
    }
}

fn two_args<'i>(name: &str, args: Vec<Pair<'i, Rule>>) -> Result<[Pair<'i, Rule>; 2]> {
    let found = args.len();
    <[Pair<'i, Rule>; 2]>::try_from(args).map_err(|_| EngineError::Arity {
        function: name.to_string(),
        expected: 2,
        found,
    })
}

fn literal(pair: Pair<'_, Rule>) -> Result<Value> {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::boolean => Ok(Value::Boolean(text == "true")),
        Rule::number if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) => text
            .parse::<f64>()
            .map(Value::double)
            .map_err(|e| EngineError::Parse(format!("bad number '{}': {}", text, e))),
        Rule::number => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| EngineError::Parse(format!("bad integer '{}': {}", text, e))),
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
            Ok(Value::symbol(&unescape(inner)))
        }
        rule => Err(EngineError::Parse(format!(
            "expected a literal, found {:?} '{}'",
            rule, text
        ))),
    }
}

fn number_list(pair: Option<Pair<'_, Rule>>) -> Result<Vec<f64>> {
    match pair {
        Some(pair) if pair.as_rule() == Rule::list => pair
            .into_inner()
            .map(|p| {
                p.as_str()
                    .parse::<f64>()
                    .map_err(|e| EngineError::Parse(format!("bad number '{}': {}", p.as_str(), e)))
            })
            .collect(),
        _ => Err(EngineError::Parse("expected a list of numbers".to_string())),
    }
}

fn input_names<'i>(args: impl Iterator<Item = Pair<'i, Rule>>) -> Result<Vec<String>> {
    args.map(|p| match p.as_rule() {
        Rule::identifier => Ok(p.as_str().to_string()),
        _ => Err(EngineError::Parse(format!(
            "model inputs must be column names, found '{}'",
            p.as_str()
        ))),
    })
    .collect()
}

fn tree_model(pair: Pair<'_, Rule>) -> Result<TreeModel> {
    match pair.as_rule() {
        Rule::list => Ok(TreeModel::leaf(number_list(Some(pair))?)),
        Rule::tree_node => {
            let mut inner = pair.into_inner();
            let (feature, threshold, right, left) =
                match (inner.next(), inner.next(), inner.next(), inner.next()) {
                    (Some(f), Some(t), Some(r), Some(l)) => (f, t, r, l),
                    _ => return Err(EngineError::Parse("incomplete tree split".to_string())),
                };
            let feature = feature
                .as_str()
                .parse::<usize>()
                .map_err(|e| EngineError::Parse(format!("bad feature index: {}", e)))?;
            let threshold = threshold
                .as_str()
                .parse::<f64>()
                .map_err(|e| EngineError::Parse(format!("bad threshold: {}", e)))?;
            Ok(TreeModel::split(feature, threshold, tree_model(left)?, tree_model(right)?))
        }
        _ => Err(EngineError::Parse(format!(
            "expected a tree node, found '{}'",
            pair.as_str()
        ))),
    }
}

fn unescape(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            res.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => res.push('\n'),
            Some('t') => res.push('\t'),
            Some('r') => res.push('\r'),
            Some('0') => res.push('\0'),
            Some('u') => {
                // \u{XXXX}
                let code: String = chars
                    .by_ref()
                    .skip_while(|&c| c == '{')
                    .take_while(|&c| c != '}')
                    .collect();
                if let Some(decoded) = u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    res.push(decoded);
                }
            }
            Some(other) => res.push(other),
            None => {}
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExprKind;
    use std::sync::Arc;

    fn table() -> Table {
        let mut table = Table::new();
        table.add_column("x", ValueType::Double).unwrap();
        table.add_column("y", ValueType::Boolean).unwrap();
        table.add_column("s", ValueType::Symbol).unwrap();
        table.add_column("n", ValueType::Integer).unwrap();
        table
    }

    #[test]
    fn test_parse_literals() {
        let table = table();
        let universe = Universe::new();
        let parse = |s: &str| parse_expression(s, &table, &universe).unwrap();
        assert_eq!(parse("1.5").constant_value(), Some(&Value::Double(1.5)));
        assert_eq!(parse("-3").constant_value(), Some(&Value::Integer(-3)));
        assert_eq!(parse("true").constant_value(), Some(&Value::Boolean(true)));
        assert_eq!(parse("\"a b\"").constant_value(), Some(&Value::symbol("a b")));
        let missing = parse("missing<integer>");
        assert!(missing.constant_value().unwrap().is_missing());
        assert_eq!(missing.value_type(), ValueType::Integer);
    }

    #[test]
    fn test_parse_test_expression() {
        let table = table();
        let universe = Universe::new();
        let expr = parse_expression("(y ? 10.0 : -10.0 : 0.0)", &table, &universe).unwrap();
        match expr.kind() {
            ExprKind::Test { missing, .. } => assert!(missing.is_some()),
            other => panic!("expected a test, got {:?}", other),
        }
        assert_eq!(expr.value_type(), ValueType::Double);
    }

    #[test]
    fn test_variables_are_shared() {
        let table = table();
        let universe = Universe::new();
        let expr = parse_expression("add(x, mul(x, 2.0))", &table, &universe).unwrap();
        let first = expr.sub_node(0).unwrap();
        let second = expr.sub_node(1).unwrap().sub_node(0).unwrap();
        assert!(Arc::ptr_eq(first, second));
    }

    #[test]
    fn test_aggregate_and_min_function_coexist() {
        let table = table();
        let universe = Universe::new();
        let agg = parse_expression("min[x, 1.0]", &table, &universe).unwrap();
        assert!(matches!(agg.kind(), ExprKind::Aggregator { .. }));
        let fun = parse_expression("min(x, 1.0)", &table, &universe).unwrap();
        assert!(matches!(fun.kind(), ExprKind::Function { .. }));
    }

    #[test]
    fn test_display_round_trip() {
        let table = table();
        let universe = Universe::new();
        for source in [
            "(gt(x, 2.5) ? sum[x, to_double(n)] : neg(x))",
            "(and(y, eq(s, \"a\\\"b\")) ? 1.0 : 2.0 : missing<double>)",
            "vote[y, not(y), is_missing(s)]",
            "linear([0.5, 1.0, -2.0], x, n)",
            "perceptron([0.0, 1.0], [2.0], [0.5], x)",
            "tree({0 > 1.5 ? [1.0, 0.0] : {0 > -1.0 ? [2.0, 0.0] : [3.0, 1.0]}}, x)",
        ] {
            let expr = parse_expression(source, &table, &universe).unwrap();
            let text = expr.to_string();
            let again = parse_expression(&text, &table, &universe).unwrap();
            assert_eq!(again.to_string(), text, "round trip of {}", source);
        }
    }

    #[test]
    fn test_parse_errors() {
        let table = table();
        let universe = Universe::new();
        assert!(matches!(
            parse_expression("add(x", &table, &universe),
            Err(EngineError::Parse(_))
        ));
        assert!(matches!(
            parse_expression("frobnicate(x)", &table, &universe),
            Err(EngineError::Parse(_))
        ));
        assert!(matches!(
            parse_expression("zzz", &table, &universe),
            Err(EngineError::MissingInput { .. })
        ));
        assert!(matches!(
            parse_expression("add(x, y)", &table, &universe),
            Err(EngineError::TypeMismatch { .. })
        ));
        assert!(matches!(
            parse_expression("gt(x)", &table, &universe),
            Err(EngineError::Arity { .. })
        ));
    }
}
