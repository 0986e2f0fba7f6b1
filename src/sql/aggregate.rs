/// GROUP BY and aggregate functions
use ahash::{AHashMap, AHashSet};

use super::ast::{AggregateArg, AggregateCall, AggregateFunction, ColumnRef, SelectItem};
use super::evaluator::ColumnScope;
use crate::error::{EngineError, Result};
use crate::types::{SqlRow, Value};

/// One output row of the aggregate path
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    /// Output name -> value, one entry per select item
    pub values: SqlRow,
    /// First source row of the group (none for an empty implicit group)
    pub first: Option<SqlRow>,
}

impl GroupedRow {
    /// Row that HAVING and ORDER BY see: the group's first source row with
    /// the output values layered on top
    pub fn context(&self) -> SqlRow {
        let mut row = self.first.clone().unwrap_or_default();
        row.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        row
    }
}

/// Group `rows` by the `group_by` columns and evaluate `items` per group.
///
/// Groups keep first-seen order. Without GROUP BY every row falls into a
/// single group, which exists even when there are no rows.
pub fn aggregate(
    items: &[SelectItem],
    group_by: &[ColumnRef],
    rows: Vec<SqlRow>,
    scope: &ColumnScope,
) -> Result<Vec<GroupedRow>> {
    let groups = if group_by.is_empty() {
        vec![rows]
    } else {
        group_rows(group_by, rows, scope)?
    };

    let mut output = Vec::with_capacity(groups.len());
    for group in groups {
        let mut values = SqlRow::with_capacity(items.len());
        for item in items {
            let value = match item {
                SelectItem::Column { column, .. } => group
                    .first()
                    .map(|row| scope.lookup(row, &column.to_string()).clone())
                    .unwrap_or(Value::Null),
                SelectItem::Aggregate { call, .. } => compute(call, &group, scope)?,
            };
            values.insert(item.output_name(), value);
        }
        output.push(GroupedRow {
            values,
            first: group.into_iter().next(),
        });
    }

    Ok(output)
}

fn group_rows(group_by: &[ColumnRef], rows: Vec<SqlRow>, scope: &ColumnScope) -> Result<Vec<Vec<SqlRow>>> {
    let names: Vec<String> = group_by.iter().map(|c| c.to_string()).collect();
    let mut positions: AHashMap<String, usize> = AHashMap::new();
    let mut groups: Vec<Vec<SqlRow>> = Vec::new();

    for row in rows {
        let key_values: Vec<&Value> = names.iter().map(|n| scope.lookup(&row, n)).collect();
        let key = group_key(&key_values)?;

        match positions.get(&key) {
            Some(&pos) => groups[pos].push(row),
            None => {
                positions.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    Ok(groups)
}

fn group_key<T: serde::Serialize + ?Sized>(values: &T) -> Result<String> {
    serde_json::to_string(values).map_err(|e| EngineError::Semantic(format!("cannot group values: {}", e)))
}

/// Evaluate one aggregate call over a group
pub fn compute(call: &AggregateCall, rows: &[SqlRow], scope: &ColumnScope) -> Result<Value> {
    let column = match &call.argument {
        AggregateArg::Star => {
            if call.function != AggregateFunction::Count || call.distinct {
                return Err(EngineError::Semantic(format!("{} is not supported", call)));
            }
            return Ok(Value::Integer(rows.len() as i64));
        }
        AggregateArg::Column(column) => column.to_string(),
    };

    let mut values: Vec<&Value> = rows
        .iter()
        .map(|row| scope.lookup(row, &column))
        .collect();

    if call.distinct {
        let mut seen = AHashSet::new();
        let mut unique = Vec::with_capacity(values.len());
        for value in values {
            if !value.is_null() && seen.insert(group_key(value)?) {
                unique.push(value);
            }
        }
        values = unique;
    }

    let value = match call.function {
        AggregateFunction::Count => Value::Integer(values.iter().filter(|v| !v.is_null()).count() as i64),
        AggregateFunction::Sum => sum(&values),
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Real(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => extreme(&values, |candidate, best| candidate < best),
        AggregateFunction::Max => extreme(&values, |candidate, best| candidate > best),
    };

    Ok(value)
}

/// Null and non-numeric values count as 0. Stays an integer while every
/// input is integral and the sum fits.
fn sum(values: &[&Value]) -> Value {
    let mut int_sum: Option<i64> = Some(0);
    let mut real_sum = 0.0;

    for value in values {
        match value {
            Value::Integer(i) => {
                int_sum = int_sum.and_then(|s| s.checked_add(*i));
                real_sum += *i as f64;
            }
            other => {
                if let Some(f) = other.as_f64() {
                    real_sum += f;
                    if matches!(other, Value::Real(_)) || f.fract() != 0.0 {
                        int_sum = None;
                    } else {
                        int_sum = int_sum.and_then(|s| s.checked_add(f as i64));
                    }
                }
            }
        }
    }

    match int_sum {
        Some(i) => Value::Integer(i),
        None => Value::Real(real_sum),
    }
}

/// MIN/MAX over numeric values, returning the original value
fn extreme(values: &[&Value], better: impl Fn(f64, f64) -> bool) -> Value {
    let mut best: Option<(&Value, f64)> = None;
    for &value in values {
        if let Some(n) = value.as_f64() {
            if best.map_or(true, |(_, b)| better(n, b)) {
                best = Some((value, n));
            }
        }
    }
    best.map(|(v, _)| v.clone()).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(city: &str, age: Value) -> SqlRow {
        let mut row = SqlRow::new();
        row.insert("city".into(), Value::Text(city.into()));
        row.insert("age".into(), age);
        row
    }

    fn people() -> Vec<SqlRow> {
        vec![
            person("Oslo", Value::Integer(20)),
            person("Rome", Value::Integer(30)),
            person("Oslo", Value::Integer(40)),
            person("Rome", Value::Null),
        ]
    }

    fn agg(function: AggregateFunction, column: &str, distinct: bool) -> SelectItem {
        SelectItem::Aggregate {
            call: AggregateCall {
                function,
                argument: if column == "*" {
                    AggregateArg::Star
                } else {
                    AggregateArg::Column(ColumnRef::new(column))
                },
                distinct,
            },
            alias: None,
        }
    }

    fn call(function: AggregateFunction, column: &str) -> AggregateCall {
        match agg(function, column, false) {
            SelectItem::Aggregate { call, .. } => call,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_group_by_keeps_first_seen_order() {
        let items = vec![
            SelectItem::Column {
                column: ColumnRef::new("city"),
                alias: None,
            },
            agg(AggregateFunction::Count, "*", false),
            agg(AggregateFunction::Count, "age", false),
            agg(AggregateFunction::Avg, "age", false),
        ];
        let scope = ColumnScope::new("people", None);
        let out = aggregate(&items, &[ColumnRef::new("city")], people(), &scope).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].values["city"], Value::Text("Oslo".into()));
        assert_eq!(out[0].values["COUNT(*)"], Value::Integer(2));
        assert_eq!(out[0].values["AVG(age)"], Value::Real(30.0));
        assert_eq!(out[1].values["COUNT(*)"], Value::Integer(2));
        assert_eq!(out[1].values["COUNT(age)"], Value::Integer(1));
    }

    #[test]
    fn test_implicit_group_over_empty_input() {
        let items = vec![
            agg(AggregateFunction::Count, "*", false),
            agg(AggregateFunction::Sum, "age", false),
            agg(AggregateFunction::Max, "age", false),
        ];
        let out = aggregate(&items, &[], Vec::new(), &ColumnScope::unqualified()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].values["COUNT(*)"], Value::Integer(0));
        assert_eq!(out[0].values["SUM(age)"], Value::Integer(0));
        assert_eq!(out[0].values["MAX(age)"], Value::Null);
        assert!(out[0].first.is_none());
    }

    #[test]
    fn test_sum_integer_and_real() {
        let scope = ColumnScope::unqualified();
        let ints = people();
        assert_eq!(compute(&call(AggregateFunction::Sum, "age"), &ints, &scope).unwrap(), Value::Integer(90));

        let reals = vec![person("a", Value::Real(1.5)), person("b", Value::Text("x".into()))];
        assert_eq!(compute(&call(AggregateFunction::Sum, "age"), &reals, &scope).unwrap(), Value::Real(1.5));
    }

    #[test]
    fn test_min_max_return_original_value() {
        let scope = ColumnScope::unqualified();
        let rows = vec![
            person("a", Value::Text("7".into())),
            person("b", Value::Integer(3)),
            person("c", Value::Text("n/a".into())),
        ];
        assert_eq!(compute(&call(AggregateFunction::Min, "age"), &rows, &scope).unwrap(), Value::Integer(3));
        assert_eq!(
            compute(&call(AggregateFunction::Max, "age"), &rows, &scope).unwrap(),
            Value::Text("7".into())
        );
    }

    #[test]
    fn test_count_distinct() {
        let scope = ColumnScope::unqualified();
        let item = agg(AggregateFunction::Count, "city", true);
        let out = aggregate(&[item], &[], people(), &scope).unwrap();
        assert_eq!(out[0].values["COUNT(DISTINCT city)"], Value::Integer(2));
    }

    #[test]
    fn test_star_only_for_count() {
        let scope = ColumnScope::unqualified();
        let err = compute(&call(AggregateFunction::Sum, "*"), &people(), &scope).unwrap_err();
        assert!(matches!(err, EngineError::Semantic(_)));
    }

    #[test]
    fn test_context_layers_outputs_over_first_row() {
        let items = vec![agg(AggregateFunction::Count, "*", false)];
        let scope = ColumnScope::new("people", None);
        let out = aggregate(&items, &[ColumnRef::new("city")], people(), &scope).unwrap();
        let ctx = out[1].context();
        assert_eq!(ctx["city"], Value::Text("Rome".into()));
        assert_eq!(ctx["COUNT(*)"], Value::Integer(2));
    }
}
