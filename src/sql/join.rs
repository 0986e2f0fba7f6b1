/// Nested-loop JOIN over merged rows
///
/// Rows produced so far (the base table plus any earlier joins) are the left
/// side. Columns of the joined table enter the merged row as `binding.column`.
use super::ast::{ColumnRef, Join, JoinType};
use super::evaluator::ColumnScope;
use crate::error::Result;
use crate::governor::Deadline;
use crate::types::{SqlRow, Value};

/// The two ends of an ON equality, split by side
#[derive(Debug, Clone, PartialEq)]
pub struct JoinKeys {
    /// Operand read from the rows so far (any qualifier form)
    pub outer: ColumnRef,
    /// Bare column of the joined table
    pub inner: String,
}

impl JoinKeys {
    /// An operand qualified by the joined table's alias belongs to it, as does
    /// one qualified by its table name unless that name also names the base
    /// table (a self-join). Otherwise the left operand reads the rows so far
    /// and the right operand the joined table.
    pub fn resolve(join: &Join, scope: &ColumnScope) -> Self {
        let names_joined = |c: &ColumnRef| {
            c.table.as_deref().map_or(false, |q| {
                join.table.alias.as_deref() == Some(q) || (q == join.table.name && !scope.names_base(q))
            })
        };

        if !names_joined(&join.right) && names_joined(&join.left) {
            JoinKeys {
                outer: join.right.clone(),
                inner: join.left.column.clone(),
            }
        } else {
            JoinKeys {
                outer: join.left.clone(),
                inner: join.right.column.clone(),
            }
        }
    }
}

/// Join `left_rows` with the raw rows of the joined table.
///
/// `left_columns` are the keys present on the left side and `right_columns`
/// the joined table's schema columns; both are needed to null-fill the
/// unmatched side of an outer join.
pub fn nested_loop_join(
    left_rows: &[SqlRow],
    right_rows: &[SqlRow],
    join: &Join,
    scope: &ColumnScope,
    left_columns: &[String],
    right_columns: &[String],
    deadline: &Deadline,
) -> Result<Vec<SqlRow>> {
    let keys = JoinKeys::resolve(join, scope);
    let outer_name = keys.outer.to_string();
    let binding = join.table.binding();

    let matches = |left: &SqlRow, right: &SqlRow| -> bool {
        let l = scope.lookup(left, &outer_name);
        let r = right.get(&keys.inner).unwrap_or(&Value::Null);
        l.sql_eq(r)
    };

    let mut result = Vec::new();

    match join.join_type {
        JoinType::Inner | JoinType::Left => {
            for left_row in left_rows {
                deadline.check()?;
                let mut matched = false;

                for right_row in right_rows {
                    if matches(left_row, right_row) {
                        result.push(combine_rows(left_row, right_row, binding));
                        matched = true;
                    }
                }

                // LEFT: keep the row with every joined column null
                if !matched && join.join_type == JoinType::Left {
                    result.push(combine_rows(left_row, &null_row(right_columns), binding));
                }
            }
        }
        JoinType::Right => {
            let null_left = null_row(left_columns);

            for right_row in right_rows {
                deadline.check()?;
                let mut matched = false;

                for left_row in left_rows {
                    if matches(left_row, right_row) {
                        result.push(combine_rows(left_row, right_row, binding));
                        matched = true;
                    }
                }

                if !matched {
                    result.push(combine_rows(&null_left, right_row, binding));
                }
            }
        }
    }

    Ok(result)
}

/// Left row as-is plus the right row's columns under `binding.`
fn combine_rows(left: &SqlRow, right: &SqlRow, binding: &str) -> SqlRow {
    let mut combined = SqlRow::with_capacity(left.len() + right.len());
    combined.extend(left.iter().map(|(k, v)| (k.clone(), v.clone())));
    combined.extend(
        right
            .iter()
            .map(|(k, v)| (format!("{}.{}", binding, k), v.clone())),
    );
    combined
}

fn null_row(columns: &[String]) -> SqlRow {
    columns.iter().map(|c| (c.clone(), Value::Null)).collect()
}
