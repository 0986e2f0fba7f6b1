/// Query executor - executes SQL statements against a table store
use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;
use tracing::{debug, info};

use super::aggregate::aggregate;
use super::ast::*;
use super::evaluator::{ColumnScope, ExprEvaluator};
use super::join::{nested_loop_join, JoinKeys};
use super::result::ExecutionOutput;
use super::row_converter::validate_and_convert;
use crate::error::{EngineError, Result};
use crate::governor::{Deadline, Governor};
use crate::index::{build_index, IndexCache};
use crate::store::TableStore;
use crate::types::{ColumnDef, ColumnType, IndexDef, Row, RowId, SqlRow, TableSchema, Value};

/// Interprets one statement.
///
/// Store calls are issued one at a time and each is preceded by a deadline
/// check, so an expired statement stops before its next round trip.
pub struct QueryExecutor<'a> {
    store: &'a dyn TableStore,
    governor: &'a Governor,
    indexes: &'a IndexCache,
    evaluator: &'a ExprEvaluator,
    deadline: Deadline,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        governor: &'a Governor,
        indexes: &'a IndexCache,
        evaluator: &'a ExprEvaluator,
        deadline: Deadline,
    ) -> Self {
        Self {
            store,
            governor,
            indexes,
            evaluator,
            deadline,
        }
    }

    pub async fn execute(&self, stmt: Statement) -> Result<ExecutionOutput> {
        debug!(kind = stmt.kind(), "executing statement");
        match stmt {
            Statement::Select(s) => self.execute_select(s).await,
            Statement::Insert(i) => self.execute_insert(i).await,
            Statement::Update(u) => self.execute_update(u).await,
            Statement::Delete(d) => self.execute_delete(d).await,
            Statement::CreateTable(c) => self.execute_create_table(c).await,
            Statement::CreateIndex(c) => self.execute_create_index(c).await,
            Statement::DropTable(d) => self.execute_drop_table(d).await,
            Statement::ShowTables => self.execute_show_tables().await,
            Statement::DescribeTable(table_name) => self.execute_describe_table(&table_name).await,
        }
    }

    // ---- store access ----

    async fn find_table(&self, name: &str) -> Result<Option<TableSchema>> {
        self.deadline.check()?;
        Ok(self.store.get_table_by_name(name).await?)
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.deadline.check()?;
        Ok(self.store.list_table_names().await?)
    }

    /// Schema of `name` or an unknown-table error listing the known tables
    async fn schema(&self, name: &str) -> Result<TableSchema> {
        match self.find_table(name).await? {
            Some(schema) => Ok(schema),
            None => Err(EngineError::unknown_table(name, self.table_names().await?)),
        }
    }

    async fn rows(&self, schema: &TableSchema) -> Result<Vec<Row>> {
        self.deadline.check()?;
        Ok(self.store.select_rows(schema.id).await?)
    }

    // ---- DDL ----

    async fn execute_create_table(&self, stmt: CreateTableStmt) -> Result<ExecutionOutput> {
        if self.find_table(&stmt.table).await?.is_some() {
            if stmt.if_not_exists {
                return Ok(ExecutionOutput::Definition {
                    message: format!("Table '{}' already exists, skipped", stmt.table),
                });
            }
            return Err(EngineError::Semantic(format!("table '{}' already exists", stmt.table)));
        }

        let columns = prepare_columns(stmt.columns)?;

        self.deadline.check()?;
        let current = self.store.count_tables().await?;
        self.governor.check_table_quota(current)?;

        let column_count = columns.len();
        self.deadline.check()?;
        self.store
            .create_table(TableSchema::new(stmt.table.clone(), columns))
            .await?;

        info!(table = %stmt.table, columns = column_count, "table created");
        Ok(ExecutionOutput::Definition {
            message: format!("Table '{}' created", stmt.table),
        })
    }

    async fn execute_drop_table(&self, stmt: DropTableStmt) -> Result<ExecutionOutput> {
        let schema = match self.find_table(&stmt.table).await? {
            Some(schema) => schema,
            None if stmt.if_exists => {
                return Ok(ExecutionOutput::Definition {
                    message: format!("Table '{}' does not exist, skipped", stmt.table),
                });
            }
            None => return Err(EngineError::unknown_table(&stmt.table, self.table_names().await?)),
        };

        self.deadline.check()?;
        self.store.drop_table(schema.id).await?;
        let evicted = self.indexes.evict_table(&schema.name);

        info!(table = %schema.name, evicted_indexes = evicted, "table dropped");
        Ok(ExecutionOutput::Definition {
            message: format!("Table '{}' dropped", schema.name),
        })
    }

    async fn execute_create_index(&self, stmt: CreateIndexStmt) -> Result<ExecutionOutput> {
        let mut schema = self.schema(&stmt.table).await?;

        if schema.get_index(&stmt.index_name).is_some() {
            return Err(EngineError::Semantic(format!(
                "index '{}' already exists on table '{}'",
                stmt.index_name, schema.name
            )));
        }
        for column in &stmt.columns {
            if !schema.has_column(column) {
                return Err(EngineError::unknown_column(column, &schema.name, schema.column_names()));
            }
        }

        let def = IndexDef::new(stmt.index_name.clone(), stmt.columns.clone(), stmt.unique);
        let rows = self.rows(&schema).await?;
        let tree = build_index(&def, &rows)?;
        let (entries, height) = (tree.len(), tree.height());

        schema.add_index(def);
        self.deadline.check()?;
        self.store
            .update_table_indexes(schema.id, schema.indexes.clone())
            .await?;
        self.indexes.insert(&schema.name, &stmt.index_name, tree);

        info!(
            table = %schema.name,
            index = %stmt.index_name,
            entries,
            height,
            "index built"
        );
        Ok(ExecutionOutput::Definition {
            message: format!(
                "Index '{}' created on {}({})",
                stmt.index_name,
                schema.name,
                stmt.columns.join(", ")
            ),
        })
    }

    async fn execute_show_tables(&self) -> Result<ExecutionOutput> {
        let mut names = self.table_names().await?;
        names.sort();

        let rows = names
            .into_iter()
            .map(|name| {
                let mut row = SqlRow::new();
                row.insert("table_name".to_string(), Value::Text(name));
                row
            })
            .collect();

        Ok(ExecutionOutput::Rows {
            columns: vec!["table_name".to_string()],
            rows,
        })
    }

    async fn execute_describe_table(&self, table_name: &str) -> Result<ExecutionOutput> {
        let schema = self.schema(table_name).await?;

        let rows = schema
            .columns
            .iter()
            .map(|col| {
                let mut row = SqlRow::new();
                row.insert("column".into(), Value::Text(col.name.clone()));
                row.insert("type".into(), Value::Text(col.data_type.to_string()));
                row.insert("primary_key".into(), Value::Bool(col.primary_key));
                row.insert("unique".into(), Value::Bool(col.is_unique()));
                row.insert("not_null".into(), Value::Bool(col.not_null));
                row.insert("auto_increment".into(), Value::Bool(col.auto_increment));
                row.insert("default".into(), col.default_value.clone().unwrap_or(Value::Null));
                row
            })
            .collect();

        Ok(ExecutionOutput::Rows {
            columns: ["column", "type", "primary_key", "unique", "not_null", "auto_increment", "default"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        })
    }

    // ---- DML ----

    async fn execute_insert(&self, stmt: InsertStmt) -> Result<ExecutionOutput> {
        let schema = self.schema(&stmt.table).await?;
        let targets = insert_targets(&schema, stmt.columns.as_deref(), stmt.values.first().map(Vec::len))?;

        let existing = self.rows(&schema).await?;
        self.governor
            .check_row_quota(&schema.name, existing.len(), stmt.values.len())?;

        let auto_column = schema.auto_increment_column().map(|c| c.name.clone());
        let mut next_auto = auto_column
            .as_deref()
            .map(|name| next_auto_value(existing.iter().map(|r| &r.data), name));

        // Validate every row before the first write
        let mut staged: Vec<SqlRow> = Vec::with_capacity(stmt.values.len());
        for (row_no, values) in stmt.values.iter().enumerate() {
            if values.len() != targets.len() {
                return Err(EngineError::Semantic(format!(
                    "INSERT row {} has {} values but {} columns",
                    row_no + 1,
                    values.len(),
                    targets.len()
                )));
            }

            let provided: AHashMap<&str, &Value> = targets
                .iter()
                .map(|c| c.name.as_str())
                .zip(values.iter())
                .collect();

            let mut data = SqlRow::with_capacity(schema.columns.len());
            for column in &schema.columns {
                let supplied = provided.get(column.name.as_str()).copied();
                let mut value = validate_and_convert(supplied.unwrap_or(&Value::Null), column)?;
                if value.is_null() && column.auto_increment {
                    if let Some(next) = next_auto {
                        value = Value::Integer(next);
                    }
                }
                data.insert(column.name.clone(), fill_missing(value, column, supplied.is_none())?);
            }

            if let (Some(name), Some(next)) = (auto_column.as_deref(), next_auto.as_mut()) {
                if let Some(Value::Integer(assigned)) = data.get(name) {
                    *next = (*next).max(assigned.saturating_add(1));
                }
            }

            check_unique(&schema, &data, existing.iter().map(|r| &r.data))?;
            check_unique(&schema, &data, staged.iter())?;
            staged.push(data);
        }

        let mut inserted = 0;
        for data in staged {
            self.deadline.check()?;
            self.store.insert_row(schema.id, data).await?;
            inserted += 1;
        }

        debug!(table = %schema.name, rows = inserted, "rows inserted");
        Ok(ExecutionOutput::Modification {
            affected_rows: inserted,
            message: format!("{} row(s) inserted into '{}'", inserted, schema.name),
            warning: None,
        })
    }

    async fn execute_update(&self, stmt: UpdateStmt) -> Result<ExecutionOutput> {
        let schema = self.schema(&stmt.table).await?;
        let scope = ColumnScope::new(&schema.name, None);

        let mut assignments: Vec<(&ColumnDef, Value)> = Vec::with_capacity(stmt.assignments.len());
        for (name, value) in &stmt.assignments {
            let column = schema
                .get_column(name)
                .ok_or_else(|| EngineError::unknown_column(name, &schema.name, schema.column_names()))?;
            assignments.push((column, validate_and_convert(value, column)?));
        }
        if let Some(cond) = &stmt.where_clause {
            check_condition_columns(&schema, &scope, cond)?;
        }

        let mut matched: Vec<Row> = Vec::new();
        let mut untouched: Vec<Row> = Vec::new();
        for row in self.rows(&schema).await? {
            self.deadline.check()?;
            if self.matches(stmt.where_clause.as_ref(), &row.data, &scope) {
                matched.push(row);
            } else {
                untouched.push(row);
            }
        }

        let mut staged: Vec<(RowId, SqlRow)> = Vec::with_capacity(matched.len());
        for row in matched {
            let mut data = row.data;
            for (column, value) in &assignments {
                data.insert(column.name.clone(), fill_missing(value.clone(), column, false)?);
            }
            staged.push((row.id, data));
        }

        for (i, (_, data)) in staged.iter().enumerate() {
            check_unique(&schema, data, untouched.iter().map(|r| &r.data))?;
            check_unique(&schema, data, staged[..i].iter().map(|(_, d)| d))?;
        }

        let mut updated = 0;
        for (row_id, data) in staged {
            self.deadline.check()?;
            self.store.update_row(row_id, data).await?;
            updated += 1;
        }

        debug!(table = %schema.name, rows = updated, "rows updated");
        Ok(ExecutionOutput::Modification {
            affected_rows: updated,
            message: format!("{} row(s) updated in '{}'", updated, schema.name),
            warning: stmt.where_clause.is_none().then(|| {
                format!("UPDATE without WHERE modified every row of '{}'", schema.name)
            }),
        })
    }

    async fn execute_delete(&self, stmt: DeleteStmt) -> Result<ExecutionOutput> {
        let schema = self.schema(&stmt.table).await?;
        let scope = ColumnScope::new(&schema.name, None);
        if let Some(cond) = &stmt.where_clause {
            check_condition_columns(&schema, &scope, cond)?;
        }

        let mut doomed: Vec<RowId> = Vec::new();
        for row in self.rows(&schema).await? {
            self.deadline.check()?;
            if self.matches(stmt.where_clause.as_ref(), &row.data, &scope) {
                doomed.push(row.id);
            }
        }

        let mut deleted = 0;
        for row_id in doomed {
            self.deadline.check()?;
            self.store.delete_row(row_id).await?;
            deleted += 1;
        }

        debug!(table = %schema.name, rows = deleted, "rows deleted");
        Ok(ExecutionOutput::Modification {
            affected_rows: deleted,
            message: format!("{} row(s) deleted from '{}'", deleted, schema.name),
            warning: stmt.where_clause.is_none().then(|| {
                format!("DELETE without WHERE removed every row of '{}'", schema.name)
            }),
        })
    }

    fn matches(&self, cond: Option<&Condition>, row: &SqlRow, scope: &ColumnScope) -> bool {
        cond.map_or(true, |c| self.evaluator.eval(c, row, scope))
    }

    /// Rows satisfying `cond`; the deadline is checked per row since
    /// evaluation never yields to the runtime
    fn filter_rows(&self, rows: Vec<SqlRow>, cond: Option<&Condition>, scope: &ColumnScope) -> Result<Vec<SqlRow>> {
        let Some(cond) = cond else {
            return Ok(rows);
        };
        let mut kept = Vec::new();
        for row in rows {
            self.deadline.check()?;
            if self.evaluator.eval(cond, &row, scope) {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    // ---- SELECT ----

    async fn execute_select(&self, stmt: SelectStmt) -> Result<ExecutionOutput> {
        let base = self.schema(&stmt.from.name).await?;
        let mut joined = Vec::with_capacity(stmt.joins.len());
        for join in &stmt.joins {
            joined.push(self.schema(&join.table.name).await?);
        }

        let ctx = SelectContext::new(&stmt, &base, &joined);
        ctx.validate()?;

        let mut rows: Vec<SqlRow> = self.rows(&base).await?.into_iter().map(|r| r.data).collect();
        let mut left_columns = base.column_names();
        for (join, schema) in stmt.joins.iter().zip(&joined) {
            let right: Vec<SqlRow> = self.rows(schema).await?.into_iter().map(|r| r.data).collect();
            let right_columns = schema.column_names();
            rows = nested_loop_join(
                &rows,
                &right,
                join,
                &ctx.scope,
                &left_columns,
                &right_columns,
                &self.deadline,
            )?;
            left_columns.extend(
                right_columns
                    .iter()
                    .map(|c| format!("{}.{}", join.table.binding(), c)),
            );
        }

        let rows = self.filter_rows(rows, stmt.where_clause.as_ref(), &ctx.scope)?;

        let output = if ctx.is_aggregate() {
            self.finish_aggregate(&ctx, rows)?
        } else {
            self.finish_plain(&ctx, rows)?
        };

        if let ExecutionOutput::Rows { rows, .. } = &output {
            debug!(table = %base.name, joins = stmt.joins.len(), rows = rows.len(), "select finished");
        }
        Ok(output)
    }

    /// Sort, project, DISTINCT, then OFFSET/LIMIT
    fn finish_plain(&self, ctx: &SelectContext<'_>, mut rows: Vec<SqlRow>) -> Result<ExecutionOutput> {
        let stmt = ctx.stmt;

        // ORDER BY may name a select alias
        let order_keys: Vec<(String, bool)> = stmt
            .order_by
            .iter()
            .map(|o| (ctx.unalias(&o.column.to_string()), o.asc))
            .collect();
        if !order_keys.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &order_keys, &ctx.scope));
        }

        let columns: Vec<String> = match &stmt.projection {
            Projection::Star => ctx.available.clone(),
            Projection::Items(items) => items.iter().map(SelectItem::output_name).collect(),
        };

        let mut projected: Vec<SqlRow> = rows
            .iter()
            .map(|row| -> SqlRow {
                match &stmt.projection {
                    Projection::Star => columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect(),
                    Projection::Items(items) => items
                        .iter()
                        .filter_map(|item| match item {
                            SelectItem::Column { column, .. } => Some((
                                item.output_name(),
                                ctx.scope.lookup(row, &column.to_string()).clone(),
                            )),
                            SelectItem::Aggregate { .. } => None,
                        })
                        .collect(),
                }
            })
            .collect();

        if stmt.distinct {
            let mut seen = AHashSet::new();
            let mut unique = Vec::with_capacity(projected.len());
            for row in projected {
                let values: Vec<&Value> = columns.iter().map(|c| row.get(c).unwrap_or(&Value::Null)).collect();
                let key = serde_json::to_string(&values)
                    .map_err(|e| EngineError::Semantic(format!("cannot compare rows for DISTINCT: {}", e)))?;
                if seen.insert(key) {
                    unique.push(row);
                }
            }
            projected = unique;
        }

        Ok(ExecutionOutput::Rows {
            columns,
            rows: paginate(projected, stmt.offset, stmt.limit),
        })
    }

    /// Group, aggregate, HAVING, sort over output names, then OFFSET/LIMIT
    fn finish_aggregate(&self, ctx: &SelectContext<'_>, rows: Vec<SqlRow>) -> Result<ExecutionOutput> {
        let stmt = ctx.stmt;
        let items = match &stmt.projection {
            Projection::Items(items) => items,
            Projection::Star => {
                return Err(EngineError::Semantic(
                    "SELECT * cannot be combined with aggregates or GROUP BY".into(),
                ))
            }
        };

        let groups = aggregate(items, &stmt.group_by, rows, &ctx.scope)?;
        let mut contexts: Vec<(SqlRow, SqlRow)> = Vec::with_capacity(groups.len());
        for group in groups {
            self.deadline.check()?;
            let context = group.context();
            if self.matches(stmt.having.as_ref(), &context, &ctx.scope) {
                contexts.push((context, group.values));
            }
        }

        let order_keys: Vec<(String, bool)> = stmt
            .order_by
            .iter()
            .map(|o| (o.column.to_string(), o.asc))
            .collect();
        if !order_keys.is_empty() {
            contexts.sort_by(|a, b| compare_rows(&a.0, &b.0, &order_keys, &ctx.scope));
        }

        let rows: Vec<SqlRow> = contexts.into_iter().map(|(_, values)| values).collect();
        Ok(ExecutionOutput::Rows {
            columns: items.iter().map(SelectItem::output_name).collect(),
            rows: paginate(rows, stmt.offset, stmt.limit),
        })
    }
}

/// Column resolution for one SELECT: base columns are bare, joined columns
/// are `binding.column`
struct SelectContext<'s> {
    stmt: &'s SelectStmt,
    base: &'s TableSchema,
    joined: &'s [TableSchema],
    scope: ColumnScope,
    /// Every key of a merged row, base columns first, in join order
    available: Vec<String>,
    /// `available[..join_offsets[i]]` are the keys visible to join `i`'s ON
    join_offsets: Vec<usize>,
}

impl<'s> SelectContext<'s> {
    fn new(stmt: &'s SelectStmt, base: &'s TableSchema, joined: &'s [TableSchema]) -> Self {
        let mut available = base.column_names();
        let mut join_offsets = Vec::with_capacity(joined.len());
        for (join, schema) in stmt.joins.iter().zip(joined) {
            join_offsets.push(available.len());
            available.extend(
                schema
                    .columns
                    .iter()
                    .map(|c| format!("{}.{}", join.table.binding(), c.name)),
            );
        }

        Self {
            stmt,
            base,
            joined,
            scope: ColumnScope::new(&base.name, stmt.from.alias.as_deref()),
            available,
            join_offsets,
        }
    }

    fn is_aggregate(&self) -> bool {
        self.stmt.is_aggregate() || self.stmt.having.is_some()
    }

    fn output_names(&self) -> Vec<String> {
        match &self.stmt.projection {
            Projection::Star => Vec::new(),
            Projection::Items(items) => items.iter().map(SelectItem::output_name).collect(),
        }
    }

    /// Column behind a select alias, or the name unchanged
    fn unalias(&self, name: &str) -> String {
        if let Projection::Items(items) = &self.stmt.projection {
            for item in items {
                if let SelectItem::Column {
                    column,
                    alias: Some(alias),
                } = item
                {
                    if alias == name {
                        return column.to_string();
                    }
                }
            }
        }
        name.to_string()
    }

    fn check_column(&self, name: &str) -> Result<()> {
        self.check_column_in(name, &self.available)
    }

    fn check_column_in(&self, name: &str, available: &[String]) -> Result<()> {
        if self.scope.resolve_key(available, name).is_some() {
            return Ok(());
        }

        // Report against the joined table when the qualifier names one
        let qualifier = name.split_once('.').map(|(q, _)| q);
        let owner = qualifier.and_then(|q| {
            self.stmt
                .joins
                .iter()
                .zip(self.joined)
                .find(|(join, _)| join.table.is_named(q))
        });
        let err = match owner {
            Some((_, schema)) => EngineError::unknown_column(name, &schema.name, schema.column_names()),
            None => EngineError::unknown_column(name, &self.base.name, available.to_vec()),
        };
        Err(err)
    }

    fn validate(&self) -> Result<()> {
        let stmt = self.stmt;
        let aggregate = self.is_aggregate();

        for (i, (join, schema)) in stmt.joins.iter().zip(self.joined).enumerate() {
            let keys = JoinKeys::resolve(join, &self.scope);
            if !schema.has_column(&keys.inner) {
                return Err(EngineError::unknown_column(
                    &keys.inner,
                    &schema.name,
                    schema.column_names(),
                ));
            }
            self.check_column_in(&keys.outer.to_string(), &self.available[..self.join_offsets[i]])?;
        }

        match &stmt.projection {
            Projection::Star if aggregate => {
                return Err(EngineError::Semantic(
                    "SELECT * cannot be combined with aggregates or GROUP BY".into(),
                ));
            }
            Projection::Star => {}
            Projection::Items(items) => {
                for item in items {
                    match item {
                        SelectItem::Column { column, .. } => self.check_column(&column.to_string())?,
                        SelectItem::Aggregate { call, .. } => match &call.argument {
                            AggregateArg::Column(column) => self.check_column(&column.to_string())?,
                            AggregateArg::Star if call.function != AggregateFunction::Count || call.distinct => {
                                return Err(EngineError::Semantic(format!("{} is not supported", call)));
                            }
                            AggregateArg::Star => {}
                        },
                    }
                }
            }
        }

        if let Some(cond) = &stmt.where_clause {
            for column in cond.columns() {
                self.check_column(column)?;
            }
        }

        for column in &stmt.group_by {
            self.check_column(&column.to_string())?;
        }

        let outputs = self.output_names();
        if let Some(having) = &stmt.having {
            for column in having.columns() {
                if outputs.iter().any(|o| o == column) {
                    continue;
                }
                if column.contains('(') {
                    return Err(EngineError::Semantic(format!(
                        "HAVING references {} which is not in the select list",
                        column
                    )));
                }
                self.check_column(column)?;
            }
        }

        for order in &stmt.order_by {
            let name = order.column.to_string();
            if outputs.iter().any(|o| *o == name) {
                continue;
            }
            if aggregate && name.contains('(') {
                return Err(EngineError::Semantic(format!(
                    "ORDER BY {} which is not in the select list",
                    name
                )));
            }
            self.check_column(&name)?;
        }

        Ok(())
    }
}

/// Validate column definitions of a new table and settle its primary key.
///
/// Without a declared primary key an `id` column is promoted (it must be
/// INTEGER) or an implicit `id INTEGER PRIMARY KEY AUTO_INCREMENT` is
/// prepended.
fn prepare_columns(mut columns: Vec<ColumnDef>) -> Result<Vec<ColumnDef>> {
    if columns.is_empty() {
        return Err(EngineError::Semantic("a table needs at least one column".into()));
    }

    let mut names = AHashSet::with_capacity(columns.len());
    for col in &columns {
        if !names.insert(col.name.as_str()) {
            return Err(EngineError::Semantic(format!("duplicate column '{}'", col.name)));
        }
    }

    if columns.iter().filter(|c| c.primary_key).count() > 1 {
        return Err(EngineError::Semantic("a table can have only one primary key".into()));
    }

    let auto: Vec<&ColumnDef> = columns.iter().filter(|c| c.auto_increment).collect();
    if auto.len() > 1 {
        return Err(EngineError::Semantic(
            "a table can have only one AUTO_INCREMENT column".into(),
        ));
    }
    if let Some(col) = auto.iter().find(|c| c.data_type != ColumnType::Integer) {
        return Err(EngineError::Semantic(format!(
            "AUTO_INCREMENT column '{}' must be INTEGER, not {}",
            col.name, col.data_type
        )));
    }
    let auto_name = auto.first().map(|c| c.name.clone());

    for col in &mut columns {
        if let Some(default) = col.default_value.take() {
            col.default_value = Some(validate_and_convert(&default, col)?);
        }
    }

    if columns.iter().any(|c| c.primary_key) {
        return Ok(columns);
    }

    match columns.iter().position(|c| c.name.eq_ignore_ascii_case("id")) {
        Some(pos) => {
            let id = &columns[pos];
            if id.data_type != ColumnType::Integer {
                return Err(EngineError::Semantic(format!(
                    "column '{}' is {} and cannot become the implicit INTEGER primary key",
                    id.name, id.data_type
                )));
            }
            if let Some(other) = auto_name.filter(|n| *n != id.name) {
                return Err(EngineError::Semantic(format!(
                    "AUTO_INCREMENT column '{}' must be the primary key",
                    other
                )));
            }
            let promoted = columns[pos].clone().primary_key().auto_increment();
            columns[pos] = promoted;
        }
        None => {
            if let Some(other) = auto_name {
                return Err(EngineError::Semantic(format!(
                    "AUTO_INCREMENT column '{}' must be the primary key",
                    other
                )));
            }
            columns.insert(0, ColumnDef::implicit_id());
        }
    }

    Ok(columns)
}

/// Columns receiving the VALUES of an INSERT.
///
/// Without a column list the values map onto every column, or onto every
/// non-AUTO_INCREMENT column when exactly that many values are given.
fn insert_targets<'s>(
    schema: &'s TableSchema,
    columns: Option<&[String]>,
    first_row_len: Option<usize>,
) -> Result<Vec<&'s ColumnDef>> {
    match columns {
        Some(names) => {
            let mut seen = AHashSet::with_capacity(names.len());
            names
                .iter()
                .map(|name| {
                    if !seen.insert(name.as_str()) {
                        return Err(EngineError::Semantic(format!(
                            "column '{}' listed more than once",
                            name
                        )));
                    }
                    schema
                        .get_column(name)
                        .ok_or_else(|| EngineError::unknown_column(name, &schema.name, schema.column_names()))
                })
                .collect()
        }
        None => {
            let all: Vec<&ColumnDef> = schema.columns.iter().collect();
            let writable: Vec<&ColumnDef> = schema.columns.iter().filter(|c| !c.auto_increment).collect();
            match first_row_len {
                Some(n) if n != all.len() && n == writable.len() => Ok(writable),
                _ => Ok(all),
            }
        }
    }
}

/// An omitted value, or a null for a NOT NULL column, takes the column
/// default; an explicit null is kept for nullable columns.
fn fill_missing(value: Value, column: &ColumnDef, omitted: bool) -> Result<Value> {
    if !value.is_null() {
        return Ok(value);
    }
    if omitted || column.not_null {
        if let Some(default) = &column.default_value {
            return Ok(default.clone());
        }
    }
    if column.not_null {
        return Err(EngineError::ConstraintViolation(format!(
            "column '{}' cannot be NULL",
            column.name
        )));
    }
    Ok(Value::Null)
}

/// 1 + the largest integer in `column` (1 for an empty table)
fn next_auto_value<'r>(rows: impl Iterator<Item = &'r SqlRow>, column: &str) -> i64 {
    rows.filter_map(|row| row.get(column).and_then(Value::as_f64))
        .map(|f| f as i64)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Linear scan of `others` for a value colliding with `candidate` on any
/// PRIMARY KEY/UNIQUE column; nulls never collide
fn check_unique<'r>(
    schema: &TableSchema,
    candidate: &SqlRow,
    others: impl Iterator<Item = &'r SqlRow> + Clone,
) -> Result<()> {
    for column in schema.columns.iter().filter(|c| c.is_unique()) {
        let value = match candidate.get(&column.name) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        let duplicate = others
            .clone()
            .any(|other| other.get(&column.name).map_or(false, |v| v.sql_eq(value)));
        if duplicate {
            return Err(EngineError::ConstraintViolation(format!(
                "duplicate value {} for unique column '{}' in table '{}'",
                value, column.name, schema.name
            )));
        }
    }
    Ok(())
}

fn check_condition_columns(schema: &TableSchema, scope: &ColumnScope, cond: &Condition) -> Result<()> {
    let known = schema.column_names();
    for column in cond.columns() {
        if scope.resolve_key(&known, column).is_none() {
            return Err(EngineError::unknown_column(column, &schema.name, known));
        }
    }
    Ok(())
}

/// Multi-key comparison; nulls sort first ascending
fn compare_rows(a: &SqlRow, b: &SqlRow, keys: &[(String, bool)], scope: &ColumnScope) -> Ordering {
    for (name, asc) in keys {
        let ord = scope.lookup(a, name).sort_cmp(scope.lookup(b, name));
        let ord = if *asc { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn paginate(rows: Vec<SqlRow>, offset: Option<usize>, limit: Option<usize>) -> Vec<SqlRow> {
    rows.into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
