//! Index layer implementation
//!
//! Secondary indexes are in-memory B+Trees built in full from a table scan on
//! `CREATE INDEX` and cached per (table, index). They are not maintained by
//! later writes and are not consulted when planning SELECT.

pub mod btree;
pub mod cache;
pub mod key;

pub use btree::{BTree, BTreeConfig, BTreeStats};
pub use cache::IndexCache;
pub use key::IndexKey;

use crate::error::{EngineError, Result};
use crate::types::{IndexDef, Row, RowId};

/// Index over row ids keyed by the index columns' values
pub type BTreeIndex = BTree<IndexKey, RowId>;

/// Build a fresh index over `rows`.
///
/// Rows with a null key part are skipped by unique indexes: nulls never
/// collide.
pub fn build_index(def: &IndexDef, rows: &[Row]) -> Result<BTreeIndex> {
    let mut tree = BTreeIndex::with_config(BTreeConfig {
        unique_keys: def.unique,
        ..Default::default()
    });

    for row in rows {
        let key = IndexKey::from_row(&def.columns, &row.data);
        if def.unique && key.has_null() {
            continue;
        }
        tree.insert(key, row.id).map_err(|e| match e {
            EngineError::ConstraintViolation(detail) => EngineError::ConstraintViolation(format!(
                "cannot create unique index '{}': {}",
                def.name, detail
            )),
            other => other,
        })?;
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SqlRow, Value};

    fn row(id: RowId, city: &str, age: i64) -> Row {
        let mut data = SqlRow::new();
        data.insert("city".into(), Value::Text(city.into()));
        data.insert("age".into(), Value::Integer(age));
        Row { id, table_id: 1, data }
    }

    #[test]
    fn test_build_composite_index() {
        let rows = vec![row(1, "Oslo", 30), row(2, "Oslo", 40), row(3, "Rome", 30), row(4, "Oslo", 30)];
        let def = IndexDef::new("idx_city_age", vec!["city".into(), "age".into()], false);
        let tree = build_index(&def, &rows).unwrap();

        assert_eq!(tree.len(), 3);
        let key = IndexKey::new(vec![Value::Text("Oslo".into()), Value::Integer(30)]);
        assert_eq!(tree.search(&key), &[1, 4]);
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let rows = vec![row(1, "Oslo", 30), row(2, "Oslo", 40)];
        let def = IndexDef::new("idx_city", vec!["city".into()], true);
        match build_index(&def, &rows) {
            Err(EngineError::ConstraintViolation(msg)) => assert!(msg.contains("idx_city")),
            other => panic!("Expected constraint violation, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_unique_index_skips_nulls() {
        let mut a = row(1, "Oslo", 30);
        let mut b = row(2, "Rome", 30);
        a.data.insert("email".into(), Value::Null);
        b.data.remove("email");
        let def = IndexDef::new("idx_email", vec!["email".into()], true);
        let tree = build_index(&def, &[a, b]).unwrap();
        assert!(tree.is_empty());
    }
}
