#![forbid(unsafe_code)]

use crate::{NodeOf, StoreError, TreeBackend};
use arbor_core::{
    FIRST_NODE_ID, FieldType, NodeMeta, Role, SchemaDescriptor, TreeNode, TreeSchema, Value, validate_identifier,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;

const FIXED_COLUMNS: [&str; 5] = ["id", "parent", "sort", "role", "kind"];
const FIXED_TYPES: [&str; 5] = ["INTEGER", "INTEGER", "INTEGER", "TEXT", "TEXT"];
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ID_WATERMARK: &str = "next_id";
const COUNTERS_DDL: &str = "CREATE TABLE IF NOT EXISTS arbor_counters (\n  \
                            store TEXT NOT NULL,\n  \
                            name TEXT NOT NULL,\n  \
                            value INTEGER NOT NULL,\n  \
                            PRIMARY KEY(store, name)\n);\n";

#[derive(Debug)]
struct Column {
    name: String,
    field_type: FieldType,
}

/// Physical layout derived once from the two schema descriptors.
///
/// One table per store: the fixed identity columns, then every branch field
/// as `b_<name>`, then every leaf field as `l_<name>`. The columns of the role
/// a row does not have stay NULL.
#[derive(Debug)]
struct TableLayout {
    table: String,
    branch: Vec<Column>,
    leaf: Vec<Column>,
    insert_sql: String,
    select_sql: String,
}

impl TableLayout {
    fn derive<S: TreeSchema>(schema: &S) -> Result<Self, StoreError> {
        validate_identifier(schema.name())?;
        let table = format!("tree_{}", schema.name());
        let branch = role_columns("b", schema.branch_schema());
        let leaf = role_columns("l", schema.leaf_schema());

        let names = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(branch.iter().chain(&leaf).map(|column| column.name.as_str()))
            .collect::<Vec<_>>();
        let placeholders = (1..=names.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let column_list = names.join(", ");

        Ok(Self {
            insert_sql: format!("INSERT INTO {table}({column_list}) VALUES ({placeholders})"),
            select_sql: format!("SELECT {column_list} FROM {table}"),
            table,
            branch,
            leaf,
        })
    }

    /// `(name, declared type)` of every column, in table order.
    fn column_specs(&self) -> Vec<(&str, &str)> {
        FIXED_COLUMNS
            .iter()
            .copied()
            .zip(FIXED_TYPES)
            .chain(
                self.branch
                    .iter()
                    .chain(&self.leaf)
                    .map(|column| (column.name.as_str(), column.field_type.sql_type())),
            )
            .collect()
    }

    fn ddl(&self) -> String {
        let table = &self.table;
        let mut lines = vec![
            "id INTEGER PRIMARY KEY".to_string(),
            "parent INTEGER NOT NULL".to_string(),
            "sort INTEGER NOT NULL".to_string(),
            "role TEXT NOT NULL".to_string(),
            "kind TEXT NOT NULL".to_string(),
        ];
        for column in self.branch.iter().chain(&self.leaf) {
            lines.push(format!("{} {}", column.name, column.field_type.sql_type()));
        }
        lines.push("CHECK(id >= 2)".to_string());
        lines.push("CHECK(parent <> id)".to_string());
        lines.push("CHECK(sort >= 0)".to_string());
        lines.push("CHECK(role IN ('branch', 'leaf'))".to_string());

        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n  {}\n);\n\
             CREATE INDEX IF NOT EXISTS idx_{table}_parent_sort ON {table}(parent, sort, id);\n\
             {COUNTERS_DDL}",
            lines.join(",\n  ")
        )
    }

    fn columns_for(&self, role: Role) -> &[Column] {
        match role {
            Role::Branch => &self.branch,
            Role::Leaf => &self.leaf,
        }
    }
}

fn role_columns(prefix: &str, schema: &SchemaDescriptor) -> Vec<Column> {
    schema
        .fields()
        .iter()
        .map(|field| Column {
            name: format!("{prefix}_{}", field.name()),
            field_type: field.field_type(),
        })
        .collect()
}

/// A row as read from SQLite, before the factory turns it into a node.
struct RawRow {
    meta: NodeMeta,
    role: String,
    kind: String,
    values: Vec<SqlValue>,
}

/// Relational backend for [`crate::TreeStore`] on a rusqlite connection.
#[derive(Debug)]
pub struct SqliteTree<S: TreeSchema> {
    conn: Connection,
    schema: S,
    layout: TableLayout,
}

impl<S: TreeSchema> SqliteTree<S> {
    pub fn open(path: impl AsRef<Path>, schema: S) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn, schema)
    }

    pub fn open_in_memory(schema: S) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, schema)
    }

    pub fn from_connection(conn: Connection, schema: S) -> Result<Self, StoreError> {
        let layout = TableLayout::derive(&schema)?;
        preflight_gate(&conn, &layout)?;
        conn.execute_batch(&layout.ddl())?;
        tracing::info!(store = schema.name(), table = %layout.table, "tree table ready");
        Ok(Self {
            conn,
            schema,
            layout,
        })
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), StoreError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        &self.layout.table
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn row_params(&self, node: &NodeOf<S>) -> Result<Vec<SqlValue>, StoreError> {
        let meta = node.metadata();
        let (Some(id), Some(sort)) = (meta.id, meta.sort) else {
            return Err(StoreError::InvalidInput("node metadata is not assigned"));
        };
        let role = node.role();
        let kind = node.kind();
        let known_kind = match node {
            TreeNode::Branch(_) => self.schema.branch_factory().contains(kind),
            TreeNode::Leaf(_) => self.schema.leaf_factory().contains(kind),
        };
        if !known_kind {
            return Err(arbor_core::SchemaError::UnknownKind(kind.to_string()).into());
        }

        let values = node.values();
        self.schema.schema_for(role).check(&values)?;

        let width = FIXED_COLUMNS.len() + self.layout.branch.len() + self.layout.leaf.len();
        let mut out = Vec::with_capacity(width);
        out.push(SqlValue::Integer(id));
        out.push(SqlValue::Integer(meta.parent));
        out.push(SqlValue::Integer(sort));
        out.push(SqlValue::Text(role.as_str().to_string()));
        out.push(SqlValue::Text(kind.to_string()));

        let converted = values
            .into_iter()
            .map(to_sql_value)
            .collect::<Result<Vec<_>, _>>()?;
        match role {
            Role::Branch => {
                out.extend(converted);
                out.extend(std::iter::repeat_n(SqlValue::Null, self.layout.leaf.len()));
            }
            Role::Leaf => {
                out.extend(std::iter::repeat_n(SqlValue::Null, self.layout.branch.len()));
                out.extend(converted);
            }
        }
        Ok(out)
    }

    fn materialize(&self, raw: RawRow) -> Result<NodeOf<S>, StoreError> {
        let role = Role::parse(&raw.role).ok_or(StoreError::InvalidInput("unknown role in row"))?;
        let branch_width = self.layout.branch.len();
        let stored = match role {
            Role::Branch => raw.values.into_iter().take(branch_width).collect::<Vec<_>>(),
            Role::Leaf => raw.values.into_iter().skip(branch_width).collect::<Vec<_>>(),
        };
        let values = self
            .layout
            .columns_for(role)
            .iter()
            .zip(stored)
            .map(|(column, value)| from_sql_value(value, column.field_type))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match role {
            Role::Branch => TreeNode::Branch(self.schema.branch_factory().build(&raw.kind, raw.meta, values)?),
            Role::Leaf => TreeNode::Leaf(self.schema.leaf_factory().build(&raw.kind, raw.meta, values)?),
        })
    }

    fn read_raw(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<RawRow> {
        let mut values = Vec::with_capacity(width);
        for index in FIXED_COLUMNS.len()..FIXED_COLUMNS.len() + width {
            values.push(row.get::<_, SqlValue>(index)?);
        }
        Ok(RawRow {
            meta: NodeMeta::assigned(row.get(0)?, row.get(1)?, row.get(2)?),
            role: row.get(3)?,
            kind: row.get(4)?,
            values,
        })
    }

    fn payload_width(&self) -> usize {
        self.layout.branch.len() + self.layout.leaf.len()
    }
}

fn raise_watermark_tx(conn: &Connection, store: &str, next_id: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO arbor_counters(store, name, value) VALUES (?1, ?2, ?3) \
         ON CONFLICT(store, name) DO UPDATE SET value = MAX(value, excluded.value)",
        params![store, ID_WATERMARK, next_id],
    )?;
    Ok(())
}

impl<S: TreeSchema> TreeBackend<S> for SqliteTree<S> {
    fn schema(&self) -> &S {
        &self.schema
    }

    fn next_id(&self) -> Result<i64, StoreError> {
        let stored = self
            .conn
            .query_row(
                "SELECT value FROM arbor_counters WHERE store = ?1 AND name = ?2",
                params![self.schema.name(), ID_WATERMARK],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        let max = self.conn.query_row(
            &format!("SELECT MAX(id) FROM {}", self.layout.table),
            [],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        let after_rows = match max {
            Some(max) => max
                .checked_add(1)
                .ok_or(StoreError::InvalidInput("numeric overflow"))?,
            None => FIRST_NODE_ID,
        };
        Ok(stored.unwrap_or(FIRST_NODE_ID).max(after_rows).max(FIRST_NODE_ID))
    }

    fn reserve_ids(&mut self, next_id: i64) -> Result<(), StoreError> {
        raise_watermark_tx(&self.conn, self.schema.name(), next_id)
    }

    fn roles(&self, ids: &BTreeSet<i64>) -> Result<BTreeMap<i64, Role>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT role FROM {} WHERE id = ?1", self.layout.table))?;
        let mut out = BTreeMap::new();
        for id in ids {
            let role = stmt
                .query_row(params![id], |row| row.get::<_, String>(0))
                .optional()?;
            if let Some(role) = role {
                let role = Role::parse(&role).ok_or(StoreError::InvalidInput("unknown role in row"))?;
                out.insert(*id, role);
            }
        }
        Ok(out)
    }

    fn next_sort(&self, parent: i64) -> Result<i64, StoreError> {
        let max = self.conn.query_row(
            &format!("SELECT MAX(sort) FROM {} WHERE parent = ?1", self.layout.table),
            params![parent],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        match max {
            Some(sort) => sort
                .checked_add(1)
                .ok_or(StoreError::InvalidInput("numeric overflow")),
            None => Ok(0),
        }
    }

    fn persist(
        &mut self,
        nodes: &[NodeOf<S>],
        next_id: i64,
        after_row: &mut dyn FnMut(&NodeOf<S>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let rows = nodes
            .iter()
            .map(|node| self.row_params(node))
            .collect::<Result<Vec<_>, _>>()?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.layout.insert_sql)?;
            for (node, row) in nodes.iter().zip(&rows) {
                if let Err(err) = stmt.execute(params_from_iter(row.iter())) {
                    return Err(map_insert_conflict(err, node.id().unwrap_or_default()));
                }
                after_row(node)?;
            }
        }
        raise_watermark_tx(&tx, self.schema.name(), next_id)?;
        tx.commit()?;
        Ok(())
    }

    fn fetch(&self, id: i64) -> Result<Option<NodeOf<S>>, StoreError> {
        let width = self.payload_width();
        let raw = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", self.layout.select_sql),
                params![id],
                |row| Self::read_raw(row, width),
            )
            .optional()?;
        raw.map(|raw| self.materialize(raw)).transpose()
    }

    fn fetch_children(&self, parent: i64) -> Result<Vec<NodeOf<S>>, StoreError> {
        let width = self.payload_width();
        let mut stmt = self.conn.prepare_cached(&format!(
            "{} WHERE parent = ?1 ORDER BY sort ASC, id ASC",
            self.layout.select_sql
        ))?;
        let raws = stmt
            .query_map(params![parent], |row| Self::read_raw(row, width))?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(|raw| self.materialize(raw)).collect()
    }

    fn subtree(&self, id: i64) -> Result<Vec<(i64, Role)>, StoreError> {
        let table = &self.layout.table;
        let mut stmt = self.conn.prepare_cached(&format!(
            "WITH RECURSIVE subtree(id, role, depth) AS ( \
               SELECT id, role, 0 FROM {table} WHERE id = ?1 \
               UNION ALL \
               SELECT child.id, child.role, subtree.depth + 1 \
               FROM {table} AS child JOIN subtree ON child.parent = subtree.id \
             ) \
             SELECT id, role FROM subtree ORDER BY depth DESC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, role)| {
                Role::parse(&role)
                    .map(|role| (id, role))
                    .ok_or(StoreError::InvalidInput("unknown role in row"))
            })
            .collect()
    }

    fn delete(
        &mut self,
        rows: &[(i64, Role)],
        before_commit: &mut dyn FnMut(i64, Role) -> Result<(), StoreError>,
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0usize;
        {
            let mut stmt = tx.prepare_cached(&format!("DELETE FROM {} WHERE id = ?1", self.layout.table))?;
            for (id, role) in rows {
                deleted += stmt.execute(params![id])?;
                before_commit(*id, *role)?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn count(&self, role: Role) -> Result<usize, StoreError> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(1) FROM {} WHERE role = ?1", self.layout.table),
            params![role.as_str()],
            |row| row.get::<_, i64>(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidInput("numeric overflow"))
    }
}

/// Refuses to open a table whose columns drifted from the declared schema,
/// by name, order or declared type.
fn preflight_gate(conn: &Connection, layout: &TableLayout) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", layout.table))?;
    let existing = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    if existing.is_empty() {
        return Ok(());
    }
    let expected = layout.column_specs();
    let matches = existing.len() == expected.len()
        && existing
            .iter()
            .zip(&expected)
            .all(|((name, declared), (want_name, want_type))| {
                name == want_name && declared.eq_ignore_ascii_case(want_type)
            });
    if !matches {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: table layout does not match the declared schema",
        ));
    }
    Ok(())
}

fn to_sql_value(value: Value) -> Result<SqlValue, StoreError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Text(text) => SqlValue::Text(text),
        Value::Integer(number) => SqlValue::Integer(number),
        Value::Boolean(flag) => SqlValue::Integer(i64::from(flag)),
        Value::Timestamp(stamp) => SqlValue::Integer(
            i64::try_from(stamp.unix_timestamp_nanos())
                .map_err(|_| StoreError::InvalidInput("timestamp out of range"))?,
        ),
    })
}

fn from_sql_value(value: SqlValue, field_type: FieldType) -> Result<Value, StoreError> {
    match (value, field_type) {
        (SqlValue::Null, _) => Ok(Value::Null),
        (SqlValue::Text(text), FieldType::String) => Ok(Value::Text(text)),
        (SqlValue::Integer(number), FieldType::Integer) => Ok(Value::Integer(number)),
        (SqlValue::Integer(flag), FieldType::Boolean) => Ok(Value::Boolean(flag != 0)),
        (SqlValue::Integer(nanos), FieldType::Timestamp) => {
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
                .map(Value::Timestamp)
                .map_err(|_| StoreError::InvalidInput("timestamp out of range"))
        }
        _ => Err(StoreError::InvalidInput(
            "column value does not match the declared type",
        )),
    }
}

fn map_insert_conflict(err: rusqlite::Error, id: i64) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::DuplicateId(id);
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                && message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}
