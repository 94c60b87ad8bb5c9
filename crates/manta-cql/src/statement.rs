//! Structured statements and CQL rendering.
//!
//! Statements carry their predicates and bound values as data so that both a
//! wire-protocol driver (via [`Statement::to_cql`]) and the in-memory session
//! (by interpretation) can execute them. Builders are chainable and consume
//! `self`, so a statement is immutable once handed to a session.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Comparison operator inside a WHERE or IF clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn cql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

/// A single `column <op> ?` term. Bound values are carried alongside the
/// predicate list, aligned by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
}

impl Predicate {
    pub fn eq(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Eq,
        }
    }

    pub fn new(column: impl Into<String>, operator: Operator) -> Self {
        Self {
            column: column.into(),
            operator,
        }
    }
}

/// The IF clause of a conditional write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// No condition: the write is unconditional.
    #[default]
    None,
    /// `IF EXISTS`: the row must already exist.
    Exists,
    /// `IF NOT EXISTS`: the row must not exist. Deletes reject this;
    /// inserts express it through [`InsertStatement::if_not_exists`].
    NotExists,
    /// `IF <predicates>` with positionally aligned bound values.
    Predicates {
        predicates: Vec<Predicate>,
        bindings: Vec<Value>,
    },
}

impl Condition {
    /// True when the statement carries any condition at all.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Condition::None)
    }
}

/// Column projection of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// `SELECT *`
    All,
    /// An explicit column list.
    Columns(Vec<String>),
    /// `SELECT COUNT(1)`; the result row carries a single `count` column.
    Count,
}

/// A structured SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub table: String,
    pub projection: Projection,
    pub predicates: Vec<Predicate>,
    pub bindings: Vec<Value>,
    /// `(column, descending)` pairs, in order.
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<usize>,
    pub allow_filtering: bool,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: Projection::All,
            predicates: Vec::new(),
            bindings: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            allow_filtering: false,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn count(mut self) -> Self {
        self.projection = Projection::Count;
        self
    }

    /// Appends a predicate and its bound value.
    pub fn filter(mut self, predicate: Predicate, value: Value) -> Self {
        self.predicates.push(predicate);
        self.bindings.push(value);
        self
    }

    /// Appends predicates with positionally aligned bindings.
    pub fn filter_all(
        mut self,
        predicates: impl IntoIterator<Item = Predicate>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.predicates.extend(predicates);
        self.bindings.extend(bindings);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order_by.push((column.into(), descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn allow_filtering(mut self) -> Self {
        self.allow_filtering = true;
        self
    }
}

/// A structured INSERT. The column and value lists are positionally aligned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
    pub if_not_exists: bool,
    pub ttl: Option<Duration>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            if_not_exists: false,
            ttl: None,
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A structured UPDATE. In this protocol an unconditional UPDATE has upsert
/// semantics; conditions turn it into a compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub table: String,
    pub set_columns: Vec<String>,
    pub set_values: Vec<Value>,
    pub key_predicates: Vec<Predicate>,
    pub key_bindings: Vec<Value>,
    pub condition: Condition,
    pub ttl: Option<Duration>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_columns: Vec::new(),
            set_values: Vec::new(),
            key_predicates: Vec::new(),
            key_bindings: Vec::new(),
            condition: Condition::None,
            ttl: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set_columns.push(column.into());
        self.set_values.push(value);
        self
    }

    pub fn key(mut self, column: impl Into<String>, value: Value) -> Self {
        self.key_predicates.push(Predicate::eq(column));
        self.key_bindings.push(value);
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A structured DELETE. An empty column list removes whole rows; a non-empty
/// list clears only those columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub bindings: Vec<Value>,
    pub condition: Condition,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            predicates: Vec::new(),
            bindings: Vec::new(),
            condition: Condition::None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn filter(mut self, predicate: Predicate, value: Value) -> Self {
        self.predicates.push(predicate);
        self.bindings.push(value);
        self
    }

    pub fn key(self, column: impl Into<String>, value: Value) -> Self {
        self.filter(Predicate::eq(column), value)
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

/// Any DML statement a session can execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// The table the statement targets.
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) => &s.table,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }

    /// True when the statement carries a compare-and-set condition.
    pub fn is_conditional(&self) -> bool {
        match self {
            Statement::Select(_) => false,
            Statement::Insert(s) => s.if_not_exists,
            Statement::Update(s) => s.condition.is_conditional(),
            Statement::Delete(s) => s.condition.is_conditional(),
        }
    }

    /// Renders the statement to CQL text plus positional bind values.
    pub fn to_cql(&self) -> (String, Vec<Value>) {
        match self {
            Statement::Select(s) => render_select(s),
            Statement::Insert(s) => render_insert(s),
            Statement::Update(s) => render_update(s),
            Statement::Delete(s) => render_delete(s),
        }
    }
}

fn write_predicates(cql: &mut String, predicates: &[Predicate]) {
    for (i, p) in predicates.iter().enumerate() {
        if i > 0 {
            cql.push_str(" AND ");
        }
        let _ = write!(cql, "{}{}?", p.column, p.operator.cql());
    }
}

fn write_condition(cql: &mut String, condition: &Condition, values: &mut Vec<Value>) {
    match condition {
        Condition::None => {}
        Condition::Exists => cql.push_str(" IF EXISTS"),
        Condition::NotExists => cql.push_str(" IF NOT EXISTS"),
        Condition::Predicates { predicates, bindings } => {
            cql.push_str(" IF ");
            write_predicates(cql, predicates);
            values.extend(bindings.iter().cloned());
        }
    }
}

fn render_select(s: &SelectStatement) -> (String, Vec<Value>) {
    let mut cql = String::from("SELECT ");
    match &s.projection {
        Projection::All => cql.push('*'),
        Projection::Columns(cols) => cql.push_str(&cols.join(",")),
        Projection::Count => cql.push_str("COUNT(1)"),
    }
    let _ = write!(cql, " FROM {}", s.table);
    if !s.predicates.is_empty() {
        cql.push_str(" WHERE ");
        write_predicates(&mut cql, &s.predicates);
    }
    if !s.order_by.is_empty() {
        cql.push_str(" ORDER BY ");
        for (i, (column, descending)) in s.order_by.iter().enumerate() {
            if i > 0 {
                cql.push(',');
            }
            let _ = write!(cql, "{} {}", column, if *descending { "DESC" } else { "ASC" });
        }
    }
    if let Some(limit) = s.limit {
        let _ = write!(cql, " LIMIT {}", limit);
    }
    if s.allow_filtering {
        cql.push_str(" ALLOW FILTERING");
    }
    (cql, s.bindings.clone())
}

fn render_insert(s: &InsertStatement) -> (String, Vec<Value>) {
    let mut cql = format!("INSERT INTO {} (", s.table);
    cql.push_str(&s.columns.join(","));
    cql.push_str(") VALUES (");
    cql.push_str(&vec!["?"; s.columns.len()].join(","));
    cql.push(')');
    if s.if_not_exists {
        cql.push_str(" IF NOT EXISTS");
    }
    if let Some(ttl) = s.ttl {
        let _ = write!(cql, " USING TTL {}", ttl.as_secs());
    }
    (cql, s.values.clone())
}

fn render_update(s: &UpdateStatement) -> (String, Vec<Value>) {
    let mut cql = format!("UPDATE {}", s.table);
    if let Some(ttl) = s.ttl {
        let _ = write!(cql, " USING TTL {}", ttl.as_secs());
    }
    cql.push_str(" SET ");
    for (i, column) in s.set_columns.iter().enumerate() {
        if i > 0 {
            cql.push(',');
        }
        let _ = write!(cql, "{}=?", column);
    }
    cql.push_str(" WHERE ");
    write_predicates(&mut cql, &s.key_predicates);

    let mut values = s.set_values.clone();
    values.extend(s.key_bindings.iter().cloned());
    write_condition(&mut cql, &s.condition, &mut values);
    (cql, values)
}

fn render_delete(s: &DeleteStatement) -> (String, Vec<Value>) {
    let mut cql = String::from("DELETE ");
    if !s.columns.is_empty() {
        cql.push_str(&s.columns.join(","));
        cql.push(' ');
    }
    let _ = write!(cql, "FROM {}", s.table);
    if !s.predicates.is_empty() {
        cql.push_str(" WHERE ");
        write_predicates(&mut cql, &s.predicates);
    }
    let mut values = s.bindings.clone();
    write_condition(&mut cql, &s.condition, &mut values);
    (cql, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_select() {
        let stmt = Statement::Select(
            SelectStatement::new("ks.orders")
                .columns(["order_id", "shipping_address"])
                .filter(Predicate::eq("order_id"), json!("o-1"))
                .limit(1),
        );
        let (cql, values) = stmt.to_cql();
        assert_eq!(
            cql,
            "SELECT order_id,shipping_address FROM ks.orders WHERE order_id=? LIMIT 1"
        );
        assert_eq!(values, vec![json!("o-1")]);
    }

    #[test]
    fn test_render_select_count_and_order() {
        let stmt = Statement::Select(
            SelectStatement::new("ks.orders")
                .count()
                .filter(Predicate::eq("region"), json!("APAC")),
        );
        let (cql, _) = stmt.to_cql();
        assert_eq!(cql, "SELECT COUNT(1) FROM ks.orders WHERE region=?");

        let sorted = Statement::Select(
            SelectStatement::new("ks.orders")
                .filter(Predicate::eq("region"), json!("APAC"))
                .order_by("placed_at", true),
        );
        let (cql, _) = sorted.to_cql();
        assert_eq!(
            cql,
            "SELECT * FROM ks.orders WHERE region=? ORDER BY placed_at DESC"
        );
    }

    #[test]
    fn test_render_insert() {
        let stmt = Statement::Insert(
            InsertStatement::new("ks.orders")
                .value("order_id", json!("o-1"))
                .value("region", json!("APAC"))
                .if_not_exists()
                .ttl(Duration::from_secs(30)),
        );
        let (cql, values) = stmt.to_cql();
        assert_eq!(
            cql,
            "INSERT INTO ks.orders (order_id,region) VALUES (?,?) IF NOT EXISTS USING TTL 30"
        );
        assert_eq!(values, vec![json!("o-1"), json!("APAC")]);
    }

    #[test]
    fn test_render_update_with_conditions() {
        let stmt = Statement::Update(
            UpdateStatement::new("ks.orders")
                .set("region", json!("EMEA"))
                .key("order_id", json!("o-1"))
                .condition(Condition::Exists),
        );
        let (cql, values) = stmt.to_cql();
        assert_eq!(
            cql,
            "UPDATE ks.orders SET region=? WHERE order_id=? IF EXISTS"
        );
        assert_eq!(values, vec![json!("EMEA"), json!("o-1")]);

        let cas = Statement::Update(
            UpdateStatement::new("ks.orders")
                .set("region", json!("EMEA"))
                .key("order_id", json!("o-1"))
                .condition(Condition::Predicates {
                    predicates: vec![Predicate::eq("region")],
                    bindings: vec![json!("APAC")],
                }),
        );
        let (cql, values) = cas.to_cql();
        assert_eq!(
            cql,
            "UPDATE ks.orders SET region=? WHERE order_id=? IF region=?"
        );
        assert_eq!(values, vec![json!("EMEA"), json!("o-1"), json!("APAC")]);
    }

    #[test]
    fn test_render_delete() {
        let stmt = Statement::Delete(
            DeleteStatement::new("ks.orders")
                .key("order_id", json!("o-1"))
                .condition(Condition::Exists),
        );
        let (cql, values) = stmt.to_cql();
        assert_eq!(cql, "DELETE FROM ks.orders WHERE order_id=? IF EXISTS");
        assert_eq!(values, vec![json!("o-1")]);

        let columns = Statement::Delete(
            DeleteStatement::new("ks.orders")
                .column("shipping_address")
                .key("order_id", json!("o-1")),
        );
        let (cql, _) = columns.to_cql();
        assert_eq!(cql, "DELETE shipping_address FROM ks.orders WHERE order_id=?");
    }

    #[test]
    fn test_conditional_flags() {
        let insert = Statement::Insert(InsertStatement::new("t").if_not_exists());
        assert!(insert.is_conditional());
        let upsert = Statement::Update(UpdateStatement::new("t"));
        assert!(!upsert.is_conditional());
    }
}
