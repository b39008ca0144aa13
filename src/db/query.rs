// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQL statement assembly with positional bind parameters.
//!
//! Statements are built as text with `?` placeholders plus the list of values
//! to bind, in placeholder order. Identifiers are quoted with backticks.

use super::row::Row;
use super::value::{BindType, Value};
use crate::error::{FrameworkError, Result};

/// Column layout of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<(String, BindType)>,
    primary: Option<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary: None,
        }
    }

    pub fn column(mut self, name: impl Into<String>, bind: BindType) -> Self {
        self.columns.push((name.into(), bind));
        self
    }

    /// Mark an already declared column as the primary key.
    pub fn primary(mut self, name: impl Into<String>) -> Self {
        self.primary = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, BindType)> {
        self.columns.iter().map(|(n, b)| (n.as_str(), *b))
    }

    pub fn is_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column_type(&self, name: &str) -> Result<BindType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| *b)
            .ok_or_else(|| FrameworkError::InvalidColumn(name.to_string()))
    }

    /// `` `table`.`column` ``
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", quote(&self.name), quote(column))
    }
}

/// A statement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Quote an identifier with backticks.
pub fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Whether an expression looks like a function call, e.g. `COUNT(*)`.
pub fn is_function_call(expr: &str) -> bool {
    let expr = expr.trim();
    let Some(open) = expr.find('(') else {
        return false;
    };
    open > 0
        && expr.ends_with(')')
        && expr[..open]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distinct {
    All,
    Distinct,
}

/// Selected columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Columns {
    #[default]
    All,
    Raw(String),
    /// Expressions with optional aliases.
    List(Vec<(String, Option<String>)>),
}

/// The `FROM` part.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Source {
    /// The model's own table.
    #[default]
    Table,
    Raw(String),
    Tables(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Join,
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Join => "JOIN",
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinConstraint {
    On(String),
    Using(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub constraint: JoinConstraint,
    /// Columns of the joined table to select, with aliases. Empty selects `t.*`.
    pub columns: Vec<(String, String)>,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<String>, constraint: JoinConstraint) -> Self {
        Self {
            kind,
            table: table.into(),
            constraint,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, expr: impl Into<String>, alias: impl Into<String>) -> Self {
        self.columns.push((expr.into(), alias.into()));
        self
    }
}

/// A condition expression with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub expr: String,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    Column(String, Order),
    Raw(String),
}

/// Options of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectOptions {
    pub distinct: Option<Distinct>,
    pub columns: Columns,
    pub from: Source,
    pub joins: Vec<Join>,
    pub where_and: Vec<Condition>,
    pub where_or: Vec<Condition>,
    pub group_by: Vec<String>,
    pub having_and: Vec<Condition>,
    pub having_or: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self, distinct: Distinct) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.push_column(expr.into(), None);
        self
    }

    pub fn column_as(mut self, expr: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push_column(expr.into(), Some(alias.into()));
        self
    }

    fn push_column(&mut self, expr: String, alias: Option<String>) {
        match &mut self.columns {
            Columns::List(list) => list.push((expr, alias)),
            _ => self.columns = Columns::List(vec![(expr, alias)]),
        }
    }

    pub fn raw_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Columns::Raw(columns.into());
        self
    }

    pub fn from_raw(mut self, from: impl Into<String>) -> Self {
        self.from = Source::Raw(from.into());
        self
    }

    pub fn from_tables(mut self, tables: Vec<String>) -> Self {
        self.from = Source::Tables(tables);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.where_and.push(condition);
        self
    }

    pub fn or_where(mut self, condition: Condition) -> Self {
        self.where_or.push(condition);
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having_and.push(condition);
        self
    }

    pub fn or_having(mut self, condition: Condition) -> Self {
        self.having_or.push(condition);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push(OrderBy::Column(column.into(), order));
        self
    }

    pub fn order_by_raw(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(OrderBy::Raw(expr.into()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Assemble a `SELECT` for `table`.
pub fn build_select(table: &TableDef, options: &SelectOptions) -> Result<Statement> {
    let mut params = Vec::new();
    let mut parts = vec!["SELECT".to_string()];

    match options.distinct {
        Some(Distinct::All) => parts.push("ALL".to_string()),
        Some(Distinct::Distinct) => parts.push("DISTINCT".to_string()),
        None => {}
    }

    let mut columns = render_columns(table, &options.columns)?;
    for join in &options.joins {
        columns.push_str(&render_join_columns(join));
    }
    parts.push(columns);

    parts.push("FROM".to_string());
    parts.push(render_source(table, &options.from)?);

    for join in &options.joins {
        parts.push(render_join(join)?);
    }

    let where_clause = render_conditions(&options.where_and, &options.where_or, "where", &mut params)?;
    parts.push(format!(
        "WHERE {}",
        where_clause.unwrap_or_else(|| "1".to_string())
    ));

    if !options.group_by.is_empty() {
        if options.group_by.iter().any(|g| g.trim().is_empty()) {
            return Err(FrameworkError::InvalidClause { clause: "group by" });
        }
        let groups: Vec<String> = options
            .group_by
            .iter()
            .map(|g| format!("({})", g.trim()))
            .collect();
        parts.push(format!("GROUP BY {}", groups.join(",")));
    }

    let having_or: &[Condition] = if options.having_and.is_empty() {
        &options.having_or
    } else {
        &[]
    };
    if let Some(having) = render_conditions(&options.having_and, having_or, "having", &mut params)? {
        parts.push(format!("HAVING {having}"));
    }

    if !options.order_by.is_empty() {
        let mut orders = Vec::with_capacity(options.order_by.len());
        for order in &options.order_by {
            orders.push(match order {
                OrderBy::Column(column, dir) if !column.trim().is_empty() => {
                    let dir = match dir {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    format!("{} {dir}", column.trim())
                }
                OrderBy::Raw(expr) if !expr.trim().is_empty() => expr.trim().to_string(),
                _ => return Err(FrameworkError::InvalidClause { clause: "order by" }),
            });
        }
        parts.push(format!("ORDER BY {}", orders.join(",")));
    }

    let bound = |n: u64, clause: &'static str| {
        i64::try_from(n).map_err(|_| FrameworkError::InvalidClause { clause })
    };
    match (options.limit, options.offset) {
        (Some(limit), Some(offset)) => {
            let (limit, offset) = (bound(limit, "limit")?, bound(offset, "offset")?);
            parts.push("LIMIT ?,?".to_string());
            params.push(Value::from(offset));
            params.push(Value::from(limit));
        }
        (Some(limit), None) => {
            let limit = bound(limit, "limit")?;
            parts.push("LIMIT ?".to_string());
            params.push(Value::from(limit));
        }
        (None, _) => {}
    }

    Ok(Statement {
        sql: parts.join(" "),
        params,
    })
}

fn render_columns(table: &TableDef, columns: &Columns) -> Result<String> {
    match columns {
        Columns::All => Ok("*".to_string()),
        Columns::Raw(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
        Columns::Raw(_) => Err(FrameworkError::InvalidClause { clause: "columns" }),
        Columns::List(list) if list.is_empty() => Ok("*".to_string()),
        Columns::List(list) => {
            let mut rendered = Vec::with_capacity(list.len());
            for (expr, alias) in list {
                let expr = expr.trim();
                if expr.is_empty() {
                    return Err(FrameworkError::InvalidClause { clause: "columns" });
                }
                let column = if table.is_column(expr) {
                    table.qualified(expr)
                } else if is_function_call(expr) || expr == "*" {
                    expr.to_string()
                } else {
                    quote(expr)
                };
                rendered.push(match alias {
                    Some(alias) => format!("{column} AS {}", quote(alias)),
                    None => column,
                });
            }
            Ok(rendered.join(","))
        }
    }
}

fn render_join_columns(join: &Join) -> String {
    if join.columns.is_empty() {
        return format!(",{}.*", quote(&join.table));
    }
    join.columns
        .iter()
        .map(|(expr, alias)| {
            if is_function_call(expr) {
                format!(",{} AS {}", expr.trim(), quote(alias))
            } else {
                format!(",{}.{} AS {}", quote(&join.table), quote(expr.trim()), quote(alias))
            }
        })
        .collect()
}

fn render_source(table: &TableDef, source: &Source) -> Result<String> {
    match source {
        Source::Table => Ok(quote(table.name())),
        Source::Raw(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
        Source::Tables(tables) if !tables.is_empty() => Ok(tables
            .iter()
            .map(|t| quote(t.trim()))
            .collect::<Vec<_>>()
            .join(",")),
        _ => Err(FrameworkError::InvalidClause { clause: "from" }),
    }
}

fn render_join(join: &Join) -> Result<String> {
    if join.table.trim().is_empty() {
        return Err(FrameworkError::InvalidClause { clause: "join" });
    }
    let constraint = match &join.constraint {
        JoinConstraint::On(expr) if !expr.trim().is_empty() => format!("ON ({})", expr.trim()),
        JoinConstraint::Using(column) if !column.trim().is_empty() => {
            format!("USING ({})", quote(column.trim()))
        }
        _ => return Err(FrameworkError::InvalidClause { clause: "join" }),
    };
    Ok(format!(
        "{} {} {constraint}",
        join.kind.keyword(),
        quote(join.table.trim())
    ))
}

/// Join AND conditions, then OR conditions. Values are appended in order.
fn render_conditions(
    and: &[Condition],
    or: &[Condition],
    clause: &'static str,
    params: &mut Vec<Value>,
) -> Result<Option<String>> {
    if and.iter().chain(or).any(|c| c.expr.trim().is_empty()) {
        return Err(FrameworkError::InvalidClause { clause });
    }
    let join = |conditions: &[Condition], sep: &str| {
        conditions
            .iter()
            .map(|c| c.expr.trim())
            .collect::<Vec<_>>()
            .join(sep)
    };

    let mut sql = join(and, " AND ");
    if !or.is_empty() {
        if !sql.is_empty() {
            sql.push_str(" OR ");
        }
        sql.push_str(&join(or, " OR "));
    }
    for condition in and.iter().chain(or) {
        params.extend(condition.values.iter().cloned());
    }

    Ok(if sql.is_empty() { None } else { Some(sql) })
}

/// Coerce every value of `data` to the type of its column.
fn bind_columns(table: &TableDef, data: &Row) -> Result<Vec<(String, Value)>> {
    data.columns()
        .map(|(column, value)| {
            let bind = table.column_type(column)?;
            Ok((column.to_string(), bind.coerce(column, value.clone())?))
        })
        .collect()
}

/// `` `t`.`a` = ? AND `t`.`b` = ? ``
fn equality_filter(table: &TableDef, filter: &Row, params: &mut Vec<Value>) -> Result<String> {
    let bound = bind_columns(table, filter)?;
    let mut terms = Vec::with_capacity(bound.len());
    for (column, value) in bound {
        terms.push(format!("{} = ?", table.qualified(&column)));
        params.push(value);
    }
    Ok(terms.join(" AND "))
}

/// Build `SELECT` options matching every column of `filter` for equality.
pub fn filter_conditions(table: &TableDef, filter: &Row) -> Result<Vec<Condition>> {
    bind_columns(table, filter)?
        .into_iter()
        .map(|(column, value)| {
            Ok(Condition::new(format!("{} = ?", table.qualified(&column))).with_value(value))
        })
        .collect()
}

pub fn build_insert(table: &TableDef, data: &Row) -> Result<Statement> {
    let bound = bind_columns(table, data)?;
    if bound.is_empty() {
        return Err(FrameworkError::EmptyStatement(table.name().to_string()));
    }
    let columns: Vec<String> = bound.iter().map(|(c, _)| quote(c)).collect();
    let placeholders = vec!["?"; bound.len()].join(",");
    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(table.name()),
            columns.join(",")
        ),
        params: bound.into_iter().map(|(_, v)| v).collect(),
    })
}

pub fn build_update(table: &TableDef, data: &Row, filter: &Row) -> Result<Statement> {
    let bound = bind_columns(table, data)?;
    if bound.is_empty() {
        return Err(FrameworkError::EmptyStatement(table.name().to_string()));
    }
    let mut params = Vec::new();
    let mut sets = Vec::with_capacity(bound.len());
    for (column, value) in bound {
        sets.push(format!("{} = ?", quote(&column)));
        params.push(value);
    }
    let mut sql = format!("UPDATE {} SET {}", quote(table.name()), sets.join(","));
    let filter = equality_filter(table, filter, &mut params)?;
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    Ok(Statement { sql, params })
}

/// `DELETE`; an empty filter deletes every row.
pub fn build_delete(table: &TableDef, filter: &Row) -> Result<Statement> {
    let mut params = Vec::new();
    let mut sql = format!("DELETE FROM {}", quote(table.name()));
    let filter = equality_filter(table, filter, &mut params)?;
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    Ok(Statement { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDef {
        TableDef::new("users")
            .column("id", BindType::Integer)
            .column("name", BindType::Text)
            .column("score", BindType::Real)
            .primary("id")
    }

    #[test]
    fn test_select_defaults() {
        let stmt = build_select(&users(), &SelectOptions::new()).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM `users` WHERE 1");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_columns_and_aliases() {
        let options = SelectOptions::new()
            .distinct(Distinct::Distinct)
            .column_as("name", "n")
            .column_as("COUNT(*)", "total")
            .column("nickname");
        let stmt = build_select(&users(), &options).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT `users`.`name` AS `n`,COUNT(*) AS `total`,`nickname` FROM `users` WHERE 1"
        );
    }

    #[test]
    fn test_select_full_clause_order() {
        let options = SelectOptions::new()
            .join(
                Join::new(JoinKind::Left, "posts", JoinConstraint::On("posts.user_id = users.id".into()))
                    .column("title", "post_title"),
            )
            .join(Join::new(JoinKind::Inner, "teams", JoinConstraint::Using("team_id".into())))
            .and_where(Condition::new("users.score > ?").with_value(1.5))
            .and_where(Condition::new("users.name LIKE ?").with_value("A%"))
            .or_where(Condition::new("users.id = ?").with_value(1))
            .group_by("users.id")
            .having(Condition::new("COUNT(posts.id) > ?").with_value(2))
            .or_having(Condition::new("1 = ?").with_value(9))
            .order_by("users.name", Order::Desc)
            .limit(10)
            .offset(20);
        let stmt = build_select(&users(), &options).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT *,`posts`.`title` AS `post_title`,`teams`.* FROM `users` \
             LEFT JOIN `posts` ON (posts.user_id = users.id) \
             INNER JOIN `teams` USING (`team_id`) \
             WHERE users.score > ? AND users.name LIKE ? OR users.id = ? \
             GROUP BY (users.id) HAVING COUNT(posts.id) > ? \
             ORDER BY users.name DESC LIMIT ?,?"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Real(1.5),
                Value::from("A%"),
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(20),
                Value::Integer(10),
            ]
        );
    }

    #[test]
    fn test_limit_beyond_i64_is_rejected() {
        let options = SelectOptions::new().limit(u64::MAX);
        assert!(matches!(
            build_select(&users(), &options),
            Err(FrameworkError::InvalidClause { clause: "limit" })
        ));

        let options = SelectOptions::new().limit(10).offset(i64::MAX as u64 + 1);
        assert!(matches!(
            build_select(&users(), &options),
            Err(FrameworkError::InvalidClause { clause: "offset" })
        ));
    }

    #[test]
    fn test_select_or_only_and_offset_without_limit() {
        let options = SelectOptions::new()
            .or_where(Condition::new("id = ?").with_value(1))
            .or_where(Condition::new("id = ?").with_value(2))
            .offset(5);
        let stmt = build_select(&users(), &options).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM `users` WHERE id = ? OR id = ?");
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_select_rejects_empty_condition() {
        let options = SelectOptions::new().and_where(Condition::new("  "));
        assert!(matches!(
            build_select(&users(), &options),
            Err(FrameworkError::InvalidClause { clause: "where" })
        ));
    }

    #[test]
    fn test_insert_coerces_to_column_types() {
        let data: Row = [("name", Value::from(42)), ("score", Value::from("3.5"))]
            .into_iter()
            .collect();
        let stmt = build_insert(&users(), &data).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `users` (`name`,`score`) VALUES (?,?)"
        );
        assert_eq!(stmt.params, vec![Value::from("42"), Value::Real(3.5)]);
    }

    #[test]
    fn test_insert_rejects_unknown_and_empty() {
        let data: Row = [("email", "a@b.c")].into_iter().collect();
        assert!(matches!(
            build_insert(&users(), &data),
            Err(FrameworkError::InvalidColumn(c)) if c == "email"
        ));
        assert!(matches!(
            build_insert(&users(), &Row::new()),
            Err(FrameworkError::EmptyStatement(_))
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let data: Row = [("name", "Grace")].into_iter().collect();
        let filter: Row = [("id", 3)].into_iter().collect();
        let stmt = build_update(&users(), &data, &filter).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE `users` SET `name` = ? WHERE `users`.`id` = ?"
        );
        assert_eq!(stmt.params, vec![Value::from("Grace"), Value::Integer(3)]);

        let stmt = build_delete(&users(), &filter).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `users` WHERE `users`.`id` = ?");

        let stmt = build_delete(&users(), &Row::new()).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM `users`");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_column_type_lookup() {
        let table = users();
        assert_eq!(table.column_type("score").unwrap(), BindType::Real);
        assert!(table.is_column("id"));
        assert!(matches!(
            table.column_type("nope"),
            Err(FrameworkError::InvalidColumn(_))
        ));
    }

    #[test]
    fn test_is_function_call() {
        assert!(is_function_call("COUNT(*)"));
        assert!(is_function_call("max(users.id)"));
        assert!(!is_function_call("(1)"));
        assert!(!is_function_call("name"));
        assert!(!is_function_call("a + b(1)"));
    }
}
