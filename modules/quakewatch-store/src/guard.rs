//! Allow-list validation for generated SQL.
//!
//! Statements produced by the text-generation capability are untrusted. A
//! statement is parsed with the Postgres dialect and accepted only when it is
//! a single `SELECT` whose tables, columns and functions all come from the
//! advertised catalog. The text that runs is re-rendered from the parsed tree,
//! so what executes is exactly what was checked.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;

use sqlparser::ast::{
    visit_expressions, visit_relations, Expr, Ident, ObjectName, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use quakewatch_common::{QuakeError, QuakeResult};

const FUNCTIONS: &[&str] = &["count", "lower", "upper", "coalesce", "trim", "length", "min", "max"];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Tables and columns advertised by the store's catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self.insert_column(table, column.into());
        }
        self.tables.entry(table.to_lowercase()).or_default();
        self
    }

    pub fn insert_column(&mut self, table: &str, column: String) {
        self.tables
            .entry(table.to_lowercase())
            .or_default()
            .push(column.to_lowercase());
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(&table.to_lowercase()).map(Vec::as_slice)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|cols| cols.iter().any(|c| c == column))
            .unwrap_or(false)
    }

    /// One line per table, e.g. `citizen(email, name)`. Used in prompts.
    pub fn describe(&self) -> String {
        self.tables
            .iter()
            .map(|(table, columns)| format!("{}({})", table, columns.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validate an untrusted statement against this catalog.
    pub fn validate(&self, statement: &str) -> QuakeResult<ReadOnlyQuery> {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, statement)
            .map_err(|e| reject(format!("failed to parse SQL: {e}")))?;
        let mut iter = statements.iter();
        let Some(statement) = iter.next() else {
            return Err(reject("empty statement"));
        };
        if iter.next().is_some() {
            return Err(reject("only a single statement is allowed"));
        }
        let Statement::Query(query) = statement else {
            return Err(reject("only SELECT statements are allowed"));
        };

        check_clauses(query)?;
        let selects = selects(&query.body)?;

        let mut scope = Scope::default();
        for select in &selects {
            if select.into.is_some() {
                return Err(reject("SELECT INTO is not allowed"));
            }
            for from in &select.from {
                self.bind(&from.relation, &mut scope)?;
                for join in &from.joins {
                    self.bind(&join.relation, &mut scope)?;
                }
            }
            for item in &select.projection {
                if let SelectItem::ExprWithAlias { alias, .. } = item {
                    scope.outputs.insert(alias.value.to_lowercase());
                }
            }
        }
        if scope.tables.is_empty() {
            return Err(reject("statement must read from at least one advertised table"));
        }

        let relations = visit_relations(&**query, |relation| {
            match self.resolve_relation(relation) {
                Ok(_) => ControlFlow::Continue(()),
                Err(e) => ControlFlow::Break(e),
            }
        });
        if let ControlFlow::Break(e) = relations {
            return Err(e);
        }

        let expressions = visit_expressions(&**query, |expr| {
            match self.check_expr(expr, &scope) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => ControlFlow::Break(e),
            }
        });
        if let ControlFlow::Break(e) = expressions {
            return Err(e);
        }

        Ok(ReadOnlyQuery {
            sql: query.to_string(),
            projection: projection(selects[0]),
            tables: scope.tables,
        })
    }

    /// Record a FROM/JOIN target and its alias. Only plain catalog tables
    /// are accepted.
    fn bind(&self, factor: &TableFactor, scope: &mut Scope) -> QuakeResult<()> {
        let TableFactor::Table {
            name, alias, args, ..
        } = factor
        else {
            return Err(reject(
                "only advertised tables may appear in FROM; subqueries are not allowed",
            ));
        };
        if args.is_some() {
            return Err(reject(format!("table function `{name}` is not allowed")));
        }

        let table = self.resolve_relation(name)?;
        if let Some(alias) = alias {
            scope
                .qualifiers
                .insert(alias.name.value.to_lowercase(), table.clone());
        }
        scope.qualifiers.insert(table.clone(), table.clone());
        if !scope.tables.contains(&table) {
            scope.tables.push(table);
        }
        Ok(())
    }

    /// `table` or `public.table`, which must be advertised.
    fn resolve_relation(&self, name: &ObjectName) -> QuakeResult<String> {
        let parts = lowered(&name.0);
        let table = match parts.as_slice() {
            [table] => table,
            [schema, table] if schema == "public" => table,
            _ => return Err(reject(format!("table `{name}` is not in the advertised catalog"))),
        };
        if !self.contains_table(table) {
            return Err(reject(format!("table `{table}` is not in the advertised catalog")));
        }
        Ok(table.clone())
    }

    fn check_expr(&self, expr: &Expr, scope: &Scope) -> QuakeResult<()> {
        match expr {
            Expr::Identifier(ident) => {
                let column = ident.value.to_lowercase();
                let known = scope.outputs.contains(&column)
                    || scope.tables.iter().any(|t| self.has_column(t, &column));
                if !known {
                    return Err(reject(format!("column `{column}` is not in the advertised catalog")));
                }
                Ok(())
            }
            Expr::CompoundIdentifier(idents) => {
                let parts = lowered(idents);
                let (qualifier, column) = match parts.as_slice() {
                    [qualifier, column] => (qualifier, column),
                    [schema, qualifier, column] if schema == "public" => (qualifier, column),
                    _ => {
                        return Err(reject(format!(
                            "unsupported column reference `{}`",
                            parts.join(".")
                        )))
                    }
                };
                let Some(table) = scope.qualifiers.get(qualifier) else {
                    return Err(reject(format!("unknown table or alias `{qualifier}`")));
                };
                if !self.has_column(table, column) {
                    return Err(reject(format!(
                        "column `{table}.{column}` is not in the advertised catalog"
                    )));
                }
                Ok(())
            }
            Expr::Function(function) => match lowered(&function.name.0).as_slice() {
                [name] if FUNCTIONS.contains(&name.as_str()) => Ok(()),
                parts => Err(reject(format!("function `{}` is not allowed", parts.join(".")))),
            },
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => {
                Err(reject("subqueries are not allowed"))
            }
            Expr::Value(Value::Placeholder(_)) => Err(reject("parameters are not allowed")),
            Expr::Value(Value::DollarQuotedString(_)) => {
                Err(reject("dollar quoting is not allowed"))
            }
            _ => Ok(()),
        }
    }
}

/// Names visible while checking identifiers.
#[derive(Default)]
struct Scope {
    /// Referenced catalog tables, in order of first appearance.
    tables: Vec<String>,
    /// Table name or alias to catalog table.
    qualifiers: HashMap<String, String>,
    /// Output column aliases, usable in ORDER BY.
    outputs: HashSet<String>,
}

fn check_clauses(query: &Query) -> QuakeResult<()> {
    if query.with.is_some() {
        return Err(reject("WITH clauses are not allowed"));
    }
    if !query.locks.is_empty() {
        return Err(reject("row locking is not allowed"));
    }
    if query.for_clause.is_some() {
        return Err(reject("FOR clauses are not allowed"));
    }
    Ok(())
}

/// Every SELECT of a plain or set-operation body.
fn selects(body: &SetExpr) -> QuakeResult<Vec<&Select>> {
    match body {
        SetExpr::Select(select) => Ok(vec![select.as_ref()]),
        SetExpr::SetOperation { left, right, .. } => {
            let mut out = selects(left)?;
            out.extend(selects(right)?);
            Ok(out)
        }
        SetExpr::Query(_) => Err(reject("subqueries are not allowed")),
        _ => Err(reject("only SELECT statements are allowed")),
    }
}

fn lowered(idents: &[Ident]) -> Vec<String> {
    idents.iter().map(|ident| ident.value.to_lowercase()).collect()
}

fn reject(reason: impl Into<String>) -> QuakeError {
    QuakeError::QueryTranslation(reason.into())
}

// ---------------------------------------------------------------------------
// ReadOnlyQuery
// ---------------------------------------------------------------------------

/// A statement that passed `Catalog::validate`. Only the guard constructs
/// these, and stores execute nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOnlyQuery {
    sql: String,
    tables: Vec<String>,
    projection: Projection,
}

/// Shape of the result rows, as far as the guard can tell.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<ProjectedColumn>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    /// Source column, when the item is a plain (possibly qualified) column.
    pub source: Option<String>,
    /// Output key in the result row.
    pub output: String,
}

impl ReadOnlyQuery {
    /// Statement text as rendered from the validated tree.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Referenced tables in order of first appearance.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

/// Result columns are named by the first SELECT of a set operation.
fn projection(select: &Select) -> Projection {
    let mut columns = Vec::new();
    for item in &select.projection {
        let column = match item {
            SelectItem::Wildcard(..) | SelectItem::QualifiedWildcard(..) => return Projection::All,
            SelectItem::UnnamedExpr(expr) => {
                let source = source_column(expr);
                ProjectedColumn {
                    output: source.clone().unwrap_or_else(|| default_output(expr)),
                    source,
                }
            }
            SelectItem::ExprWithAlias { expr, alias } => ProjectedColumn {
                source: source_column(expr),
                output: output_name(alias),
            },
        };
        columns.push(column);
    }
    Projection::Columns(columns)
}

fn source_column(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(output_name(ident)),
        Expr::CompoundIdentifier(idents) => idents.last().map(output_name),
        _ => None,
    }
}

/// Postgres folds unquoted names to lower case.
fn output_name(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

fn default_output(expr: &Expr) -> String {
    match expr {
        Expr::Function(function) => function
            .name
            .0
            .last()
            .map(output_name)
            .unwrap_or_else(|| "?column?".to_string()),
        _ => "?column?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_table("citizen", ["email", "name"])
            .with_table("org", ["email", "name", "sector"])
            .with_table("disaster", ["event_date", "event_time", "coordinates", "magnitude"])
    }

    fn rejected(sql: &str) -> String {
        match catalog().validate(sql) {
            Err(QuakeError::QueryTranslation(reason)) => reason,
            other => panic!("expected rejection for {sql:?}, got {other:?}"),
        }
    }

    #[test]
    fn accepts_plain_select() {
        let query = catalog().validate("SELECT email, name FROM citizen;").unwrap();
        assert_eq!(query.sql(), "SELECT email, name FROM citizen");
        assert_eq!(query.tables(), ["citizen".to_string()]);
        assert_eq!(
            query.projection(),
            &Projection::Columns(vec![
                ProjectedColumn { source: Some("email".into()), output: "email".into() },
                ProjectedColumn { source: Some("name".into()), output: "name".into() },
            ])
        );
    }

    #[test]
    fn accepts_star_projection() {
        let query = catalog().validate("select * from org").unwrap();
        assert_eq!(query.projection(), &Projection::All);
    }

    #[test]
    fn accepts_aliases_filters_and_ordering() {
        let query = catalog()
            .validate(
                "SELECT c.email AS address, c.name FROM public.citizen AS c \
                 WHERE lower(c.name) LIKE 'a%' AND c.email IS NOT NULL ORDER BY address",
            )
            .unwrap();
        assert_eq!(query.tables(), ["citizen".to_string()]);
        let Projection::Columns(columns) = query.projection() else {
            panic!("expected explicit columns");
        };
        assert_eq!(columns[0].source.as_deref(), Some("email"));
        assert_eq!(columns[0].output, "address");
        assert_eq!(columns[1].output, "name");
    }

    #[test]
    fn accepts_union_of_advertised_tables() {
        let query = catalog()
            .validate("SELECT email FROM citizen UNION SELECT email FROM org")
            .unwrap();
        assert_eq!(query.tables(), ["citizen".to_string(), "org".to_string()]);
    }

    #[test]
    fn keywords_inside_string_literals_are_inert() {
        assert!(catalog()
            .validate("SELECT email FROM citizen WHERE name = 'drop table; --'")
            .is_ok());
    }

    #[test]
    fn comments_never_reach_the_executed_text() {
        let query = catalog()
            .validate("SELECT * FROM citizen -- all of them")
            .unwrap();
        assert_eq!(query.sql(), "SELECT * FROM citizen");
    }

    #[test]
    fn escape_strings_cannot_smuggle_a_union() {
        let catalog = Catalog::new().with_table("citizen", ["email", "name"]);
        for sql in [
            r"SELECT email AS e FROM citizen WHERE name = E'\'' UNION SELECT usename FROM pg_user /* ' */",
            r"SELECT email AS e FROM citizen WHERE name = E'\'' UNION SELECT password FROM secrets /* ' */",
        ] {
            assert!(
                matches!(catalog.validate(sql), Err(QuakeError::QueryTranslation(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn rejects_unadvertised_table() {
        let reason = rejected("SELECT * FROM users");
        assert!(reason.contains("`users`"), "{reason}");
    }

    #[test]
    fn rejects_unadvertised_joined_table() {
        let reason = rejected("SELECT c.email FROM citizen c JOIN secrets s ON s.email = c.email");
        assert!(reason.contains("`secrets`"), "{reason}");
    }

    #[test]
    fn rejects_unknown_column() {
        let reason = rejected("SELECT password FROM citizen");
        assert!(reason.contains("`password`"), "{reason}");
    }

    #[test]
    fn rejects_column_from_wrong_table() {
        let reason = rejected("SELECT c.sector FROM citizen c");
        assert!(reason.contains("citizen.sector"), "{reason}");
    }

    #[test]
    fn rejects_mutations() {
        rejected("DELETE FROM citizen");
        rejected("UPDATE citizen SET name = 'x'");
        rejected("INSERT INTO citizen (email) VALUES ('x')");
        rejected("SELECT email INTO backup FROM citizen");
    }

    #[test]
    fn rejects_stacked_statements() {
        let reason = rejected("SELECT * FROM citizen; DROP TABLE citizen");
        assert!(reason.contains("single statement"), "{reason}");
    }

    #[test]
    fn rejects_system_objects() {
        rejected("SELECT pg_sleep(10) FROM citizen");
        rejected("SELECT * FROM pg_catalog.pg_user");
        rejected("SELECT * FROM pg_user");
    }

    #[test]
    fn rejects_subqueries_and_unknown_functions() {
        rejected("SELECT * FROM (SELECT * FROM citizen) q");
        rejected("SELECT email FROM citizen WHERE email IN (SELECT email FROM org)");
        rejected("WITH x AS (SELECT * FROM citizen) SELECT * FROM x");
        let reason = rejected("SELECT version() FROM citizen");
        assert!(reason.contains("`version`"), "{reason}");
    }

    #[test]
    fn rejects_row_locking_and_parameters() {
        rejected("SELECT * FROM citizen FOR UPDATE");
        rejected("SELECT * FROM citizen WHERE email = $1");
    }

    #[test]
    fn rejects_statements_without_tables() {
        rejected("SELECT 1");
        rejected("");
        rejected("   ;");
    }

    #[test]
    fn describe_lists_tables_with_columns() {
        let described = Catalog::new()
            .with_table("citizen", ["email", "name"])
            .describe();
        assert_eq!(described, "citizen(email, name)");
    }
}
