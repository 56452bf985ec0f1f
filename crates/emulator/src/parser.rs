//! SQL text to internal AST.
//!
//! Statements go through `sqlparser`'s generic dialect after a small
//! rewrite that lets it accept Spanner DDL (`STRING(1024)` lengths and the
//! trailing `PRIMARY KEY (...)` clause). Double-quoted tokens inside
//! expressions are string literals, as in GoogleSQL.

use crate::ast::{
    BinaryOp, ColumnDef, Expr, OrderByExpr, Select, SelectItem, SortDirection, Statement, UnaryOp,
};
use driver::{DriverError, DriverResult};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;
use types::{SqlType, Value};

/// Parse exactly one statement.
pub fn parse_statement(sql: &str) -> DriverResult<Statement> {
    if sql.trim().is_empty() {
        return Err(DriverError::invalid_argument(
            "Syntax error: Unexpected end of statement",
        ));
    }

    let rewritten = rewrite_spanner_ddl(sql);
    let dialect = GenericDialect {};
    let mut stmts = SqlParser::parse_sql(&dialect, &rewritten)
        .map_err(|e| DriverError::invalid_argument(format!("Syntax error: {e}")))?;

    match stmts.len() {
        0 => Err(DriverError::invalid_argument(
            "Syntax error: Unexpected end of statement",
        )),
        1 => map_statement(stmts.remove(0)),
        n => Err(DriverError::invalid_argument(format!(
            "expected a single statement, found {n}"
        ))),
    }
}

fn map_statement(stmt: sqlast::Statement) -> DriverResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => {
            let table = object_name(&name)?;
            let primary_key = resolve_primary_key(&columns, &constraints)?.unwrap_or_default();

            let mapped_columns = columns
                .into_iter()
                .map(map_column_def)
                .collect::<DriverResult<Vec<_>>>()?;

            Ok(Statement::CreateTable {
                name: table,
                columns: mapped_columns,
                primary_key,
            })
        }
        SqlStatement::Drop {
            object_type,
            names,
            if_exists,
            ..
        } => match object_type {
            sqlast::ObjectType::Table => Ok(Statement::DropTable {
                name: first_name(names)?,
                if_exists,
            }),
            other => Err(DriverError::unimplemented(format!(
                "unsupported DROP type: {other}"
            ))),
        },
        SqlStatement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let table = object_name(&table_name)?;
            let source = source
                .ok_or_else(|| DriverError::invalid_argument("INSERT requires a VALUES list"))?;
            let rows = extract_values(*source)?;
            Ok(Statement::Insert {
                table,
                columns: columns.into_iter().map(|c| c.value).collect(),
                rows,
            })
        }
        SqlStatement::Query(query) => map_select(*query).map(Statement::Select),
        other => Err(DriverError::unimplemented(format!(
            "unsupported statement: {other}"
        ))),
    }
}

fn map_column_def(col: sqlast::ColumnDef) -> DriverResult<ColumnDef> {
    let raw_type = col.data_type.to_string();
    let ty = SqlType::parse(&raw_type).ok_or_else(|| {
        DriverError::invalid_argument(format!(
            "unsupported type {raw_type} for column {}",
            col.name.value
        ))
    })?;
    let not_null = col
        .options
        .iter()
        .any(|opt| matches!(opt.option, sqlast::ColumnOption::NotNull));

    Ok(ColumnDef {
        name: col.name.value,
        ty,
        not_null,
    })
}

fn map_select(query: sqlast::Query) -> DriverResult<Select> {
    use sqlast::SetExpr;

    let select = match *query.body {
        SetExpr::Select(select) => select,
        SetExpr::Values(_) => {
            return Err(DriverError::unimplemented(
                "standalone VALUES not supported",
            ))
        }
        _ => return Err(DriverError::unimplemented("set operations not supported")),
    };

    let sqlast::Select {
        projection,
        from,
        selection,
        having,
        ..
    } = *select;

    if having.is_some() {
        return Err(DriverError::unimplemented("HAVING not supported"));
    }

    let from = match from.len() {
        0 => None,
        1 => Some(table_name_from_with_joins(&from[0])?),
        _ => return Err(DriverError::unimplemented("joins not supported")),
    };

    let items = projection
        .into_iter()
        .map(map_select_item)
        .collect::<DriverResult<Vec<_>>>()?;
    let selection = selection.map(map_expr).transpose()?;

    let order_by = query
        .order_by
        .into_iter()
        .map(map_order_by_expr)
        .collect::<DriverResult<Vec<_>>>()?;

    let limit = query.limit.map(|expr| parse_count(expr, "LIMIT")).transpose()?;
    let offset = query
        .offset
        .map(|offset| parse_count(offset.value, "OFFSET"))
        .transpose()?;

    Ok(Select {
        items,
        from,
        selection,
        order_by,
        limit,
        offset,
    })
}

fn parse_count(expr: sqlast::Expr, clause: &str) -> DriverResult<u64> {
    match expr {
        sqlast::Expr::Value(sqlast::Value::Number(n, _)) => n
            .parse::<u64>()
            .map_err(|_| DriverError::invalid_argument(format!("invalid {clause} value: {n}"))),
        other => Err(DriverError::invalid_argument(format!(
            "{clause} expects an integer literal, got {other}"
        ))),
    }
}

fn map_order_by_expr(expr: sqlast::OrderByExpr) -> DriverResult<OrderByExpr> {
    let direction = match expr.asc {
        Some(false) => SortDirection::Desc,
        _ => SortDirection::Asc,
    };

    Ok(OrderByExpr {
        expr: map_expr(expr.expr)?,
        direction,
    })
}

fn extract_values(query: sqlast::Query) -> DriverResult<Vec<Vec<Expr>>> {
    match *query.body {
        sqlast::SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(DriverError::invalid_argument(
                    "INSERT requires at least one row",
                ));
            }
            values
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(map_expr).collect())
                .collect()
        }
        _ => Err(DriverError::unimplemented("INSERT expects VALUES list")),
    }
}

fn map_select_item(item: sqlast::SelectItem) -> DriverResult<SelectItem> {
    match item {
        sqlast::SelectItem::Wildcard(options) => {
            ensure_plain_wildcard(&options)?;
            Ok(SelectItem::Wildcard)
        }
        sqlast::SelectItem::QualifiedWildcard(_, _) => Err(DriverError::unimplemented(
            "qualified wildcard not supported",
        )),
        sqlast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
            expr: map_expr(expr)?,
            alias: None,
        }),
        sqlast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
            expr: map_expr(expr)?,
            alias: Some(alias.value),
        }),
    }
}

fn map_expr(expr: sqlast::Expr) -> DriverResult<Expr> {
    use sqlast::Expr as SqlExpr;

    match expr {
        SqlExpr::Identifier(ident) => Ok(map_identifier(ident)),
        SqlExpr::CompoundIdentifier(idents) => idents
            .into_iter()
            .last()
            .map(|ident| Expr::Column(ident.value))
            .ok_or_else(|| DriverError::invalid_argument("invalid identifier")),
        SqlExpr::Value(value) => Ok(Expr::Literal(map_value(value)?)),
        SqlExpr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: Box::new(map_expr(*left)?),
            op: map_binary_op(op)?,
            right: Box::new(map_expr(*right)?),
        }),
        SqlExpr::UnaryOp { op, expr } => map_unary(op, *expr),
        SqlExpr::Nested(expr) => map_expr(*expr),
        SqlExpr::IsNull(expr) => Ok(Expr::IsNull {
            expr: Box::new(map_expr(*expr)?),
            negated: false,
        }),
        SqlExpr::IsNotNull(expr) => Ok(Expr::IsNull {
            expr: Box::new(map_expr(*expr)?),
            negated: true,
        }),
        SqlExpr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(map_expr(*expr)?),
            list: list.into_iter().map(map_expr).collect::<DriverResult<_>>()?,
            negated,
        }),
        other => Err(DriverError::invalid_argument(format!(
            "unsupported expression: {other}"
        ))),
    }
}

/// `"abc"` is a string literal in GoogleSQL; identifiers are bare or
/// backtick-quoted.
fn map_identifier(ident: sqlast::Ident) -> Expr {
    match ident.quote_style {
        Some('"') => Expr::Literal(Value::Text(ident.value)),
        _ => Expr::Column(ident.value),
    }
}

fn map_unary(op: sqlast::UnaryOperator, operand: sqlast::Expr) -> DriverResult<Expr> {
    use sqlast::UnaryOperator as SqlUnary;

    let operand = map_expr(operand)?;
    match op {
        SqlUnary::Plus => Ok(operand),
        SqlUnary::Minus => Ok(Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(operand),
        }),
        SqlUnary::Not => Ok(Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(operand),
        }),
        other => Err(DriverError::invalid_argument(format!(
            "unsupported unary operator: {other}"
        ))),
    }
}

fn map_value(value: sqlast::Value) -> DriverResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => num
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| DriverError::invalid_argument(format!("invalid INT64 literal: {num}"))),
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(Value::Text(s)),
        SqlValue::Boolean(b) => Ok(Value::Bool(b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(DriverError::invalid_argument(format!(
            "unsupported literal: {other}"
        ))),
    }
}

fn map_binary_op(op: sqlast::BinaryOperator) -> DriverResult<BinaryOp> {
    use sqlast::BinaryOperator as SqlBinary;

    Ok(match op {
        SqlBinary::Eq => BinaryOp::Eq,
        SqlBinary::NotEq => BinaryOp::Ne,
        SqlBinary::Lt => BinaryOp::Lt,
        SqlBinary::LtEq => BinaryOp::Le,
        SqlBinary::Gt => BinaryOp::Gt,
        SqlBinary::GtEq => BinaryOp::Ge,
        SqlBinary::And => BinaryOp::And,
        SqlBinary::Or => BinaryOp::Or,
        SqlBinary::Plus => BinaryOp::Add,
        SqlBinary::Minus => BinaryOp::Sub,
        SqlBinary::Multiply => BinaryOp::Mul,
        SqlBinary::Divide => BinaryOp::Div,
        other => {
            return Err(DriverError::invalid_argument(format!(
                "unsupported operator: {other}"
            )))
        }
    })
}

fn object_name(name: &sqlast::ObjectName) -> DriverResult<String> {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .ok_or_else(|| DriverError::invalid_argument("invalid object name"))
}

fn first_name(names: Vec<sqlast::ObjectName>) -> DriverResult<String> {
    names
        .first()
        .ok_or_else(|| DriverError::invalid_argument("DROP requires a target"))
        .and_then(object_name)
}

fn table_name_from_with_joins(table: &sqlast::TableWithJoins) -> DriverResult<String> {
    if !table.joins.is_empty() {
        return Err(DriverError::unimplemented("joins not supported"));
    }
    match &table.relation {
        sqlast::TableFactor::Table { name, .. } => object_name(name),
        other => Err(DriverError::unimplemented(format!(
            "unsupported table factor: {other}"
        ))),
    }
}

fn ensure_plain_wildcard(options: &sqlast::WildcardAdditionalOptions) -> DriverResult<()> {
    let has_options = options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_rename.is_some()
        || options.opt_replace.is_some();
    if has_options {
        Err(DriverError::unimplemented("wildcard options not supported"))
    } else {
        Ok(())
    }
}

/// Resolve primary key from inline column constraints and table-level constraints.
fn resolve_primary_key(
    columns: &[sqlast::ColumnDef],
    constraints: &[sqlast::TableConstraint],
) -> DriverResult<Option<Vec<String>>> {
    let inline_pk = columns
        .iter()
        .filter(|column| {
            column.options.iter().any(|opt| {
                matches!(
                    opt.option,
                    sqlast::ColumnOption::Unique {
                        is_primary: true,
                        ..
                    }
                )
            })
        })
        .map(|column| column.name.value.clone())
        .collect::<Vec<_>>();

    let table_pk = constraints.iter().find_map(|constraint| match constraint {
        sqlast::TableConstraint::Unique {
            columns,
            is_primary: true,
            ..
        } => Some(columns.iter().map(|c| c.value.clone()).collect::<Vec<_>>()),
        _ => None,
    });

    match (table_pk, inline_pk.len()) {
        (Some(_), n) if n > 0 => Err(DriverError::invalid_argument(
            "PRIMARY KEY defined both inline and at table level",
        )),
        (Some(pk), _) => Ok(Some(pk)),
        (None, 0) => Ok(None),
        (None, 1) => Ok(Some(inline_pk)),
        (None, _) => Err(DriverError::invalid_argument(
            "multiple PRIMARY KEY column constraints; use PRIMARY KEY (col1, col2)",
        )),
    }
}

/// Rewrite Spanner-only DDL syntax into something the generic dialect
/// parses. Non-DDL text is returned unchanged.
pub(crate) fn rewrite_spanner_ddl(sql: &str) -> String {
    if !starts_with_keyword(sql.trim_start(), "CREATE") {
        return sql.to_string();
    }
    let stripped = strip_type_lengths(sql);
    hoist_primary_key(&stripped).unwrap_or(stripped)
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    strip_prefix_ci(s, keyword).is_some()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `STRING(1024)`, `STRING(MAX)` and `BYTES(...)` lose their length.
fn strip_type_lengths(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;

    while !rest.is_empty() {
        let boundary = out.chars().last().map_or(true, |c| !is_ident_char(c));
        let keyword = ["STRING", "BYTES"]
            .into_iter()
            .find(|kw| boundary && strip_prefix_ci(rest, kw).is_some());

        if let Some(kw) = keyword {
            let (word, after) = rest.split_at(kw.len());
            let trimmed = after.trim_start();
            let word_ends = !after.starts_with(is_ident_char);
            if word_ends && trimmed.starts_with('(') {
                if let Some(close) = trimmed.find(')') {
                    out.push_str(word);
                    rest = &trimmed[close + 1..];
                    continue;
                }
            }
            out.push_str(word);
            rest = after;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}

/// Move a trailing `PRIMARY KEY (cols)` clause into the column list.
fn hoist_primary_key(sql: &str) -> Option<String> {
    let open = sql.find('(')?;
    let mut depth = 0usize;
    let mut close = None;
    for (idx, c) in sql[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let tail = sql[close + 1..].trim_start();
    let tail = strip_prefix_ci(tail, "PRIMARY")?.trim_start();
    let tail = strip_prefix_ci(tail, "KEY")?.trim_start();
    let tail = tail.strip_prefix('(')?;
    let key_end = tail.find(')')?;
    let key_columns = tail[..key_end].trim();
    let remainder = tail[key_end + 1..].trim();

    let head = &sql[..close];
    if key_columns.is_empty() {
        Some(format!("{head}){remainder}"))
    } else {
        Some(format!("{head}, PRIMARY KEY ({key_columns})){remainder}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn select(sql: &str) -> Select {
        match parse_statement(sql).expect("parser should succeed") {
            Statement::Select(select) => select,
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn rewrite_strips_lengths_and_hoists_key() {
        let ddl = "CREATE TABLE T (\n A STRING(1024),\n B STRING(MAX),\n C BYTES(10)\n) PRIMARY KEY (A)";
        assert_eq!(
            rewrite_spanner_ddl(ddl),
            "CREATE TABLE T (\n A STRING,\n B STRING,\n C BYTES\n, PRIMARY KEY (A))"
        );
    }

    #[test]
    fn rewrite_leaves_queries_alone() {
        let sql = "SELECT * FROM T WHERE A = \"STRING(1)\"";
        assert_eq!(rewrite_spanner_ddl(sql), sql);
    }

    #[test]
    fn rewrite_keeps_identifiers_containing_keywords() {
        assert_eq!(
            strip_type_lengths("CREATE TABLE T (MYSTRING INT64, S STRING (5))"),
            "CREATE TABLE T (MYSTRING INT64, S STRING)"
        );
    }

    #[test]
    fn parse_spanner_create_table() {
        let stmt = parse_statement(
            "CREATE TABLE TestQueryContext (
                A   STRING(1024),
                B  STRING(1024) NOT NULL,
                C   INT64
            )	 PRIMARY KEY (A)",
        )
        .unwrap();

        match stmt {
            Statement::CreateTable {
                name,
                columns,
                primary_key,
            } => {
                assert_eq!(name, "TestQueryContext");
                assert_eq!(primary_key, vec!["A".to_string()]);
                assert_eq!(columns.len(), 3);
                assert_eq!(columns[0].ty, SqlType::Text);
                assert!(!columns[0].not_null);
                assert!(columns[1].not_null);
                assert_eq!(columns[2].ty, SqlType::Int);
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parse_drop_table() {
        assert_eq!(
            parse_statement("DROP TABLE TestQueryContext").unwrap(),
            Statement::DropTable {
                name: "TestQueryContext".into(),
                if_exists: false,
            }
        );
    }

    #[test]
    fn parse_multi_row_insert_with_double_quotes() {
        let stmt = parse_statement(
            r#"INSERT INTO T (A, B, C)
               VALUES ("a1", "b1", "c1"), ("a2", "b2", "c2") , ("a3", "b3", "c3") "#,
        )
        .unwrap();

        match stmt {
            Statement::Insert {
                table,
                columns,
                rows,
            } => {
                assert_eq!(table, "T");
                assert_eq!(columns, vec!["A", "B", "C"]);
                assert_eq!(rows.len(), 3);
                assert_eq!(rows[1][0], Expr::Literal(Value::Text("a2".into())));
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn double_quoted_token_is_a_string_literal() {
        let select = select("SELECT * FROM T WHERE A = \"a1\"");
        assert_eq!(select.from.as_deref(), Some("T"));
        assert_eq!(
            select.selection,
            Some(Expr::Binary {
                left: Box::new(Expr::Column("A".into())),
                op: BinaryOp::Eq,
                right: Box::new(Expr::Literal(Value::Text("a1".into()))),
            })
        );
    }

    #[test]
    fn parse_order_limit_offset() {
        let select = select("SELECT A AS key, B FROM T ORDER BY A DESC, B LIMIT 2 OFFSET 1");
        assert_eq!(select.items.len(), 2);
        assert!(matches!(
            &select.items[0],
            SelectItem::Expr { alias: Some(alias), .. } if alias == "key"
        ));
        assert_eq!(select.order_by.len(), 2);
        assert_eq!(select.order_by[0].direction, SortDirection::Desc);
        assert_eq!(select.order_by[1].direction, SortDirection::Asc);
        assert_eq!(select.limit, Some(2));
        assert_eq!(select.offset, Some(1));
    }

    #[test]
    fn empty_statement_is_invalid() {
        for sql in ["", "   ", ";"] {
            let err = parse_statement(sql).unwrap_err();
            assert!(err.is_invalid_argument(), "{sql:?} gave {err}");
        }
    }

    #[test]
    fn multiple_statements_are_rejected() {
        let err = parse_statement("SELECT 1; SELECT 2").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn garbage_is_a_syntax_error() {
        let err = parse_statement("SELEKT * FROM T").unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.message.starts_with("Syntax error"));
    }
}
