//! Name resolution and type checking for queries.
//!
//! Everything that can be decided without reading rows is decided here, so
//! a [`Plan`] only fails at evaluation time for data-dependent reasons.

use std::sync::Arc;

use driver::{DriverError, DriverResult};
use types::{SqlType, Value};

use crate::ast::{BinaryOp, Expr, Select, SelectItem, SortDirection, Statement, UnaryOp};
use crate::catalog::{DatabaseState, Table};
use crate::parser::parse_statement;

/// Expression with column references resolved to row positions.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    Literal(Value),
    Column(usize),
    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },
    Binary {
        left: Box<BoundExpr>,
        op: BinaryOp,
        right: Box<BoundExpr>,
    },
    IsNull {
        expr: Box<BoundExpr>,
        negated: bool,
    },
    InList {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        negated: bool,
    },
}

/// Rows a query reads from.
#[derive(Clone, Debug)]
pub enum Source {
    Table(Arc<Table>),
    /// `SELECT` without `FROM`: a single empty row.
    Single,
}

#[derive(Clone, Debug)]
pub struct Plan {
    pub columns: Vec<String>,
    pub source: Source,
    pub projection: Vec<BoundExpr>,
    pub filter: Option<BoundExpr>,
    pub order_by: Vec<(BoundExpr, SortDirection)>,
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Parse and analyze a read-only query against a snapshot.
pub fn prepare(state: &DatabaseState, sql: &str) -> DriverResult<Plan> {
    match parse_statement(sql)? {
        Statement::Select(select) => analyze(state, select),
        _ => Err(DriverError::invalid_argument(
            "Only SELECT statements can be executed as queries",
        )),
    }
}

pub fn analyze(state: &DatabaseState, select: Select) -> DriverResult<Plan> {
    let source = match &select.from {
        Some(name) => Source::Table(Arc::clone(state.table(name)?)),
        None => Source::Single,
    };
    let table = match &source {
        Source::Table(table) => Some(table.as_ref()),
        Source::Single => None,
    };
    let binder = Binder { table };

    let mut columns = Vec::new();
    let mut projection = Vec::new();
    let mut aliases: Vec<(String, Typed)> = Vec::new();
    for item in select.items {
        match item {
            SelectItem::Wildcard => {
                let table = table.ok_or_else(|| {
                    DriverError::invalid_argument("SELECT * must have a FROM clause")
                })?;
                for (idx, column) in table.columns().iter().enumerate() {
                    columns.push(column.name.clone());
                    projection.push(BoundExpr::Column(idx));
                }
            }
            SelectItem::Expr { expr, alias } => {
                let label = match (&alias, &expr) {
                    (Some(alias), _) => alias.clone(),
                    (None, Expr::Column(name)) => binder.column_label(name),
                    _ => String::new(),
                };
                let typed = binder.bind(expr)?;
                if let Some(alias) = alias {
                    aliases.push((alias, typed.clone()));
                }
                columns.push(label);
                projection.push(typed.expr);
            }
        }
    }

    let filter = match select.selection {
        Some(expr) => {
            let typed = binder.bind(expr)?;
            match typed.ty {
                Some(SqlType::Bool) | None => Some(typed.expr),
                Some(other) => {
                    return Err(DriverError::invalid_argument(format!(
                        "WHERE clause should return type BOOL, but returns {other}"
                    )))
                }
            }
        }
        None => None,
    };

    let order_by = select
        .order_by
        .into_iter()
        .map(|item| {
            let typed = binder.bind_order_key(item.expr, &aliases)?;
            Ok((typed.expr, item.direction))
        })
        .collect::<DriverResult<Vec<_>>>()?;

    Ok(Plan {
        columns,
        source,
        projection,
        filter,
        order_by,
        limit: select.limit,
        offset: select.offset.unwrap_or(0),
    })
}

/// Bind an expression that may not reference any column, as in `VALUES`.
pub fn bind_constant(expr: Expr) -> DriverResult<BoundExpr> {
    Binder { table: None }.bind(expr).map(|typed| typed.expr)
}

/// Bound expression with its static type; `None` is the untyped NULL.
#[derive(Clone, Debug)]
struct Typed {
    expr: BoundExpr,
    ty: Option<SqlType>,
}

struct Binder<'a> {
    table: Option<&'a Table>,
}

impl Binder<'_> {
    fn column_label(&self, name: &str) -> String {
        self.table
            .and_then(|table| {
                table
                    .column_index(name)
                    .map(|idx| table.columns()[idx].name.clone())
            })
            .unwrap_or_else(|| name.to_string())
    }

    fn bind_order_key(&self, expr: Expr, aliases: &[(String, Typed)]) -> DriverResult<Typed> {
        if let Expr::Column(name) = &expr {
            let is_column = self
                .table
                .is_some_and(|table| table.column_index(name).is_some());
            if !is_column {
                if let Some((_, typed)) = aliases.iter().find(|(a, _)| a.eq_ignore_ascii_case(name))
                {
                    return Ok(typed.clone());
                }
            }
        }
        self.bind(expr)
    }

    fn bind(&self, expr: Expr) -> DriverResult<Typed> {
        match expr {
            Expr::Literal(value) => Ok(Typed {
                ty: value.sql_type(),
                expr: BoundExpr::Literal(value),
            }),
            Expr::Column(name) => {
                let (idx, ty) = self
                    .table
                    .and_then(|table| {
                        table
                            .column_index(&name)
                            .map(|idx| (idx, table.columns()[idx].ty))
                    })
                    .ok_or_else(|| {
                        DriverError::invalid_argument(format!("Unrecognized name: {name}"))
                    })?;
                Ok(Typed {
                    expr: BoundExpr::Column(idx),
                    ty: Some(ty),
                })
            }
            Expr::Unary { op, expr } => {
                let operand = self.bind(*expr)?;
                let expected = match op {
                    UnaryOp::Not => SqlType::Bool,
                    UnaryOp::Neg => SqlType::Int,
                };
                if !accepts(operand.ty, expected) {
                    return Err(signature_error(unary_symbol(op), &[operand.ty]));
                }
                Ok(Typed {
                    expr: BoundExpr::Unary {
                        op,
                        expr: Box::new(operand.expr),
                    },
                    ty: Some(expected),
                })
            }
            Expr::Binary { left, op, right } => {
                let left = self.bind(*left)?;
                let right = self.bind(*right)?;
                let ty = binary_result_type(op, left.ty, right.ty)
                    .ok_or_else(|| signature_error(op.symbol(), &[left.ty, right.ty]))?;
                Ok(Typed {
                    expr: BoundExpr::Binary {
                        left: Box::new(left.expr),
                        op,
                        right: Box::new(right.expr),
                    },
                    ty: Some(ty),
                })
            }
            Expr::IsNull { expr, negated } => Ok(Typed {
                expr: BoundExpr::IsNull {
                    expr: Box::new(self.bind(*expr)?.expr),
                    negated,
                },
                ty: Some(SqlType::Bool),
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let needle = self.bind(*expr)?;
                let mut bound = Vec::with_capacity(list.len());
                for item in list {
                    let item = self.bind(item)?;
                    if !comparable(needle.ty, item.ty) {
                        return Err(signature_error("IN", &[needle.ty, item.ty]));
                    }
                    bound.push(item.expr);
                }
                Ok(Typed {
                    expr: BoundExpr::InList {
                        expr: Box::new(needle.expr),
                        list: bound,
                        negated,
                    },
                    ty: Some(SqlType::Bool),
                })
            }
        }
    }
}

fn accepts(actual: Option<SqlType>, expected: SqlType) -> bool {
    actual.map_or(true, |ty| ty == expected)
}

fn comparable(left: Option<SqlType>, right: Option<SqlType>) -> bool {
    match (left, right) {
        (Some(l), Some(r)) => l == r,
        _ => true,
    }
}

fn binary_result_type(
    op: BinaryOp,
    left: Option<SqlType>,
    right: Option<SqlType>,
) -> Option<SqlType> {
    if op.is_comparison() {
        comparable(left, right).then_some(SqlType::Bool)
    } else if op.is_logical() {
        (accepts(left, SqlType::Bool) && accepts(right, SqlType::Bool)).then_some(SqlType::Bool)
    } else {
        (accepts(left, SqlType::Int) && accepts(right, SqlType::Int)).then_some(SqlType::Int)
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "NOT",
        UnaryOp::Neg => "-",
    }
}

fn signature_error(operator: &str, args: &[Option<SqlType>]) -> DriverError {
    let rendered = args
        .iter()
        .map(|ty| ty.map_or_else(|| "NULL".to_string(), |ty| ty.to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    DriverError::invalid_argument(format!(
        "No matching signature for operator {operator} for argument types: {rendered}"
    ))
}
