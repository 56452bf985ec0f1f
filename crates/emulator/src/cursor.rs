use std::sync::Arc;

use async_trait::async_trait;
use common::Row;
use driver::{DriverError, DriverResult, RowCursor};
use tracing::debug;
use types::Value;

use crate::analyze::{prepare, Plan, Source};
use crate::ast::SortDirection;
use crate::catalog::{DatabaseState, Table};
use crate::eval::{eval, passes};

/// Result cursor handed out by [`crate::EmulatorConnection`].
///
/// A deferred cursor holds only the query text and the snapshot it was
/// submitted against; analysis runs on the first `next` or on `close`, and
/// its failure is reported through `err`.
pub struct EmulatorCursor {
    state: CursorState,
    columns: Vec<String>,
    current: Option<Row>,
    err: Option<DriverError>,
}

enum CursorState {
    Pending {
        sql: String,
        snapshot: Arc<DatabaseState>,
    },
    Ready(Plan),
    Streaming(RowStream),
    Exhausted,
    Closed,
}

impl EmulatorCursor {
    pub(crate) fn deferred(sql: impl Into<String>, snapshot: Arc<DatabaseState>) -> Self {
        Self {
            state: CursorState::Pending {
                sql: sql.into(),
                snapshot,
            },
            columns: Vec::new(),
            current: None,
            err: None,
        }
    }

    pub(crate) fn validated(plan: Plan) -> Self {
        Self {
            columns: plan.columns.clone(),
            state: CursorState::Ready(plan),
            current: None,
            err: None,
        }
    }

    fn fail(&mut self, err: DriverError) {
        debug!(error = %err, "query stream failed");
        self.current = None;
        self.err = Some(err);
        self.state = CursorState::Exhausted;
    }

    /// Move towards `Streaming`, recording any failure on the way.
    fn advance_state(&mut self) {
        loop {
            match std::mem::replace(&mut self.state, CursorState::Exhausted) {
                CursorState::Pending { sql, snapshot } => match prepare(&snapshot, &sql) {
                    Ok(plan) => {
                        self.columns = plan.columns.clone();
                        self.state = CursorState::Ready(plan);
                    }
                    Err(err) => return self.fail(err),
                },
                CursorState::Ready(plan) => match RowStream::start(plan) {
                    Ok(stream) => {
                        self.state = CursorState::Streaming(stream);
                        return;
                    }
                    Err(err) => return self.fail(err),
                },
                other => {
                    self.state = other;
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl RowCursor for EmulatorCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self) -> bool {
        self.advance_state();
        let CursorState::Streaming(stream) = &mut self.state else {
            self.current = None;
            return false;
        };
        match stream.next_row() {
            Some(Ok(row)) => {
                self.current = Some(row);
                true
            }
            Some(Err(err)) => {
                self.fail(err);
                false
            }
            None => {
                self.current = None;
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let CursorState::Pending { sql, snapshot } = &self.state {
            if let Err(err) = prepare(snapshot, sql) {
                self.fail(err);
            }
        }
        self.current = None;
        self.state = CursorState::Closed;
        Ok(())
    }

    fn err(&self) -> Option<&DriverError> {
        self.err.as_ref()
    }
}

/// Lazily produces projected rows for a plan.
///
/// Without ORDER BY the table is walked in key order and filtered row by
/// row, so a failing predicate surfaces only when its row is reached. With
/// ORDER BY every row is filtered and sorted up front.
pub(crate) struct RowStream {
    plan: Plan,
    rows: Rows,
    skipped: u64,
    emitted: u64,
}

enum Rows {
    Scan {
        table: Arc<Table>,
        last_key: Option<Vec<Value>>,
    },
    Sorted(std::vec::IntoIter<Vec<Value>>),
    Single {
        done: bool,
    },
}

impl RowStream {
    pub(crate) fn start(plan: Plan) -> DriverResult<Self> {
        let rows = match (&plan.source, plan.order_by.is_empty()) {
            (Source::Table(table), true) => Rows::Scan {
                table: Arc::clone(table),
                last_key: None,
            },
            (Source::Table(table), false) => Rows::Sorted(sort_rows(&plan, table)?.into_iter()),
            (Source::Single, _) => Rows::Single { done: false },
        };
        Ok(Self {
            plan,
            rows,
            skipped: 0,
            emitted: 0,
        })
    }

    pub(crate) fn next_row(&mut self) -> Option<DriverResult<Row>> {
        loop {
            if self.plan.limit.is_some_and(|limit| self.emitted >= limit) {
                return None;
            }
            let (values, filtered) = self.next_source()?;
            if !filtered {
                match passes(self.plan.filter.as_ref(), &values) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => return Some(Err(err)),
                }
            }
            if self.skipped < self.plan.offset {
                self.skipped += 1;
                continue;
            }
            self.emitted += 1;
            return Some(self.project(&values));
        }
    }

    /// Next candidate row and whether the filter already ran on it.
    fn next_source(&mut self) -> Option<(Vec<Value>, bool)> {
        match &mut self.rows {
            Rows::Scan { table, last_key } => {
                let (key, row) = table.next_after(last_key.as_deref())?;
                let key = key.to_vec();
                let values = row.values.clone();
                *last_key = Some(key);
                Some((values, false))
            }
            Rows::Sorted(rows) => rows.next().map(|values| (values, true)),
            Rows::Single { done } => {
                if *done {
                    return None;
                }
                *done = true;
                Some((Vec::new(), false))
            }
        }
    }

    fn project(&self, values: &[Value]) -> DriverResult<Row> {
        self.plan
            .projection
            .iter()
            .map(|expr| eval(expr, values))
            .collect::<DriverResult<Vec<_>>>()
            .map(Row::new)
    }
}

fn sort_rows(plan: &Plan, table: &Table) -> DriverResult<Vec<Vec<Value>>> {
    let mut keyed = Vec::new();
    for row in table.rows() {
        if !passes(plan.filter.as_ref(), &row.values)? {
            continue;
        }
        let key = plan
            .order_by
            .iter()
            .map(|(expr, _)| eval(expr, &row.values))
            .collect::<DriverResult<Vec<_>>>()?;
        keyed.push((key, row.values.clone()));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        a.iter()
            .zip(b)
            .zip(&plan.order_by)
            .map(|((a, b), (_, direction))| match direction {
                SortDirection::Asc => a.cmp(b),
                SortDirection::Desc => b.cmp(a),
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(keyed.into_iter().map(|(_, values)| values).collect())
}
