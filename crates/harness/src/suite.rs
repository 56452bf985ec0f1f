//! The `TestQueryContext` suite: a three-column table and eight queries
//! covering empty input, syntax errors, filters, ordering and a missing
//! table.

use crate::case::{Stage, TestCase};
use crate::fixture::{ColumnSpec, FixtureSpec};
use crate::record::Record;

pub const QUERY_CONTEXT_TABLE: &str = "TestQueryContext";

/// Stage at which the backend reports a query it cannot analyze.
///
/// Streaming drivers accept every query and report the problem once the
/// cursor is closed; eagerly validating ones reject it at submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorSurface {
    #[default]
    Close,
    Submit,
}

impl ErrorSurface {
    fn stage(self) -> Stage {
        match self {
            ErrorSurface::Close => Stage::Close,
            ErrorSurface::Submit => Stage::Submit,
        }
    }
}

pub fn query_context_fixture() -> FixtureSpec {
    FixtureSpec::new(QUERY_CONTEXT_TABLE)
        .column(ColumnSpec::string("A", 1024))
        .column(ColumnSpec::string("B", 1024))
        .column(ColumnSpec::string("C", 1024))
        .primary_key(["A"])
        .row(["a1".into(), "b1".into(), "c1".into()])
        .row(["a2".into(), "b2".into(), "c2".into()])
        .row(["a3".into(), "b3".into(), "c3".into()])
}

pub fn query_context_cases(surface: ErrorSurface) -> Vec<TestCase<Record>> {
    let invalid = surface.stage();
    let a1 = Record::new("a1", "b1", "c1");
    let a2 = Record::new("a2", "b2", "c2");
    let a3 = Record::new("a3", "b3", "c3");

    vec![
        TestCase::new("empty query", "").expect_error(invalid),
        TestCase::new("syntax error", "SELECT SELECT * FROM TestQueryContext")
            .expect_error(invalid),
        TestCase::new(
            "return nothing",
            r#"SELECT * FROM TestQueryContext WHERE A = "hihihi""#,
        ),
        TestCase::new(
            "select one tuple",
            r#"SELECT * FROM TestQueryContext WHERE A = "a1""#,
        )
        .want_rows([a1.clone()]),
        TestCase::new(
            "select subset of tuples",
            r#"SELECT * FROM TestQueryContext WHERE A = "a1" OR A = "a2""#,
        )
        .want_rows([a1.clone(), a2.clone()]),
        TestCase::new(
            "select subset of tuples with !=",
            r#"SELECT * FROM TestQueryContext WHERE A != "a3""#,
        )
        .want_rows([a1.clone(), a2.clone()]),
        TestCase::new(
            "select entire table",
            "SELECT * FROM TestQueryContext ORDER BY A",
        )
        .want_rows([a1, a2, a3]),
        TestCase::new("query non existent table", "SELECT * FROM NonExistent")
            .expect_error(invalid),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_cases_follow_the_surface() {
        let close = query_context_cases(ErrorSurface::Close);
        let submit = query_context_cases(ErrorSurface::Submit);
        assert_eq!(close.len(), 8);

        let failing: Vec<_> = close
            .iter()
            .filter(|c| c.expectations().expects(Stage::Close))
            .map(|c| c.name())
            .collect();
        assert_eq!(
            failing,
            vec!["empty query", "syntax error", "query non existent table"]
        );
        assert!(submit
            .iter()
            .all(|c| !c.expectations().expects(Stage::Close)));
    }

    #[test]
    fn fixture_seeds_three_rows() {
        let fixture = query_context_fixture();
        assert_eq!(fixture.rows().len(), 3);
        assert!(fixture
            .create_ddl()
            .ends_with(") PRIMARY KEY (A)"));
    }
}
