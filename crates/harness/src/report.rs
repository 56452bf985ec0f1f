use common::pretty::{render_string_table, TableStyleKind};
use serde::{Deserialize, Serialize};

use crate::evaluate::Verdict;

/// Verdicts of a run plus the state the fixture was left in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub verdicts: Vec<Verdict>,
    /// Set when dropping the fixture failed; the database is left dirty.
    pub teardown_error: Option<String>,
    pub dirty: bool,
}

impl RunReport {
    pub fn new(verdicts: Vec<Verdict>, teardown_error: Option<String>) -> Self {
        Self {
            dirty: teardown_error.is_some(),
            verdicts,
            teardown_error,
        }
    }

    /// True when every case passed and the fixture was cleaned up.
    pub fn passed(&self) -> bool {
        !self.dirty && self.verdicts.iter().all(Verdict::passed)
    }

    pub fn failures(&self) -> Vec<&Verdict> {
        self.verdicts.iter().filter(|v| !v.passed()).collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn summary(&self) -> String {
        let failed = self.failures().len();
        let mut line = format!(
            "{} cases: {} passed, {} failed",
            self.verdicts.len(),
            self.verdicts.len() - failed,
            failed
        );
        if let Some(err) = &self.teardown_error {
            line.push_str(&format!("; teardown failed: {err}"));
        }
        line
    }

    /// Table of `case | result | detail` followed by the summary line.
    pub fn render(&self, style: TableStyleKind) -> String {
        let rows = self
            .verdicts
            .iter()
            .flat_map(|verdict| {
                if verdict.passed() {
                    return vec![vec![
                        verdict.case.clone(),
                        "ok".to_string(),
                        String::new(),
                    ]];
                }
                verdict
                    .mismatches
                    .iter()
                    .enumerate()
                    .map(|(idx, mismatch)| {
                        let (case, result) = if idx == 0 {
                            (verdict.case.clone(), "FAIL".to_string())
                        } else {
                            (String::new(), String::new())
                        };
                        vec![case, result, mismatch.to_string()]
                    })
                    .collect()
            })
            .collect();
        let table = render_string_table(&["case", "result", "detail"], rows, style);
        format!("{table}\n{}", self.summary())
    }
}
