//! The terminal, JSON-serializable report of an [`crate::apply_diff`] call
//! (§6, §4.4 "Report assembly").

use serde::Serialize;

/// Overall outcome, derived strictly from the per-hunk outcome sets (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Success,
    Partial,
    Error,
}

/// Why a hunk ended up in `failed`, never surfaced as an `Err` (§7).
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Stage C's locator found no candidate at or above the confidence
    /// floor.
    LowConfidence { confidence: f64 },
    /// Every stage exhausted its attempts without locating the hunk.
    NotFound,
}

impl FailureReason {
    fn type_str(&self) -> &'static str {
        match self {
            FailureReason::LowConfidence { .. } => "low_confidence",
            FailureReason::NotFound => "not_found",
        }
    }

    fn confidence(&self) -> Option<f64> {
        match self {
            FailureReason::LowConfidence { confidence } => Some(*confidence),
            FailureReason::NotFound => None,
        }
    }
}

/// The `error` payload, present only when a pipeline-fatal error occurred
/// or at least one hunk failed.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub hunk: Option<usize>,
    pub confidence: Option<f64>,
}

impl ErrorPayload {
    pub fn fatal(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            hunk: None,
            confidence: None,
        }
    }

    pub fn from_failure(hunk: usize, reason: &FailureReason) -> Self {
        Self {
            kind: reason.type_str().to_string(),
            hunk: Some(hunk),
            confidence: reason.confidence(),
        }
    }
}

/// `details` field of the JSON report (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ResultDetails {
    pub succeeded: Vec<usize>,
    pub failed: Vec<usize>,
    pub already_applied: Vec<usize>,
    pub changes_written: bool,
    pub error: Option<ErrorPayload>,
}

/// The terminal value of an [`crate::apply_diff`] call.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationResult {
    pub status: ApplicationStatus,
    pub details: ResultDetails,
}

impl ApplicationResult {
    /// A fatal, whole-pipeline error: nothing was written, no hunk
    /// outcomes were recorded.
    pub fn fatal(kind: &str) -> Self {
        Self {
            status: ApplicationStatus::Error,
            details: ResultDetails {
                succeeded: Vec::new(),
                failed: Vec::new(),
                already_applied: Vec::new(),
                changes_written: false,
                error: Some(ErrorPayload::fatal(kind)),
            },
        }
    }

    /// Derive the final status from the accumulated per-hunk outcome sets
    /// and whether the file was actually rewritten, per §4.4's rules.
    pub fn finish(
        mut succeeded: Vec<usize>,
        mut failed: Vec<usize>,
        mut already_applied: Vec<usize>,
        failure_reasons: &[(usize, FailureReason)],
        changes_written: bool,
    ) -> Self {
        succeeded.sort_unstable();
        failed.sort_unstable();
        already_applied.sort_unstable();

        let status = if failed.is_empty() {
            ApplicationStatus::Success
        } else if !succeeded.is_empty() && changes_written {
            ApplicationStatus::Partial
        } else {
            ApplicationStatus::Error
        };

        let error = if status == ApplicationStatus::Error {
            failure_reasons
                .first()
                .map(|(hunk, reason)| ErrorPayload::from_failure(*hunk, reason))
        } else {
            None
        };

        Self {
            status,
            details: ResultDetails {
                succeeded,
                failed,
                already_applied,
                changes_written,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_the_documented_shape() {
        let result = ApplicationResult::finish(vec![1], vec![], vec![], &[], true);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["details"]["succeeded"], serde_json::json!([1]));
        assert_eq!(json["details"]["changes_written"], true);
        assert_eq!(json["details"]["error"], serde_json::Value::Null);
    }

    #[test]
    fn success_requires_empty_failed() {
        let result = ApplicationResult::finish(vec![1, 2], vec![], vec![3], &[], true);
        assert_eq!(result.status, ApplicationStatus::Success);
    }

    #[test]
    fn partial_requires_succeeded_failed_and_changes_written() {
        let reasons = vec![(2, FailureReason::NotFound)];
        let result = ApplicationResult::finish(vec![1], vec![2], vec![], &reasons, true);
        assert_eq!(result.status, ApplicationStatus::Partial);
    }

    #[test]
    fn error_when_nothing_written_and_a_hunk_failed() {
        let reasons = vec![(1, FailureReason::LowConfidence { confidence: 0.4 })];
        let result = ApplicationResult::finish(vec![], vec![1], vec![], &reasons, false);
        assert_eq!(result.status, ApplicationStatus::Error);
        assert_eq!(result.details.error.unwrap().kind, "low_confidence");
    }
}
