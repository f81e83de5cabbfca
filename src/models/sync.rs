use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RejectionKind, SyncError};

/// Messages kept in each of `SyncSummary::errors` and
/// `SyncSummary::rejection_reasons` before the rest are summarised
pub const MAX_REPORTED_ERRORS: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBreakdown {
    pub malformed: usize,
    pub outside_allow_list: usize,
    pub price_order: usize,
}

/// Outcome of one sync run
///
/// Write and prune failures go to `errors`; validation rejections go to
/// `rejection_reasons`. Each list is capped on its own so a feed full of bad
/// rows never hides a storage problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    pub written: usize,
    pub rejected: usize,
    pub write_failed: usize,
    pub rejections: RejectionBreakdown,
    pub pruned: u64,
    pub errors: Vec<String>,
    pub rejection_reasons: Vec<String>,
    #[serde(skip)]
    suppressed_errors: usize,
    #[serde(skip)]
    suppressed_rejections: usize,
}

impl SyncSummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            started_at: Utc::now(),
            fetched: 0,
            written: 0,
            rejected: 0,
            write_failed: 0,
            rejections: RejectionBreakdown::default(),
            pruned: 0,
            errors: Vec::new(),
            rejection_reasons: Vec::new(),
            suppressed_errors: 0,
            suppressed_rejections: 0,
        }
    }

    /// Count a rejected row. Rows outside the allow-list are only counted:
    /// most of the national feed is expected to land there.
    pub fn record_rejection(&mut self, kind: RejectionKind, message: String) {
        self.rejected += 1;
        match kind {
            RejectionKind::Malformed => self.rejections.malformed += 1,
            RejectionKind::OutsideAllowList => {
                self.rejections.outside_allow_list += 1;
                return;
            }
            RejectionKind::PriceOrder => self.rejections.price_order += 1,
        }
        push_capped(
            &mut self.rejection_reasons,
            &mut self.suppressed_rejections,
            message,
        );
    }

    pub fn record_write_failure(&mut self, message: String) {
        self.write_failed += 1;
        self.push_error(message);
    }

    pub fn push_error(&mut self, message: String) {
        push_capped(&mut self.errors, &mut self.suppressed_errors, message);
    }

    /// Append the overflow markers once the run is complete
    pub fn finish(&mut self) {
        append_overflow(&mut self.errors, &mut self.suppressed_errors);
        append_overflow(&mut self.rejection_reasons, &mut self.suppressed_rejections);
    }

    /// True when records needed writing and none of them made it
    pub fn all_writes_failed(&self) -> bool {
        self.write_failed > 0 && self.written == 0
    }

    /// The error a run reports when every write failed
    pub fn persistence_failure(&self) -> SyncError {
        let first = self.errors.first().map(String::as_str).unwrap_or("no detail");
        SyncError::PersistenceFailure(format!(
            "all {} writes failed for {}: {}",
            self.write_failed, self.date, first
        ))
    }
}

fn push_capped(list: &mut Vec<String>, suppressed: &mut usize, message: String) {
    if list.len() < MAX_REPORTED_ERRORS {
        list.push(message);
    } else {
        *suppressed += 1;
    }
}

fn append_overflow(list: &mut Vec<String>, suppressed: &mut usize) {
    if *suppressed > 0 {
        list.push(format!("... and {} more", suppressed));
        *suppressed = 0;
    }
}

/// Query string of the on-demand trigger
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncQuery {
    pub date: Option<String>,
}

/// Body returned by the on-demand trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub date: Option<NaiveDate>,
    pub fetched: usize,
    pub written: usize,
    pub rejected: usize,
    pub write_failed: usize,
    pub errors: Vec<String>,
}

impl SyncResponse {
    /// Storage errors come first, then rejection reasons
    pub fn from_summary(summary: SyncSummary) -> Self {
        let success = !summary.all_writes_failed();
        let mut errors = summary.errors;
        errors.extend(summary.rejection_reasons);

        Self {
            success,
            date: Some(summary.date),
            fetched: summary.fetched,
            written: summary.written,
            rejected: summary.rejected,
            write_failed: summary.write_failed,
            errors,
        }
    }

    pub fn failure(date: Option<NaiveDate>, error: String) -> Self {
        Self {
            success: false,
            date,
            fetched: 0,
            written: 0,
            rejected: 0,
            write_failed: 0,
            errors: vec![error],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_rejections_are_bucketed() {
        let mut summary = SyncSummary::new(date());
        summary.record_rejection(RejectionKind::Malformed, "a".into());
        summary.record_rejection(RejectionKind::OutsideAllowList, "b".into());
        summary.record_rejection(RejectionKind::OutsideAllowList, "c".into());

        assert_eq!(summary.rejected, 3);
        assert_eq!(summary.rejections.malformed, 1);
        assert_eq!(summary.rejections.outside_allow_list, 2);
        assert_eq!(summary.rejections.price_order, 0);
        assert_eq!(summary.write_failed, 0);
        // Allow-list misses are counted but not itemised
        assert_eq!(summary.rejection_reasons, vec!["a".to_string()]);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_write_failure_survives_many_rejections() {
        let mut summary = SyncSummary::new(date());
        for i in 0..MAX_REPORTED_ERRORS + 10 {
            summary.record_rejection(RejectionKind::Malformed, format!("row {}: bad", i));
        }
        summary.record_write_failure("row 60: disk full".into());
        summary.finish();

        assert_eq!(summary.errors, vec!["row 60: disk full".to_string()]);
        assert_eq!(summary.rejection_reasons.len(), MAX_REPORTED_ERRORS + 1);
        assert_eq!(summary.rejection_reasons.last().unwrap(), "... and 10 more");

        let response = SyncResponse::from_summary(summary);
        assert_eq!(response.errors[0], "row 60: disk full");
        assert!(!response.success);
    }

    #[test]
    fn test_error_list_is_capped() {
        let mut summary = SyncSummary::new(date());
        for i in 0..MAX_REPORTED_ERRORS + 7 {
            summary.record_write_failure(format!("write {}", i));
        }
        summary.finish();

        assert_eq!(summary.write_failed, MAX_REPORTED_ERRORS + 7);
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS + 1);
        assert_eq!(summary.errors.last().unwrap(), "... and 7 more");
    }

    #[test]
    fn test_response_success_flag() {
        let mut summary = SyncSummary::new(date());
        summary.written = 3;
        summary.write_failed = 1;
        assert!(SyncResponse::from_summary(summary.clone()).success);

        summary.written = 0;
        assert!(!SyncResponse::from_summary(summary).success);

        // Nothing to write is still a successful run
        assert!(SyncResponse::from_summary(SyncSummary::new(date())).success);
    }
}
