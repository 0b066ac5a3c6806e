use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Conference,
    ExamDuty,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn parse(value: &str) -> Option<Self> {
        LeaveStatus::from_str(value.trim()).ok()
    }

    /// A leave can be decided once: only `pending -> approved | rejected`.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        self == LeaveStatus::Pending && next != LeaveStatus::Pending
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 1000,
    "leave_type": "sick",
    "from_date": "2026-01-01",
    "to_date": "2026-01-03",
    "reason": "Flu",
    "status": "pending",
    "rejected_reason": null,
    "approved_by": null,
    "created_at": "2026-01-01T00:00:00Z"
}))]
pub struct Leave {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub rejected_reason: Option<String>,
    pub approved_by: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Inclusive calendar days covered by a leave. Zero when the range is inverted.
pub fn leave_days(from: NaiveDate, to: NaiveDate) -> i32 {
    if from > to {
        return 0;
    }
    (to - from).num_days() as i32 + 1
}

/// Days of `[from, to]` that fall inside `year`.
pub fn leave_days_in_year(from: NaiveDate, to: NaiveDate, year: i32) -> i32 {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };
    leave_days(from.max(start), to.min(end))
}

/// Every date in `[from, to]`, used to mark attendance as on-leave.
pub fn dates_in_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|d| *d <= to).collect()
}

/// Approved days within the current calendar year.
pub fn approved_days_this_year(leaves: &[(NaiveDate, NaiveDate)], today: NaiveDate) -> i32 {
    leaves
        .iter()
        .map(|(from, to)| leave_days_in_year(*from, *to, today.year()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn leave_days_are_inclusive() {
        assert_eq!(leave_days(d(2026, 1, 1), d(2026, 1, 1)), 1);
        assert_eq!(leave_days(d(2026, 1, 1), d(2026, 1, 3)), 3);
        assert_eq!(leave_days(d(2026, 1, 30), d(2026, 2, 2)), 4);
        assert_eq!(leave_days(d(2026, 1, 5), d(2026, 1, 3)), 0);
    }

    #[test]
    fn days_in_year_clip_the_range() {
        assert_eq!(leave_days_in_year(d(2025, 12, 30), d(2026, 1, 2), 2026), 2);
        assert_eq!(leave_days_in_year(d(2025, 12, 30), d(2026, 1, 2), 2025), 2);
        assert_eq!(leave_days_in_year(d(2024, 3, 1), d(2024, 3, 5), 2026), 0);
    }

    #[test]
    fn only_pending_leaves_can_be_decided() {
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Approved));
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Pending.can_transition_to(LeaveStatus::Pending));
        assert!(!LeaveStatus::Approved.can_transition_to(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Rejected.can_transition_to(LeaveStatus::Approved));
    }

    #[test]
    fn range_dates_cover_both_ends() {
        let dates = dates_in_range(d(2026, 2, 27), d(2026, 3, 2));
        assert_eq!(
            dates,
            vec![d(2026, 2, 27), d(2026, 2, 28), d(2026, 3, 1), d(2026, 3, 2)]
        );
    }

    #[test]
    fn leave_types_use_kebab_case() {
        assert_eq!(LeaveType::ExamDuty.as_ref(), "exam-duty");
        let parsed: LeaveType = serde_json::from_str("\"exam-duty\"").unwrap();
        assert_eq!(parsed, LeaveType::ExamDuty);
    }

    #[test]
    fn approved_days_count_only_current_year() {
        let leaves = vec![
            (d(2025, 12, 31), d(2026, 1, 2)),
            (d(2026, 3, 10), d(2026, 3, 11)),
        ];
        assert_eq!(approved_days_this_year(&leaves, d(2026, 6, 1)), 4);
    }
}
