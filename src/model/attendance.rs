use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    OnLeave,
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        AttendanceStatus::from_str(value.trim()).ok()
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 7,
    "date": "2026-01-05",
    "check_in": "09:02:11",
    "check_out": "17:45:00",
    "status": "present",
    "notes": null
}))]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: String,
    pub notes: Option<String>,
}

/// Minutes between clock-in and clock-out; never negative.
pub fn worked_minutes(check_in: NaiveTime, check_out: NaiveTime) -> i64 {
    (check_out - check_in).num_minutes().max(0)
}

/// Status of a day once the employee clocks out.
pub fn status_for_worked_minutes(
    minutes: i64,
    full_day_minutes: i64,
    half_day_minutes: i64,
) -> AttendanceStatus {
    if minutes >= full_day_minutes {
        AttendanceStatus::Present
    } else if minutes >= half_day_minutes {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn worked_minutes_clamps_at_zero() {
        assert_eq!(worked_minutes(t(9, 0), t(17, 30)), 510);
        assert_eq!(worked_minutes(t(9, 0), t(8, 0)), 0);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(status_for_worked_minutes(480, 480, 240), AttendanceStatus::Present);
        assert_eq!(status_for_worked_minutes(479, 480, 240), AttendanceStatus::HalfDay);
        assert_eq!(status_for_worked_minutes(240, 480, 240), AttendanceStatus::HalfDay);
        assert_eq!(status_for_worked_minutes(239, 480, 240), AttendanceStatus::Absent);
    }

    #[test]
    fn stored_values_are_kebab_case() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half-day");
        assert_eq!(AttendanceStatus::parse("on-leave"), Some(AttendanceStatus::OnLeave));
        assert_eq!(AttendanceStatus::parse("late"), None);
    }
}
