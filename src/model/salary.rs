use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::AttendanceStatus;

pub const SALARY_COLUMNS: &str = "id, employee_id, month, year, base_pay, hra, insurance, \
     incentives, days_present, days_half, days_on_leave, days_absent, per_day_rate, \
     absence_deduction, net_salary, calculated_at";

/// A generated payroll record (one per employee per month).
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Salary {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = 1)]
    pub month: u8,
    #[schema(example = 2026)]
    pub year: u16,
    pub base_pay: f64,
    pub hra: f64,
    pub insurance: f64,
    pub incentives: f64,
    pub days_present: u32,
    pub days_half: u32,
    pub days_on_leave: u32,
    pub days_absent: u32,
    pub per_day_rate: f64,
    pub absence_deduction: f64,
    pub net_salary: f64,
    #[schema(value_type = String, format = "date-time")]
    pub calculated_at: DateTime<Utc>,
}

/// Attendance counts for one employee over one month.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceTally {
    pub present: u32,
    pub half_day: u32,
    pub on_leave: u32,
    pub absent: u32,
}

impl AttendanceTally {
    /// Builds a tally from `(status, count)` rows; unknown statuses are ignored.
    pub fn from_counts<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut tally = AttendanceTally::default();
        for (status, count) in rows {
            let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
            match AttendanceStatus::parse(status.as_ref()) {
                Some(AttendanceStatus::Present) => tally.present += count,
                Some(AttendanceStatus::HalfDay) => tally.half_day += count,
                Some(AttendanceStatus::OnLeave) => tally.on_leave += count,
                Some(AttendanceStatus::Absent) => tally.absent += count,
                None => {}
            }
        }
        tally
    }
}

/// Pay components taken from the salary structure plus per-run incentives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayComponents {
    pub base_pay: f64,
    pub hra: f64,
    pub insurance: f64,
    pub incentives: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayBreakdown {
    pub per_day_rate: f64,
    pub absence_deduction: f64,
    pub net_salary: f64,
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monthly net pay.
///
/// The base pay is prorated per calendar day. Absent days cost a full day and
/// half-days cost half a day. Present and on-leave days are paid, and days
/// without an attendance record are not deducted. Allowances and incentives
/// are added, insurance is subtracted, and the result never goes below zero.
pub fn compute_pay(pay: PayComponents, tally: AttendanceTally, days_in_month: u32) -> PayBreakdown {
    let per_day_rate = if days_in_month == 0 {
        0.0
    } else {
        pay.base_pay / f64::from(days_in_month)
    };

    let unpaid_days = f64::from(tally.absent) + 0.5 * f64::from(tally.half_day);
    let absence_deduction = (per_day_rate * unpaid_days).min(pay.base_pay);

    let net = pay.base_pay - absence_deduction + pay.hra + pay.incentives - pay.insurance;

    PayBreakdown {
        per_day_rate: round2(per_day_rate),
        absence_deduction: round2(absence_deduction),
        net_salary: round2(net.max(0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pay(base: f64, hra: f64, insurance: f64, incentives: f64) -> PayComponents {
        PayComponents {
            base_pay: base,
            hra,
            insurance,
            incentives,
        }
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2026, 1), Some(31));
        assert_eq!(days_in_month(2026, 2), Some(28));
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2026, 4), Some(30));
        assert_eq!(days_in_month(2026, 12), Some(31));
        assert_eq!(days_in_month(2026, 13), None);
        assert_eq!(days_in_month(2026, 0), None);
    }

    #[test]
    fn full_attendance_pays_structure_total() {
        let tally = AttendanceTally {
            present: 22,
            ..Default::default()
        };
        let out = compute_pay(pay(30_000.0, 5_000.0, 1_000.0, 0.0), tally, 30);

        assert_eq!(out.per_day_rate, 1_000.0);
        assert_eq!(out.absence_deduction, 0.0);
        assert_eq!(out.net_salary, 34_000.0);
    }

    #[test]
    fn absences_and_half_days_are_deducted() {
        let tally = AttendanceTally {
            present: 18,
            half_day: 2,
            on_leave: 3,
            absent: 2,
        };
        let out = compute_pay(pay(30_000.0, 0.0, 0.0, 500.0), tally, 30);

        // 2 absent + 2 * 0.5 half-day = 3 unpaid days at 1000/day
        assert_eq!(out.absence_deduction, 3_000.0);
        assert_eq!(out.net_salary, 27_500.0);
    }

    #[test]
    fn on_leave_days_are_paid() {
        let tally = AttendanceTally {
            on_leave: 10,
            ..Default::default()
        };
        let out = compute_pay(pay(31_000.0, 0.0, 0.0, 0.0), tally, 31);
        assert_eq!(out.net_salary, 31_000.0);
    }

    #[test]
    fn net_never_goes_negative() {
        let tally = AttendanceTally {
            absent: 40,
            ..Default::default()
        };
        let out = compute_pay(pay(10_000.0, 0.0, 2_000.0, 0.0), tally, 30);

        assert_eq!(out.absence_deduction, 10_000.0);
        assert_eq!(out.net_salary, 0.0);
    }

    #[test]
    fn money_is_rounded_to_cents() {
        let tally = AttendanceTally {
            absent: 1,
            ..Default::default()
        };
        let out = compute_pay(pay(10_000.0, 0.0, 0.0, 0.0), tally, 31);

        assert_eq!(out.per_day_rate, 322.58);
        assert_eq!(out.absence_deduction, 322.58);
        assert_eq!(out.net_salary, 9_677.42);
    }

    #[test]
    fn tally_from_grouped_rows() {
        let rows = vec![
            ("present".to_string(), 15_i64),
            ("half-day".to_string(), 2),
            ("on-leave".to_string(), 3),
            ("absent".to_string(), 1),
            ("unknown".to_string(), 9),
        ];
        let tally = AttendanceTally::from_counts(rows);

        assert_eq!(
            tally,
            AttendanceTally {
                present: 15,
                half_day: 2,
                on_leave: 3,
                absent: 1
            }
        );
    }
}
