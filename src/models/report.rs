use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
}

/// One statistical return per calendar month, keyed by (year, month).
/// The counter bag mirrors the paper ward sheet; the lifecycle metadata at
/// the bottom drives the draft -> submitted -> approved state machine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MonthlyReport {
    pub year: i64,
    pub month: i64,
    pub report_date: NaiveDate,

    // Bed complement
    pub total_beds: i64,
    pub total_beds_hdu: i64,
    pub total_beds_ward: i64,
    pub total_beds_isolation: i64,

    // Admissions by sex, scheme and unit
    pub admissions_male: i64,
    pub admissions_female: i64,
    pub admissions_ah: i64,
    pub admissions_amca: i64,
    pub admissions_sama: i64,
    pub admissions_ku: i64,
    pub admissions_munt: i64,
    pub admissions_ward02: i64,
    pub admissions_isolation: i64,
    pub admissions_hdu_unit: i64,

    // Discharges and patient flow
    pub bed_occupancy_rate: f64,
    pub avg_length_of_stay: f64,
    pub midnight_total: i64,
    pub discharges: i64,
    pub lama: i64,
    pub re_admissions: i64,
    pub discharge_same_day: i64,
    pub transfer_to_other_hospitals: i64,
    pub transfer_from_other_hospitals: i64,
    pub weekday_transfers_in: i64,
    pub weekday_transfers_out: i64,
    pub weekend_transfers_in: i64,
    pub weekend_transfers_out: i64,
    pub missing: i64,
    pub number_of_death: i64,
    pub death_within_24hrs: i64,
    pub death_within_48hrs: i64,
    pub death_rate: f64,

    // Diagnostics
    pub no_of_hd: i64,
    pub xray_inward: i64,
    pub xray_departmental: i64,
    pub ecg_inward: i64,
    pub ecg_departmental: i64,
    pub abg: i64,
    pub wit_meetings: bool,

    // Referrals
    pub referrals_cardiology: i64,
    pub referrals_chest_physician: i64,
    pub referrals_radiodiagnosis: i64,
    pub referrals_heumatology: i64,
    pub referrals_others: i64,
    pub total_referrals: i64,

    // Lifecycle metadata
    pub status: ReportStatus,
    pub created_by: Option<Uuid>,
    pub last_updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl MonthlyReport {
    pub fn total_admissions(&self) -> i64 {
        self.admissions_male + self.admissions_female
    }

    pub fn total_xrays(&self) -> i64 {
        self.xray_inward + self.xray_departmental
    }

    pub fn total_ecgs(&self) -> i64 {
        self.ecg_inward + self.ecg_departmental
    }

    pub fn total_transfers_in(&self) -> i64 {
        self.transfer_from_other_hospitals + self.weekday_transfers_in + self.weekend_transfers_in
    }

    pub fn total_transfers_out(&self) -> i64 {
        self.transfer_to_other_hospitals + self.weekday_transfers_out + self.weekend_transfers_out
    }

    pub fn net_transfer_balance(&self) -> i64 {
        self.total_transfers_in() - self.total_transfers_out()
    }

    /// Deaths as a percentage of discharges; zero when nothing was discharged.
    pub fn mortality_rate_percentage(&self) -> f64 {
        if self.discharges > 0 {
            round2(self.number_of_death as f64 / self.discharges as f64 * 100.0)
        } else {
            0.0
        }
    }

    /// Census-derived occupancy when a midnight count exists, otherwise the
    /// rate entered on the sheet.
    pub fn occupancy_percentage(&self) -> f64 {
        if self.total_beds > 0 && self.midnight_total > 0 {
            round2(self.midnight_total as f64 / self.total_beds as f64 * 100.0)
        } else {
            self.bed_occupancy_rate
        }
    }
}

/// API shape: the stored row plus the computed columns.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: MonthlyReport,
    pub total_admissions: i64,
    pub total_xrays: i64,
    pub total_ecgs: i64,
    pub total_transfers_in: i64,
    pub total_transfers_out: i64,
    pub net_transfer_balance: i64,
    pub mortality_rate_percentage: f64,
    pub occupancy_percentage: f64,
}

impl From<MonthlyReport> for ReportResponse {
    fn from(report: MonthlyReport) -> Self {
        ReportResponse {
            total_admissions: report.total_admissions(),
            total_xrays: report.total_xrays(),
            total_ecgs: report.total_ecgs(),
            total_transfers_in: report.total_transfers_in(),
            total_transfers_out: report.total_transfers_out(),
            net_transfer_balance: report.net_transfer_balance(),
            mortality_rate_percentage: report.mortality_rate_percentage(),
            occupancy_percentage: report.occupancy_percentage(),
            report,
        }
    }
}

fn default_total_beds() -> i64 {
    30
}

fn default_hdu_beds() -> i64 {
    2
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveReportRequest {
    #[schema(example = 2025)]
    pub year: i64,
    #[schema(example = 1)]
    pub month: i64,

    #[serde(default = "default_total_beds")]
    pub total_beds: i64,
    #[serde(default = "default_hdu_beds")]
    pub total_beds_hdu: i64,
    #[serde(default)]
    pub total_beds_ward: i64,
    #[serde(default)]
    pub total_beds_isolation: i64,
    #[serde(default)]
    pub admissions_male: i64,
    #[serde(default)]
    pub admissions_female: i64,
    #[serde(default)]
    pub admissions_ah: i64,
    #[serde(default)]
    pub admissions_amca: i64,
    #[serde(default)]
    pub admissions_sama: i64,
    #[serde(default)]
    pub admissions_ku: i64,
    #[serde(default)]
    pub admissions_munt: i64,
    #[serde(default)]
    pub admissions_ward02: i64,
    #[serde(default)]
    pub admissions_isolation: i64,
    #[serde(default)]
    pub admissions_hdu_unit: i64,
    #[serde(default)]
    pub bed_occupancy_rate: f64,
    #[serde(default)]
    pub avg_length_of_stay: f64,
    #[serde(default)]
    pub midnight_total: i64,
    #[serde(default)]
    pub discharges: i64,
    #[serde(default)]
    pub lama: i64,
    #[serde(default)]
    pub re_admissions: i64,
    #[serde(default)]
    pub discharge_same_day: i64,
    #[serde(default)]
    pub transfer_to_other_hospitals: i64,
    #[serde(default)]
    pub transfer_from_other_hospitals: i64,
    #[serde(default)]
    pub weekday_transfers_in: i64,
    #[serde(default)]
    pub weekday_transfers_out: i64,
    #[serde(default)]
    pub weekend_transfers_in: i64,
    #[serde(default)]
    pub weekend_transfers_out: i64,
    #[serde(default)]
    pub missing: i64,
    #[serde(default)]
    pub number_of_death: i64,
    #[serde(default)]
    pub death_within_24hrs: i64,
    #[serde(default)]
    pub death_within_48hrs: i64,
    #[serde(default)]
    pub death_rate: f64,
    #[serde(default)]
    pub no_of_hd: i64,
    #[serde(default)]
    pub xray_inward: i64,
    #[serde(default)]
    pub xray_departmental: i64,
    #[serde(default)]
    pub ecg_inward: i64,
    #[serde(default)]
    pub ecg_departmental: i64,
    #[serde(default)]
    pub abg: i64,
    #[serde(default)]
    pub wit_meetings: bool,
    #[serde(default)]
    pub referrals_cardiology: i64,
    #[serde(default)]
    pub referrals_chest_physician: i64,
    #[serde(default)]
    pub referrals_radiodiagnosis: i64,
    #[serde(default)]
    pub referrals_heumatology: i64,
    #[serde(default)]
    pub referrals_others: i64,
    #[serde(default)]
    pub total_referrals: i64,

    /// Only an explicit status changes the stored one; omitted means keep.
    pub status: Option<ReportStatus>,
}

impl SaveReportRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_report_key(self.year, self.month)?;

        if self.total_beds < 1 {
            return Err(AppError::validation("total_beds must be at least 1"));
        }

        for (field, value) in [
            ("bed_occupancy_rate", self.bed_occupancy_rate),
            ("death_rate", self.death_rate),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AppError::validation(format!(
                    "{field} must be between 0 and 100"
                )));
            }
        }

        if self.avg_length_of_stay < 0.0 {
            return Err(AppError::validation("avg_length_of_stay must not be negative"));
        }

        for (field, value) in self.counters() {
            if value < 0 {
                return Err(AppError::validation(format!("{field} must not be negative")));
            }
        }

        Ok(())
    }

    fn counters(&self) -> [(&'static str, i64); 40] {
        [
            ("total_beds_hdu", self.total_beds_hdu),
            ("total_beds_ward", self.total_beds_ward),
            ("total_beds_isolation", self.total_beds_isolation),
            ("admissions_male", self.admissions_male),
            ("admissions_female", self.admissions_female),
            ("admissions_ah", self.admissions_ah),
            ("admissions_amca", self.admissions_amca),
            ("admissions_sama", self.admissions_sama),
            ("admissions_ku", self.admissions_ku),
            ("admissions_munt", self.admissions_munt),
            ("admissions_ward02", self.admissions_ward02),
            ("admissions_isolation", self.admissions_isolation),
            ("admissions_hdu_unit", self.admissions_hdu_unit),
            ("midnight_total", self.midnight_total),
            ("discharges", self.discharges),
            ("lama", self.lama),
            ("re_admissions", self.re_admissions),
            ("discharge_same_day", self.discharge_same_day),
            ("transfer_to_other_hospitals", self.transfer_to_other_hospitals),
            ("transfer_from_other_hospitals", self.transfer_from_other_hospitals),
            ("weekday_transfers_in", self.weekday_transfers_in),
            ("weekday_transfers_out", self.weekday_transfers_out),
            ("weekend_transfers_in", self.weekend_transfers_in),
            ("weekend_transfers_out", self.weekend_transfers_out),
            ("missing", self.missing),
            ("number_of_death", self.number_of_death),
            ("death_within_24hrs", self.death_within_24hrs),
            ("death_within_48hrs", self.death_within_48hrs),
            ("no_of_hd", self.no_of_hd),
            ("xray_inward", self.xray_inward),
            ("xray_departmental", self.xray_departmental),
            ("ecg_inward", self.ecg_inward),
            ("ecg_departmental", self.ecg_departmental),
            ("abg", self.abg),
            ("referrals_cardiology", self.referrals_cardiology),
            ("referrals_chest_physician", self.referrals_chest_physician),
            ("referrals_radiodiagnosis", self.referrals_radiodiagnosis),
            ("referrals_heumatology", self.referrals_heumatology),
            ("referrals_others", self.referrals_others),
            ("total_referrals", self.total_referrals),
        ]
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitReportRequest {
    #[schema(example = 2025)]
    pub year: i64,
    #[schema(example = 1)]
    pub month: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct YearStatistics {
    pub year: i64,
    pub total_reports: i64,
    pub draft_reports: i64,
    pub submitted_reports: i64,
    pub approved_reports: i64,
    pub completion_rate: f64,
    pub avg_total_admissions: f64,
    pub avg_total_discharges: f64,
    pub avg_occupancy_rate: f64,
}

impl YearStatistics {
    pub fn compute(year: i64, reports: &[MonthlyReport]) -> Self {
        if reports.is_empty() {
            return YearStatistics {
                year,
                total_reports: 0,
                draft_reports: 0,
                submitted_reports: 0,
                approved_reports: 0,
                completion_rate: 0.0,
                avg_total_admissions: 0.0,
                avg_total_discharges: 0.0,
                avg_occupancy_rate: 0.0,
            };
        }

        let total = reports.len() as i64;
        let count_status = |status: ReportStatus| -> i64 {
            reports.iter().filter(|r| r.status == status).count() as i64
        };
        let avg = |value: f64| round2(value / total as f64);

        YearStatistics {
            year,
            total_reports: total,
            draft_reports: count_status(ReportStatus::Draft),
            submitted_reports: count_status(ReportStatus::Submitted),
            approved_reports: count_status(ReportStatus::Approved),
            completion_rate: round2(total as f64 / 12.0 * 100.0),
            avg_total_admissions: avg(reports.iter().map(|r| r.total_admissions() as f64).sum()),
            avg_total_discharges: avg(reports.iter().map(|r| r.discharges as f64).sum()),
            avg_occupancy_rate: avg(reports.iter().map(|r| r.occupancy_percentage()).sum()),
        }
    }
}

pub fn validate_report_key(year: i64, month: i64) -> Result<(), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation("month must be between 1 and 12"));
    }
    if !(2020..=2030).contains(&year) {
        return Err(AppError::validation("year must be between 2020 and 2030"));
    }
    Ok(())
}

pub fn first_of_month(year: i64, month: i64) -> Result<NaiveDate, AppError> {
    NaiveDate::from_ymd_opt(year as i32, month as u32, 1)
        .ok_or_else(|| AppError::validation("invalid year/month"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::utc_now;
    use serde_json::json;

    fn blank_report(year: i64, month: i64) -> MonthlyReport {
        let request: SaveReportRequest =
            serde_json::from_value(json!({ "year": year, "month": month })).unwrap();
        MonthlyReport {
            year,
            month,
            report_date: first_of_month(year, month).unwrap(),
            total_beds: request.total_beds,
            total_beds_hdu: request.total_beds_hdu,
            total_beds_ward: 0,
            total_beds_isolation: 0,
            admissions_male: 0,
            admissions_female: 0,
            admissions_ah: 0,
            admissions_amca: 0,
            admissions_sama: 0,
            admissions_ku: 0,
            admissions_munt: 0,
            admissions_ward02: 0,
            admissions_isolation: 0,
            admissions_hdu_unit: 0,
            bed_occupancy_rate: 0.0,
            avg_length_of_stay: 0.0,
            midnight_total: 0,
            discharges: 0,
            lama: 0,
            re_admissions: 0,
            discharge_same_day: 0,
            transfer_to_other_hospitals: 0,
            transfer_from_other_hospitals: 0,
            weekday_transfers_in: 0,
            weekday_transfers_out: 0,
            weekend_transfers_in: 0,
            weekend_transfers_out: 0,
            missing: 0,
            number_of_death: 0,
            death_within_24hrs: 0,
            death_within_48hrs: 0,
            death_rate: 0.0,
            no_of_hd: 0,
            xray_inward: 0,
            xray_departmental: 0,
            ecg_inward: 0,
            ecg_departmental: 0,
            abg: 0,
            wit_meetings: false,
            referrals_cardiology: 0,
            referrals_chest_physician: 0,
            referrals_radiodiagnosis: 0,
            referrals_heumatology: 0,
            referrals_others: 0,
            total_referrals: 0,
            status: ReportStatus::Draft,
            created_by: None,
            last_updated_by: None,
            created_at: utc_now(),
            updated_at: utc_now(),
        }
    }

    #[test]
    fn derived_totals() {
        let mut report = blank_report(2025, 1);
        report.admissions_male = 45;
        report.admissions_female = 38;
        report.transfer_from_other_hospitals = 2;
        report.weekday_transfers_in = 3;
        report.weekend_transfers_in = 1;
        report.transfer_to_other_hospitals = 4;

        assert_eq!(report.total_admissions(), 83);
        assert_eq!(report.total_transfers_in(), 6);
        assert_eq!(report.total_transfers_out(), 4);
        assert_eq!(report.net_transfer_balance(), 2);
    }

    #[test]
    fn mortality_rate_guards_zero_discharges() {
        let mut report = blank_report(2025, 1);
        report.number_of_death = 3;
        assert_eq!(report.mortality_rate_percentage(), 0.0);

        report.discharges = 40;
        assert_eq!(report.mortality_rate_percentage(), 7.5);
    }

    #[test]
    fn occupancy_prefers_midnight_census() {
        let mut report = blank_report(2025, 1);
        report.bed_occupancy_rate = 55.0;
        assert_eq!(report.occupancy_percentage(), 55.0);

        report.total_beds = 30;
        report.midnight_total = 24;
        assert_eq!(report.occupancy_percentage(), 80.0);
    }

    #[test]
    fn save_request_validation() {
        let ok: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2025, "month": 1 })).unwrap();
        assert!(ok.validate().is_ok());

        let bad_month: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2025, "month": 13 })).unwrap();
        assert!(bad_month.validate().is_err());

        let bad_year: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2019, "month": 1 })).unwrap();
        assert!(bad_year.validate().is_err());

        let bad_rate: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2025, "month": 1, "bed_occupancy_rate": 120.0 }))
                .unwrap();
        assert!(bad_rate.validate().is_err());

        let negative: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2025, "month": 1, "discharges": -1 })).unwrap();
        assert!(negative.validate().is_err());

        let no_beds: SaveReportRequest =
            serde_json::from_value(json!({ "year": 2025, "month": 1, "total_beds": 0 })).unwrap();
        assert!(no_beds.validate().is_err());
    }

    #[test]
    fn year_statistics_on_empty_year_are_zero() {
        let stats = YearStatistics::compute(2025, &[]);
        assert_eq!(stats.total_reports, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.avg_total_admissions, 0.0);
        assert_eq!(stats.avg_occupancy_rate, 0.0);
    }

    #[test]
    fn year_statistics_average_derived_values() {
        let mut january = blank_report(2025, 1);
        january.admissions_male = 40;
        january.admissions_female = 40;
        january.discharges = 60;
        january.total_beds = 30;
        january.midnight_total = 15;
        january.status = ReportStatus::Approved;

        let mut february = blank_report(2025, 2);
        february.admissions_male = 10;
        february.admissions_female = 10;
        february.discharges = 20;
        february.bed_occupancy_rate = 70.0;
        february.status = ReportStatus::Draft;

        let stats = YearStatistics::compute(2025, &[january, february]);
        assert_eq!(stats.total_reports, 2);
        assert_eq!(stats.draft_reports, 1);
        assert_eq!(stats.approved_reports, 1);
        assert_eq!(stats.completion_rate, 16.67);
        assert_eq!(stats.avg_total_admissions, 50.0);
        assert_eq!(stats.avg_total_discharges, 40.0);
        // january census-derived 50%, february stored 70%
        assert_eq!(stats.avg_occupancy_rate, 60.0);
    }
}
