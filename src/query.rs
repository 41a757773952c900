// 📊 Aggregate Query Layer - read-only views over the canonical tables
//
// The store is an explicit cache: nothing is loaded until `load()` is
// called, `refresh()` swaps in a fresh snapshot, `invalidate()` drops it.
// Readers hold an `Arc` to an immutable snapshot, so a refresh never
// changes data under a query that is already running.

use crate::canonical::read_canonical;
use crate::error::PipelineError;
use crate::merger::CanonicalRecord;
use crate::report::{with_commas, CleaningReport};
use crate::schema::DatasetKind;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// Biometric/demographic ratio above which an operational warning is raised
pub const BIOMETRIC_RATIO_THRESHOLD: f64 = 1.5;

/// Share of age 0-5 enrolments (percent) that counts as an early-registration drive
pub const YOUNG_SHARE_THRESHOLD: f64 = 60.0;

/// Weekend daily average must exceed weekday average by this factor
pub const WEEKEND_SURGE_FACTOR: f64 = 1.1;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Error, Debug)]
pub enum QueryError {
    /// Canonical tables absent, unreadable, or invalidated
    #[error("Data not loaded: {0}")]
    DataNotLoaded(String),
}

// ============================================================================
// CANONICAL STORE (explicit cache)
// ============================================================================

pub struct CanonicalStore {
    data_dir: PathBuf,
    report_path: Option<PathBuf>,
    snapshot: RwLock<Option<Arc<CanonicalTables>>>,
    last_error: RwLock<Option<String>>,
}

impl CanonicalStore {
    /// Empty store; call `load()` before querying
    pub fn new(data_dir: impl Into<PathBuf>, report_path: Option<PathBuf>) -> Self {
        CanonicalStore {
            data_dir: data_dir.into(),
            report_path,
            snapshot: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Read all three tables from disk and make them the current snapshot
    ///
    /// On failure the previous snapshot is dropped too: serving tables that
    /// no longer match what is on disk is worse than reporting "not loaded".
    pub fn load(&self) -> Result<Arc<CanonicalTables>, QueryError> {
        match CanonicalTables::load(&self.data_dir, self.report_path.as_deref()) {
            Ok(tables) => {
                let tables = Arc::new(tables);
                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(tables.clone());
                *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = None;
                info!(dir = %self.data_dir.display(), "canonical tables loaded");
                Ok(tables)
            }
            Err(e) => {
                warn!(dir = %self.data_dir.display(), error = %e, "canonical tables not loaded");
                self.invalidate();
                *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = Some(e.to_string());
                Err(QueryError::DataNotLoaded(e.to_string()))
            }
        }
    }

    pub fn refresh(&self) -> Result<Arc<CanonicalTables>, QueryError> {
        self.load()
    }

    pub fn invalidate(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current snapshot, or `DataNotLoaded`
    pub fn snapshot(&self) -> Result<Arc<CanonicalTables>, QueryError> {
        if let Some(tables) = self.snapshot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(tables.clone());
        }

        let reason = self
            .last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "canonical tables have not been loaded".to_string());
        Err(QueryError::DataNotLoaded(reason))
    }
}

// ============================================================================
// CANONICAL TABLES (immutable snapshot)
// ============================================================================

#[derive(Debug, Clone)]
pub struct CanonicalTables {
    tables: BTreeMap<DatasetKind, Vec<CanonicalRecord>>,
    report: Option<CleaningReport>,
    pub loaded_at: DateTime<Utc>,
}

impl CanonicalTables {
    pub fn load(dir: &Path, report_path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut tables = BTreeMap::new();
        for kind in DatasetKind::ALL {
            tables.insert(kind, read_canonical(&dir.join(kind.output_file()), kind)?);
        }

        // The report only feeds the quality score; a missing one is fine
        let report = report_path.and_then(|path| {
            let json = fs::read_to_string(path).ok()?;
            match CleaningReport::from_json(&json) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable cleaning report");
                    None
                }
            }
        });

        Ok(CanonicalTables {
            tables,
            report,
            loaded_at: Utc::now(),
        })
    }

    pub fn from_tables(
        enrolment: Vec<CanonicalRecord>,
        demographic: Vec<CanonicalRecord>,
        biometric: Vec<CanonicalRecord>,
    ) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(DatasetKind::Enrolment, enrolment);
        tables.insert(DatasetKind::Demographic, demographic);
        tables.insert(DatasetKind::Biometric, biometric);

        CanonicalTables {
            tables,
            report: None,
            loaded_at: Utc::now(),
        }
    }

    pub fn with_report(mut self, report: CleaningReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn table(&self, kind: DatasetKind) -> &[CanonicalRecord] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self, kind: DatasetKind) -> u64 {
        self.table(kind).iter().map(|r| r.total).sum()
    }

    // ========================================================================
    // METRICS
    // ========================================================================

    pub fn metrics(&self) -> Metrics {
        let enrolments = self.total(DatasetKind::Enrolment);
        let demographic = self.total(DatasetKind::Demographic);
        let biometric = self.total(DatasetKind::Biometric);

        Metrics {
            total_enrollments: enrolments,
            total_enrollments_formatted: format_millions(enrolments),
            total_demographic_updates: demographic,
            total_demographic_updates_formatted: format_millions(demographic),
            total_biometric_updates: biometric,
            total_biometric_updates_formatted: format_millions(biometric),
            data_quality_score: self.report.as_ref().and_then(overall_quality),
            records_count: DatasetKind::ALL
                .iter()
                .map(|&k| (k, self.table(k).len() as u64))
                .collect(),
        }
    }

    // ========================================================================
    // TRENDS
    // ========================================================================

    /// Daily totals per kind over the `days` before the latest enrolment date
    pub fn trends(&self, days: u32) -> Trends {
        let latest = self
            .table(DatasetKind::Enrolment)
            .last()
            .map(|r| r.date)
            .or_else(|| {
                DatasetKind::ALL
                    .iter()
                    .filter_map(|&k| self.table(k).last().map(|r| r.date))
                    .max()
            });

        let mut trends = Trends {
            dates: Vec::new(),
            enrollment: Vec::new(),
            demographic: Vec::new(),
            biometric: Vec::new(),
            period: format!("Last {} days", days),
        };

        let Some(latest) = latest else {
            return trends;
        };
        let start = latest - Duration::days(i64::from(days));

        let daily: BTreeMap<DatasetKind, BTreeMap<NaiveDate, u64>> = DatasetKind::ALL
            .iter()
            .map(|&kind| {
                let mut by_day = BTreeMap::new();
                for row in self.table(kind).iter().filter(|r| r.date >= start && r.date <= latest) {
                    *by_day.entry(row.date).or_insert(0) += row.total;
                }
                (kind, by_day)
            })
            .collect();

        let dates: Vec<NaiveDate> = daily
            .values()
            .flat_map(|by_day| by_day.keys().copied())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let series = |kind: DatasetKind| -> Vec<u64> {
            let by_day = &daily[&kind];
            dates.iter().map(|d| by_day.get(d).copied().unwrap_or(0)).collect()
        };

        trends.enrollment = series(DatasetKind::Enrolment);
        trends.demographic = series(DatasetKind::Demographic);
        trends.biometric = series(DatasetKind::Biometric);
        trends.dates = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
        trends
    }

    // ========================================================================
    // STATES
    // ========================================================================

    fn state_stats(&self) -> Vec<StateStat> {
        let mut by_state: HashMap<&str, (u64, HashSet<&str>, HashSet<&str>)> = HashMap::new();
        for row in self.table(DatasetKind::Enrolment) {
            let entry = by_state.entry(row.state.as_str()).or_default();
            entry.0 += row.total;
            entry.1.insert(row.district.as_str());
            entry.2.insert(row.pincode.as_str());
        }

        let mut stats: Vec<StateStat> = by_state
            .into_iter()
            .map(|(state, (total, districts, pincodes))| StateStat {
                state: state.to_string(),
                enrollments: total,
                enrollments_formatted: format_thousands(total),
                districts: districts.len() as u64,
                pincodes: pincodes.len() as u64,
                code: None,
            })
            .collect();

        // Descending by total, name breaks ties so output is stable
        stats.sort_by(|a, b| b.enrollments.cmp(&a.enrollments).then_with(|| a.state.cmp(&b.state)));
        stats
    }

    pub fn top_states(&self, top_n: usize) -> TopStates {
        let stats = self.state_stats();
        let total_states = stats.len() as u64;

        TopStates {
            top_states: stats.into_iter().take(top_n).collect(),
            total_states,
        }
    }

    /// Every state, with a short code for map rendering
    pub fn all_states(&self) -> AllStates {
        let states: Vec<StateStat> = self
            .state_stats()
            .into_iter()
            .map(|mut s| {
                s.code = Some(s.state.chars().take(2).collect::<String>().to_uppercase());
                s
            })
            .collect();

        AllStates {
            total_states: states.len() as u64,
            total_enrollments: states.iter().map(|s| s.enrollments).sum(),
            states,
        }
    }

    // ========================================================================
    // DEMOGRAPHICS
    // ========================================================================

    /// Enrolment split across the three age brackets
    pub fn demographics(&self) -> Demographics {
        let sums = self.bracket_sums(DatasetKind::Enrolment);
        let total: u64 = sums.iter().sum();

        let age_distribution = ["Age 0-5", "Age 5-17", "Age 18+"]
            .iter()
            .zip(&sums)
            .map(|(group, &count)| AgeGroup {
                group: group.to_string(),
                count,
                percentage: round1(percent(count, total)),
            })
            .collect();

        Demographics {
            age_distribution,
            total,
        }
    }

    fn bracket_sums(&self, kind: DatasetKind) -> Vec<u64> {
        let mut sums = vec![0u64; kind.count_columns().len()];
        for row in self.table(kind) {
            for (sum, count) in sums.iter_mut().zip(&row.counts) {
                *sum += count;
            }
        }
        sums
    }

    // ========================================================================
    // ANOMALIES & INSIGHTS
    // ========================================================================

    pub fn anomalies(&self, now: DateTime<Utc>) -> Anomalies {
        let enrolment = self.table(DatasetKind::Enrolment);
        let mut anomalies = Vec::new();

        let mut by_weekday: BTreeMap<&str, u64> = BTreeMap::new();
        let mut by_month: BTreeMap<u32, u64> = BTreeMap::new();
        for row in enrolment {
            *by_weekday.entry(row.day_of_week.as_str()).or_insert(0) += row.total;
            *by_month.entry(row.month).or_insert(0) += row.total;
        }

        if let (Some((max_day, max)), Some((min_day, min))) = (arg_max(&by_weekday), arg_min(&by_weekday)) {
            anomalies.push(Anomaly {
                kind: "temporal".to_string(),
                severity: "info".to_string(),
                message: format!("{} shows highest enrollment activity", max_day),
                detail: format!(
                    "{} enrollments vs {} on {}",
                    with_commas(max),
                    with_commas(min),
                    min_day
                ),
            });
        }

        if let Some((month, total)) = arg_max(&by_month) {
            let name = month
                .checked_sub(1)
                .and_then(|i| MONTH_NAMES.get(i as usize))
                .map(|m| m.to_string())
                .unwrap_or_else(|| month.to_string());
            anomalies.push(Anomaly {
                kind: "seasonal".to_string(),
                severity: "info".to_string(),
                message: format!("{} shows peak enrollment", name),
                detail: format!("{} total enrollments", with_commas(total)),
            });
        }

        let bio = self.total(DatasetKind::Biometric);
        let demo = self.total(DatasetKind::Demographic);
        if demo > 0 {
            let ratio = bio as f64 / demo as f64;
            if ratio > BIOMETRIC_RATIO_THRESHOLD {
                anomalies.push(Anomaly {
                    kind: "operational".to_string(),
                    severity: "warning".to_string(),
                    message: "Biometric updates significantly higher than demographic".to_string(),
                    detail: format!(
                        "Ratio: {:.2}x - May indicate frequent biometric re-authentication",
                        ratio
                    ),
                });
            }
        }

        Anomalies {
            count: anomalies.len(),
            anomalies,
            last_checked: now,
        }
    }

    pub fn insights(&self, now: DateTime<Utc>) -> Insights {
        let enrolment = self.table(DatasetKind::Enrolment);
        let mut insights = Vec::new();

        let total = self.total(DatasetKind::Enrolment);
        let young = self.bracket_sums(DatasetKind::Enrolment).first().copied().unwrap_or(0);
        let young_share = percent(young, total);
        if young_share > YOUNG_SHARE_THRESHOLD {
            insights.push(Insight {
                title: "Young population enrollment drive".to_string(),
                detail: format!(
                    "{:.1}% of enrollments are children aged 0-5, indicating focus on early registration",
                    young_share
                ),
                action: "Continue emphasis on birth registration linkage programs".to_string(),
            });
        }

        // Averages are over days, not rows
        let mut daily: BTreeMap<NaiveDate, (bool, u64)> = BTreeMap::new();
        for row in enrolment {
            let weekend = row.day_of_week == "Saturday" || row.day_of_week == "Sunday";
            daily.entry(row.date).or_insert((weekend, 0)).1 += row.total;
        }
        let average = |weekend: bool| -> Option<f64> {
            let days: Vec<u64> = daily.values().filter(|(w, _)| *w == weekend).map(|(_, t)| *t).collect();
            if days.is_empty() {
                None
            } else {
                Some(days.iter().sum::<u64>() as f64 / days.len() as f64)
            }
        };
        if let (Some(weekend_avg), Some(weekday_avg)) = (average(true), average(false)) {
            if weekday_avg > 0.0 && weekend_avg > weekday_avg * WEEKEND_SURGE_FACTOR {
                insights.push(Insight {
                    title: "Weekend enrollment surge".to_string(),
                    detail: format!(
                        "Weekend enrollments are {:.1}% higher than weekdays",
                        (weekend_avg / weekday_avg - 1.0) * 100.0
                    ),
                    action: "Ensure adequate staffing on Saturdays and Sundays".to_string(),
                });
            }
        }

        if let Some(top) = self.state_stats().into_iter().next() {
            insights.push(Insight {
                title: format!("{} leads in enrollments", top.state),
                detail: format!(
                    "{} total enrollments - highest among all states",
                    with_commas(top.enrollments)
                ),
                action: format!("Study {}'s best practices for replication", top.state),
            });
        }

        Insights {
            insights,
            generated_at: now,
        }
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub total_enrollments: u64,
    pub total_enrollments_formatted: String,
    pub total_demographic_updates: u64,
    pub total_demographic_updates_formatted: String,
    pub total_biometric_updates: u64,
    pub total_biometric_updates_formatted: String,
    /// Percent of processed rows that survived cleaning, from the last report
    pub data_quality_score: Option<f64>,
    pub records_count: BTreeMap<DatasetKind, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trends {
    pub dates: Vec<String>,
    pub enrollment: Vec<u64>,
    pub demographic: Vec<u64>,
    pub biometric: Vec<u64>,
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateStat {
    pub state: String,
    pub enrollments: u64,
    pub enrollments_formatted: String,
    pub districts: u64,
    pub pincodes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopStates {
    pub top_states: Vec<StateStat>,
    pub total_states: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllStates {
    pub states: Vec<StateStat>,
    pub total_states: u64,
    pub total_enrollments: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgeGroup {
    pub group: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Demographics {
    pub age_distribution: Vec<AgeGroup>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomalies {
    pub anomalies: Vec<Anomaly>,
    pub count: usize,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub title: String,
    pub detail: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub insights: Vec<Insight>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// HELPERS
// ============================================================================

fn overall_quality(report: &CleaningReport) -> Option<f64> {
    let rows_in: u64 = report.datasets.values().map(|d| d.tally.rows_in).sum();
    let cleaned: u64 = report.datasets.values().map(|d| d.rows_cleaned).sum();
    if rows_in == 0 {
        return None;
    }
    Some((cleaned as f64 / rows_in as f64 * 10_000.0).round() / 100.0)
}

/// First key with the largest value (keys iterate in order)
fn arg_max<K: Copy>(values: &BTreeMap<K, u64>) -> Option<(K, u64)> {
    values.iter().fold(None, |best, (&k, &v)| match best {
        Some((_, b)) if b >= v => best,
        _ => Some((k, v)),
    })
}

fn arg_min<K: Copy>(values: &BTreeMap<K, u64>) -> Option<(K, u64)> {
    values.iter().fold(None, |best, (&k, &v)| match best {
        Some((_, b)) if b <= v => best,
        _ => Some((k, v)),
    })
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn format_millions(n: u64) -> String {
    format!("{:.2}M", n as f64 / 1_000_000.0)
}

pub fn format_thousands(n: u64) -> String {
    format!("{:.1}K", n as f64 / 1_000.0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::write_canonical;
    use crate::normalizer::NormalizedRecord;
    use chrono::TimeZone;

    fn row(date: (i32, u32, u32), state: &str, district: &str, pincode: &str, counts: &[u64]) -> CanonicalRecord {
        CanonicalRecord::derive(NormalizedRecord {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            state: state.to_string(),
            district: district.to_string(),
            pincode: pincode.to_string(),
            counts: counts.to_vec(),
        })
    }

    /// 2025-03-01 is a Saturday, 2025-03-03 a Monday
    fn sample() -> CanonicalTables {
        CanonicalTables::from_tables(
            vec![
                row((2025, 3, 1), "Delhi", "South", "110001", &[70, 20, 10]),
                row((2025, 3, 1), "Delhi", "North", "110002", &[30, 0, 0]),
                row((2025, 3, 3), "Kerala", "Ernakulam", "682001", &[20, 10, 10]),
                row((2025, 4, 7), "Goa", "North Goa", "403001", &[5, 0, 0]),
            ],
            vec![
                row((2025, 3, 1), "Delhi", "South", "110001", &[10, 10]),
                row((2025, 4, 6), "Goa", "North Goa", "403001", &[5, 5]),
            ],
            vec![row((2025, 3, 3), "Delhi", "South", "110001", &[40, 20])],
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_metrics_totals() {
        let metrics = sample().metrics();

        assert_eq!(metrics.total_enrollments, 175);
        assert_eq!(metrics.total_demographic_updates, 30);
        assert_eq!(metrics.total_biometric_updates, 60);
        assert_eq!(metrics.total_enrollments_formatted, "0.00M");
        assert_eq!(metrics.records_count[&DatasetKind::Enrolment], 4);
        assert_eq!(metrics.data_quality_score, None);
    }

    #[test]
    fn test_trends_window_and_alignment() {
        let trends = sample().trends(7);

        // Window is 2025-03-31 ..= 2025-04-07
        assert_eq!(trends.dates, vec!["2025-04-06", "2025-04-07"]);
        assert_eq!(trends.enrollment, vec![0, 5]);
        assert_eq!(trends.demographic, vec![10, 0]);
        assert_eq!(trends.biometric, vec![0, 0]);
        assert_eq!(trends.period, "Last 7 days");
    }

    #[test]
    fn test_trends_on_empty_tables() {
        let trends = CanonicalTables::from_tables(vec![], vec![], vec![]).trends(30);
        assert!(trends.dates.is_empty());
    }

    #[test]
    fn test_top_states() {
        let top = sample().top_states(2);

        assert_eq!(top.total_states, 3);
        assert_eq!(top.top_states.len(), 2);
        assert_eq!(top.top_states[0].state, "Delhi");
        assert_eq!(top.top_states[0].enrollments, 130);
        assert_eq!(top.top_states[0].enrollments_formatted, "0.1K");
        assert_eq!(top.top_states[0].districts, 2);
        assert_eq!(top.top_states[0].pincodes, 2);
        assert_eq!(top.top_states[1].state, "Kerala");
    }

    #[test]
    fn test_all_states_codes() {
        let all = sample().all_states();

        assert_eq!(all.total_states, 3);
        assert_eq!(all.total_enrollments, 175);
        assert_eq!(all.states[2].code.as_deref(), Some("GO"));
    }

    #[test]
    fn test_demographics_percentages() {
        let demo = sample().demographics();

        assert_eq!(demo.total, 175);
        assert_eq!(demo.age_distribution[0].count, 125);
        assert_eq!(demo.age_distribution[0].percentage, 71.4);
        assert_eq!(demo.age_distribution[2].group, "Age 18+");
    }

    #[test]
    fn test_demographics_empty_has_zero_percent() {
        let demo = CanonicalTables::from_tables(vec![], vec![], vec![]).demographics();

        assert_eq!(demo.total, 0);
        assert!(demo.age_distribution.iter().all(|g| g.percentage == 0.0));
    }

    #[test]
    fn test_anomalies() {
        let anomalies = sample().anomalies(now());

        assert_eq!(anomalies.count, 3);
        assert_eq!(anomalies.anomalies[0].message, "Saturday shows highest enrollment activity");
        assert_eq!(anomalies.anomalies[0].detail, "130 enrollments vs 45 on Monday");
        assert_eq!(anomalies.anomalies[1].message, "Mar shows peak enrollment");
        assert_eq!(anomalies.anomalies[2].severity, "warning");
        assert!(anomalies.anomalies[2].detail.starts_with("Ratio: 2.00x"));
    }

    #[test]
    fn test_no_ratio_flag_without_demographic_data() {
        let tables = CanonicalTables::from_tables(vec![], vec![], vec![row((2025, 3, 3), "Delhi", "South", "110001", &[1, 1])]);
        let anomalies = tables.anomalies(now());

        assert_eq!(anomalies.count, 0);
    }

    #[test]
    fn test_insights() {
        let insights = sample().insights(now()).insights;
        let titles: Vec<&str> = insights.iter().map(|i| i.title.as_str()).collect();

        // 125 of 175 = 71.4% aged 0-5; Saturday 130/day vs weekday 22.5/day
        assert_eq!(
            titles,
            vec![
                "Young population enrollment drive",
                "Weekend enrollment surge",
                "Delhi leads in enrollments",
            ]
        );
        assert_eq!(insights[2].action, "Study Delhi's best practices for replication");
    }

    #[test]
    fn test_store_reports_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = CanonicalStore::new(dir.path(), None);

        assert!(matches!(store.snapshot(), Err(QueryError::DataNotLoaded(_))));
        assert!(matches!(store.load(), Err(QueryError::DataNotLoaded(_))));
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_store_load_refresh_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample();
        for kind in DatasetKind::ALL {
            write_canonical(&dir.path().join(kind.output_file()), kind, data.table(kind)).unwrap();
        }

        let store = CanonicalStore::new(dir.path(), Some(dir.path().join("missing_report.json")));
        let first = store.load().unwrap();
        assert_eq!(first.table(DatasetKind::Enrolment).len(), 4);
        assert!(store.is_loaded());

        write_canonical(
            &dir.path().join(DatasetKind::Enrolment.output_file()),
            DatasetKind::Enrolment,
            &[],
        )
        .unwrap();

        // Old snapshot is untouched until refresh
        assert_eq!(store.snapshot().unwrap().table(DatasetKind::Enrolment).len(), 4);
        store.refresh().unwrap();
        assert_eq!(store.snapshot().unwrap().table(DatasetKind::Enrolment).len(), 0);
        assert_eq!(first.table(DatasetKind::Enrolment).len(), 4);

        store.invalidate();
        assert!(store.snapshot().is_err());
    }
}
