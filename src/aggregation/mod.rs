//! Derived statistics over collection and household records.
//!
//! Everything here is pure: the same records in give the same numbers out,
//! so the recorder, reconciliation and the dashboard all share one
//! definition of "compliance".

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, TimeZone};
use serde::Serialize;

use crate::entity::{collections, households};

/// The derived fields stored on a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Aggregate {
    pub total_points: i32,
    pub compliance_rate: i32,
    pub collection_count: usize,
}

impl Aggregate {
    /// Compares only the fields persisted on the household.
    pub fn matches(&self, household: &households::Model) -> bool {
        self.total_points == household.total_points
            && self.compliance_rate == household.compliance_rate
    }
}

/// The aggregate a household row currently claims to have. Rows do not
/// store a collection count, so there is none here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoredAggregate {
    pub total_points: i32,
    pub compliance_rate: i32,
}

impl StoredAggregate {
    pub fn of(household: &households::Model) -> Self {
        StoredAggregate {
            total_points: household.total_points,
            compliance_rate: household.compliance_rate,
        }
    }

    pub fn differs_from(&self, aggregate: &Aggregate) -> bool {
        self.total_points != aggregate.total_points
            || self.compliance_rate != aggregate.compliance_rate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WardPerformance {
    pub ward_number: String,
    pub name: String,
    pub total: usize,
    pub segregated: usize,
    pub compliance_rate: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub total_points: i32,
    pub segregated_count: usize,
    pub collection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_collections: usize,
    pub segregated_count: usize,
    pub compliance_rate: i32,
    pub today_collections: usize,
    pub total_households: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegregationBreakdown {
    pub segregated: usize,
    pub mixed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodStats {
    pub segregated: usize,
    pub total: usize,
    pub compliance_rate: i32,
}

/// `round(100 * segregated / total)` with halves rounded up, 0 when `total` is 0.
pub fn rate(segregated: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let segregated = segregated.min(total) as u64;
    let total = total as u64;
    ((200 * segregated + total) / (2 * total)) as i32
}

/// Percentage of `collections` marked segregated.
///
/// Records whose status is neither segregated nor mixed count towards the
/// total but never towards the segregated share.
pub fn compliance_rate(collections: &[collections::Model]) -> i32 {
    let segregated = collections.iter().filter(|c| c.is_segregated()).count();
    rate(segregated, collections.len())
}

pub fn household_aggregate(collections: &[collections::Model]) -> Aggregate {
    Aggregate {
        total_points: collections.iter().map(|c| c.points_awarded).sum(),
        compliance_rate: compliance_rate(collections),
        collection_count: collections.len(),
    }
}

/// Per-ward totals, best compliance first. Ties keep the order in which
/// each ward was first seen.
pub fn ward_performance(collections: &[collections::Model]) -> Vec<WardPerformance> {
    let mut wards: Vec<WardPerformance> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for collection in collections {
        let slot = *index
            .entry(collection.ward_number.as_str())
            .or_insert_with(|| {
                wards.push(WardPerformance {
                    ward_number: collection.ward_number.clone(),
                    name: format!("Ward {}", collection.ward_number),
                    total: 0,
                    segregated: 0,
                    compliance_rate: 0,
                });
                wards.len() - 1
            });
        let ward = &mut wards[slot];
        ward.total += 1;
        if collection.is_segregated() {
            ward.segregated += 1;
        }
    }

    for ward in &mut wards {
        ward.compliance_rate = rate(ward.segregated, ward.total);
    }
    wards.sort_by(|a, b| b.compliance_rate.cmp(&a.compliance_rate));
    wards
}

/// Households with positive points, best compliance first, at most `limit`.
pub fn top_performers(households: &[households::Model], limit: usize) -> Vec<households::Model> {
    let mut ranked: Vec<households::Model> = households
        .iter()
        .filter(|h| h.total_points > 0)
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.compliance_rate.cmp(&a.compliance_rate));
    ranked.truncate(limit);
    ranked
}

/// One entry per calendar day for the `days` days ending on `reference_date`,
/// oldest first. Days are taken in `tz`.
pub fn daily_series<Tz: TimeZone>(
    collections: &[collections::Model],
    days: u32,
    reference_date: NaiveDate,
    tz: &Tz,
) -> Vec<DailyPoint> {
    let mut series: Vec<DailyPoint> = (0..days)
        .rev()
        .map(|back| DailyPoint {
            date: reference_date - Duration::days(i64::from(back)),
            total_points: 0,
            segregated_count: 0,
            collection_count: 0,
        })
        .collect();
    let Some(first) = series.first().map(|p| p.date) else {
        return series;
    };

    for collection in collections {
        let day = collection.collection_time.with_timezone(tz).date_naive();
        if day < first || day > reference_date {
            continue;
        }
        let point = &mut series[(day - first).num_days() as usize];
        point.collection_count += 1;
        point.total_points += collection.points_awarded;
        if collection.is_segregated() {
            point.segregated_count += 1;
        }
    }
    series
}

pub fn overall_stats<Tz: TimeZone>(
    collections: &[collections::Model],
    households: &[households::Model],
    today: NaiveDate,
    tz: &Tz,
) -> OverallStats {
    let segregated_count = collections.iter().filter(|c| c.is_segregated()).count();
    let today_collections = collections
        .iter()
        .filter(|c| c.collection_time.with_timezone(tz).date_naive() == today)
        .count();
    OverallStats {
        total_collections: collections.len(),
        segregated_count,
        compliance_rate: rate(segregated_count, collections.len()),
        today_collections,
        total_households: households.len(),
    }
}

/// Counts literal segregated and mixed records; anything else is in neither.
pub fn segregation_breakdown(collections: &[collections::Model]) -> SegregationBreakdown {
    SegregationBreakdown {
        segregated: collections.iter().filter(|c| c.is_segregated()).count(),
        mixed: collections.iter().filter(|c| c.is_mixed()).count(),
    }
}

/// Stats for the calendar month containing `reference_date`.
pub fn monthly_stats<Tz: TimeZone>(
    collections: &[collections::Model],
    reference_date: NaiveDate,
    tz: &Tz,
) -> PeriodStats {
    let in_month: Vec<&collections::Model> = collections
        .iter()
        .filter(|c| {
            let day = c.collection_time.with_timezone(tz).date_naive();
            day.year() == reference_date.year() && day.month() == reference_date.month()
        })
        .collect();
    let segregated = in_month.iter().filter(|c| c.is_segregated()).count();
    PeriodStats {
        segregated,
        total: in_month.len(),
        compliance_rate: rate(segregated, in_month.len()),
    }
}
