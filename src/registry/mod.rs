use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::aggregation::{self, DailyPoint, PeriodStats};
use crate::data::configuration::DashboardConfig;
use crate::data::store::{CollectionFilter, EntityStore, HouseholdFilter, NewHousehold, SortSpec};
use crate::entity::{collections, households};
use crate::error::RecorderError;

/// `HH` followed by seven digits: the tail of the clock and three random ones.
pub fn generate_qr_code() -> String {
    let stamp = Utc::now().timestamp_millis().rem_euclid(10_000);
    let random = rand::thread_rng().gen_range(0..1000);
    format!("HH{stamp:04}{random:03}")
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "household", rename_all = "lowercase")]
pub enum Registration {
    Created(households::Model),
    /// The QR code was already registered; nothing was written
    Existing(households::Model),
}

impl Registration {
    pub fn household(&self) -> &households::Model {
        match self {
            Registration::Created(h) | Registration::Existing(h) => h,
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), RecorderError> {
    if value.trim().is_empty() {
        return Err(RecorderError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn register_household<S: EntityStore>(
    store: &S,
    new: NewHousehold,
) -> Result<Registration, RecorderError> {
    require("qr_code", &new.qr_code)?;
    require("address", &new.address)?;
    require("ward_number", &new.ward_number)?;
    require("ward_name", &new.ward_name)?;

    let qr_code = new.qr_code.trim().to_string();
    if let Some(existing) = store
        .filter_households(&HouseholdFilter::qr_code(&qr_code), None)
        .await?
        .into_iter()
        .next()
    {
        return Ok(Registration::Existing(existing));
    }

    let created = store
        .create_household(NewHousehold {
            qr_code: qr_code.clone(),
            address: new.address.trim().to_string(),
            ward_number: new.ward_number.trim().to_string(),
            ward_name: new.ward_name.trim().to_string(),
            resident_name: optional(new.resident_name),
            phone_number: optional(new.phone_number),
        })
        .await;
    let household = match created {
        Ok(household) => household,
        Err(e) => {
            // A concurrent registration may have taken the QR code since the lookup
            return match store
                .filter_households(&HouseholdFilter::qr_code(&qr_code), None)
                .await?
                .into_iter()
                .next()
            {
                Some(existing) => {
                    debug!("Household {qr_code} registered concurrently: {e}");
                    Ok(Registration::Existing(existing))
                }
                None => Err(e.into()),
            };
        }
    };
    info!(
        "Registered household {} in ward {}",
        household.qr_code, household.ward_number
    );
    Ok(Registration::Created(household))
}

pub async fn find_by_qr<S: EntityStore>(
    store: &S,
    qr_code: &str,
) -> Result<households::Model, RecorderError> {
    store
        .filter_households(&HouseholdFilter::qr_code(qr_code.trim()), None)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RecorderError::NotFound(format!("household {}", qr_code.trim())))
}

/// Newest first. Matches address, QR code, ward name or resident name, ignoring case.
pub async fn search<S: EntityStore>(
    store: &S,
    term: &str,
) -> Result<Vec<households::Model>, RecorderError> {
    let all = store
        .list_households(Some(&SortSpec::descending("created_at")))
        .await?;
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Ok(all);
    }
    let hit = |field: &str| field.to_lowercase().contains(&term);
    Ok(all
        .into_iter()
        .filter(|h| {
            hit(&h.address)
                || hit(&h.qr_code)
                || hit(&h.ward_name)
                || h.resident_name.as_deref().is_some_and(hit)
        })
        .collect())
}

/// What a resident sees for their own household.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentSummary {
    pub household: households::Model,
    pub recent_collections: Vec<collections::Model>,
    pub monthly: PeriodStats,
    pub daily: Vec<DailyPoint>,
}

pub async fn resident_summary<S: EntityStore, Tz: TimeZone>(
    store: &S,
    qr_code: &str,
    config: &DashboardConfig,
    today: NaiveDate,
    tz: &Tz,
) -> Result<ResidentSummary, RecorderError> {
    let household = find_by_qr(store, qr_code).await?;
    let history = store
        .filter_collections(
            &CollectionFilter::household(&household.qr_code),
            Some(&SortSpec::descending("collection_time")),
        )
        .await?;

    let monthly = aggregation::monthly_stats(&history, today, tz);
    let daily = aggregation::daily_series(&history, config.daily_window_days, today, tz);
    let recent_collections = history
        .into_iter()
        .take(usize::try_from(config.recent_collections).unwrap_or(usize::MAX))
        .collect();

    Ok(ResidentSummary {
        household,
        recent_collections,
        monthly,
        daily,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_follow_convention() {
        for _ in 0..50 {
            let code = generate_qr_code();
            assert_eq!(code.len(), 9);
            assert!(code.starts_with("HH"));
            assert!(code[2..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn registration_exposes_household() {
        let household = households::Model {
            id: 4,
            qr_code: "HH1234567".to_string(),
            address: "12 Lake Rd".to_string(),
            ward_number: "002".to_string(),
            ward_name: "Lakeside".to_string(),
            resident_name: None,
            phone_number: None,
            total_points: 0,
            compliance_rate: 0,
            aggregate_version: 0,
            created_at: Utc::now(),
        };
        let registration = Registration::Existing(household.clone());
        assert_eq!(registration.household(), &household);
    }
}
