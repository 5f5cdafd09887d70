//! The record store contract the recorder and registry are written against.
//!
//! Three record kinds live behind it: households, collections and wards.
//! Collections are append-only, so the contract has no update for them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregation::Aggregate;
use crate::entity::collections::{self, CollectionStatus};
use crate::entity::{households, wards};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("store is not connected")]
    NotConnected,

    #[error("{kind} {id} disappeared during update")]
    MissingRecord { kind: &'static str, id: i32 },
}

/// A field name, optionally prefixed with `-` for descending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: &str) -> Self {
        SortSpec {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn descending(field: &str) -> Self {
        SortSpec {
            field: field.to_string(),
            descending: true,
        }
    }
}

impl FromStr for SortSpec {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (field, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if field.is_empty() {
            return Err(StoreError::UnknownSortField(s.to_string()));
        }
        Ok(SortSpec {
            field: field.to_string(),
            descending,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewHousehold {
    pub qr_code: String,
    pub address: String,
    pub ward_number: String,
    pub ward_name: String,
    #[serde(default)]
    pub resident_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Exact-match predicate; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct HouseholdFilter {
    pub qr_code: Option<String>,
    pub ward_number: Option<String>,
}

impl HouseholdFilter {
    pub fn qr_code(qr_code: &str) -> Self {
        HouseholdFilter {
            qr_code: Some(qr_code.to_string()),
            ..Default::default()
        }
    }

    pub fn ward_number(ward_number: &str) -> Self {
        HouseholdFilter {
            ward_number: Some(ward_number.to_string()),
            ..Default::default()
        }
    }
}

/// Profile fields only. Aggregates go through `compare_and_swap_aggregate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HouseholdPatch {
    pub address: Option<String>,
    pub ward_number: Option<String>,
    pub ward_name: Option<String>,
    pub resident_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCollection {
    pub household_qr: String,
    pub collector_name: String,
    pub status: CollectionStatus,
    pub collection_time: DateTime<Utc>,
    pub ward_number: String,
    pub notes: Option<String>,
    pub points_awarded: i32,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    pub household_qr: Option<String>,
    pub ward_number: Option<String>,
    pub collector_name: Option<String>,
    pub status: Option<String>,
}

impl CollectionFilter {
    pub fn household(qr_code: &str) -> Self {
        CollectionFilter {
            household_qr: Some(qr_code.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWard {
    pub ward_number: String,
    pub ward_name: String,
    #[serde(default)]
    pub supervisor_name: Option<String>,
    #[serde(default)]
    pub supervisor_contact: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WardFilter {
    pub ward_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WardPatch {
    pub ward_name: Option<String>,
    pub total_households: Option<i32>,
    pub supervisor_name: Option<String>,
    pub supervisor_contact: Option<String>,
}

/// Without a sort spec, records come back in insertion order.
#[allow(async_fn_in_trait)]
pub trait EntityStore {
    async fn create_household(&self, new: NewHousehold) -> Result<households::Model, StoreError>;
    async fn get_household(&self, id: i32) -> Result<Option<households::Model>, StoreError>;
    async fn filter_households(
        &self,
        filter: &HouseholdFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError>;
    async fn list_households(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError>;
    async fn update_household(
        &self,
        id: i32,
        patch: HouseholdPatch,
    ) -> Result<households::Model, StoreError>;

    /// Writes `aggregate` only if the stored version still equals
    /// `expected_version`, bumping it by one. `None` means someone else won.
    async fn compare_and_swap_aggregate(
        &self,
        id: i32,
        expected_version: i32,
        aggregate: &Aggregate,
    ) -> Result<Option<households::Model>, StoreError>;

    async fn create_collection(
        &self,
        new: NewCollection,
    ) -> Result<collections::Model, StoreError>;
    async fn get_collection(&self, id: i32) -> Result<Option<collections::Model>, StoreError>;
    async fn filter_collections(
        &self,
        filter: &CollectionFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError>;
    async fn list_collections(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError>;

    async fn create_ward(&self, new: NewWard) -> Result<wards::Model, StoreError>;
    async fn get_ward(&self, id: i32) -> Result<Option<wards::Model>, StoreError>;
    async fn filter_wards(
        &self,
        filter: &WardFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<wards::Model>, StoreError>;
    async fn list_wards(&self, sort: Option<&SortSpec>) -> Result<Vec<wards::Model>, StoreError>;
    async fn update_ward(&self, id: i32, patch: WardPatch) -> Result<wards::Model, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_spec_prefix_means_descending() {
        let spec: SortSpec = "-collection_time".parse().unwrap();
        assert_eq!(spec, SortSpec::descending("collection_time"));
        assert_eq!(spec.to_string(), "-collection_time");

        let spec: SortSpec = "qr_code".parse().unwrap();
        assert_eq!(spec, SortSpec::ascending("qr_code"));
    }

    #[test]
    fn empty_sort_spec_is_rejected() {
        assert!(matches!(
            "-".parse::<SortSpec>(),
            Err(StoreError::UnknownSortField(_))
        ));
        assert!("".parse::<SortSpec>().is_err());
    }
}
