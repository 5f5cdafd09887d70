use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Points for a segregated pickup.
pub const SEGREGATED_POINTS: i32 = 5;
/// Points for a mixed pickup.
pub const MIXED_POINTS: i32 = -2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Matches households.qr_code, not enforced
    #[sea_orm(indexed)]
    pub household_qr: String,
    pub collector_name: String,

    /// "segregated" or "mixed"; kept as text so rows from other writers still load
    pub status: String,
    pub collection_time: DateTimeUtc,
    pub ward_number: String,
    pub notes: Option<String>,
    pub points_awarded: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_segregated(&self) -> bool {
        self.status == CollectionStatus::Segregated.as_str()
    }

    pub fn is_mixed(&self) -> bool {
        self.status == CollectionStatus::Mixed.as_str()
    }

    /// None when the stored status is neither segregated nor mixed.
    pub fn parsed_status(&self) -> Option<CollectionStatus> {
        self.status.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Segregated,
    Mixed,
}

impl CollectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Segregated => "segregated",
            CollectionStatus::Mixed => "mixed",
        }
    }

    pub fn points(self) -> i32 {
        match self {
            CollectionStatus::Segregated => SEGREGATED_POINTS,
            CollectionStatus::Mixed => MIXED_POINTS,
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collection status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for CollectionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "segregated" => Ok(CollectionStatus::Segregated),
            "mixed" => Ok(CollectionStatus::Mixed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
