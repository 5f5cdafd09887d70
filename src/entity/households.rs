use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "households")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Printed on the household's sticker, e.g. "HH4821337"
    #[sea_orm(unique)]
    pub qr_code: String,
    pub address: String,
    pub ward_number: String,
    pub ward_name: String,
    pub resident_name: Option<String>,
    pub phone_number: Option<String>,

    // Derived from the household's collections, rebuilt by reconciliation
    pub total_points: i32,
    pub compliance_rate: i32,
    /// Bumped on every aggregate write
    pub aggregate_version: i32,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
