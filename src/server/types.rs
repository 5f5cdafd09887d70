use serde::{Deserialize, Serialize};

use crate::aggregation::{Aggregate, StoredAggregate};
use crate::entity::{collections, households, wards};

#[derive(Debug, Default, Deserialize)]
pub struct ListHouseholdsQuery {
    pub sort: Option<String>,
    /// Free-text search; when present `sort` is ignored
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SortQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    pub qr_code: String,
}

#[derive(Debug, Serialize)]
pub struct RecordCollectionResponse {
    pub collection: collections::Model,
    pub household: households::Model,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub household: households::Model,
    pub previous: StoredAggregate,
    pub current: Aggregate,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct WardCensusResponse {
    pub ward: wards::Model,
    pub previous_total: i32,
    pub changed: bool,
}
