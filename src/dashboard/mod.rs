use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::aggregation::{self, OverallStats, SegregationBreakdown, WardPerformance};
use crate::data::configuration::DashboardConfig;
use crate::data::store::{EntityStore, SortSpec};
use crate::entity::households;
use crate::error::RecorderError;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: OverallStats,
    pub ward_performance: Vec<WardPerformance>,
    pub top_performers: Vec<households::Model>,
    pub breakdown: SegregationBreakdown,
}

impl Dashboard {
    pub fn leading_ward(&self) -> Option<&WardPerformance> {
        self.ward_performance.first()
    }

    pub fn lagging_ward(&self) -> Option<&WardPerformance> {
        self.ward_performance.last()
    }
}

pub async fn load_dashboard<S: EntityStore, Tz: TimeZone>(
    store: &S,
    config: &DashboardConfig,
    today: NaiveDate,
    tz: &Tz,
) -> Result<Dashboard, RecorderError> {
    let collections = store
        .list_collections(Some(&SortSpec::descending("collection_time")))
        .await?;
    let households = store.list_households(None).await?;

    Ok(Dashboard {
        stats: aggregation::overall_stats(&collections, &households, today, tz),
        ward_performance: aggregation::ward_performance(&collections),
        top_performers: aggregation::top_performers(&households, config.top_performers),
        breakdown: aggregation::segregation_breakdown(&collections),
    })
}
