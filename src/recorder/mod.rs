//! The collection write path and the reconciliation that backs it up.
//!
//! A household's `total_points` and `compliance_rate` are a cache over its
//! collections. Writing a collection and refreshing that cache are two
//! separate store calls, so the cache can fall behind; every refresh is a
//! full recompute written with compare-and-swap, and reconciliation runs the
//! same refresh on demand.

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregation::{self, Aggregate, StoredAggregate};
use crate::data::configuration::RecorderConfig;
use crate::data::store::{
    CollectionFilter, EntityStore, HouseholdFilter, NewCollection, WardFilter, WardPatch,
};
use crate::entity::collections::{self, CollectionStatus};
use crate::entity::{households, wards};
use crate::error::RecorderError;
use crate::registry;

/// What a collector submits after scanning a household.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionSubmission {
    pub collector_name: String,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CollectionSubmission {
    pub fn new(collector_name: &str, status: &str) -> Self {
        CollectionSubmission {
            collector_name: collector_name.to_string(),
            status: status.to_string(),
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidSubmission {
    collector_name: String,
    status: CollectionStatus,
    notes: Option<String>,
}

fn validate(submission: CollectionSubmission) -> Result<ValidSubmission, RecorderError> {
    let status = submission
        .status
        .trim()
        .parse::<CollectionStatus>()
        .map_err(|e| RecorderError::Validation(e.to_string()))?;

    let collector_name = submission.collector_name.trim();
    if collector_name.is_empty() {
        return Err(RecorderError::Validation(
            "collector name is required".to_string(),
        ));
    }

    let notes = submission
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(ValidSubmission {
        collector_name: collector_name.to_string(),
        status,
        notes,
    })
}

/// Outcome of recomputing one household's aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub household: households::Model,
    pub previous: StoredAggregate,
    pub current: Aggregate,
}

impl Reconciliation {
    /// Whether the stored aggregate was out of date.
    pub fn changed(&self) -> bool {
        self.previous.differs_from(&self.current)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub repaired: Vec<String>,
    /// Households whose aggregate could not be written in the attempt budget
    pub conflicted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WardCensus {
    pub ward: wards::Model,
    pub previous_total: i32,
}

impl WardCensus {
    pub fn changed(&self) -> bool {
        self.previous_total != self.ward.total_households
    }
}

pub struct CollectionRecorder<'a, S> {
    store: &'a S,
    max_attempts: u32,
}

impl<'a, S: EntityStore> CollectionRecorder<'a, S> {
    pub fn new(store: &'a S, config: &RecorderConfig) -> Self {
        CollectionRecorder {
            store,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Writes one collection for `household` and refreshes its aggregate.
    ///
    /// If the collection is written but the aggregate refresh fails, the
    /// error is returned and the household stays stale until reconciled.
    pub async fn record_collection(
        &self,
        household: &households::Model,
        submission: CollectionSubmission,
    ) -> Result<collections::Model, RecorderError> {
        let valid = validate(submission)?;
        let points = valid.status.points();

        let collection = self
            .store
            .create_collection(NewCollection {
                household_qr: household.qr_code.clone(),
                collector_name: valid.collector_name,
                status: valid.status,
                collection_time: Utc::now(),
                ward_number: household.ward_number.clone(),
                notes: valid.notes,
                points_awarded: points,
            })
            .await?;
        info!(
            "Recorded {} collection {} for {} ({:+} points)",
            valid.status, collection.id, household.qr_code, points
        );

        self.refresh(household.id).await?;
        Ok(collection)
    }

    /// Looks the household up by QR code, then records.
    pub async fn record_for_qr(
        &self,
        qr_code: &str,
        submission: CollectionSubmission,
    ) -> Result<collections::Model, RecorderError> {
        let household = self.household_by_qr(qr_code).await?;
        self.record_collection(&household, submission).await
    }

    /// Recomputes the household's aggregate from its collections. Safe to repeat.
    pub async fn reconcile_household(&self, qr_code: &str) -> Result<Reconciliation, RecorderError> {
        let household = self.household_by_qr(qr_code).await?;
        let reconciliation = self.refresh(household.id).await?;
        if reconciliation.changed() {
            warn!(
                "Household {qr_code} aggregate was stale: {} points / {}% -> {} points / {}%",
                reconciliation.previous.total_points,
                reconciliation.previous.compliance_rate,
                reconciliation.current.total_points,
                reconciliation.current.compliance_rate
            );
        }
        Ok(reconciliation)
    }

    pub async fn reconcile_all(&self) -> Result<ReconcileReport, RecorderError> {
        let mut report = ReconcileReport::default();
        for household in self.store.list_households(None).await? {
            report.examined += 1;
            match self.refresh(household.id).await {
                Ok(reconciliation) if reconciliation.changed() => {
                    report.repaired.push(household.qr_code)
                }
                Ok(_) => {}
                Err(RecorderError::Conflict { qr_code, .. }) => report.conflicted.push(qr_code),
                Err(e) => return Err(e),
            }
        }
        info!(
            "Reconciled {} households, {} repaired, {} conflicted",
            report.examined,
            report.repaired.len(),
            report.conflicted.len()
        );
        Ok(report)
    }

    /// Recounts the households registered against a ward.
    pub async fn reconcile_ward(&self, ward_number: &str) -> Result<WardCensus, RecorderError> {
        let ward = self
            .store
            .filter_wards(
                &WardFilter {
                    ward_number: Some(ward_number.to_string()),
                },
                None,
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecorderError::NotFound(format!("ward {ward_number}")))?;

        let registered = self
            .store
            .filter_households(&HouseholdFilter::ward_number(ward_number), None)
            .await?
            .len();
        let total = i32::try_from(registered).unwrap_or(i32::MAX);

        let previous_total = ward.total_households;
        let ward = if previous_total == total {
            ward
        } else {
            self.store
                .update_ward(
                    ward.id,
                    WardPatch {
                        total_households: Some(total),
                        ..Default::default()
                    },
                )
                .await?
        };
        Ok(WardCensus {
            ward,
            previous_total,
        })
    }

    async fn household_by_qr(&self, qr_code: &str) -> Result<households::Model, RecorderError> {
        registry::find_by_qr(self.store, qr_code).await
    }

    async fn refresh(&self, household_id: i32) -> Result<Reconciliation, RecorderError> {
        let mut qr_code = String::new();
        for attempt in 1..=self.max_attempts {
            let current = self
                .store
                .get_household(household_id)
                .await?
                .ok_or_else(|| RecorderError::NotFound(format!("household #{household_id}")))?;
            qr_code = current.qr_code.clone();

            let records = self
                .store
                .filter_collections(&CollectionFilter::household(&current.qr_code), None)
                .await?;
            let unrecognized = records
                .iter()
                .filter(|c| c.parsed_status().is_none())
                .count();
            if unrecognized > 0 {
                warn!(
                    "Household {} has {unrecognized} collections with an unrecognized status",
                    current.qr_code
                );
            }

            let aggregate = aggregation::household_aggregate(&records);
            let previous = StoredAggregate::of(&current);
            if aggregate.matches(&current) {
                return Ok(Reconciliation {
                    household: current,
                    previous,
                    current: aggregate,
                });
            }

            match self
                .store
                .compare_and_swap_aggregate(household_id, current.aggregate_version, &aggregate)
                .await?
            {
                Some(household) => {
                    debug!(
                        "Household {} aggregate now {} points / {}% (version {})",
                        household.qr_code,
                        household.total_points,
                        household.compliance_rate,
                        household.aggregate_version
                    );
                    return Ok(Reconciliation {
                        household,
                        previous,
                        current: aggregate,
                    });
                }
                None => warn!(
                    "Household {} changed during aggregate write, attempt {attempt}/{}",
                    current.qr_code, self.max_attempts
                ),
            }
        }
        Err(RecorderError::Conflict {
            qr_code,
            attempts: self.max_attempts,
        })
    }
}
