#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use ecotrack::aggregation::Aggregate;
use ecotrack::data::configuration::{Configuration, WardSeed};
use ecotrack::data::dbconnector::{EcoDBConnection, SQLConnector};
use ecotrack::data::store::{
    CollectionFilter, EntityStore, HouseholdFilter, HouseholdPatch, NewCollection, NewHousehold,
    NewWard, SortSpec, StoreError, WardFilter, WardPatch,
};
use ecotrack::entity::{collections, households, wards};

pub fn configuration() -> Configuration {
    let mut config = Configuration::default();
    config.wards.insert(
        "001".to_string(),
        WardSeed {
            ward_name: "General Ward".to_string(),
            supervisor_name: Some("Asha".to_string()),
            supervisor_contact: None,
        },
    );
    config
}

pub async fn store() -> SQLConnector {
    let mut connector = SQLConnector::in_memory();
    connector.connect().await.expect("connect");
    connector
        .initialize(&configuration())
        .await
        .expect("initialize");
    connector
}

pub fn new_household(qr_code: &str, ward_number: &str) -> NewHousehold {
    NewHousehold {
        qr_code: qr_code.to_string(),
        address: format!("{qr_code} Temple Street"),
        ward_number: ward_number.to_string(),
        ward_name: format!("Ward {ward_number}"),
        resident_name: Some("Meera".to_string()),
        phone_number: None,
    }
}

/// Delegates to a real store, with switches to break the aggregate write.
pub struct FaultyStore {
    pub inner: SQLConnector,
    pub fail_aggregate_writes: AtomicBool,
    pub lose_aggregate_races: AtomicBool,
    /// Loses this many aggregate writes, then lets them through
    pub races_to_lose: AtomicU32,
    pub aggregate_attempts: AtomicU32,
    /// The next household filter comes back empty, as if the row was not there yet
    pub miss_next_household_lookup: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: SQLConnector) -> Self {
        FaultyStore {
            inner,
            fail_aggregate_writes: AtomicBool::new(false),
            lose_aggregate_races: AtomicBool::new(false),
            races_to_lose: AtomicU32::new(0),
            aggregate_attempts: AtomicU32::new(0),
            miss_next_household_lookup: AtomicBool::new(false),
        }
    }
}

impl EntityStore for FaultyStore {
    async fn create_household(&self, new: NewHousehold) -> Result<households::Model, StoreError> {
        self.inner.create_household(new).await
    }
    async fn get_household(&self, id: i32) -> Result<Option<households::Model>, StoreError> {
        self.inner.get_household(id).await
    }
    async fn filter_households(
        &self,
        filter: &HouseholdFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError> {
        if self.miss_next_household_lookup.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        self.inner.filter_households(filter, sort).await
    }
    async fn list_households(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError> {
        self.inner.list_households(sort).await
    }
    async fn update_household(
        &self,
        id: i32,
        patch: HouseholdPatch,
    ) -> Result<households::Model, StoreError> {
        self.inner.update_household(id, patch).await
    }
    async fn compare_and_swap_aggregate(
        &self,
        id: i32,
        expected_version: i32,
        aggregate: &Aggregate,
    ) -> Result<Option<households::Model>, StoreError> {
        self.aggregate_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_aggregate_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "disk unplugged".to_string(),
            )));
        }
        if self.lose_aggregate_races.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if self
            .races_to_lose
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(None);
        }
        self.inner
            .compare_and_swap_aggregate(id, expected_version, aggregate)
            .await
    }
    async fn create_collection(
        &self,
        new: NewCollection,
    ) -> Result<collections::Model, StoreError> {
        self.inner.create_collection(new).await
    }
    async fn get_collection(&self, id: i32) -> Result<Option<collections::Model>, StoreError> {
        self.inner.get_collection(id).await
    }
    async fn filter_collections(
        &self,
        filter: &CollectionFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError> {
        self.inner.filter_collections(filter, sort).await
    }
    async fn list_collections(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError> {
        self.inner.list_collections(sort).await
    }
    async fn create_ward(&self, new: NewWard) -> Result<wards::Model, StoreError> {
        self.inner.create_ward(new).await
    }
    async fn get_ward(&self, id: i32) -> Result<Option<wards::Model>, StoreError> {
        self.inner.get_ward(id).await
    }
    async fn filter_wards(
        &self,
        filter: &WardFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<wards::Model>, StoreError> {
        self.inner.filter_wards(filter, sort).await
    }
    async fn list_wards(&self, sort: Option<&SortSpec>) -> Result<Vec<wards::Model>, StoreError> {
        self.inner.list_wards(sort).await
    }
    async fn update_ward(&self, id: i32, patch: WardPatch) -> Result<wards::Model, StoreError> {
        self.inner.update_ward(id, patch).await
    }
}
