use std::str::FromStr;

use chrono::Utc;
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, Order, QueryFilter,
    QueryOrder, Select, Set,
};

use crate::aggregation::Aggregate;
use crate::data::dbconnector::SQLConnector;
use crate::data::store::{
    CollectionFilter, EntityStore, HouseholdFilter, HouseholdPatch, NewCollection, NewHousehold,
    NewWard, SortSpec, StoreError, WardFilter, WardPatch,
};
use crate::entity::{collections, households, wards};

/// Applies `sort` with `id` as tie-break in the same direction, or plain
/// insertion order when there is no sort.
fn sorted<E>(select: Select<E>, sort: Option<&SortSpec>, id: E::Column) -> Result<Select<E>, StoreError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let Some(spec) = sort else {
        return Ok(select.order_by(id, Order::Asc));
    };
    let column = E::Column::from_str(&spec.field)
        .map_err(|_| StoreError::UnknownSortField(spec.field.clone()))?;
    let order = if spec.descending {
        Order::Desc
    } else {
        Order::Asc
    };
    Ok(select.order_by(column, order.clone()).order_by(id, order))
}

impl EntityStore for SQLConnector {
    async fn create_household(&self, new: NewHousehold) -> Result<households::Model, StoreError> {
        let household = households::ActiveModel {
            qr_code: Set(new.qr_code),
            address: Set(new.address),
            ward_number: Set(new.ward_number),
            ward_name: Set(new.ward_name),
            resident_name: Set(new.resident_name),
            phone_number: Set(new.phone_number),
            total_points: Set(0),
            compliance_rate: Set(0),
            aggregate_version: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(household.insert(self.connection()?).await?)
    }

    async fn get_household(&self, id: i32) -> Result<Option<households::Model>, StoreError> {
        Ok(households::Entity::find_by_id(id)
            .one(self.connection()?)
            .await?)
    }

    async fn filter_households(
        &self,
        filter: &HouseholdFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError> {
        let condition = Condition::all()
            .add_option(
                filter
                    .qr_code
                    .as_ref()
                    .map(|qr| households::Column::QrCode.eq(qr.as_str())),
            )
            .add_option(
                filter
                    .ward_number
                    .as_ref()
                    .map(|ward| households::Column::WardNumber.eq(ward.as_str())),
            );
        let select = households::Entity::find().filter(condition);
        Ok(sorted(select, sort, households::Column::Id)?
            .all(self.connection()?)
            .await?)
    }

    async fn list_households(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<households::Model>, StoreError> {
        self.filter_households(&HouseholdFilter::default(), sort)
            .await
    }

    async fn update_household(
        &self,
        id: i32,
        patch: HouseholdPatch,
    ) -> Result<households::Model, StoreError> {
        let db = self.connection()?;
        let current = households::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(StoreError::MissingRecord {
                kind: "household",
                id,
            })?;

        let mut active = current.clone().into_active_model();
        if let Some(address) = patch.address {
            active.address = Set(address);
        }
        if let Some(ward_number) = patch.ward_number {
            active.ward_number = Set(ward_number);
        }
        if let Some(ward_name) = patch.ward_name {
            active.ward_name = Set(ward_name);
        }
        if let Some(resident_name) = patch.resident_name {
            active.resident_name = Set(Some(resident_name));
        }
        if let Some(phone_number) = patch.phone_number {
            active.phone_number = Set(Some(phone_number));
        }
        if !active.is_changed() {
            return Ok(current);
        }
        Ok(active.update(db).await?)
    }

    async fn compare_and_swap_aggregate(
        &self,
        id: i32,
        expected_version: i32,
        aggregate: &Aggregate,
    ) -> Result<Option<households::Model>, StoreError> {
        let db = self.connection()?;
        let result = households::Entity::update_many()
            .col_expr(
                households::Column::TotalPoints,
                Expr::value(aggregate.total_points),
            )
            .col_expr(
                households::Column::ComplianceRate,
                Expr::value(aggregate.compliance_rate),
            )
            .col_expr(
                households::Column::AggregateVersion,
                Expr::value(expected_version + 1),
            )
            .filter(households::Column::Id.eq(id))
            .filter(households::Column::AggregateVersion.eq(expected_version))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            debug!("Aggregate write for household {id} lost at version {expected_version}");
            return Ok(None);
        }

        let updated = households::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(StoreError::MissingRecord {
                kind: "household",
                id,
            })?;
        Ok(Some(updated))
    }

    async fn create_collection(
        &self,
        new: NewCollection,
    ) -> Result<collections::Model, StoreError> {
        let collection = collections::ActiveModel {
            household_qr: Set(new.household_qr),
            collector_name: Set(new.collector_name),
            status: Set(new.status.as_str().to_string()),
            collection_time: Set(new.collection_time),
            ward_number: Set(new.ward_number),
            notes: Set(new.notes),
            points_awarded: Set(new.points_awarded),
            ..Default::default()
        };
        Ok(collection.insert(self.connection()?).await?)
    }

    async fn get_collection(&self, id: i32) -> Result<Option<collections::Model>, StoreError> {
        Ok(collections::Entity::find_by_id(id)
            .one(self.connection()?)
            .await?)
    }

    async fn filter_collections(
        &self,
        filter: &CollectionFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError> {
        let condition = Condition::all()
            .add_option(
                filter
                    .household_qr
                    .as_ref()
                    .map(|qr| collections::Column::HouseholdQr.eq(qr.as_str())),
            )
            .add_option(
                filter
                    .ward_number
                    .as_ref()
                    .map(|ward| collections::Column::WardNumber.eq(ward.as_str())),
            )
            .add_option(
                filter
                    .collector_name
                    .as_ref()
                    .map(|name| collections::Column::CollectorName.eq(name.as_str())),
            )
            .add_option(
                filter
                    .status
                    .as_ref()
                    .map(|status| collections::Column::Status.eq(status.as_str())),
            );
        let select = collections::Entity::find().filter(condition);
        Ok(sorted(select, sort, collections::Column::Id)?
            .all(self.connection()?)
            .await?)
    }

    async fn list_collections(
        &self,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<collections::Model>, StoreError> {
        self.filter_collections(&CollectionFilter::default(), sort)
            .await
    }

    async fn create_ward(&self, new: NewWard) -> Result<wards::Model, StoreError> {
        let ward = wards::ActiveModel {
            ward_number: Set(new.ward_number),
            ward_name: Set(new.ward_name),
            total_households: Set(0),
            supervisor_name: Set(new.supervisor_name),
            supervisor_contact: Set(new.supervisor_contact),
            ..Default::default()
        };
        Ok(ward.insert(self.connection()?).await?)
    }

    async fn get_ward(&self, id: i32) -> Result<Option<wards::Model>, StoreError> {
        Ok(wards::Entity::find_by_id(id)
            .one(self.connection()?)
            .await?)
    }

    async fn filter_wards(
        &self,
        filter: &WardFilter,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<wards::Model>, StoreError> {
        let condition = Condition::all().add_option(
            filter
                .ward_number
                .as_ref()
                .map(|ward| wards::Column::WardNumber.eq(ward.as_str())),
        );
        let select = wards::Entity::find().filter(condition);
        Ok(sorted(select, sort, wards::Column::Id)?
            .all(self.connection()?)
            .await?)
    }

    async fn list_wards(&self, sort: Option<&SortSpec>) -> Result<Vec<wards::Model>, StoreError> {
        self.filter_wards(&WardFilter::default(), sort).await
    }

    async fn update_ward(&self, id: i32, patch: WardPatch) -> Result<wards::Model, StoreError> {
        let db = self.connection()?;
        let current = wards::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(StoreError::MissingRecord { kind: "ward", id })?;

        let mut active = current.clone().into_active_model();
        if let Some(ward_name) = patch.ward_name {
            active.ward_name = Set(ward_name);
        }
        if let Some(total_households) = patch.total_households {
            active.total_households = Set(total_households);
        }
        if let Some(supervisor_name) = patch.supervisor_name {
            active.supervisor_name = Set(Some(supervisor_name));
        }
        if let Some(supervisor_contact) = patch.supervisor_contact {
            active.supervisor_contact = Set(Some(supervisor_contact));
        }
        if !active.is_changed() {
            return Ok(current);
        }
        Ok(active.update(db).await?)
    }
}
