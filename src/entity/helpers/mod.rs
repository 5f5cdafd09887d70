use anyhow::Context;

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::data::configuration::WardSeed;

/// Inserts the ward unless its number is already taken. Returns whether a row was written.
pub async fn seed_ward(
    db: &DatabaseConnection,
    ward_number: &str,
    seed: &WardSeed,
) -> anyhow::Result<bool> {
    use crate::entity::{households, wards};

    anyhow::ensure!(!ward_number.trim().is_empty(), "ward number must not be empty");
    anyhow::ensure!(
        !seed.ward_name.trim().is_empty(),
        "ward {ward_number} has no name"
    );

    let existing = wards::Entity::find()
        .filter(wards::Column::WardNumber.eq(ward_number))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(false);
    }

    // Households may have registered against this number before the ward existed
    let registered = households::Entity::find()
        .filter(households::Column::WardNumber.eq(ward_number))
        .all(db)
        .await?
        .len();

    let ward = wards::ActiveModel {
        ward_number: Set(ward_number.to_string()),
        ward_name: Set(seed.ward_name.clone()),
        total_households: Set(i32::try_from(registered).unwrap_or(i32::MAX)),
        supervisor_name: Set(seed.supervisor_name.clone()),
        supervisor_contact: Set(seed.supervisor_contact.clone()),
        ..Default::default()
    };

    ward.insert(db)
        .await
        .with_context(|| format!("failed to insert ward {ward_number}"))?;
    Ok(true)
}
