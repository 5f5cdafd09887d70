use anyhow::Context;
use log::{debug, info};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, Statement,
};

use crate::data::configuration::Configuration;
use crate::data::store::StoreError;
use crate::entity::{collections, helpers, households, wards};

#[allow(async_fn_in_trait)]
pub trait EcoDBConnection {
    async fn connect(&mut self) -> Result<(), anyhow::Error>;
    async fn check(&self) -> Result<(), anyhow::Error>;
    async fn close(&self) -> Result<(), anyhow::Error>;
    async fn is_initialized(&self) -> Result<bool, anyhow::Error>;
    async fn initialize(&self, config: &Configuration) -> Result<(), anyhow::Error>;
}

pub struct SQLConnector {
    url: String,
    database_connection: Option<DatabaseConnection>,
}

impl SQLConnector {
    pub fn new(path: &str) -> Self {
        SQLConnector {
            url: format!("sqlite://{path}/db.sqlite?mode=rwc"),
            database_connection: None,
        }
    }

    /// Private database that lives as long as the connector.
    pub fn in_memory() -> Self {
        SQLConnector {
            url: String::from("sqlite::memory:"),
            database_connection: None,
        }
    }

    pub fn connection(&self) -> Result<&DatabaseConnection, StoreError> {
        self.database_connection
            .as_ref()
            .ok_or(StoreError::NotConnected)
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

impl EcoDBConnection for SQLConnector {
    async fn connect(&mut self) -> Result<(), anyhow::Error> {
        let mut options = ConnectOptions::new(self.url.clone());
        options.sqlx_logging(false);
        if self.is_memory() {
            // every pooled connection would otherwise see its own empty database
            options.max_connections(1).min_connections(1);
        }
        let db = Database::connect(options)
            .await
            .with_context(|| format!("failed to connect to {}", self.url))?;

        self.database_connection = Some(db);
        Ok(())
    }
    async fn check(&self) -> Result<(), anyhow::Error> {
        if let Some(ref db) = self.database_connection {
            db.ping().await?;
        }
        Ok(())
    }
    async fn close(&self) -> Result<(), anyhow::Error> {
        if let Some(ref db) = self.database_connection {
            let db = db.clone();
            db.close().await?;
        }
        Ok(())
    }
    async fn is_initialized(&self) -> Result<bool, anyhow::Error> {
        let db = self.connection()?;
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'households'",
            ))
            .await?;
        Ok(row.is_some())
    }
    async fn initialize(&self, config: &Configuration) -> Result<(), anyhow::Error> {
        let db = self.connection()?;
        create_table(db, households::Entity).await?;
        create_table(db, collections::Entity).await?;
        create_table(db, wards::Entity).await?;
        debug!("Created tables");

        for (ward_number, seed) in &config.wards {
            if helpers::seed_ward(db, ward_number, seed).await? {
                info!("Seeded ward {ward_number} ({})", seed.ward_name);
            }
        }
        Ok(())
    }
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> anyhow::Result<()> {
    let table = entity.table_name().to_string();
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .with_context(|| format!("failed to create table {table}"))?;
    Ok(())
}
