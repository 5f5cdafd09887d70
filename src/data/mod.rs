pub mod configuration;
pub mod dbconnector;
pub mod sqlstore;
pub mod store;
