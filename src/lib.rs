pub mod aggregation;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod entity;
pub mod error;
pub mod recorder;
pub mod registry;
pub mod server;
