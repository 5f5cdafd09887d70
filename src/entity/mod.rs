pub mod collections;
pub mod helpers;
pub mod households;
pub mod wards;
