//! Core data models for region resolution.

pub mod admin;

pub use admin::{AdminLevel, RegionInfo, ResolvedChain, COUNTRY_ADCODE, COUNTRY_NAME};
