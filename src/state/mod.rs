pub mod db;
pub mod models;
mod suffixes;
mod tables;

pub use db::{DeploymentState, StateError};
pub use models::SuffixRecord;
pub use tables::*;
