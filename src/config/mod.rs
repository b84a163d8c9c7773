//! Declarative YAML configuration
//!
//! A run is described by one YAML file ([`SdnSpec`]) with `model`, `data`,
//! `optimizer`, `scheduler` and `training` sections.

mod loader;
mod schema;


pub use loader::{load_spec, train_from_spec, train_from_yaml, validate_spec};
pub use schema::{OptimSpec, SchedulerSpec, SdnSpec};
