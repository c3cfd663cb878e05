// Settings: where the config lives and how the device selection is stored

pub mod paths;
pub mod store;

pub use paths::{ConfigLocation, LocationOptions};
pub use store::{AppConfig, ConfigStore, JsonConfigStore};
