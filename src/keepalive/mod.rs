// Device keep-alive lifecycle
// Controller, background scheduling and test doubles

mod controller;
mod schedule;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{KeepAliveController, KeepAliveSettings, KeepAliveStatus, ReconcileReport};
