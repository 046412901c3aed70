//! Case Notifier: delivers pending case-file notifications to courts.

pub mod business_hours;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateways;
pub mod logging;
pub mod pipeline;
pub mod store;
