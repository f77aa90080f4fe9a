//! Intake bot: booking intake for a mobile tyre-fitting business over a
//! messaging webhook.

pub mod config;
pub mod error;
pub mod intake;
pub mod routes;
pub mod store;
