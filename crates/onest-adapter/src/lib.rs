//! Provider (BPP) and seeker (BAP) gateways for the ONEST work-opportunity network.
//!
//! Inbound protocol actions are acknowledged synchronously by the [`gateway`], recorded
//! in the [`outbox`], and executed by a worker pool that posts the paired `on_*`
//! callback through the [`dispatch`] client.

pub mod applications;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod eligibility;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod network;
pub mod offerings;
pub mod outbox;
pub mod seeker;
pub mod staging;
pub mod storage;
pub mod telemetry;
