//! CertWatch Core Library
//!
//! Provides the core certificate lifecycle engine, including:
//! - Certificate checking with retry (Check Service)
//! - ACME HTTP-01 renewal (Renewal Service)
//! - Batch scheduling (Scheduler)
//!
//! This library is designed to be platform-independent, abstracting storage,
//! notification delivery and challenge publishing through traits.

pub mod config;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};
pub use services::{CheckService, RenewalService, Scheduler, ServiceContext};
pub use traits::{ChallengePublisher, DomainRepository, NotificationTransport, RenewalAuthority};
