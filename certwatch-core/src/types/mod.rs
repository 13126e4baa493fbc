//! 类型定义模块

mod domain;
mod notification;
mod probe;
mod renewal;

pub use domain::{CertificateStatus, DomainRecord, CERTIFICATE_DETAILS_MAX_LEN};
pub use notification::Urgency;
pub use probe::{ProbeFailureKind, ProbeResult};
pub use renewal::{ChallengeState, HttpChallenge, RenewalState};
