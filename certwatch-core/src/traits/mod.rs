//! Storage layer and collaborator abstraction trait definition

mod challenge_publisher;
mod domain_repository;
mod notification_transport;
mod renewal_authority;

pub use challenge_publisher::ChallengePublisher;
pub use domain_repository::DomainRepository;
pub use notification_transport::NotificationTransport;
pub use renewal_authority::{CertificateOrder, RenewalAuthority};
