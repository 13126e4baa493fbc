//! 证书续期服务
//!
//! 驱动 ACME HTTP-01 续期状态机：开单、发布挑战、触发验证、
//! 轮询结果、提交 CSR、取回证书链。只有订单成功签发后才会
//! 一次性更新域名记录；任何中途失败都不触碰记录。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::traits::CertificateOrder;
use crate::types::{ChallengeState, DomainRecord, HttpChallenge, RenewalState};
use crate::utils::{domain_name, CancelToken};

/// 签发结果（仅在状态机内部流转）
struct IssuedCertificate {
    subject: String,
    not_after: DateTime<Utc>,
}

/// 证书续期服务
pub struct RenewalService {
    ctx: Arc<ServiceContext>,
}

impl RenewalService {
    /// 创建续期服务
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// 立即续期一个域名（不可取消的便捷入口）
    pub async fn renew_now(&self, raw: &str) -> CoreResult<DomainRecord> {
        self.renew_with_cancel(raw, &CancelToken::new()).await
    }

    /// 带取消支持的证书续期
    ///
    /// 与证书检查共用同一张按域名的锁表，同一域名的续期与检查互斥。
    /// 整个流程受 `renewal_timeout` 约束。
    pub async fn renew_with_cancel(
        &self,
        raw: &str,
        cancel: &CancelToken,
    ) -> CoreResult<DomainRecord> {
        let name = domain_name::normalize(raw);
        if name.is_empty() {
            return Err(CoreError::Validation(
                "domain name must not be empty".to_string(),
            ));
        }

        let _guard = self.ctx.locks.acquire(&name).await;

        let mut record = self
            .ctx
            .domain_repository
            .find_by_name(&name)
            .await?
            .ok_or_else(|| CoreError::DomainNotFound(name.clone()))?;

        info!("Starting certificate renewal for domain {name}");
        let issued = match tokio::time::timeout(
            self.ctx.config.renewal_timeout(),
            self.drive(&name, cancel),
        )
        .await
        {
            Ok(Ok(issued)) => issued,
            Ok(Err(e)) => {
                error!("Renewal failed for domain {name}: {e}");
                return Err(e);
            }
            Err(_) => {
                let message = format!(
                    "renewal timed out after {}s",
                    self.ctx.config.renewal_timeout_secs
                );
                error!("Renewal failed for domain {name}: {message}");
                return Err(CoreError::RenewalProtocol {
                    domain: name,
                    message,
                });
            }
        };

        // 签发成功后才触碰记录，单次保存保证原子性
        record.certificate_expiry_date = Some(issued.not_after);
        record.last_renewal = Some(Utc::now());
        record.set_details(&format!("Renewed certificate: {}", issued.subject));
        let saved = self.ctx.domain_repository.save(&record).await?;
        info!(
            "Certificate renewed for domain {name}, new expiry {}",
            issued.not_after.to_rfc3339()
        );
        Ok(saved)
    }

    /// 推进一张订单直到签发或失败
    async fn drive(&self, domain: &str, cancel: &CancelToken) -> CoreResult<IssuedCertificate> {
        let mut state = RenewalState::Created;
        let mut order = self.ctx.renewal_authority.new_order(domain).await?;

        transition(domain, &mut state, RenewalState::Authorizing);
        let challenges = order.http_challenges().await?;
        if challenges.is_empty() {
            return Err(CoreError::RenewalProtocol {
                domain: domain.to_string(),
                message: "order yielded no pending HTTP-01 challenges".to_string(),
            });
        }

        let result = self
            .validate_and_finalize(domain, &mut state, order.as_mut(), &challenges, cancel)
            .await;

        // 无论成败，已发布的挑战内容都要撤下
        for challenge in &challenges {
            if let Err(e) = self
                .ctx
                .challenge_publisher
                .unpublish(&challenge.domain, &challenge.token)
                .await
            {
                warn!(
                    "Failed to unpublish challenge token {} for domain {}: {e}",
                    challenge.token, challenge.domain
                );
            }
        }

        if result.is_err() {
            transition(domain, &mut state, RenewalState::Failed);
        }
        result
    }

    /// 发布并验证挑战，然后提交 CSR 并等待签发
    async fn validate_and_finalize(
        &self,
        domain: &str,
        state: &mut RenewalState,
        order: &mut dyn CertificateOrder,
        challenges: &[HttpChallenge],
        cancel: &CancelToken,
    ) -> CoreResult<IssuedCertificate> {
        transition(domain, state, RenewalState::ChallengePending);
        for challenge in challenges {
            self.ctx
                .challenge_publisher
                .publish(
                    &challenge.domain,
                    &challenge.token,
                    &challenge.key_authorization,
                )
                .await?;
        }

        transition(domain, state, RenewalState::ChallengeTriggered);
        for challenge in challenges {
            order.trigger_challenge(challenge).await?;
        }

        for challenge in challenges {
            self.poll_challenge(domain, order, challenge, cancel).await?;
        }
        transition(domain, state, RenewalState::ChallengeValid);

        transition(domain, state, RenewalState::Finalizing);
        let key_pair = rcgen::KeyPair::generate().map_err(|e| CoreError::RenewalProtocol {
            domain: domain.to_string(),
            message: format!("key pair generation failed: {e}"),
        })?;
        let params = rcgen::CertificateParams::new(vec![domain.to_string()]).map_err(|e| {
            CoreError::RenewalProtocol {
                domain: domain.to_string(),
                message: format!("CSR parameters rejected: {e}"),
            }
        })?;
        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| CoreError::RenewalProtocol {
                domain: domain.to_string(),
                message: format!("CSR serialization failed: {e}"),
            })?;
        order.finalize(csr.der()).await?;

        let chain_pem = loop {
            if let Some(pem) = order.certificate_chain().await? {
                break pem;
            }
            debug!("Certificate for domain {domain} not ready yet, polling again");
            self.wait_poll_interval(domain, cancel).await?;
        };

        transition(domain, state, RenewalState::Issued);
        parse_issued_leaf(domain, &chain_pem)
    }

    /// 轮询单个挑战直到终态
    async fn poll_challenge(
        &self,
        domain: &str,
        order: &mut dyn CertificateOrder,
        challenge: &HttpChallenge,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        loop {
            match order.challenge_state(challenge).await? {
                ChallengeState::Valid => {
                    debug!(
                        "Challenge {} validated for domain {}",
                        challenge.token, challenge.domain
                    );
                    return Ok(());
                }
                ChallengeState::Invalid => {
                    return Err(CoreError::RenewalProtocol {
                        domain: domain.to_string(),
                        message: format!(
                            "HTTP-01 challenge for {} failed validation",
                            challenge.domain
                        ),
                    });
                }
                ChallengeState::Pending | ChallengeState::Triggered => {
                    self.wait_poll_interval(domain, cancel).await?;
                }
            }
        }
    }

    /// 等一个轮询周期，期间可被取消
    async fn wait_poll_interval(&self, domain: &str, cancel: &CancelToken) -> CoreResult<()> {
        tokio::select! {
            () = cancel.cancelled() => Err(CoreError::Interrupted(format!(
                "renewal for {domain} cancelled during challenge polling"
            ))),
            () = tokio::time::sleep(self.ctx.config.challenge_poll_interval()) => Ok(()),
        }
    }
}

/// 记录状态机迁移
fn transition(domain: &str, state: &mut RenewalState, next: RenewalState) {
    debug!("Renewal state for domain {domain}: {state:?} -> {next:?}");
    *state = next;
}

/// 从签发的 PEM 链中解析叶子证书的主体与到期时间
fn parse_issued_leaf(domain: &str, chain_pem: &str) -> CoreResult<IssuedCertificate> {
    let protocol_err = |message: String| CoreError::RenewalProtocol {
        domain: domain.to_string(),
        message,
    };

    let (_, pem) = x509_parser::pem::parse_x509_pem(chain_pem.as_bytes())
        .map_err(|e| protocol_err(format!("issued chain is not valid PEM: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| protocol_err(format!("issued leaf certificate is malformed: {e}")))?;

    let subject = cert.subject().to_string();
    let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| protocol_err("issued certificate has an unrepresentable expiry".to_string()))?;

    Ok(IssuedCertificate { subject, not_after })
}
