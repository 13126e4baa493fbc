//! ACME 授权服务实现
//!
//! 基于 `instant-acme` 对接 RFC 8555 授权服务器。账户在首次开单时
//! 创建并在进程内复用；每张订单只含单个 DNS 标识符。

use async_trait::async_trait;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order,
    OrderStatus,
};
use log::{debug, info};
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::traits::{CertificateOrder, RenewalAuthority};
use crate::types::{ChallengeState, HttpChallenge};

/// 生成账户联系方式列表
fn contact_entries(email: Option<&str>) -> Vec<String> {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| format!("mailto:{e}"))
        .into_iter()
        .collect()
}

/// 把 instant-acme 错误统一映射为续期协议错误
fn protocol_err(domain: &str, context: &str, e: &impl std::fmt::Display) -> CoreError {
    CoreError::RenewalProtocol {
        domain: domain.to_string(),
        message: format!("{context}: {e}"),
    }
}

/// 对接真实 ACME 目录的授权服务
pub struct AcmeAuthority {
    directory_url: String,
    contact_email: Option<String>,
    account: Mutex<Option<Account>>,
}

impl AcmeAuthority {
    /// 从引擎配置创建授权服务
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            directory_url: config.acme_directory.clone(),
            contact_email: config.acme_contact_email.clone(),
            account: Mutex::new(None),
        }
    }

    /// 首次使用时创建 ACME 账户
    async fn ensure_account<'a>(
        &self,
        slot: &'a mut Option<Account>,
        domain: &str,
    ) -> CoreResult<&'a Account> {
        if slot.is_none() {
            info!("Creating ACME account at {}", self.directory_url);
            let contact_owned = contact_entries(self.contact_email.as_deref());
            let contact: Vec<&str> = contact_owned.iter().map(String::as_str).collect();
            let new_account = NewAccount {
                contact: &contact,
                terms_of_service_agreed: true,
                only_return_existing: false,
            };
            let (account, _credentials) =
                Account::create(&new_account, &self.directory_url, None)
                    .await
                    .map_err(|e| protocol_err(domain, "ACME account creation failed", &e))?;
            *slot = Some(account);
        }
        slot.as_ref().ok_or_else(|| CoreError::RenewalProtocol {
            domain: domain.to_string(),
            message: "ACME account unavailable".to_string(),
        })
    }
}

#[async_trait]
impl RenewalAuthority for AcmeAuthority {
    async fn new_order(&self, domain: &str) -> CoreResult<Box<dyn CertificateOrder>> {
        let mut slot = self.account.lock().await;
        let account = self.ensure_account(&mut slot, domain).await?;
        let identifiers = [Identifier::Dns(domain.to_string())];
        let order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await
            .map_err(|e| protocol_err(domain, "ACME order creation failed", &e))?;

        debug!("Created ACME order for domain {domain}");
        Ok(Box::new(AcmeOrder {
            domain: domain.to_string(),
            order,
        }))
    }
}

/// 单域名 ACME 订单
struct AcmeOrder {
    domain: String,
    order: Order,
}

#[async_trait]
impl CertificateOrder for AcmeOrder {
    async fn http_challenges(&mut self) -> CoreResult<Vec<HttpChallenge>> {
        let authorizations = self
            .order
            .authorizations()
            .await
            .map_err(|e| protocol_err(&self.domain, "failed to fetch authorizations", &e))?;

        let mut challenges = Vec::new();
        for auth in &authorizations {
            // 已通过的授权无需再次验证
            if auth.status == AuthorizationStatus::Valid {
                continue;
            }
            if auth.status != AuthorizationStatus::Pending {
                return Err(CoreError::RenewalProtocol {
                    domain: self.domain.clone(),
                    message: format!("authorization in unexpected state: {:?}", auth.status),
                });
            }

            let challenge = auth
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Http01)
                .ok_or_else(|| CoreError::RenewalProtocol {
                    domain: self.domain.clone(),
                    message: "no HTTP-01 challenge offered by authority".to_string(),
                })?;

            let key_authorization = self.order.key_authorization(challenge);
            challenges.push(HttpChallenge {
                domain: self.domain.clone(),
                token: challenge.token.clone(),
                key_authorization: key_authorization.as_str().to_string(),
                url: challenge.url.clone(),
            });
        }
        Ok(challenges)
    }

    async fn trigger_challenge(&mut self, challenge: &HttpChallenge) -> CoreResult<()> {
        self.order
            .set_challenge_ready(&challenge.url)
            .await
            .map_err(|e| protocol_err(&self.domain, "failed to mark challenge ready", &e))
    }

    async fn challenge_state(&mut self, _challenge: &HttpChallenge) -> CoreResult<ChallengeState> {
        // HTTP-01 单挑战订单：订单状态即挑战验证进度
        self.order
            .refresh()
            .await
            .map_err(|e| protocol_err(&self.domain, "failed to refresh order", &e))?;

        match self.order.state().status {
            OrderStatus::Pending => Ok(ChallengeState::Triggered),
            OrderStatus::Ready | OrderStatus::Processing | OrderStatus::Valid => {
                Ok(ChallengeState::Valid)
            }
            OrderStatus::Invalid => Ok(ChallengeState::Invalid),
        }
    }

    async fn finalize(&mut self, csr_der: &[u8]) -> CoreResult<()> {
        // 授权服务器可能在验证完成时直接推进到 Valid
        if self.order.state().status == OrderStatus::Valid {
            return Ok(());
        }
        self.order
            .finalize(csr_der)
            .await
            .map_err(|e| protocol_err(&self.domain, "order finalization failed", &e))
    }

    async fn certificate_chain(&mut self) -> CoreResult<Option<String>> {
        self.order
            .certificate()
            .await
            .map_err(|e| protocol_err(&self.domain, "failed to download certificate", &e))
    }
}
