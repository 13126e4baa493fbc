//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::services::{CertificateProber, ServiceContext};
use crate::traits::{
    CertificateOrder, ChallengePublisher, DomainRepository, NotificationTransport,
    RenewalAuthority,
};
use crate::types::{
    ChallengeState, DomainRecord, HttpChallenge, ProbeFailureKind, ProbeResult, Urgency,
};

// ===== MockDomainRepository =====

pub struct MockDomainRepository {
    records: RwLock<HashMap<String, DomainRecord>>,
    /// 如果 Some，save 时返回此错误（用于测试存储失败路径）
    save_error: RwLock<Option<String>>,
}

impl MockDomainRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            save_error: RwLock::new(None),
        }
    }

    pub async fn set_save_error(&self, err: Option<String>) {
        *self.save_error.write().await = err;
    }
}

#[async_trait]
impl DomainRepository for MockDomainRepository {
    async fn find_by_name(&self, domain_name: &str) -> CoreResult<Option<DomainRecord>> {
        Ok(self.records.read().await.get(domain_name).cloned())
    }

    async fn find_all(&self) -> CoreResult<Vec<DomainRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_auto_renewal_true(&self) -> CoreResult<Vec<DomainRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.auto_renewal)
            .cloned()
            .collect())
    }

    async fn save(&self, record: &DomainRecord) -> CoreResult<DomainRecord> {
        if let Some(ref msg) = *self.save_error.read().await {
            return Err(CoreError::Storage(msg.clone()));
        }
        let mut saved = record.clone();
        if saved.id.is_none() {
            saved.id = Some(uuid::Uuid::new_v4().to_string());
        }
        self.records
            .write()
            .await
            .insert(saved.domain_name.clone(), saved.clone());
        Ok(saved)
    }

    async fn exists_by_id(&self, id: &str) -> CoreResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.id.as_deref() == Some(id)))
    }

    async fn delete_by_id(&self, id: &str) -> CoreResult<()> {
        self.records
            .write()
            .await
            .retain(|_, r| r.id.as_deref() != Some(id));
        Ok(())
    }
}

// ===== MockNotificationTransport =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDelivery {
    pub destination: String,
    pub subject: String,
    pub urgency: Urgency,
    pub domain: String,
}

pub struct MockNotificationTransport {
    deliveries: Mutex<Vec<RecordedDelivery>>,
    /// 前 N 次投递返回失败（用于测试引擎自身的投递重试）
    fail_first: AtomicUsize,
    fail_always: std::sync::atomic::AtomicBool,
}

impl MockNotificationTransport {
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            fail_first: AtomicUsize::new(0),
            fail_always: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn fail_first(&self, n: usize) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    pub async fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().await.clone()
    }

    pub async fn delivery_count(&self) -> usize {
        self.deliveries.lock().await.len()
    }
}

#[async_trait]
impl NotificationTransport for MockNotificationTransport {
    async fn deliver(
        &self,
        destination: &str,
        subject: &str,
        urgency: Urgency,
        domain: &str,
    ) -> CoreResult<()> {
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(CoreError::Transport("smtp unavailable".to_string()));
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::Transport("smtp unavailable".to_string()));
        }
        self.deliveries.lock().await.push(RecordedDelivery {
            destination: destination.to_string(),
            subject: subject.to_string(),
            urgency,
            domain: domain.to_string(),
        });
        Ok(())
    }
}

// ===== MockChallengePublisher =====

pub struct MockChallengePublisher {
    published: Mutex<Vec<(String, String, String)>>,
    unpublished: Mutex<Vec<(String, String)>>,
}

impl MockChallengePublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            unpublished: Mutex::new(Vec::new()),
        }
    }

    pub async fn published(&self) -> Vec<(String, String, String)> {
        self.published.lock().await.clone()
    }

    pub async fn unpublished(&self) -> Vec<(String, String)> {
        self.unpublished.lock().await.clone()
    }
}

#[async_trait]
impl ChallengePublisher for MockChallengePublisher {
    async fn publish(&self, domain: &str, token: &str, key_authorization: &str) -> CoreResult<()> {
        self.published.lock().await.push((
            domain.to_string(),
            token.to_string(),
            key_authorization.to_string(),
        ));
        Ok(())
    }

    async fn unpublish(&self, domain: &str, token: &str) -> CoreResult<()> {
        self.unpublished
            .lock()
            .await
            .push((domain.to_string(), token.to_string()));
        Ok(())
    }
}

// ===== ScriptedProber =====

/// 按脚本返回探测结果的桩探测器
///
/// 脚本耗尽后重复返回 `fallback`；同时记录调用次数与并发峰值，
/// 用于验证重试次数与按域名串行化。
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeResult>>,
    fallback: ProbeResult,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hold: Duration,
}

impl ScriptedProber {
    pub fn new(script: Vec<ProbeResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: ProbeResult::failure("Connection timed out"),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold: Duration::ZERO,
        }
    }

    pub fn always(result: ProbeResult) -> Self {
        let mut prober = Self::new(Vec::new());
        prober.fallback = result;
        prober
    }

    /// 每次探测挂起指定时长（放大并发窗口）
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateProber for ScriptedProber {
    async fn probe(&self, _host: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        let result = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// 构造一个 `days` 天后过期的成功探测结果
pub fn probe_success(days: i64) -> ProbeResult {
    let now = Utc::now();
    // 额外加 12 小时，保证 num_days 向下取整后仍是 days
    let expiry = now + chrono::Duration::days(days) + chrono::Duration::hours(12);
    ProbeResult {
        accessible: true,
        error_message: None,
        failure_kind: ProbeFailureKind::Transient,
        expiry_date: Some(expiry),
        not_before_date: Some(now - chrono::Duration::days(30)),
        subject_name: Some("CN=example.com".to_string()),
        issuer_name: Some("CN=Test CA".to_string()),
        serial_number: Some("1A2B3C".to_string()),
        days_until_expiry: days,
    }
}

/// 构造一个证书已过期的失败探测结果（元数据保留）
pub fn probe_expired() -> ProbeResult {
    let now = Utc::now();
    ProbeResult {
        accessible: false,
        error_message: Some("Certificate has expired".to_string()),
        failure_kind: ProbeFailureKind::ValidityWindow,
        expiry_date: Some(now - chrono::Duration::days(10)),
        not_before_date: Some(now - chrono::Duration::days(100)),
        subject_name: Some("CN=example.com".to_string()),
        issuer_name: Some("CN=Test CA".to_string()),
        serial_number: Some("1A2B3C".to_string()),
        days_until_expiry: -10,
    }
}

// ===== StubAuthority =====

/// 桩订单行为
#[derive(Debug, Clone)]
pub enum StubOrderBehavior {
    /// 轮询 `polls` 次后挑战通过，最终签发 `cert_pem`
    IssueAfterPolls { polls: u32, cert_pem: String },
    /// 挑战验证失败（终态）
    ChallengeInvalid,
}

pub struct StubAuthority {
    behavior: StubOrderBehavior,
    orders_created: AtomicUsize,
}

impl StubAuthority {
    pub fn new(behavior: StubOrderBehavior) -> Self {
        Self {
            behavior,
            orders_created: AtomicUsize::new(0),
        }
    }

    /// 默认桩：一次轮询即通过，签发 90 天有效期的证书
    pub fn issuing(domain: &str) -> Self {
        Self::new(StubOrderBehavior::IssueAfterPolls {
            polls: 1,
            cert_pem: test_cert_pem(domain, Utc::now() + chrono::Duration::days(90)),
        })
    }

    pub fn orders_created(&self) -> usize {
        self.orders_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenewalAuthority for StubAuthority {
    async fn new_order(&self, domain: &str) -> CoreResult<Box<dyn CertificateOrder>> {
        self.orders_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubOrder {
            domain: domain.to_string(),
            behavior: self.behavior.clone(),
            polls_left: match &self.behavior {
                StubOrderBehavior::IssueAfterPolls { polls, .. } => *polls,
                StubOrderBehavior::ChallengeInvalid => 0,
            },
            finalized: false,
        }))
    }
}

struct StubOrder {
    domain: String,
    behavior: StubOrderBehavior,
    polls_left: u32,
    finalized: bool,
}

#[async_trait]
impl CertificateOrder for StubOrder {
    async fn http_challenges(&mut self) -> CoreResult<Vec<HttpChallenge>> {
        Ok(vec![HttpChallenge {
            domain: self.domain.clone(),
            token: "stub-token".to_string(),
            key_authorization: "stub-token.thumbprint".to_string(),
            url: "https://authority.test/challenge/1".to_string(),
        }])
    }

    async fn trigger_challenge(&mut self, _challenge: &HttpChallenge) -> CoreResult<()> {
        Ok(())
    }

    async fn challenge_state(&mut self, _challenge: &HttpChallenge) -> CoreResult<ChallengeState> {
        match &self.behavior {
            StubOrderBehavior::ChallengeInvalid => Ok(ChallengeState::Invalid),
            StubOrderBehavior::IssueAfterPolls { .. } => {
                if self.polls_left > 1 {
                    self.polls_left -= 1;
                    Ok(ChallengeState::Triggered)
                } else {
                    Ok(ChallengeState::Valid)
                }
            }
        }
    }

    async fn finalize(&mut self, csr_der: &[u8]) -> CoreResult<()> {
        if csr_der.is_empty() {
            return Err(CoreError::RenewalProtocol {
                domain: self.domain.clone(),
                message: "empty CSR".to_string(),
            });
        }
        self.finalized = true;
        Ok(())
    }

    async fn certificate_chain(&mut self) -> CoreResult<Option<String>> {
        match &self.behavior {
            StubOrderBehavior::IssueAfterPolls { cert_pem, .. } if self.finalized => {
                Ok(Some(cert_pem.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// 用 rcgen 自签一张指定到期时间的 PEM 证书
pub fn test_cert_pem(domain: &str, not_after: DateTime<Utc>) -> String {
    #[allow(clippy::unwrap_used)]
    {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(vec![domain.to_string()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, domain);
        params.not_before =
            time::OffsetDateTime::from_unix_timestamp((Utc::now() - chrono::Duration::days(1)).timestamp())
                .unwrap();
        params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        cert.pem()
    }
}

// ===== 工厂方法 =====

/// 创建测试用 `ServiceContext`
pub fn create_test_context(
    prober: Arc<dyn CertificateProber>,
    authority: Arc<dyn RenewalAuthority>,
    config: EngineConfig,
) -> (
    Arc<ServiceContext>,
    Arc<MockDomainRepository>,
    Arc<MockNotificationTransport>,
    Arc<MockChallengePublisher>,
) {
    let repo = Arc::new(MockDomainRepository::new());
    let notifier = Arc::new(MockNotificationTransport::new());
    let publisher = Arc::new(MockChallengePublisher::new());

    let ctx = Arc::new(ServiceContext::new(
        repo.clone(),
        notifier.clone(),
        publisher.clone(),
        prober,
        authority,
        config,
    ));

    (ctx, repo, notifier, publisher)
}
