//! 业务逻辑服务层

mod acme;
mod check_service;
mod prober;
mod renewal_service;
mod scheduler;

pub use acme::AcmeAuthority;
pub use check_service::{classify, CheckService};
pub use prober::{CertificateProber, TlsProber};
pub use renewal_service::RenewalService;
pub use scheduler::Scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::EngineConfig;
use crate::traits::{
    ChallengePublisher, DomainRepository, NotificationTransport, RenewalAuthority,
};

/// 按域名串行化的锁表
///
/// 同一 `domain_name` 在任意时刻最多只有一个检查或续期在途；
/// 后到的请求等待前一个完成。锁条目不回收，数量以受管域名数为上界。
#[derive(Clone, Default)]
pub struct DomainLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DomainLocks {
    /// 创建空锁表
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定域名的独占锁，已被占用时等待
    pub async fn acquire(&self, domain_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().await;
            table
                .entry(domain_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// 服务上下文 - 持有所有依赖
///
/// 平台层需要创建此上下文，并注入平台特定的存储、通知与挑战发布实现。
pub struct ServiceContext {
    /// 域名记录仓库
    pub domain_repository: Arc<dyn DomainRepository>,
    /// 通知投递
    pub notification_transport: Arc<dyn NotificationTransport>,
    /// HTTP-01 挑战发布
    pub challenge_publisher: Arc<dyn ChallengePublisher>,
    /// TLS 探测器
    pub prober: Arc<dyn CertificateProber>,
    /// ACME 授权服务
    pub renewal_authority: Arc<dyn RenewalAuthority>,
    /// 引擎配置
    pub config: EngineConfig,
    /// 按域名串行化的锁表（检查与续期共用）
    pub locks: DomainLocks,
}

impl ServiceContext {
    /// 创建服务上下文
    #[must_use]
    pub fn new(
        domain_repository: Arc<dyn DomainRepository>,
        notification_transport: Arc<dyn NotificationTransport>,
        challenge_publisher: Arc<dyn ChallengePublisher>,
        prober: Arc<dyn CertificateProber>,
        renewal_authority: Arc<dyn RenewalAuthority>,
        config: EngineConfig,
    ) -> Self {
        Self {
            domain_repository,
            notification_transport,
            challenge_publisher,
            prober,
            renewal_authority,
            config,
            locks: DomainLocks::new(),
        }
    }
}
