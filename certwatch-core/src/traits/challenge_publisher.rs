//! HTTP-01 挑战发布抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;

/// 挑战发布 Trait
///
/// 实现方负责把 key authorization 暴露在目标域名的
/// `/.well-known/acme-challenge/{token}` 路径下；本引擎不提供 HTTP 服务。
#[async_trait]
pub trait ChallengePublisher: Send + Sync {
    /// 发布挑战内容
    async fn publish(&self, domain: &str, token: &str, key_authorization: &str) -> CoreResult<()>;

    /// 验证结束后撤下挑战内容
    async fn unpublish(&self, domain: &str, token: &str) -> CoreResult<()>;
}
