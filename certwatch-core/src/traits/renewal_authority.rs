//! ACME 授权服务抽象 Trait
//!
//! 把订单 / 授权 / 挑战 / 最终化的协议交互收敛到两个 trait 后，
//! 续期状态机可以在测试里用桩实现驱动，生产环境由
//! `services::acme::AcmeAuthority` 对接真实授权服务。

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{ChallengeState, HttpChallenge};

/// 证书授权服务 Trait
#[async_trait]
pub trait RenewalAuthority: Send + Sync {
    /// 为指定域名开出一张新订单
    ///
    /// 实现方负责账户密钥对的创建或复用。
    async fn new_order(&self, domain: &str) -> CoreResult<Box<dyn CertificateOrder>>;
}

/// 单张证书订单 Trait
///
/// 方法按协议顺序调用：`http_challenges` → `trigger_challenge` →
/// `challenge_state`（轮询）→ `finalize` → `certificate_chain`。
#[async_trait]
pub trait CertificateOrder: Send {
    /// 列出订单所需的 HTTP-01 挑战（每个授权一个）
    async fn http_challenges(&mut self) -> CoreResult<Vec<HttpChallenge>>;

    /// 通知授权服务器开始验证指定挑战
    async fn trigger_challenge(&mut self, challenge: &HttpChallenge) -> CoreResult<()>;

    /// 查询指定挑战的当前状态
    async fn challenge_state(&mut self, challenge: &HttpChallenge) -> CoreResult<ChallengeState>;

    /// 提交 CSR（DER 编码）完成订单
    async fn finalize(&mut self, csr_der: &[u8]) -> CoreResult<()>;

    /// 获取签发的证书链（PEM）；尚未签发时返回 `None`
    async fn certificate_chain(&mut self) -> CoreResult<Option<String>>;
}
