//! 引擎配置
//!
//! 所有超时、重试与阈值集中在此，由平台层反序列化注入。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Let's Encrypt 生产环境目录地址
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt 测试环境目录地址
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// 证书生命周期引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// TCP 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// TLS 握手 / 读取超时（秒）
    pub read_timeout_secs: u64,
    /// 单次检查的最大探测次数
    pub max_retries: u32,
    /// 两次探测之间的固定延迟（秒）
    pub retry_delay_secs: u64,
    /// 触发普通提醒的剩余天数阈值
    pub notify_threshold_days: i64,
    /// 触发紧急提醒的剩余天数阈值
    pub urgent_threshold_days: i64,
    /// 通知投递的最大尝试次数
    pub notify_max_attempts: u32,
    /// 通知并发上限
    pub notify_concurrency: usize,
    /// 全量复查周期（秒，默认 12 小时）
    pub recheck_interval_secs: u64,
    /// 续期资格检查周期（秒，默认 24 小时）
    pub renewal_interval_secs: u64,
    /// 证书到期前多少天开始续期
    pub renewal_threshold_days: i64,
    /// 每个批次任务的并发上限
    pub job_concurrency: usize,
    /// ACME 挑战状态轮询间隔（秒）
    pub challenge_poll_interval_secs: u64,
    /// 单个域名续期的总超时（秒）
    pub renewal_timeout_secs: u64,
    /// ACME 目录地址
    pub acme_directory: String,
    /// ACME 账户联系邮箱
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acme_contact_email: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 2,
            notify_threshold_days: 30,
            urgent_threshold_days: 7,
            notify_max_attempts: 3,
            notify_concurrency: 4,
            recheck_interval_secs: 12 * 60 * 60,
            renewal_interval_secs: 24 * 60 * 60,
            renewal_threshold_days: 30,
            job_concurrency: 4,
            challenge_poll_interval_secs: 3,
            renewal_timeout_secs: 120,
            acme_directory: LETS_ENCRYPT_PRODUCTION.to_string(),
            acme_contact_email: None,
        }
    }
}

impl EngineConfig {
    /// TCP 连接超时
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// TLS 握手 / 读取超时
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// 探测重试间隔
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// ACME 挑战轮询间隔
    #[must_use]
    pub fn challenge_poll_interval(&self) -> Duration {
        Duration::from_secs(self.challenge_poll_interval_secs)
    }

    /// 单域名续期总超时
    #[must_use]
    pub fn renewal_timeout(&self) -> Duration {
        Duration::from_secs(self.renewal_timeout_secs)
    }
}
