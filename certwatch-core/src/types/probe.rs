//! 探测结果类型定义

use chrono::{DateTime, Utc};

/// 探测失败的类别
///
/// 网络与握手类失败可能是瞬时的，值得重试；证书在有效期窗口
/// 之外是确定性结论，重试不会改变结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbeFailureKind {
    /// 网络或握手失败（DNS、连接、超时、TLS 协商）
    #[default]
    Transient,
    /// 叶子证书未生效或已过期
    ValidityWindow,
}

/// 单次 TLS 探测的结果（仅在内存中流转，不持久化）
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    /// 是否成功取得有效期内的叶子证书
    pub accessible: bool,
    /// 失败原因（人类可读，不含堆栈）
    pub error_message: Option<String>,
    /// 失败类别（仅在 `accessible == false` 时有意义）
    pub failure_kind: ProbeFailureKind,
    /// 证书到期时间
    pub expiry_date: Option<DateTime<Utc>>,
    /// 证书生效时间
    pub not_before_date: Option<DateTime<Utc>>,
    /// 证书主体
    pub subject_name: Option<String>,
    /// 签发者
    pub issuer_name: Option<String>,
    /// 序列号（大写十六进制）
    pub serial_number: Option<String>,
    /// 距到期天数（向下取整）
    pub days_until_expiry: i64,
}

impl ProbeResult {
    /// 构造失败结果（默认按瞬时失败处理）
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            accessible: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// 失败是否值得重试
    #[must_use]
    pub fn is_retryable_failure(&self) -> bool {
        !self.accessible && self.failure_kind == ProbeFailureKind::Transient
    }

    /// 生成确定性的多行证书摘要
    ///
    /// 字段顺序固定：Subject、Issuer、Valid From、Valid Until、
    /// Serial Number、Days until expiry。
    #[must_use]
    pub fn details(&self) -> String {
        let fmt = |dt: &Option<DateTime<Utc>>| {
            dt.map_or_else(String::new, |d| d.to_rfc3339())
        };
        format!(
            "Subject: {}\nIssuer: {}\nValid From: {}\nValid Until: {}\nSerial Number: {}\nDays until expiry: {}",
            self.subject_name.as_deref().unwrap_or(""),
            self.issuer_name.as_deref().unwrap_or(""),
            fmt(&self.not_before_date),
            fmt(&self.expiry_date),
            self.serial_number.as_deref().unwrap_or(""),
            self.days_until_expiry,
        )
    }
}
