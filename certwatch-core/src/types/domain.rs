//! 域名记录类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `certificate_details` 字段的最大长度（对应存储层列宽）
pub const CERTIFICATE_DETAILS_MAX_LEN: usize = 2048;

/// 证书状态
///
/// 有意只保留三个状态：从未探测过的记录是 `Unknown`，
/// 探测成功且在有效期内是 `Valid`，其余一律 `Error`。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertificateStatus {
    /// 证书有效
    Valid,
    /// 探测失败或证书已失效
    Error,
    /// 从未探测
    #[default]
    Unknown,
}

/// 域名记录
///
/// 由外部存储层持久化；本引擎只通过 [`crate::traits::DomainRepository`] 读写。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    /// 记录 ID（由存储层分配）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 规范化后的域名（唯一）
    pub domain_name: String,
    /// 证书状态
    #[serde(default)]
    pub certificate_status: CertificateStatus,
    /// 证书到期时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_expiry_date: Option<DateTime<Utc>>,
    /// 最后检查时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    /// 最后续期时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_renewal: Option<DateTime<Utc>>,
    /// 证书详情摘要（诊断用，长度有界）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_details: Option<String>,
    /// 是否自动续期
    #[serde(default = "default_auto_renewal")]
    pub auto_renewal: bool,
    /// 到期提醒邮箱
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
}

fn default_auto_renewal() -> bool {
    true
}

impl DomainRecord {
    /// 创建一条新记录（未探测状态）
    #[must_use]
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            id: None,
            domain_name: domain_name.into(),
            certificate_status: CertificateStatus::Unknown,
            certificate_expiry_date: None,
            last_checked: None,
            last_renewal: None,
            certificate_details: None,
            auto_renewal: true,
            notification_email: None,
        }
    }

    /// 设置证书详情，超出列宽时截断
    pub fn set_details(&mut self, details: impl Into<String>) {
        let mut details = details.into();
        if details.len() > CERTIFICATE_DETAILS_MAX_LEN {
            // 按字符边界截断，避免破坏 UTF-8；字符的末尾不得越过列宽
            details = details
                .char_indices()
                .take_while(|&(i, c)| i + c.len_utf8() <= CERTIFICATE_DETAILS_MAX_LEN)
                .map(|(_, c)| c)
                .collect();
        }
        self.certificate_details = Some(details);
    }
}
