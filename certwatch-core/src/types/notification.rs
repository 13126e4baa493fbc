//! 到期提醒类型定义

use serde::{Deserialize, Serialize};

/// 提醒级别
///
/// 由剩余天数推导：<= 7 天为紧急，7 < 天数 <= 30 为普通，其余不提醒。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// 不提醒
    None,
    /// 普通提醒
    Normal,
    /// 紧急提醒
    Urgent,
}

impl Urgency {
    /// 根据剩余天数计算提醒级别
    #[must_use]
    pub fn for_days(days_until_expiry: i64) -> Self {
        Self::for_days_with(days_until_expiry, 7, 30)
    }

    /// 根据剩余天数与可配置阈值计算提醒级别
    #[must_use]
    pub fn for_days_with(days_until_expiry: i64, urgent_threshold: i64, notify_threshold: i64) -> Self {
        if days_until_expiry <= urgent_threshold {
            Self::Urgent
        } else if days_until_expiry <= notify_threshold {
            Self::Normal
        } else {
            Self::None
        }
    }

    /// 邮件主题前缀
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Urgent => "[URGENT]",
            Self::Normal => "[NOTICE]",
            Self::None => "",
        }
    }

    /// 生成确定性的邮件主题
    #[must_use]
    pub fn subject(self, domain: &str, days_until_expiry: i64) -> String {
        format!(
            "{} Certificate for {} expires in {} day(s)",
            self.marker(),
            domain,
            days_until_expiry
        )
    }
}
