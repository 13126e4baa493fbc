//! 通知投递抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::Urgency;

/// 通知投递 Trait
///
/// 引擎只计算主题与级别，正文模板由实现方负责。
/// 投递失败由引擎做有界重试，永远不会影响域名记录本身。
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// 投递一条到期提醒
    ///
    /// # Arguments
    /// * `destination` - 收件地址
    /// * `subject` - 引擎生成的确定性主题
    /// * `urgency` - 提醒级别
    /// * `domain` - 触发提醒的域名
    async fn deliver(
        &self,
        destination: &str,
        subject: &str,
        urgency: Urgency,
        domain: &str,
    ) -> CoreResult<()>;
}
