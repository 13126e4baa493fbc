//! 域名记录持久化抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::DomainRecord;

/// 域名记录仓库 Trait
///
/// 平台实现负责持久化格式；引擎保证同一 `domain_name`
/// 的写入永远被串行化（见 `services::DomainLocks`）。
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// 按规范化域名查找记录
    async fn find_by_name(&self, domain_name: &str) -> CoreResult<Option<DomainRecord>>;

    /// 获取所有记录
    async fn find_all(&self) -> CoreResult<Vec<DomainRecord>>;

    /// 获取所有开启自动续期的记录
    async fn find_by_auto_renewal_true(&self) -> CoreResult<Vec<DomainRecord>>;

    /// 保存记录（无 id 时由实现分配）
    ///
    /// # Returns
    /// 保存后的记录（含分配的 id）
    async fn save(&self, record: &DomainRecord) -> CoreResult<DomainRecord>;

    /// 记录是否存在
    async fn exists_by_id(&self, id: &str) -> CoreResult<bool>;

    /// 删除记录
    async fn delete_by_id(&self, id: &str) -> CoreResult<()>;
}
