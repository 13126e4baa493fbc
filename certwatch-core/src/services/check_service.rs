//! 证书检查服务
//!
//! 负责单域名检查的完整流程：规范化、按域名加锁、带重试的探测、
//! 状态分类、记录落库与到期通知分发。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::types::{CertificateStatus, DomainRecord, ProbeResult, Urgency};
use crate::utils::{domain_name, CancelToken};

/// 根据探测结果分类证书状态
///
/// 只有探测成功且当前时间早于到期时间才是 `Valid`，
/// 其余一律 `Error`。分类不关心信任链，只看有效期窗口。
#[must_use]
pub fn classify(probe: &ProbeResult, now: DateTime<Utc>) -> CertificateStatus {
    if probe.accessible {
        match probe.expiry_date {
            Some(expiry) if now < expiry => CertificateStatus::Valid,
            _ => CertificateStatus::Error,
        }
    } else {
        CertificateStatus::Error
    }
}

/// 证书检查服务
pub struct CheckService {
    ctx: Arc<ServiceContext>,
    /// 通知分发并发上限（投递失败的重试在许可内完成）
    notify_limit: Arc<Semaphore>,
}

impl CheckService {
    /// 创建检查服务
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let permits = ctx.config.notify_concurrency.max(1);
        Self {
            ctx,
            notify_limit: Arc::new(Semaphore::new(permits)),
        }
    }

    /// 立即检查一个域名（不可取消的便捷入口）
    pub async fn check_now(&self, raw: &str) -> CoreResult<DomainRecord> {
        self.check_with_retry(raw, &CancelToken::new()).await
    }

    /// 带重试的证书检查
    ///
    /// 对同一域名串行执行；失败的尝试之间等待固定延迟，
    /// 等待期间可被 `cancel` 中断。探测全部失败时记录仍会落库，
    /// 状态为 `Error`，详情为最后一次失败原因。
    pub async fn check_with_retry(
        &self,
        raw: &str,
        cancel: &CancelToken,
    ) -> CoreResult<DomainRecord> {
        let name = domain_name::normalize(raw);
        if name.is_empty() {
            return Err(CoreError::Validation(
                "domain name must not be empty".to_string(),
            ));
        }

        let _guard = self.ctx.locks.acquire(&name).await;

        let mut record = self
            .ctx
            .domain_repository
            .find_by_name(&name)
            .await?
            .unwrap_or_else(|| DomainRecord::new(&name));

        let max_attempts = self.ctx.config.max_retries.max(1);
        let mut last_error = String::from("Unknown error");
        let mut attempts_used = 0;

        for attempt in 1..=max_attempts {
            attempts_used = attempt;
            debug!("Checking certificate for domain {name} (attempt {attempt}/{max_attempts})");
            let probe = self.ctx.prober.probe(&name).await;

            if probe.accessible {
                return self.apply_success(record, &probe).await;
            }

            let retryable = probe.is_retryable_failure();
            last_error = probe
                .error_message
                .unwrap_or_else(|| "Certificate check failed".to_string());
            warn!("Certificate check attempt {attempt}/{max_attempts} failed for domain {name}: {last_error}");

            // 有效期窗口外是确定性结论，继续探测不会改变结果
            if !retryable {
                debug!("Failure for domain {name} is not transient, skipping remaining attempts");
                break;
            }

            if attempt < max_attempts {
                tokio::select! {
                    () = cancel.cancelled() => {
                        return Err(CoreError::Interrupted(format!(
                            "certificate check for {name} cancelled during retry delay"
                        )));
                    }
                    () = tokio::time::sleep(self.ctx.config.retry_delay()) => {}
                }
            }
        }

        // 失败同样是一次有效观测，落库为 Error
        error!("Certificate check failed for domain {name} after {attempts_used} attempt(s): {last_error}");
        record.certificate_status = CertificateStatus::Error;
        record.last_checked = Some(Utc::now());
        record.set_details(&last_error);
        let saved = self.ctx.domain_repository.save(&record).await?;
        Ok(saved)
    }

    /// 应用一次成功探测：更新记录、落库、按需分发通知
    async fn apply_success(
        &self,
        mut record: DomainRecord,
        probe: &ProbeResult,
    ) -> CoreResult<DomainRecord> {
        let now = Utc::now();
        record.last_checked = Some(now);
        record.certificate_expiry_date = probe.expiry_date;
        record.certificate_status = classify(probe, now);
        record.set_details(&probe.details());

        let saved = self.ctx.domain_repository.save(&record).await?;
        info!(
            "Certificate check completed for domain {}: status={:?}, days until expiry={}",
            saved.domain_name, saved.certificate_status, probe.days_until_expiry
        );

        self.maybe_notify(&saved, now);
        Ok(saved)
    }

    /// 到期临近时在后台分发通知
    ///
    /// 分发在独立任务中进行，受并发上限约束；投递失败只重试投递本身，
    /// 绝不影响已落库的检查结果。
    fn maybe_notify(&self, record: &DomainRecord, now: DateTime<Utc>) {
        let Some(expiry) = record.certificate_expiry_date else {
            return;
        };
        let Some(destination) = record
            .notification_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
        else {
            return;
        };

        let days = (expiry - now).num_days();
        let urgency = Urgency::for_days_with(
            days,
            self.ctx.config.urgent_threshold_days,
            self.ctx.config.notify_threshold_days,
        );
        if urgency == Urgency::None {
            return;
        }

        let transport = self.ctx.notification_transport.clone();
        let limit = self.notify_limit.clone();
        let max_attempts = self.ctx.config.notify_max_attempts.max(1);
        let domain = record.domain_name.clone();
        let subject = urgency.subject(&domain, days);

        tokio::spawn(async move {
            // Semaphore 永不关闭，acquire 失败只在进程收尾时发生
            let Ok(_permit) = limit.acquire_owned().await else {
                return;
            };
            for attempt in 1..=max_attempts {
                match transport
                    .deliver(&destination, &subject, urgency, &domain)
                    .await
                {
                    Ok(()) => {
                        info!("Expiry notification delivered for domain {domain} ({days} day(s) remaining)");
                        return;
                    }
                    Err(e) => {
                        warn!("Notification delivery attempt {attempt}/{max_attempts} failed for domain {domain}: {e}");
                        if attempt < max_attempts {
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        }
                    }
                }
            }
            error!("Giving up on expiry notification for domain {domain} after {max_attempts} attempts");
        });
    }
}
