//! 批量调度服务
//!
//! 周期性地对全量域名复查证书、对临期域名发起自动续期。
//! 单个域名的失败只记日志，不影响批次内其它域名。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::{CheckService, RenewalService, ServiceContext};
use crate::types::DomainRecord;
use crate::utils::CancelToken;

/// 记录是否到达续期窗口
///
/// 从未检查过的记录（无到期时间）视为到期，交给续期流程兜底。
fn renewal_due(record: &DomainRecord, threshold: DateTime<Utc>) -> bool {
    record
        .certificate_expiry_date
        .is_none_or(|expiry| expiry < threshold)
}

/// 批量调度器
pub struct Scheduler {
    ctx: Arc<ServiceContext>,
    check_service: Arc<CheckService>,
    renewal_service: Arc<RenewalService>,
}

impl Scheduler {
    /// 创建调度器
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            check_service: Arc::new(CheckService::new(ctx.clone())),
            renewal_service: Arc::new(RenewalService::new(ctx.clone())),
            ctx,
        }
    }

    /// 启动周期任务，返回两个任务句柄（复查、续期）
    ///
    /// 每个周期任务在启动时立即执行一轮，之后按配置间隔触发；
    /// `cancel` 发出信号后任务在当前批次边界退出。
    #[must_use]
    pub fn start(self: Arc<Self>, cancel: CancelToken) -> Vec<JoinHandle<()>> {
        let recheck = {
            let this = self.clone();
            let cancel = cancel.clone();
            let period = std::time::Duration::from_secs(this.ctx.config.recheck_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => this.run_recheck_job(&cancel).await,
                    }
                }
                info!("Certificate recheck scheduler stopped");
            })
        };

        let renewal = {
            let this = self;
            let period = std::time::Duration::from_secs(this.ctx.config.renewal_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => this.run_renewal_job(&cancel).await,
                    }
                }
                info!("Certificate renewal scheduler stopped");
            })
        };

        vec![recheck, renewal]
    }

    /// 对全量域名执行一轮证书复查
    pub async fn run_recheck_job(&self, cancel: &CancelToken) {
        let records = match self.ctx.domain_repository.find_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Scheduled recheck aborted, repository unavailable: {e}");
                return;
            }
        };

        info!(
            "Starting scheduled certificate recheck for {} domain(s)",
            records.len()
        );
        futures::stream::iter(records)
            .for_each_concurrent(self.ctx.config.job_concurrency.max(1), |record| {
                let check = self.check_service.clone();
                async move {
                    match check.check_with_retry(&record.domain_name, cancel).await {
                        Ok(checked) => debug!(
                            "Scheduled check for domain {} finished: {:?}",
                            checked.domain_name, checked.certificate_status
                        ),
                        Err(e) if e.is_expected() => warn!(
                            "Scheduled check failed for domain {}: {e}",
                            record.domain_name
                        ),
                        Err(e) => error!(
                            "Scheduled check errored for domain {}: {e}",
                            record.domain_name
                        ),
                    }
                }
            })
            .await;
        info!("Scheduled certificate recheck completed");
    }

    /// 对临期且开启自动续期的域名发起一轮续期
    pub async fn run_renewal_job(&self, cancel: &CancelToken) {
        let records = match self.ctx.domain_repository.find_by_auto_renewal_true().await {
            Ok(records) => records,
            Err(e) => {
                error!("Scheduled renewal aborted, repository unavailable: {e}");
                return;
            }
        };

        let threshold = Utc::now() + chrono::Duration::days(self.ctx.config.renewal_threshold_days);
        let due: Vec<DomainRecord> = records
            .into_iter()
            .filter(|record| renewal_due(record, threshold))
            .collect();

        info!("{} domain(s) due for certificate renewal", due.len());
        futures::stream::iter(due)
            .for_each_concurrent(self.ctx.config.job_concurrency.max(1), |record| {
                let renewal = self.renewal_service.clone();
                async move {
                    match renewal
                        .renew_with_cancel(&record.domain_name, cancel)
                        .await
                    {
                        Ok(renewed) => info!(
                            "Automatic renewal for domain {} finished, new expiry {:?}",
                            renewed.domain_name, renewed.certificate_expiry_date
                        ),
                        Err(e) if e.is_expected() => warn!(
                            "Automatic renewal failed for domain {}: {e}",
                            record.domain_name
                        ),
                        Err(e) => error!(
                            "Automatic renewal errored for domain {}: {e}",
                            record.domain_name
                        ),
                    }
                }
            })
            .await;
        info!("Scheduled certificate renewal completed");
    }
}
