//! ACME 续期类型定义

use serde::{Deserialize, Serialize};

/// HTTP-01 挑战数据
///
/// 引擎只负责产生 `(token, key_authorization)`，由外部协作方
/// 发布到 `/.well-known/acme-challenge/{token}`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpChallenge {
    /// 被验证的域名
    pub domain: String,
    /// 挑战 token
    pub token: String,
    /// key authorization（token.指纹）
    pub key_authorization: String,
    /// 挑战对象在授权服务器上的地址
    pub url: String,
}

/// 单个挑战在授权服务器上的状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChallengeState {
    /// 等待触发
    Pending,
    /// 已触发，等待验证
    Triggered,
    /// 验证通过
    Valid,
    /// 验证失败（终态）
    Invalid,
}

/// 续期状态机
///
/// `Invalid` 挑战或订单失败从 `ChallengePending` / `ChallengeTriggered` /
/// `Finalizing` 进入 `Failed` 终态；记录只在 `Issued` 时一次性更新。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RenewalState {
    /// 会话已建立
    Created,
    /// 订单已开出，正在获取授权
    Authorizing,
    /// 挑战已发布，等待触发
    ChallengePending,
    /// 已通知授权服务器开始验证
    ChallengeTriggered,
    /// 所有挑战验证通过
    ChallengeValid,
    /// CSR 已提交
    Finalizing,
    /// 证书已签发并写回记录
    Issued,
    /// 续期失败（终态，记录未被改动）
    Failed,
}
