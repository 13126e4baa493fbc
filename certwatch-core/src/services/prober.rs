//! TLS 证书探测模块
//!
//! 使用 rustls 实现纯异步的叶子证书探测。本系统关心的是
//! “证书是否临近过期”，而不是“证书链是否可信”，因此握手
//! 时接受任意服务端证书（见 [`AcceptAnyServerCert`]），只读取
//! 叶子证书的有效期与身份字段。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, trace, warn};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::config::EngineConfig;
use crate::types::{ProbeFailureKind, ProbeResult};

const HTTPS_PORT: u16 = 443;

/// TLS 探测器抽象
///
/// 重试控制器与批处理只依赖此 trait，测试中用桩实现替换网络探测。
#[async_trait]
pub trait CertificateProber: Send + Sync {
    /// 探测 `host:443` 并提取叶子证书信息；探测失败不返回 `Err`，
    /// 失败原因在 [`ProbeResult::error_message`] 中给出。
    async fn probe(&self, host: &str) -> ProbeResult;
}

/// 初始化 rustls CryptoProvider（仅初始化一次）
fn ensure_crypto_provider() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(e) = CryptoProvider::install_default(rustls::crypto::ring::default_provider()) {
            error!(
                "FATAL: Failed to install rustls crypto provider: {e:?}. \
                 This is a critical initialization error. The application cannot continue."
            );
            panic!("Failed to install default rustls crypto provider: {e:?}");
        }
    });
}

/// 接受任意服务端证书的校验器
///
/// 有意为之：本引擎测量的是叶子证书的有效期窗口，链信任校验
/// 会把“证书已过期但服务仍在线”这类最需要告警的场景挡在握手
/// 阶段。请勿在未重新评估需求的情况下替换为真实校验。
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
        ]
    }
}

/// 生产环境 TLS 探测器
pub struct TlsProber {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TlsProber {
    /// 按引擎配置创建探测器
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    /// 仅协商 TLS 1.2 / 1.3，接受任意服务端证书
    fn client_config() -> Arc<ClientConfig> {
        let config = ClientConfig::builder_with_protocol_versions(&[
            &rustls::version::TLS13,
            &rustls::version::TLS12,
        ])
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth();
        Arc::new(config)
    }

    /// 从协商会话的叶子证书提取探测结果
    fn parse_leaf(host: &str, cert_der: &[u8], now: DateTime<Utc>) -> ProbeResult {
        let (_, cert) = match X509Certificate::from_der(cert_der) {
            Ok(c) => c,
            Err(e) => {
                warn!("[probe] Certificate parsing failed for {host}: {e}");
                return ProbeResult::failure(format!("Certificate check failed: {e}"));
            }
        };

        let validity = cert.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0);
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0);
        let (Some(not_before), Some(not_after)) = (not_before, not_after) else {
            return ProbeResult::failure("Certificate check failed: invalid validity timestamps");
        };

        let subject = cert.subject().to_string();
        let issuer = cert.issuer().to_string();
        let serial = cert.serial.to_str_radix(16).to_uppercase();
        let days_until_expiry = (not_after - now).num_days();

        let mut result = ProbeResult {
            accessible: false,
            error_message: None,
            failure_kind: ProbeFailureKind::Transient,
            expiry_date: Some(not_after),
            not_before_date: Some(not_before),
            subject_name: Some(subject),
            issuer_name: Some(issuer),
            serial_number: Some(serial),
            days_until_expiry,
        };

        if now < not_before {
            result.error_message = Some("Certificate is not yet valid".to_string());
            result.failure_kind = ProbeFailureKind::ValidityWindow;
            return result;
        }
        if now > not_after {
            result.error_message = Some("Certificate has expired".to_string());
            result.failure_kind = ProbeFailureKind::ValidityWindow;
            return result;
        }

        result.accessible = true;
        result
    }
}

#[async_trait]
impl CertificateProber for TlsProber {
    async fn probe(&self, host: &str) -> ProbeResult {
        // 确保 CryptoProvider 已初始化
        ensure_crypto_provider();

        debug!("[probe] Starting check for {host}:{HTTPS_PORT}");
        let start_time = std::time::Instant::now();
        let addr = format!("{host}:{HTTPS_PORT}");

        // 1. DNS 解析（单独一步，失败信息与连接失败区分开）
        trace!("[probe] Resolving {host}...");
        let mut addrs = match timeout(self.connect_timeout, tokio::net::lookup_host(&addr)).await {
            Ok(Ok(addrs)) => addrs.peekable(),
            Ok(Err(e)) => {
                warn!("[probe] DNS resolution failed for {host}: {e}");
                return ProbeResult::failure(format!("DNS resolution failed: {e}"));
            }
            Err(_) => {
                warn!("[probe] DNS resolution timed out for {host}");
                return ProbeResult::failure(format!("DNS resolution failed: {host}"));
            }
        };
        if addrs.peek().is_none() {
            warn!("[probe] DNS returned no addresses for {host}");
            return ProbeResult::failure(format!("DNS resolution failed: {host}"));
        }

        // 2. 建立 TCP 连接（带超时）
        trace!("[probe] Establishing TCP connection...");
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(s)) => {
                trace!(
                    "[probe] TCP connection succeeded, took {:?}",
                    start_time.elapsed()
                );
                s
            }
            Ok(Err(e)) => {
                warn!("[probe] TCP connection failed for {host}: {e}");
                return ProbeResult::failure(format!("Connection failed: {e}"));
            }
            Err(_) => {
                warn!(
                    "[probe] TCP connection timeout for {host} ({}s)",
                    self.connect_timeout.as_secs()
                );
                return ProbeResult::failure("Connection timed out");
            }
        };

        // 3. TLS 握手（带超时）
        let connector = TlsConnector::from(Self::client_config());
        let Ok(server_name) = ServerName::try_from(host.to_string()) else {
            warn!("[probe] Invalid server name: {host}");
            return ProbeResult::failure(format!("Certificate check failed: invalid host {host}"));
        };

        trace!("[probe] Performing TLS handshake...");
        let tls_stream = match timeout(self.read_timeout, connector.connect(server_name, stream))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("[probe] TLS handshake failed for {host}: {e}");
                return ProbeResult::failure(format!("TLS handshake failed: {e}"));
            }
            Err(_) => {
                warn!(
                    "[probe] TLS handshake timeout for {host} ({}s)",
                    self.read_timeout.as_secs()
                );
                return ProbeResult::failure("TLS handshake timed out");
            }
        };

        // 4. 提取叶子证书
        let (_, tls_conn) = tls_stream.get_ref();
        let cert_der = match tls_conn.peer_certificates() {
            Some([leaf, ..]) => leaf.as_ref().to_vec(),
            _ => {
                warn!("[probe] No certificates presented by {host}");
                return ProbeResult::failure(format!("No certificates found for domain: {host}"));
            }
        };

        let result = Self::parse_leaf(host, &cert_der, Utc::now());
        debug!(
            "[probe] Check completed for {host}: accessible={}, days_until_expiry={}, total_time={:?}",
            result.accessible,
            result.days_until_expiry,
            start_time.elapsed()
        );
        result
    }
}
