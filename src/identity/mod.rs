//! 外部身份校验模块
//!
//! 连接外部身份服务（正版校验接口）判断一个账号名是否经过
//! 官方认证，认证通过的玩家可以在连接时免密自动登录。
//!
//! 校验结果进入按小写账号名索引的 TTL 缓存；外部服务超时或
//! 出错只会向上返回错误，调用方按"未认证"降级处理，错误
//! 永远不会被缓存。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use authgate::identity::{CachedIdentityVerifier, HttpIdentityVerifier, IdentityVerifier, VerifierConfig};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = VerifierConfig::default();
//! let http = HttpIdentityVerifier::new(&config).unwrap();
//! let verifier = CachedIdentityVerifier::new(Arc::new(http), config.cache_ttl);
//!
//! match verifier.verify("steve").await {
//!     Ok(true) => println!("已认证"),
//!     Ok(false) => println!("未认证"),
//!     Err(e) => println!("无法校验: {}", e),
//! }
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, VerificationError};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// 默认的正版档案查询接口
pub const DEFAULT_ENDPOINT: &str = "https://api.mojang.com/users/profiles/minecraft";

// ============================================================================
// 配置
// ============================================================================

/// 外部身份校验配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// 档案查询接口，账号名会拼接在末尾
    pub endpoint: String,
    /// 单次请求的硬超时（默认 5 秒）
    pub timeout: Duration,
    /// 校验结果缓存时长（默认 30 分钟）
    pub cache_ttl: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl VerifierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置查询接口
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// 设置请求超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置缓存时长
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::internal("endpoint must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(Error::internal("timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// 校验接口
// ============================================================================

/// 外部身份校验接口
///
/// `Ok(true)` 表示账号名通过了外部认证，`Ok(false)` 表示明确
/// 未认证，`Err` 表示这次没问出答案（超时、网络故障）。
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, name: &str) -> Result<bool>;
}

// ============================================================================
// HTTP 实现
// ============================================================================

/// 基于档案查询接口的 HTTP 校验实现
///
/// 接口语义：HTTP 200 即认证账号，其余状态码视为未认证。
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpIdentityVerifier {
    pub fn new(config: &VerifierConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| VerificationError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, name: &str) -> Result<bool> {
        let url = format!("{}/{}", self.endpoint, urlencoding::encode(name));

        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| VerificationError::Timeout)?
            .map_err(|e| VerificationError::Unavailable(e.to_string()))?;

        let verified = response.status() == reqwest::StatusCode::OK;
        tracing::debug!(name, verified, "external identity lookup");
        Ok(verified)
    }
}

// ============================================================================
// TTL 缓存
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    verified: bool,
    cached_at: DateTime<Utc>,
}

/// 带 TTL 缓存的校验器包装
///
/// 缓存键为小写账号名。只有拿到明确答案才会缓存，上游错误
/// 原样向上传递，下次调用会重新发起请求。
pub struct CachedIdentityVerifier {
    inner: Arc<dyn IdentityVerifier>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl CachedIdentityVerifier {
    pub fn new(inner: Arc<dyn IdentityVerifier>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }

    /// 清除某个账号名的缓存
    pub fn invalidate(&self, name: &str) {
        self.cache.write().unwrap().remove(&name.to_lowercase());
    }

    /// 当前缓存条目数（含未被清理的过期条目）
    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    /// 清理过期条目，返回清掉的数量
    pub fn sweep(&self) -> usize {
        let deadline = Utc::now() - self.ttl_chrono();
        let mut cache = self.cache.write().unwrap();
        let before = cache.len();
        cache.retain(|_, entry| entry.cached_at > deadline);
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted stale verification results");
        }
        evicted
    }
}

#[async_trait]
impl IdentityVerifier for CachedIdentityVerifier {
    async fn verify(&self, name: &str) -> Result<bool> {
        let key = name.to_lowercase();
        let deadline = Utc::now() - self.ttl_chrono();

        if let Some(entry) = self.cache.read().unwrap().get(&key)
            && entry.cached_at > deadline
        {
            return Ok(entry.verified);
        }

        let verified = self.inner.verify(name).await?;
        self.cache.write().unwrap().insert(
            key,
            CacheEntry {
                verified,
                cached_at: Utc::now(),
            },
        );
        Ok(verified)
    }
}
