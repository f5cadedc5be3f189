//! 账号找回模块
//!
//! 两条找回路径：管理员签发的一次性找回令牌，以及用户预设的
//! 安全问题。令牌保存在内存里（重启即作废），安全问题走凭据
//! 存储持久化。
//!
//! ## 令牌示例
//!
//! ```rust
//! use authgate::recovery::{RecoveryConfig, RecoveryEngine};
//! use uuid::Uuid;
//!
//! let engine = RecoveryEngine::new(RecoveryConfig::default());
//! let identity = Uuid::new_v4();
//!
//! let issued = engine.issue_token(&identity).unwrap();
//!
//! // 校验不消费
//! assert_eq!(engine.validate(&issued.token), Some(identity));
//!
//! // 消费后作废
//! assert_eq!(engine.consume(&issued.token), Some(identity));
//! assert_eq!(engine.validate(&issued.token), None);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::random::generate_recovery_token;
use crate::store::{CredentialStore, InMemoryCredentialStore, RecoveryQa, normalize_answer};

// ============================================================================
// 配置
// ============================================================================

/// 找回令牌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// 令牌有效期（默认 24 小时）
    pub token_ttl: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RecoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置令牌有效期
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<()> {
        if self.token_ttl.is_zero() {
            return Err(Error::internal("token_ttl must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// 令牌
// ============================================================================

/// 签发出的找回令牌
#[derive(Debug, Clone)]
pub struct IssuedRecoveryToken {
    /// 令牌值（URL 安全 Base64）
    pub token: String,
    /// 绑定的身份
    pub identity: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TokenEntry {
    identity: Uuid,
    expires_at: DateTime<Utc>,
}

// ============================================================================
// 引擎
// ============================================================================

/// 账号找回引擎
pub struct RecoveryEngine {
    store: Arc<dyn CredentialStore>,
    config: RecoveryConfig,
    tokens: RwLock<HashMap<String, TokenEntry>>,
}

impl RecoveryEngine {
    /// 使用默认内存存储创建引擎
    pub fn new(config: RecoveryConfig) -> Self {
        Self::with_store(Arc::new(InMemoryCredentialStore::new()), config)
    }

    /// 使用共享存储创建引擎
    pub fn with_store(store: Arc<dyn CredentialStore>, config: RecoveryConfig) -> Self {
        Self {
            store,
            config,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// 获取配置
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// 为身份签发一个找回令牌
    ///
    /// 签发时顺手清理已过期的旧令牌。同一身份可以持有多个
    /// 未过期令牌，每个都只能用一次。
    pub fn issue_token(&self, identity: &Uuid) -> Result<IssuedRecoveryToken> {
        let token = generate_recovery_token()?;
        let issued_at = Utc::now();
        let expires_at =
            issued_at + chrono::Duration::seconds(self.config.token_ttl.as_secs() as i64);

        let mut tokens = self.tokens.write().unwrap();
        tokens.retain(|_, entry| entry.expires_at > issued_at);
        tokens.insert(
            token.clone(),
            TokenEntry {
                identity: *identity,
                expires_at,
            },
        );

        tracing::debug!(%identity, "recovery token issued");
        Ok(IssuedRecoveryToken {
            token,
            identity: *identity,
            issued_at,
            expires_at,
        })
    }

    /// 校验令牌，不消费
    ///
    /// 过期令牌视同不存在，并在发现时顺手删除。
    pub fn validate(&self, token: &str) -> Option<Uuid> {
        let now = Utc::now();
        {
            let tokens = self.tokens.read().unwrap();
            match tokens.get(token) {
                Some(entry) if entry.expires_at > now => return Some(entry.identity),
                Some(_) => {}
                None => return None,
            }
        }
        // 已过期，升级为写锁清掉
        self.tokens.write().unwrap().remove(token);
        None
    }

    /// 消费令牌（单次使用）
    ///
    /// 返回绑定的身份；令牌不存在或已过期返回 `None`。同一令牌
    /// 不可能被消费两次。
    pub fn consume(&self, token: &str) -> Option<Uuid> {
        let entry = self.tokens.write().unwrap().remove(token)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        tracing::debug!(identity = %entry.identity, "recovery token consumed");
        Some(entry.identity)
    }

    /// 撤销身份名下的全部令牌
    pub fn revoke_all(&self, identity: &Uuid) -> usize {
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, entry| entry.identity != *identity);
        before - tokens.len()
    }

    /// 当前未过期令牌数量
    pub fn active_token_count(&self) -> usize {
        let now = Utc::now();
        self.tokens
            .read()
            .unwrap()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    // ========================================================================
    // 安全问题
    // ========================================================================

    /// 设置安全问题，答案在存储前归一化（去首尾空白、转小写）
    pub async fn set_question(
        &self,
        identity: &Uuid,
        question: impl Into<String>,
        answer: &str,
    ) -> Result<()> {
        if normalize_answer(answer).is_empty() {
            return Err(crate::error::ValidationError::EmptyField("answer".to_string()).into());
        }
        self.store
            .set_recovery_qa(RecoveryQa::new(*identity, question, answer))
            .await
    }

    /// 读取身份设置的安全问题
    pub async fn question(&self, identity: &Uuid) -> Result<Option<String>> {
        Ok(self
            .store
            .get_recovery_qa(identity)
            .await?
            .map(|qa| qa.question))
    }

    /// 核对安全问题答案，未设置时一律返回 `false`
    pub async fn check_answer(&self, identity: &Uuid, answer: &str) -> Result<bool> {
        Ok(self
            .store
            .get_recovery_qa(identity)
            .await?
            .is_some_and(|qa| qa.answer_matches(answer)))
    }

    /// 清除安全问题，幂等
    pub async fn clear_question(&self, identity: &Uuid) -> Result<()> {
        self.store.delete_recovery_qa(identity).await
    }
}
