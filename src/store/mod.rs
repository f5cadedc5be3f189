//! 凭据持久化模块
//!
//! 定义身份到凭据、两步验证记录、找回问答的持久化接口，以及
//! 两个实现：进程内存版（测试、嵌入场景）和单文件 JSON 版。
//!
//! 约定："记录不存在" 用 `Ok(None)` 表达，`Err` 只代表真正的
//! 存储故障；删除不存在的记录是无害的空操作。调用方只面向
//! [`CredentialStore`] trait，不关心背后是哪种实现。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::store::{Credential, CredentialStore, InMemoryCredentialStore};
//! use uuid::Uuid;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = InMemoryCredentialStore::new();
//! let player = Uuid::new_v4();
//!
//! store
//!     .set_credential(Credential::new(player, "$argon2id$...".to_string()))
//!     .await
//!     .unwrap();
//!
//! assert!(store.get_credential(&player).await.unwrap().is_some());
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::InMemoryCredentialStore;

/// 一条登录凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// 凭据归属的身份
    pub identity: Uuid,

    /// 密码摘要（自带算法前缀）
    pub hash: String,

    /// 注册时间
    pub created_at: DateTime<Utc>,

    /// 最后一次改密时间
    pub last_changed_at: DateTime<Utc>,
}

impl Credential {
    /// 用新生成的摘要创建凭据
    pub fn new(identity: Uuid, hash: String) -> Self {
        let now = Utc::now();
        Self {
            identity,
            hash,
            created_at: now,
            last_changed_at: now,
        }
    }

    /// 替换摘要并刷新改密时间
    pub fn with_new_hash(mut self, hash: String) -> Self {
        self.hash = hash;
        self.last_changed_at = Utc::now();
        self
    }
}

/// 一条两步验证记录
///
/// `enabled_at` 为 `None` 表示密钥已生成但用户尚未用验证码确认，
/// 属于持久化的 "待确认" 状态；确认成功后写入时间戳。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorRecord {
    /// 记录归属的身份
    pub identity: Uuid,

    /// Base32 编码的 TOTP 密钥
    pub secret_base32: String,

    /// 剩余可用的备用码（一次一用，只减不增）
    pub backup_codes: Vec<String>,

    /// 确认启用的时间
    pub enabled_at: Option<DateTime<Utc>>,
}

impl TwoFactorRecord {
    /// 创建待确认的记录
    pub fn pending(identity: Uuid, secret_base32: String, backup_codes: Vec<String>) -> Self {
        Self {
            identity,
            secret_base32,
            backup_codes,
            enabled_at: None,
        }
    }

    /// 是否已确认启用
    pub fn is_enabled(&self) -> bool {
        self.enabled_at.is_some()
    }
}

/// 一条找回问答
///
/// 答案在写入前已做规范化（去首尾空白并转小写），比较时
/// 对输入做同样的变换。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryQa {
    /// 问答归属的身份
    pub identity: Uuid,

    /// 问题原文
    pub question: String,

    /// 规范化后的答案
    pub answer: String,
}

impl RecoveryQa {
    /// 创建问答，答案在此处规范化
    pub fn new(identity: Uuid, question: impl Into<String>, answer: &str) -> Self {
        Self {
            identity,
            question: question.into(),
            answer: normalize_answer(answer),
        }
    }

    /// 输入的答案是否匹配
    pub fn answer_matches(&self, input: &str) -> bool {
        crate::random::constant_time_compare_str(&normalize_answer(input), &self.answer)
    }
}

/// 答案规范化：去首尾空白、转小写
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// 凭据存储接口
///
/// 所有方法都可能涉及 I/O，因此是异步的；实现必须可以在
/// 多任务间共享（`Send + Sync`）。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 读取身份的登录凭据
    async fn get_credential(&self, identity: &Uuid) -> Result<Option<Credential>>;

    /// 写入（新建或覆盖）登录凭据
    async fn set_credential(&self, credential: Credential) -> Result<()>;

    /// 删除登录凭据；记录不存在时什么都不做
    async fn delete_credential(&self, identity: &Uuid) -> Result<()>;

    /// 读取身份的两步验证记录
    async fn get_two_factor(&self, identity: &Uuid) -> Result<Option<TwoFactorRecord>>;

    /// 写入（新建或覆盖）两步验证记录
    async fn set_two_factor(&self, record: TwoFactorRecord) -> Result<()>;

    /// 删除两步验证记录；记录不存在时什么都不做
    async fn delete_two_factor(&self, identity: &Uuid) -> Result<()>;

    /// 读取身份的找回问答
    async fn get_recovery_qa(&self, identity: &Uuid) -> Result<Option<RecoveryQa>>;

    /// 写入（新建或覆盖）找回问答
    async fn set_recovery_qa(&self, qa: RecoveryQa) -> Result<()>;

    /// 删除找回问答；记录不存在时什么都不做
    async fn delete_recovery_qa(&self, identity: &Uuid) -> Result<()>;
}
