//! # AuthGate
//!
//! 游戏服务器的认证闸门库。
//!
//! 玩家连接后先被关进闸门：不能聊天、不能移动、不能改动世界，
//! 直到通过 `/register` 或 `/login` 完成认证。库本身不依赖任何
//! 具体的服务器实现，宿主只需要把连接、断开、行为事件和命令
//! 转发给 [`AuthOrchestrator`]。
//!
//! ## 功能特性
//!
//! - **密码哈希**: 使用 Argon2 和 bcrypt 进行安全的密码哈希，登录时自动升级旧格式
//! - **渐进式锁定**: 按身份和来源地址分别计数，锁定时长逐次翻倍
//! - **会话管理**: 闲置过期、活跃刷新、后台清扫
//! - **两步验证**: TOTP 验证码加一次性备用恢复码
//! - **账号找回**: 一次性找回令牌与安全问答
//! - **外部身份校验**: 可选的 HTTP 校验器，通过者免密自动登录
//! - **行为闸门**: 聊天/移动/建造/破坏/交互逐项放行或拦截
//! - **审计日志**: 结构化安全事件，内存或 tracing 两种落地
//!
//! ## Features
//!
//! 本库使用 Cargo features 来允许用户选择性地启用功能：
//!
//! - `argon2` - 启用 Argon2id 密码哈希支持（默认启用）
//! - `bcrypt` - 启用 bcrypt 密码哈希支持（默认启用）
//! - `full` - 启用所有功能
//!
//! 默认启用的 features: `argon2`, `bcrypt`
//!
//! ## 密码哈希示例
//!
//! ```rust
//! use authgate::password::{hash_password, verify_password};
//!
//! // 哈希密码
//! let hash = hash_password("my_secure_password").unwrap();
//!
//! // 验证密码
//! assert!(verify_password("my_secure_password", &hash));
//! ```
//!
//! ## 认证闸门示例
//!
//! ```rust
//! use authgate::config::GateConfig;
//! use authgate::gate::ActivityKind;
//! use authgate::orchestrator::{AuthOrchestrator, ConnectOutcome};
//! use uuid::Uuid;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let gate = AuthOrchestrator::new(GateConfig::default()).unwrap();
//! let identity = Uuid::new_v4();
//! let address = "203.0.113.7".parse().unwrap();
//!
//! // 新玩家连接，等待注册
//! let outcome = gate.on_connect(identity, "steve", address).await.unwrap();
//! assert_eq!(outcome, ConnectOutcome::AwaitingRegistration);
//!
//! // 认证前聊天被拦截
//! assert!(!gate.on_activity(&identity, ActivityKind::Chat).allowed);
//!
//! // 注册后立即放行
//! gate.register(identity, "steve", address, "hunter42", "hunter42")
//!     .await
//!     .unwrap();
//! assert!(gate.on_activity(&identity, ActivityKind::Chat).allowed);
//! # });
//! ```
//!
//! ## 失败锁定示例
//!
//! ```rust
//! use authgate::security::{FailureOutcome, LockoutConfig, RateLimiter};
//! use uuid::Uuid;
//!
//! let limiter = RateLimiter::new(LockoutConfig::default()).unwrap();
//! let identity = Uuid::new_v4();
//!
//! // 默认三次失败触发锁定
//! limiter.record_failure(&identity, None);
//! limiter.record_failure(&identity, None);
//! let outcome = limiter.record_failure(&identity, None);
//! assert!(matches!(outcome, FailureOutcome::LockedOut { .. }));
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod mfa;
pub mod orchestrator;
pub mod password;
pub mod random;
pub mod recovery;
pub mod security;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{Error, Result};

// ============================================================================
// 编排器导出
// ============================================================================

pub use config::GateConfig;
pub use orchestrator::{AuthOrchestrator, ConnectOutcome, LoginOutcome};

// ============================================================================
// 密码相关导出
// ============================================================================

pub use password::{
    Algorithm, PasswordHasher, PasswordPolicy, hash_password, validate_passwords_match,
    verify_password,
};

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{
    BACKUP_CODE_SPACE, constant_time_compare, constant_time_compare_str, generate_backup_codes,
    generate_random_base64_url, generate_random_bytes, generate_random_hex,
    generate_recovery_token,
};

// ============================================================================
// 锁定与过滤相关导出
// ============================================================================

pub use security::{
    FailureOutcome, IpFilter, IpFilterSnapshot, LockScope, LockoutConfig, RateLimiter,
};

// ============================================================================
// 会话相关导出
// ============================================================================

pub use session::{Session, SessionConfig, SessionRegistry};

// ============================================================================
// 两步验证相关导出
// ============================================================================

pub use mfa::{
    BackupCodeConfig, BackupCodeManager, TotpConfig, TotpManager, TotpSecret, TwoFactorEngine,
    TwoFactorSetup,
};

// ============================================================================
// 账号找回相关导出
// ============================================================================

pub use recovery::{IssuedRecoveryToken, RecoveryConfig, RecoveryEngine};

// ============================================================================
// 外部身份校验相关导出
// ============================================================================

pub use identity::{
    CachedIdentityVerifier, HttpIdentityVerifier, IdentityVerifier, VerifierConfig,
};

// ============================================================================
// 行为闸门相关导出
// ============================================================================

pub use gate::{ActivityKind, GateDecision, RestrictionConfig};

// ============================================================================
// 凭据存储相关导出
// ============================================================================

pub use store::{
    Credential, CredentialStore, FileCredentialStore, InMemoryCredentialStore, RecoveryQa,
    TwoFactorRecord,
};

// ============================================================================
// 审计与统计相关导出
// ============================================================================

pub use audit::{
    AuditLogger, EventSeverity, EventType, InMemoryAuditLogger, NoOpAuditLogger, SecurityEvent,
    TracingAuditLogger,
};
pub use stats::{GateStats, IdentityStats, StatsSnapshot};
