//! 闸门聚合配置
//!
//! 把各组件的配置收拢成一个 [`GateConfig`]，编排器从这里取出
//! 每个部件的参数。字段全部公开，既可以用 builder 链式调整，
//! 也可以直接改字段。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::config::GateConfig;
//! use authgate::password::PasswordPolicy;
//! use std::time::Duration;
//!
//! let config = GateConfig::new()
//!     .with_password_policy(PasswordPolicy::strict())
//!     .with_sweep_interval(Duration::from_secs(30));
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::error::{Error, Result};
use crate::gate::RestrictionConfig;
use crate::identity::VerifierConfig;
use crate::mfa::{BackupCodeConfig, TotpConfig};
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::recovery::RecoveryConfig;
use crate::security::LockoutConfig;
use crate::session::SessionConfig;

/// 认证闸门的聚合配置
///
/// 默认值沿用原部署参数：最多 3 次失败、基础锁定 5 分钟、
/// 递进倍数 3、会话闲置 30 分钟、后台清扫 60 秒一轮。
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// 密码散列参数
    pub hasher: PasswordHasher,
    /// 密码复杂度策略
    pub password_policy: PasswordPolicy,
    /// 失败锁定策略
    pub lockout: LockoutConfig,
    /// 会话闲置策略
    pub session: SessionConfig,
    /// TOTP 参数
    pub totp: TotpConfig,
    /// 备用恢复码参数
    pub backup_codes: BackupCodeConfig,
    /// 找回令牌参数
    pub recovery: RecoveryConfig,
    /// 外部身份校验参数
    pub verification: VerifierConfig,
    /// 未登录行为限制
    pub restrictions: RestrictionConfig,
    /// 连接时对认证账号自动登录
    pub premium_auto_login: bool,
    /// 后台清扫周期
    pub sweep_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hasher: PasswordHasher::default(),
            password_policy: PasswordPolicy::default(),
            lockout: LockoutConfig::default(),
            session: SessionConfig::default(),
            totp: TotpConfig::default(),
            backup_codes: BackupCodeConfig::default(),
            recovery: RecoveryConfig::default(),
            verification: VerifierConfig::default(),
            restrictions: RestrictionConfig::default(),
            premium_auto_login: true,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl GateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 严格预设：强密码策略加上更紧的锁定
    pub fn strict() -> Self {
        Self {
            password_policy: PasswordPolicy::strict(),
            lockout: LockoutConfig::strict(),
            ..Self::default()
        }
    }

    /// 设置密码散列参数
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// 设置密码复杂度策略
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// 设置失败锁定策略
    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    /// 设置会话闲置策略
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// 设置 TOTP 参数
    pub fn with_totp(mut self, totp: TotpConfig) -> Self {
        self.totp = totp;
        self
    }

    /// 设置备用恢复码参数
    pub fn with_backup_codes(mut self, backup: BackupCodeConfig) -> Self {
        self.backup_codes = backup;
        self
    }

    /// 设置找回令牌参数
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// 设置外部身份校验参数
    pub fn with_verification(mut self, verification: VerifierConfig) -> Self {
        self.verification = verification;
        self
    }

    /// 设置未登录行为限制
    pub fn with_restrictions(mut self, restrictions: RestrictionConfig) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// 开关连接时自动登录
    pub fn with_premium_auto_login(mut self, enabled: bool) -> Self {
        self.premium_auto_login = enabled;
        self
    }

    /// 设置后台清扫周期
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<()> {
        self.lockout.validate()?;
        self.backup_codes.validate()?;
        self.recovery.validate()?;
        self.verification.validate()?;
        if self.sweep_interval.is_zero() {
            return Err(Error::internal("sweep_interval must be greater than zero"));
        }
        Ok(())
    }
}
