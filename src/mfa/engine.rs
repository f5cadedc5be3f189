//! 两步验证引擎
//!
//! 把 TOTP 验证、备用恢复码和凭据存储组合成一个带持久化状态的
//! 启用/验证流程。
//!
//! ## 状态机
//!
//! - `begin_setup` 立即持久化待确认记录（`enabled_at = None`），
//!   中途崩溃只会留下可重新开始的待确认状态
//! - `confirm_setup` 只接受 TOTP 验证码，成功后盖上启用时间戳
//! - `verify` 对未启用的身份一律返回 `false`（宁可拒绝不可放行）

use std::sync::Arc;

use crate::error::{PolicyError, Result};
use crate::store::{CredentialStore, InMemoryCredentialStore, TwoFactorRecord};

use super::backup::{BackupCodeConfig, BackupCodeManager};
use super::totp::{TotpConfig, TotpManager, TotpSecret};

/// `begin_setup` 的产物，交给用户展示一次
///
/// 备用恢复码只在这里出现一次，确认后无法再取回明文。
#[derive(Debug, Clone)]
pub struct TwoFactorSetup {
    /// Base32 编码的 TOTP 密钥，用于手动录入
    pub secret_base32: String,
    /// otpauth:// URI，用于二维码
    pub otpauth_uri: String,
    /// 一次性备用恢复码
    pub backup_codes: Vec<String>,
}

/// 两步验证引擎
pub struct TwoFactorEngine {
    store: Arc<dyn CredentialStore>,
    totp: TotpManager,
    backup: BackupCodeManager,
}

impl TwoFactorEngine {
    /// 使用默认内存存储创建引擎
    pub fn new(totp: TotpConfig, backup: BackupCodeConfig) -> Self {
        Self::with_store(Arc::new(InMemoryCredentialStore::new()), totp, backup)
    }

    /// 使用共享存储创建引擎
    pub fn with_store(
        store: Arc<dyn CredentialStore>,
        totp: TotpConfig,
        backup: BackupCodeConfig,
    ) -> Self {
        Self {
            store,
            totp: TotpManager::new(totp),
            backup: BackupCodeManager::new(backup),
        }
    }

    /// TOTP 管理器（用于展示剩余时间等）
    pub fn totp(&self) -> &TotpManager {
        &self.totp
    }

    /// 开始启用流程
    ///
    /// 生成新密钥和一组备用恢复码并立即持久化为待确认记录。
    /// 已存在的待确认记录会被新记录覆盖；已启用则拒绝。
    ///
    /// # Arguments
    ///
    /// * `identity` - 目标身份
    /// * `account` - otpauth URI 中展示的账户名
    pub async fn begin_setup(
        &self,
        identity: &uuid::Uuid,
        account: &str,
    ) -> Result<TwoFactorSetup> {
        if let Some(existing) = self.store.get_two_factor(identity).await?
            && existing.is_enabled()
        {
            return Err(PolicyError::TwoFactorAlreadyEnabled.into());
        }

        let secret = self.totp.generate_secret()?;
        let backup_codes = self.backup.generate()?;

        self.store
            .set_two_factor(TwoFactorRecord::pending(
                *identity,
                secret.base32.clone(),
                backup_codes.clone(),
            ))
            .await?;

        let otpauth_uri = self.totp.generate_uri(&secret, account);
        Ok(TwoFactorSetup {
            secret_base32: secret.base32,
            otpauth_uri,
            backup_codes,
        })
    }

    /// 确认启用
    ///
    /// 用一个当前有效的 TOTP 验证码证明用户已经正确录入密钥。
    /// 备用恢复码在这一步不被接受。返回 `Ok(false)` 表示验证码
    /// 错误，待确认记录保持不变。
    pub async fn confirm_setup(&self, identity: &uuid::Uuid, code: &str) -> Result<bool> {
        let Some(mut record) = self.store.get_two_factor(identity).await? else {
            return Err(PolicyError::NoPendingTwoFactor.into());
        };
        if record.is_enabled() {
            return Err(PolicyError::TwoFactorAlreadyEnabled.into());
        }

        let secret = TotpSecret::from_base32(&record.secret_base32)?;
        if !self.totp.verify(&secret, code)? {
            return Ok(false);
        }

        record.enabled_at = Some(chrono::Utc::now());
        self.store.set_two_factor(record).await?;
        tracing::debug!(%identity, "two-factor authentication enabled");
        Ok(true)
    }

    /// 验证一个 TOTP 或备用恢复码
    ///
    /// 身份没有已启用的记录时直接返回 `false`。先走 TOTP 时间窗，
    /// 未命中再匹配备用恢复码；命中的恢复码先从集合中删除并持久化，
    /// 然后才报告成功，保证单次使用。
    pub async fn verify(&self, identity: &uuid::Uuid, code: &str) -> Result<bool> {
        let Some(mut record) = self.store.get_two_factor(identity).await? else {
            return Ok(false);
        };
        if !record.is_enabled() {
            return Ok(false);
        }

        let secret = TotpSecret::from_base32(&record.secret_base32)?;
        if self.totp.verify(&secret, code)? {
            return Ok(true);
        }

        if let Some(index) = self.backup.matches(code, &record.backup_codes) {
            record.backup_codes.remove(index);
            let remaining = record.backup_codes.len();
            self.store.set_two_factor(record).await?;
            tracing::debug!(%identity, remaining, "backup code consumed");
            return Ok(true);
        }

        Ok(false)
    }

    /// 关闭两步验证，删除密钥和备用恢复码
    ///
    /// 幂等：未启用时也返回成功。
    pub async fn disable(&self, identity: &uuid::Uuid) -> Result<()> {
        self.store.delete_two_factor(identity).await
    }

    /// 该身份是否已启用两步验证
    pub async fn is_enabled(&self, identity: &uuid::Uuid) -> Result<bool> {
        Ok(self
            .store
            .get_two_factor(identity)
            .await?
            .is_some_and(|r| r.is_enabled()))
    }

    /// 剩余备用恢复码数量，未启用时为 `None`
    pub async fn backup_codes_remaining(&self, identity: &uuid::Uuid) -> Result<Option<usize>> {
        Ok(self
            .store
            .get_two_factor(identity)
            .await?
            .filter(|r| r.is_enabled())
            .map(|r| r.backup_codes.len()))
    }
}
