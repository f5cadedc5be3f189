//! 认证编排器
//!
//! 把密码散列、失败锁定、会话、两步验证、账号找回和外部身份
//! 校验组合成完整的认证闸门。宿主把连接、断开、行为事件和
//! 聊天命令转发进来，这里给出放行或拒绝的答案。
//!
//! ## 登录检查顺序
//!
//! 1. 来源地址黑名单
//! 2. 是否已注册
//! 3. 地址锁定（白名单地址豁免）
//! 4. 身份锁定
//! 5. 密码校验（在阻塞线程池上执行）
//! 6. 两步验证（启用时挂起会话激活，等待验证码）
//!
//! 只有全部通过才会激活会话并清空失败计数。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::config::GateConfig;
//! use authgate::orchestrator::{AuthOrchestrator, LoginOutcome};
//! use uuid::Uuid;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let gate = AuthOrchestrator::new(GateConfig::default()).unwrap();
//! let identity = Uuid::new_v4();
//! let address = "203.0.113.7".parse().unwrap();
//!
//! gate.register(identity, "steve", address, "hunter42", "hunter42")
//!     .await
//!     .unwrap();
//! assert!(gate.is_authenticated(&identity));
//!
//! gate.logout(&identity);
//! let outcome = gate.login(identity, address, "hunter42").await.unwrap();
//! assert_eq!(outcome, LoginOutcome::LoggedIn);
//! # });
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::{AuditLogger, SecurityEvent, TracingAuditLogger};
use crate::config::GateConfig;
use crate::error::{Error, PolicyError, Result, ValidationError};
use crate::gate::{ActivityKind, GateDecision};
use crate::identity::{CachedIdentityVerifier, HttpIdentityVerifier, IdentityVerifier};
use crate::mfa::{TwoFactorEngine, TwoFactorSetup};
use crate::password::{PasswordHasher, validate_passwords_match};
use crate::recovery::{IssuedRecoveryToken, RecoveryEngine};
use crate::security::{FailureOutcome, IpFilter, LockScope, RateLimiter};
use crate::session::SessionRegistry;
use crate::stats::GateStats;
use crate::store::{Credential, CredentialStore, InMemoryCredentialStore};

/// 登录成功时的两种结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// 会话已激活
    LoggedIn,
    /// 密码正确，还差两步验证码
    TwoFactorRequired,
}

/// 连接时的处置结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// 黑名单地址，建议宿主拒绝连接
    Blocked {
        /// 给玩家看的原因
        message: String,
    },
    /// 外部认证通过，已自动登录
    AutoLoggedIn,
    /// 已注册，等待 `/login`
    AwaitingLogin,
    /// 未注册，等待 `/register`
    AwaitingRegistration,
}

/// 密码通过后挂起的登录，等两步验证码
#[derive(Debug, Clone)]
struct PendingLogin {
    address: IpAddr,
}

/// 认证编排器
pub struct AuthOrchestrator {
    config: GateConfig,
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionRegistry>,
    two_factor: Arc<TwoFactorEngine>,
    recovery: Arc<RecoveryEngine>,
    ip_filter: Arc<IpFilter>,
    verifier: Option<Arc<CachedIdentityVerifier>>,
    audit: Arc<dyn AuditLogger>,
    stats: Arc<GateStats>,
    pending_two_factor: Mutex<HashMap<Uuid, PendingLogin>>,
    known_names: Mutex<HashMap<Uuid, String>>,
    last_addresses: Mutex<HashMap<Uuid, IpAddr>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AuthOrchestrator {
    /// 使用默认内存存储创建编排器
    pub fn new(config: GateConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryCredentialStore::new()))
    }

    /// 使用共享凭据存储创建编排器
    pub fn with_store(config: GateConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;

        let two_factor = TwoFactorEngine::with_store(
            Arc::clone(&store),
            config.totp.clone(),
            config.backup_codes.clone(),
        );
        let recovery = RecoveryEngine::with_store(Arc::clone(&store), config.recovery.clone());
        let limiter = RateLimiter::new(config.lockout.clone())?;
        let sessions = SessionRegistry::new(config.session.clone());
        let hasher = config.hasher.clone();

        Ok(Self {
            config,
            store,
            hasher: Arc::new(hasher),
            limiter: Arc::new(limiter),
            sessions: Arc::new(sessions),
            two_factor: Arc::new(two_factor),
            recovery: Arc::new(recovery),
            ip_filter: Arc::new(IpFilter::new()),
            verifier: None,
            audit: Arc::new(TracingAuditLogger::new()),
            stats: Arc::new(GateStats::new()),
            pending_two_factor: Mutex::new(HashMap::new()),
            known_names: Mutex::new(HashMap::new()),
            last_addresses: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        })
    }

    /// 替换审计日志记录器
    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// 挂接外部身份校验器（会包上 TTL 缓存）
    pub fn with_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = Some(Arc::new(CachedIdentityVerifier::new(
            verifier,
            self.config.verification.cache_ttl,
        )));
        self
    }

    /// 挂接配置里指定的 HTTP 身份校验器
    pub fn with_http_verifier(self) -> Result<Self> {
        let http = HttpIdentityVerifier::new(&self.config.verification)?;
        Ok(self.with_verifier(Arc::new(http)))
    }

    // ========================================================================
    // 组件访问
    // ========================================================================

    /// 当前配置
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// 会话表
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// 失败锁定器
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// IP 黑白名单
    pub fn ip_filter(&self) -> &IpFilter {
        &self.ip_filter
    }

    /// 统计计数
    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    /// 找回引擎
    pub fn recovery(&self) -> &RecoveryEngine {
        &self.recovery
    }

    /// 该身份是否处于已认证状态
    pub fn is_authenticated(&self, identity: &Uuid) -> bool {
        self.sessions.is_logged_in(identity)
    }

    /// 该身份是否已注册
    pub async fn is_registered(&self, identity: &Uuid) -> Result<bool> {
        Ok(self.store.get_credential(identity).await?.is_some())
    }

    // ========================================================================
    // 注册与登录
    // ========================================================================

    /// 注册新账号并立即激活会话
    pub async fn register(
        &self,
        identity: Uuid,
        name: &str,
        address: IpAddr,
        password: &str,
        confirmation: &str,
    ) -> Result<()> {
        validate_passwords_match(password, confirmation)?;
        self.config.password_policy.validate(password)?;

        if self.store.get_credential(&identity).await?.is_some() {
            return Err(PolicyError::AlreadyRegistered.into());
        }

        let hash = self.hash_on_worker(password.to_string()).await?;
        self.store
            .set_credential(Credential::new(identity, hash))
            .await?;

        self.known_names
            .lock()
            .unwrap()
            .insert(identity, name.to_string());
        self.last_addresses.lock().unwrap().insert(identity, address);
        self.activate(identity, address);
        self.stats.record_registration();
        self.audit.log(SecurityEvent::registered(identity, address));
        tracing::info!(%identity, name, "account registered");
        Ok(())
    }

    /// 密码登录
    ///
    /// 成功返回 [`LoginOutcome`]；启用两步验证的账号先挂起激活，
    /// 等 [`verify_two_factor`](Self::verify_two_factor) 补上验证码。
    /// 密码错误会计入失败并可能触发锁定。
    pub async fn login(
        &self,
        identity: Uuid,
        address: IpAddr,
        password: &str,
    ) -> Result<LoginOutcome> {
        if self.sessions.is_logged_in(&identity) {
            return Ok(LoginOutcome::LoggedIn);
        }

        self.last_addresses.lock().unwrap().insert(identity, address);

        if self.ip_filter.is_blacklisted(&address) {
            self.audit
                .log(SecurityEvent::connection_blocked(address, "blacklisted"));
            return Err(PolicyError::Blacklisted.into());
        }

        let Some(credential) = self.store.get_credential(&identity).await? else {
            return Err(PolicyError::NotRegistered.into());
        };

        let whitelisted = self.ip_filter.is_whitelisted(&address);
        if !whitelisted
            && let Some(retry_after) = self.limiter.address_lockout_remaining(&address)
        {
            return Err(Error::ip_locked_out(retry_after));
        }
        if let Some(retry_after) = self.limiter.identity_lockout_remaining(&identity) {
            return Err(Error::locked_out(retry_after));
        }

        if !self
            .verify_on_worker(password.to_string(), credential.hash.clone())
            .await?
        {
            self.audit
                .log(SecurityEvent::login_failed(identity, "wrong password"));
            return Err(self.record_failed_attempt(identity, address, whitelisted, false));
        }

        self.upgrade_hash_if_stale(credential, password).await;

        if self.two_factor.is_enabled(&identity).await? {
            self.pending_two_factor
                .lock()
                .unwrap()
                .insert(identity, PendingLogin { address });
            tracing::debug!(%identity, "password accepted, awaiting two-factor code");
            return Ok(LoginOutcome::TwoFactorRequired);
        }

        self.activate(identity, address);
        self.audit
            .log(SecurityEvent::login_success(identity, address));
        Ok(LoginOutcome::LoggedIn)
    }

    /// 补上两步验证码，完成挂起的登录
    pub async fn verify_two_factor(&self, identity: Uuid, code: &str) -> Result<()> {
        let Some(pending) = self.pending_two_factor.lock().unwrap().remove(&identity) else {
            return Err(PolicyError::NoPendingTwoFactor.into());
        };

        if self.two_factor.verify(&identity, code).await? {
            self.activate(identity, pending.address);
            self.audit.log(SecurityEvent::two_factor_verified(identity));
            self.audit
                .log(SecurityEvent::login_success(identity, pending.address));
            return Ok(());
        }

        self.audit.log(SecurityEvent::two_factor_failed(identity));
        let whitelisted = self.ip_filter.is_whitelisted(&pending.address);
        let address = pending.address;
        let err = self.record_failed_attempt(identity, address, whitelisted, true);

        // 还没锁定就保留挂起状态，允许重试验证码
        if matches!(
            err,
            Error::Policy(PolicyError::InvalidTwoFactorCode { .. })
        ) {
            self.pending_two_factor
                .lock()
                .unwrap()
                .entry(identity)
                .or_insert(PendingLogin { address });
        }
        Err(err)
    }

    /// 登出，返回之前是否在线
    pub fn logout(&self, identity: &Uuid) -> bool {
        self.pending_two_factor.lock().unwrap().remove(identity);
        let was_logged_in = self.sessions.set_logged_out(identity);
        if was_logged_in {
            self.audit.log(SecurityEvent::logout(*identity));
        }
        was_logged_in
    }

    // ========================================================================
    // 密码维护
    // ========================================================================

    /// 修改自己的密码，需要已登录并验证旧密码
    ///
    /// 不碰失败计数，成功后刷新会话活跃时间。
    pub async fn change_password(
        &self,
        identity: Uuid,
        current: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<()> {
        if !self.sessions.is_logged_in(&identity) {
            return Err(PolicyError::NotAuthenticated.into());
        }
        let Some(credential) = self.store.get_credential(&identity).await? else {
            return Err(PolicyError::NotRegistered.into());
        };

        if !self
            .verify_on_worker(current.to_string(), credential.hash.clone())
            .await?
        {
            return Err(Error::validation("current password is incorrect"));
        }

        validate_passwords_match(new_password, confirmation)?;
        self.config.password_policy.validate(new_password)?;

        let hash = self.hash_on_worker(new_password.to_string()).await?;
        self.store
            .set_credential(credential.with_new_hash(hash))
            .await?;

        self.sessions.touch(&identity);
        self.stats.record_password_change();
        self.audit.log(SecurityEvent::password_changed(identity));
        Ok(())
    }

    /// 管理员重置密码
    ///
    /// 绕过会话和锁定检查；没有凭据的身份会被直接建档。
    /// 重置后强制登出并清空失败计数。
    pub async fn admin_reset_password(&self, identity: Uuid, new_password: &str) -> Result<()> {
        self.config.password_policy.validate(new_password)?;

        let hash = self.hash_on_worker(new_password.to_string()).await?;
        let credential = match self.store.get_credential(&identity).await? {
            Some(existing) => existing.with_new_hash(hash),
            None => Credential::new(identity, hash),
        };
        self.store.set_credential(credential).await?;

        self.sessions.set_logged_out(&identity);
        self.pending_two_factor.lock().unwrap().remove(&identity);
        self.clear_rate_limits(&identity);
        self.audit.log(SecurityEvent::password_reset(identity));
        tracing::info!(%identity, "password reset by admin");
        Ok(())
    }

    /// 管理员解锁，抹掉失败记录和递进档位
    pub fn unlock(&self, identity: &Uuid) {
        let address = self.last_addresses.lock().unwrap().get(identity).copied();
        self.limiter.unlock(identity, address.as_ref());
        self.audit.log(SecurityEvent::unlocked(*identity));
    }

    /// 删除账号：凭据、两步验证、找回资料、会话一并清除
    pub async fn delete_account(&self, identity: &Uuid) -> Result<()> {
        self.store.delete_credential(identity).await?;
        self.store.delete_two_factor(identity).await?;
        self.store.delete_recovery_qa(identity).await?;

        self.recovery.revoke_all(identity);
        self.sessions.remove(identity);
        self.pending_two_factor.lock().unwrap().remove(identity);
        self.stats.forget_identity(identity);
        let address = self.last_addresses.lock().unwrap().remove(identity);
        self.limiter.unlock(identity, address.as_ref());

        self.audit.log(SecurityEvent::account_deleted(*identity));
        tracing::info!(%identity, "account deleted");
        Ok(())
    }

    // ========================================================================
    // 两步验证
    // ========================================================================

    /// 开始启用两步验证，需要已登录
    pub async fn begin_two_factor_setup(&self, identity: Uuid) -> Result<TwoFactorSetup> {
        if !self.sessions.is_logged_in(&identity) {
            return Err(PolicyError::NotAuthenticated.into());
        }
        if self.store.get_credential(&identity).await?.is_none() {
            return Err(PolicyError::NotRegistered.into());
        }

        let account = self
            .known_names
            .lock()
            .unwrap()
            .get(&identity)
            .cloned()
            .unwrap_or_else(|| identity.to_string());
        self.two_factor.begin_setup(&identity, &account).await
    }

    /// 回填第一个验证码，正式启用两步验证
    pub async fn confirm_two_factor_setup(&self, identity: Uuid, code: &str) -> Result<bool> {
        let confirmed = self.two_factor.confirm_setup(&identity, code).await?;
        if confirmed {
            self.stats.record_two_factor_setup();
            self.audit.log(SecurityEvent::two_factor_enabled(identity));
        }
        Ok(confirmed)
    }

    /// 关闭自己的两步验证，需要已登录
    pub async fn disable_two_factor(&self, identity: Uuid) -> Result<()> {
        if !self.sessions.is_logged_in(&identity) {
            return Err(PolicyError::NotAuthenticated.into());
        }
        self.admin_disable_two_factor(identity).await
    }

    /// 管理员强制关闭某身份的两步验证
    pub async fn admin_disable_two_factor(&self, identity: Uuid) -> Result<()> {
        self.two_factor.disable(&identity).await?;
        self.pending_two_factor.lock().unwrap().remove(&identity);
        self.audit.log(SecurityEvent::two_factor_disabled(identity));
        Ok(())
    }

    /// 该身份是否启用了两步验证
    pub async fn two_factor_enabled(&self, identity: &Uuid) -> Result<bool> {
        self.two_factor.is_enabled(identity).await
    }

    /// 剩余备用恢复码数量
    pub async fn backup_codes_remaining(&self, identity: &Uuid) -> Result<Option<usize>> {
        self.two_factor.backup_codes_remaining(identity).await
    }

    // ========================================================================
    // 账号找回
    // ========================================================================

    /// 为已注册身份签发找回令牌
    pub async fn begin_recovery(&self, identity: Uuid) -> Result<IssuedRecoveryToken> {
        if self.store.get_credential(&identity).await?.is_none() {
            return Err(PolicyError::NotRegistered.into());
        }
        let issued = self.recovery.issue_token(&identity)?;
        self.audit.log(SecurityEvent::recovery_issued(identity));
        Ok(issued)
    }

    /// 凭找回令牌设置新密码
    ///
    /// 令牌一次性：密码不合格不消耗令牌，持久化前才消耗。
    /// 返回找回的身份。
    pub async fn complete_recovery(
        &self,
        token: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<Uuid> {
        let Some(identity) = self.recovery.validate(token) else {
            return Err(ValidationError::InvalidRecoveryToken.into());
        };

        validate_passwords_match(new_password, confirmation)?;
        self.config.password_policy.validate(new_password)?;

        let hash = self.hash_on_worker(new_password.to_string()).await?;

        // 两个并发的 complete 只有先消耗掉令牌的那个能走到持久化
        if self.recovery.consume(token).is_none() {
            return Err(ValidationError::InvalidRecoveryToken.into());
        }

        let credential = match self.store.get_credential(&identity).await? {
            Some(existing) => existing.with_new_hash(hash),
            None => Credential::new(identity, hash),
        };
        self.store.set_credential(credential).await?;

        self.clear_rate_limits(&identity);
        self.stats.record_recovery();
        self.audit.log(SecurityEvent::recovery_completed(identity));
        tracing::info!(%identity, "password recovered via token");
        Ok(identity)
    }

    // ========================================================================
    // 宿主触发面
    // ========================================================================

    /// 玩家连接
    ///
    /// 记录名字和地址，检查黑名单，然后视配置尝试自动登录。
    /// 外部校验失败只降级为普通密码流程，从不挡住连接。
    pub async fn on_connect(
        &self,
        identity: Uuid,
        name: &str,
        address: IpAddr,
    ) -> Result<ConnectOutcome> {
        self.known_names
            .lock()
            .unwrap()
            .insert(identity, name.to_string());
        self.last_addresses.lock().unwrap().insert(identity, address);

        if self.ip_filter.is_blacklisted(&address) {
            self.audit
                .log(SecurityEvent::connection_blocked(address, "blacklisted"));
            return Ok(ConnectOutcome::Blocked {
                message: "This address is not allowed to join".to_string(),
            });
        }

        if self.config.premium_auto_login
            && let Some(verifier) = &self.verifier
        {
            match verifier.verify(name).await {
                Ok(true) => {
                    self.activate(identity, address);
                    self.audit.log(
                        SecurityEvent::login_success(identity, address)
                            .with_detail("method", "auto"),
                    );
                    tracing::info!(%identity, name, "verified identity auto-logged in");
                    return Ok(ConnectOutcome::AutoLoggedIn);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(name, error = %e, "identity verification failed, falling back to password auth");
                }
            }
        }

        if self.store.get_credential(&identity).await?.is_some() {
            Ok(ConnectOutcome::AwaitingLogin)
        } else {
            Ok(ConnectOutcome::AwaitingRegistration)
        }
    }

    /// 玩家断开，会话和挂起的两步验证一并丢弃
    pub fn on_disconnect(&self, identity: &Uuid) {
        self.pending_two_factor.lock().unwrap().remove(identity);
        self.known_names.lock().unwrap().remove(identity);
        if self.sessions.remove(identity).is_some() {
            tracing::debug!(%identity, "session dropped on disconnect");
        }
    }

    /// 玩家行为上报
    ///
    /// 已认证的身份放行并刷新活跃时间；未认证的按限制配置裁决。
    pub fn on_activity(&self, identity: &Uuid, kind: ActivityKind) -> GateDecision {
        let authenticated = self.sessions.is_logged_in(identity);
        if authenticated {
            self.sessions.touch(identity);
        }
        self.config.restrictions.evaluate(kind, authenticated)
    }

    // ========================================================================
    // 后台清扫
    // ========================================================================

    /// 启动周期清扫：锁定窗口遗忘、会话闲置过期、校验缓存淘汰
    ///
    /// 重复调用无效果。
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock().unwrap();
        if sweeper.is_some() {
            return;
        }

        let limiter = Arc::clone(&self.limiter);
        let sessions = Arc::clone(&self.sessions);
        let verifier = self.verifier.clone();
        let audit = Arc::clone(&self.audit);
        let stats = Arc::clone(&self.stats);
        let interval = self.config.sweep_interval;

        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                limiter.sweep();

                let expired = sessions.sweep();
                if !expired.is_empty() {
                    stats.record_expired_sessions(expired.len() as u64);
                    for identity in expired {
                        audit.log(SecurityEvent::session_expired(identity));
                    }
                }

                if let Some(verifier) = &verifier {
                    verifier.sweep();
                }
            }
        }));
        tracing::debug!(interval = ?interval, "background sweeps started");
    }

    /// 停止周期清扫
    pub fn stop(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
            tracing::debug!("background sweeps stopped");
        }
    }

    // ========================================================================
    // 内部
    // ========================================================================

    /// 激活会话并抹掉身份和地址的失败计数
    fn activate(&self, identity: Uuid, address: IpAddr) {
        self.sessions.set_logged_in(identity, address);
        self.limiter.clear_identity(&identity);
        self.limiter.clear_address(&address);
        self.stats.record_login_success(&identity);
    }

    fn clear_rate_limits(&self, identity: &Uuid) {
        self.limiter.clear_identity(identity);
        if let Some(address) = self.last_addresses.lock().unwrap().get(identity) {
            self.limiter.clear_address(address);
        }
    }

    /// 计入一次失败并换算成对外的错误
    fn record_failed_attempt(
        &self,
        identity: Uuid,
        address: IpAddr,
        whitelisted: bool,
        two_factor: bool,
    ) -> Error {
        self.stats.record_login_failure();

        let tracked_address = (!whitelisted).then_some(&address);
        match self.limiter.record_failure(&identity, tracked_address) {
            FailureOutcome::Counted { attempts_remaining } => {
                if two_factor {
                    PolicyError::InvalidTwoFactorCode { attempts_remaining }.into()
                } else {
                    PolicyError::InvalidPassword { attempts_remaining }.into()
                }
            }
            FailureOutcome::LockedOut { scope, retry_after } => {
                self.stats.record_lockout();
                self.audit.log(SecurityEvent::lockout_triggered(
                    identity,
                    match scope {
                        LockScope::Identity => "identity",
                        LockScope::Address => "address",
                    },
                ));
                match scope {
                    LockScope::Identity => Error::locked_out(retry_after),
                    LockScope::Address => Error::ip_locked_out(retry_after),
                }
            }
            FailureOutcome::AlreadyLocked { scope, retry_after } => match scope {
                LockScope::Identity => Error::locked_out(retry_after),
                LockScope::Address => Error::ip_locked_out(retry_after),
            },
        }
    }

    /// 在阻塞线程池上散列密码
    async fn hash_on_worker(&self, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::internal(format!("hash worker failed: {}", e)))?
    }

    /// 在阻塞线程池上校验密码
    async fn verify_on_worker(&self, password: String, hash: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| Error::internal(format!("verify worker failed: {}", e)))
    }

    /// 登录成功后把旧格式散列升级到当前参数
    ///
    /// 升级失败不影响本次登录，下次登录重试。
    async fn upgrade_hash_if_stale(&self, credential: Credential, password: &str) {
        if !self.hasher.needs_rehash(&credential.hash) {
            return;
        }

        let identity = credential.identity;
        match self.hash_on_worker(password.to_string()).await {
            Ok(hash) => {
                if let Err(e) = self
                    .store
                    .set_credential(credential.with_new_hash(hash))
                    .await
                {
                    tracing::warn!(%identity, error = %e, "failed to persist upgraded password hash");
                } else {
                    tracing::debug!(%identity, "password hash upgraded to current parameters");
                }
            }
            Err(e) => {
                tracing::warn!(%identity, error = %e, "failed to upgrade password hash");
            }
        }
    }
}

impl Drop for AuthOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::{Algorithm, PasswordHasher};

    fn test_config() -> GateConfig {
        // 测试里用低成本参数，避免散列拖慢用例
        let hasher = {
            #[cfg(feature = "argon2")]
            {
                PasswordHasher::new(Algorithm::Argon2id).with_argon2_params(1024, 2, 1)
            }
            #[cfg(all(feature = "bcrypt", not(feature = "argon2")))]
            {
                PasswordHasher::new(Algorithm::Bcrypt).with_bcrypt_cost(4)
            }
        };
        GateConfig::new()
            .with_hasher(hasher)
            .with_premium_auto_login(false)
    }

    fn gate() -> AuthOrchestrator {
        AuthOrchestrator::new(test_config()).unwrap()
    }

    fn addr(last: u8) -> IpAddr {
        IpAddr::from([203, 0, 113, last])
    }

    #[tokio::test]
    async fn test_register_activates_session() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();

        assert!(gate.is_authenticated(&id));
        assert!(gate.is_registered(&id).await.unwrap());
        assert_eq!(gate.stats().snapshot().registrations, 1);
    }

    #[tokio::test]
    async fn test_register_twice_rejected() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        let err = gate
            .register(id, "steve", addr(1), "other", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_register_validates_confirmation_and_policy() {
        let gate = gate();
        let id = Uuid::new_v4();

        assert!(matches!(
            gate.register(id, "steve", addr(1), "hunter42", "hunter43")
                .await
                .unwrap_err(),
            Error::Validation(ValidationError::PasswordMismatch)
        ));
        assert!(matches!(
            gate.register(id, "steve", addr(1), "abc", "abc")
                .await
                .unwrap_err(),
            Error::Validation(ValidationError::PasswordTooShort { .. })
        ));
        assert!(!gate.is_registered(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_before_register_rejected() {
        let gate = gate();
        let err = gate
            .login(Uuid::new_v4(), addr(1), "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::NotRegistered)));
    }

    #[tokio::test]
    async fn test_login_counts_failures_then_locks() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        for expected_remaining in [2u32, 1] {
            let err = gate.login(id, addr(1), "wrong").await.unwrap_err();
            assert!(matches!(
                err,
                Error::Policy(PolicyError::InvalidPassword { attempts_remaining })
                    if attempts_remaining == expected_remaining
            ));
        }

        let err = gate.login(id, addr(1), "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::LockedOut { .. })));

        // 锁定期内连正确密码也进不来
        let err = gate.login(id, addr(1), "hunter42").await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::LockedOut { .. })));
        assert!(!gate.is_authenticated(&id));
    }

    #[tokio::test]
    async fn test_successful_login_clears_failures() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        gate.login(id, addr(1), "wrong").await.unwrap_err();
        let outcome = gate.login(id, addr(1), "hunter42").await.unwrap();
        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(gate.limiter().failed_attempts(&id), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_address_rejected() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        gate.ip_filter().blacklist_add(addr(1));
        let err = gate.login(id, addr(1), "hunter42").await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::Blacklisted)));
    }

    #[tokio::test]
    async fn test_whitelisted_address_skips_ip_lockout() {
        let gate = gate();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let shared = addr(9);

        gate.register(alice, "alice", shared, "hunter42", "hunter42")
            .await
            .unwrap();
        gate.register(bob, "bob", shared, "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&alice);
        gate.logout(&bob);

        gate.ip_filter().whitelist_add(shared);

        // 白名单地址的失败不积累地址计数
        for _ in 0..2 {
            gate.login(alice, shared, "wrong").await.unwrap_err();
            gate.login(bob, shared, "wrong").await.unwrap_err();
        }
        assert!(!gate.limiter().is_address_locked(&shared));
    }

    #[tokio::test]
    async fn test_change_password_requires_session_and_current() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();

        let err = gate
            .change_password(id, "wrong-old", "newpass99", "newpass99")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        gate.change_password(id, "hunter42", "newpass99", "newpass99")
            .await
            .unwrap();

        gate.logout(&id);
        assert_eq!(
            gate.login(id, addr(1), "newpass99").await.unwrap(),
            LoginOutcome::LoggedIn
        );

        gate.logout(&id);
        let err = gate
            .change_password(id, "newpass99", "again", "again")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_admin_reset_forces_logout_and_clears_lockout() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        for _ in 0..3 {
            gate.login(id, addr(1), "wrong").await.unwrap_err();
        }
        assert!(gate.limiter().is_identity_locked(&id));

        gate.admin_reset_password(id, "fresh-start9").await.unwrap();
        assert!(!gate.is_authenticated(&id));
        assert!(!gate.limiter().is_identity_locked(&id));

        assert_eq!(
            gate.login(id, addr(1), "fresh-start9").await.unwrap(),
            LoginOutcome::LoggedIn
        );
    }

    #[tokio::test]
    async fn test_delete_account_wipes_everything() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.delete_account(&id).await.unwrap();

        assert!(!gate.is_authenticated(&id));
        assert!(!gate.is_registered(&id).await.unwrap());
        assert_eq!(gate.stats().login_count(&id), 0);

        // 同一身份可以重新注册
        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_on_activity_gates_anonymous() {
        let gate = gate();
        let id = Uuid::new_v4();

        let decision = gate.on_activity(&id, ActivityKind::Chat);
        assert!(!decision.allowed);

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        let decision = gate.on_activity(&id, ActivityKind::Chat);
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_on_connect_reports_registration_state() {
        let gate = gate();
        let id = Uuid::new_v4();

        assert_eq!(
            gate.on_connect(id, "steve", addr(1)).await.unwrap(),
            ConnectOutcome::AwaitingRegistration
        );

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        assert_eq!(
            gate.on_connect(id, "steve", addr(1)).await.unwrap(),
            ConnectOutcome::AwaitingLogin
        );
    }

    #[tokio::test]
    async fn test_on_connect_blocks_blacklisted() {
        let gate = gate();
        gate.ip_filter().blacklist_add(addr(66));

        let outcome = gate
            .on_connect(Uuid::new_v4(), "steve", addr(66))
            .await
            .unwrap();
        assert!(matches!(outcome, ConnectOutcome::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_drops_pending_state() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.on_disconnect(&id);
        assert!(!gate.is_authenticated(&id));
    }

    #[tokio::test]
    async fn test_unlock_resets_escalation() {
        let gate = gate();
        let id = Uuid::new_v4();

        gate.register(id, "steve", addr(1), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.logout(&id);

        for _ in 0..3 {
            gate.login(id, addr(1), "wrong").await.unwrap_err();
        }
        assert!(gate.limiter().is_identity_locked(&id));

        gate.unlock(&id);
        assert!(!gate.limiter().is_identity_locked(&id));
        assert_eq!(gate.limiter().escalation_level(&id), 0);
    }
}
