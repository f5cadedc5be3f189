//! 登录失败限制与渐进式锁定
//!
//! 按身份和来源地址分别追踪失败次数。达到上限后进入锁定期，
//! 锁定时长按 `base * multiplier^k` 随连续锁定次数递增（k 为
//! 已发生过的锁定次数）。计数清零与锁定生效在同一次加锁内完成，
//! 并发失败不会多扣一次锁定，也不会丢失失败计数。
//!
//! 成功登录会清除失败计数和锁定，但保留递增等级；只有管理员
//! `unlock` 才能把等级归零。后台 [`RateLimiter::sweep`] 负责释放
//! 到期的锁定，并宽恕超过遗忘窗口没有再失败的计数。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// 锁定策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// 触发锁定前允许的最大失败尝试次数
    pub max_attempts: u32,

    /// 基础锁定时长
    pub lockout_duration: Duration,

    /// 是否启用渐进式锁定（连续锁定时长递增）
    pub progressive: bool,

    /// 渐进式锁定的倍率
    pub multiplier: u32,

    /// 失败计数的遗忘窗口（窗口内无新失败则清零计数）
    pub attempt_window: Duration,

    /// 是否按来源地址追踪失败
    pub track_ip: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration: Duration::from_secs(5 * 60),
            progressive: true,
            multiplier: 3,
            attempt_window: Duration::from_secs(5 * 60),
            track_ip: true,
        }
    }
}

impl LockoutConfig {
    /// 创建严格的锁定配置
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            lockout_duration: Duration::from_secs(30 * 60),
            progressive: true,
            multiplier: 3,
            attempt_window: Duration::from_secs(60 * 60),
            track_ip: true,
        }
    }

    /// 创建宽松的配置（适用于开发环境）
    pub fn relaxed() -> Self {
        Self {
            max_attempts: 10,
            lockout_duration: Duration::from_secs(60),
            progressive: false,
            multiplier: 1,
            attempt_window: Duration::from_secs(10 * 60),
            track_ip: false,
        }
    }

    /// 设置最大失败尝试次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// 设置基础锁定时长
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    /// 设置是否启用渐进式锁定
    pub fn with_progressive(mut self, enabled: bool) -> Self {
        self.progressive = enabled;
        self
    }

    /// 设置渐进式锁定倍率
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// 设置失败计数的遗忘窗口
    pub fn with_attempt_window(mut self, window: Duration) -> Self {
        self.attempt_window = window;
        self
    }

    /// 设置是否按来源地址追踪
    pub fn with_track_ip(mut self, enabled: bool) -> Self {
        self.track_ip = enabled;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::validation("max_attempts must be greater than 0"));
        }
        if self.lockout_duration.is_zero() {
            return Err(Error::validation("lockout_duration must be greater than 0"));
        }
        if self.progressive && self.multiplier == 0 {
            return Err(Error::validation("multiplier must be greater than 0"));
        }
        Ok(())
    }
}

/// 锁定的作用范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// 针对单个身份
    Identity,
    /// 针对来源地址
    Address,
}

/// 记录一次失败后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// 已计数，还有剩余尝试次数
    Counted {
        /// 剩余尝试次数
        attempts_remaining: u32,
    },

    /// 本次失败触发了新的锁定
    LockedOut {
        /// 锁定范围
        scope: LockScope,
        /// 本次锁定的完整时长
        retry_after: Duration,
    },

    /// 已处于锁定期中，本次失败不再计数
    AlreadyLocked {
        /// 锁定范围
        scope: LockScope,
        /// 剩余等待时间
        retry_after: Duration,
    },
}

impl FailureOutcome {
    /// 是否处于（或刚进入）锁定状态
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            FailureOutcome::LockedOut { .. } | FailureOutcome::AlreadyLocked { .. }
        )
    }
}

/// 单个 key 的失败追踪状态
#[derive(Debug, Clone, Default)]
struct AttemptState {
    /// 当前累计失败次数
    fail_count: u32,
    /// 最后一次失败时间
    last_fail_at: Option<DateTime<Utc>>,
    /// 锁定截止时间
    lockout_ends_at: Option<DateTime<Utc>>,
    /// 已发生过的锁定次数（只增，管理员解锁才清零）
    escalation: u32,
}

/// 登录失败限制器
///
/// 内部用互斥锁保护两张表（身份、地址），所有方法只需要 `&self`，
/// 可以放进 `Arc` 与后台清理任务共享。
#[derive(Debug)]
pub struct RateLimiter {
    config: LockoutConfig,
    identities: Mutex<HashMap<Uuid, AttemptState>>,
    addresses: Mutex<HashMap<IpAddr, AttemptState>>,
}

impl RateLimiter {
    /// 创建新的限制器
    ///
    /// # Example
    ///
    /// ```rust
    /// use authgate::security::{LockoutConfig, RateLimiter};
    ///
    /// let limiter = RateLimiter::new(LockoutConfig::default()).unwrap();
    /// ```
    pub fn new(config: LockoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            identities: Mutex::new(HashMap::new()),
            addresses: Mutex::new(HashMap::new()),
        })
    }

    /// 使用默认配置创建限制器
    pub fn with_default_config() -> Self {
        Self {
            config: LockoutConfig::default(),
            identities: Mutex::new(HashMap::new()),
            addresses: Mutex::new(HashMap::new()),
        }
    }

    /// 获取配置引用
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// 记录一次失败尝试
    ///
    /// 同时更新身份和地址两个维度；地址传 `None` 表示本次不按地址
    /// 计数（地址在白名单中，或按地址追踪被关闭）。身份维度的结果
    /// 优先返回；身份仍在计数而地址已锁定时返回地址的锁定结果。
    pub fn record_failure(&self, identity: &Uuid, address: Option<&IpAddr>) -> FailureOutcome {
        let now = Utc::now();

        let identity_outcome = {
            let mut map = self.identities.lock().unwrap();
            self.record_in(&mut map, *identity, LockScope::Identity, now)
        };

        let address_outcome = match address {
            Some(addr) if self.config.track_ip => {
                let mut map = self.addresses.lock().unwrap();
                Some(self.record_in(&mut map, *addr, LockScope::Address, now))
            }
            _ => None,
        };

        match (identity_outcome, address_outcome) {
            (FailureOutcome::Counted { .. }, Some(lock)) if lock.is_locked() => lock,
            (outcome, _) => outcome,
        }
    }

    /// 查询身份当前的锁定剩余时间
    pub fn identity_lockout_remaining(&self, identity: &Uuid) -> Option<Duration> {
        let map = self.identities.lock().unwrap();
        Self::remaining_in(&map, identity)
    }

    /// 查询地址当前的锁定剩余时间
    ///
    /// 按地址追踪关闭时永远返回 `None`。
    pub fn address_lockout_remaining(&self, address: &IpAddr) -> Option<Duration> {
        if !self.config.track_ip {
            return None;
        }
        let map = self.addresses.lock().unwrap();
        Self::remaining_in(&map, address)
    }

    /// 身份是否处于锁定期
    pub fn is_identity_locked(&self, identity: &Uuid) -> bool {
        self.identity_lockout_remaining(identity).is_some()
    }

    /// 地址是否处于锁定期
    pub fn is_address_locked(&self, address: &IpAddr) -> bool {
        self.address_lockout_remaining(address).is_some()
    }

    /// 查询身份当前累计的失败次数
    pub fn failed_attempts(&self, identity: &Uuid) -> u32 {
        self.identities
            .lock()
            .unwrap()
            .get(identity)
            .map(|s| s.fail_count)
            .unwrap_or(0)
    }

    /// 查询身份的渐进锁定等级
    pub fn escalation_level(&self, identity: &Uuid) -> u32 {
        self.identities
            .lock()
            .unwrap()
            .get(identity)
            .map(|s| s.escalation)
            .unwrap_or(0)
    }

    /// 清除身份的失败计数与锁定（保留渐进等级）
    ///
    /// 幂等：对不存在的 key 调用没有任何效果。
    pub fn clear_identity(&self, identity: &Uuid) {
        let mut map = self.identities.lock().unwrap();
        Self::clear_in(&mut map, identity);
    }

    /// 清除地址的失败计数与锁定（保留渐进等级）
    pub fn clear_address(&self, address: &IpAddr) {
        let mut map = self.addresses.lock().unwrap();
        Self::clear_in(&mut map, address);
    }

    /// 管理员解锁：彻底移除身份（以及可选的地址）的全部状态，
    /// 包括渐进等级
    pub fn unlock(&self, identity: &Uuid, address: Option<&IpAddr>) {
        self.identities.lock().unwrap().remove(identity);
        if let Some(addr) = address {
            self.addresses.lock().unwrap().remove(addr);
        }
    }

    /// 后台清理：释放到期锁定，宽恕超过遗忘窗口的失败计数
    ///
    /// 和请求路径走同一把锁，不会与进行中的
    /// [`RateLimiter::record_failure`] / [`RateLimiter::clear_identity`]
    /// 在同一个 key 上交错。
    pub fn sweep(&self) {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.config.attempt_window)
            .unwrap_or(chrono::Duration::MAX);

        let released = {
            let mut map = self.identities.lock().unwrap();
            Self::sweep_map(&mut map, now, window)
        } + {
            let mut map = self.addresses.lock().unwrap();
            Self::sweep_map(&mut map, now, window)
        };

        if released > 0 {
            tracing::debug!(released, "released expired lockouts");
        }
    }

    // ========================================================================
    // 内部状态机
    // ========================================================================

    fn record_in<K>(
        &self,
        map: &mut HashMap<K, AttemptState>,
        key: K,
        scope: LockScope,
        now: DateTime<Utc>,
    ) -> FailureOutcome
    where
        K: Eq + std::hash::Hash,
    {
        let state = map.entry(key).or_default();

        // 锁定期内的失败不再计数，直接报告剩余时间
        if let Some(ends) = state.lockout_ends_at {
            if now < ends {
                return FailureOutcome::AlreadyLocked {
                    scope,
                    retry_after: (ends - now).to_std().unwrap_or_default(),
                };
            }
            // 锁定已过期但还没被清理，先释放再计数
            state.lockout_ends_at = None;
        }

        state.fail_count += 1;
        state.last_fail_at = Some(now);

        if state.fail_count >= self.config.max_attempts {
            let duration = self.lockout_duration_for(state.escalation);
            let ends = now + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);

            // 计数清零、截止时间和等级递增在同一次持锁中生效
            state.lockout_ends_at = Some(ends);
            state.escalation = state.escalation.saturating_add(1);
            state.fail_count = 0;

            return FailureOutcome::LockedOut {
                scope,
                retry_after: duration,
            };
        }

        FailureOutcome::Counted {
            attempts_remaining: self.config.max_attempts - state.fail_count,
        }
    }

    fn lockout_duration_for(&self, escalation: u32) -> Duration {
        if !self.config.progressive || escalation == 0 {
            return self.config.lockout_duration;
        }
        let factor = self.config.multiplier.saturating_pow(escalation);
        self.config.lockout_duration.saturating_mul(factor)
    }

    fn remaining_in<K>(map: &HashMap<K, AttemptState>, key: &K) -> Option<Duration>
    where
        K: Eq + std::hash::Hash,
    {
        let state = map.get(key)?;
        let ends = state.lockout_ends_at?;
        let now = Utc::now();
        if now < ends {
            Some((ends - now).to_std().unwrap_or_default())
        } else {
            None
        }
    }

    fn clear_in<K>(map: &mut HashMap<K, AttemptState>, key: &K)
    where
        K: Eq + std::hash::Hash,
    {
        let remove = if let Some(state) = map.get_mut(key) {
            state.fail_count = 0;
            state.last_fail_at = None;
            state.lockout_ends_at = None;
            state.escalation == 0
        } else {
            false
        };
        if remove {
            map.remove(key);
        }
    }

    fn sweep_map<K>(
        map: &mut HashMap<K, AttemptState>,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> usize
    where
        K: Eq + std::hash::Hash,
    {
        let mut released = 0;

        map.retain(|_, state| {
            if let Some(ends) = state.lockout_ends_at
                && now >= ends
            {
                state.lockout_ends_at = None;
                released += 1;
            }
            if state.lockout_ends_at.is_some() {
                return true;
            }

            if let Some(last) = state.last_fail_at
                && now.signed_duration_since(last) >= window
            {
                state.fail_count = 0;
                state.last_fail_at = None;
            }

            // 什么都不剩的条目直接回收
            state.fail_count > 0 || state.last_fail_at.is_some() || state.escalation > 0
        });

        released
    }
}
