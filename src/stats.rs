//! 认证闸门统计
//!
//! 全局计数器用原子变量累加，可以在任意线程无锁记录；
//! 按身份的登录次数和最近登录时间放在读写锁保护的映射里。
//! 所有数字都只增不减，重启即清零。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::stats::GateStats;
//! use uuid::Uuid;
//!
//! let stats = GateStats::new();
//! let identity = Uuid::new_v4();
//!
//! stats.record_registration();
//! stats.record_login_success(&identity);
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.registrations, 1);
//! assert_eq!(snapshot.login_successes, 1);
//! assert_eq!(stats.login_count(&identity), 1);
//! ```

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 某一时刻的全局计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// 注册总数
    pub registrations: u64,
    /// 登录成功总数
    pub login_successes: u64,
    /// 登录失败总数
    pub login_failures: u64,
    /// 触发锁定总数
    pub lockouts: u64,
    /// 闲置过期的会话总数
    pub expired_sessions: u64,
    /// 完成的账号找回总数
    pub recoveries: u64,
    /// 密码修改总数
    pub password_changes: u64,
    /// 两步验证启用总数
    pub two_factor_setups: u64,
}

/// 单个身份的登录统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStats {
    /// 累计登录次数
    pub login_count: u64,
    /// 最近一次登录时间
    pub last_login_at: DateTime<Utc>,
}

/// 认证闸门统计收集器
#[derive(Debug, Default)]
pub struct GateStats {
    registrations: AtomicU64,
    login_successes: AtomicU64,
    login_failures: AtomicU64,
    lockouts: AtomicU64,
    expired_sessions: AtomicU64,
    recoveries: AtomicU64,
    password_changes: AtomicU64,
    two_factor_setups: AtomicU64,
    per_identity: RwLock<HashMap<Uuid, IdentityStats>>,
}

impl GateStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次注册
    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次登录成功，并更新该身份的登录统计
    pub fn record_login_success(&self, identity: &Uuid) {
        self.login_successes.fetch_add(1, Ordering::Relaxed);

        let mut per_identity = self.per_identity.write().unwrap();
        let entry = per_identity.entry(*identity).or_insert(IdentityStats {
            login_count: 0,
            last_login_at: Utc::now(),
        });
        entry.login_count += 1;
        entry.last_login_at = Utc::now();
    }

    /// 记录一次登录失败
    pub fn record_login_failure(&self) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次锁定触发
    pub fn record_lockout(&self) {
        self.lockouts.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录 N 个会话因闲置过期
    pub fn record_expired_sessions(&self, count: u64) {
        self.expired_sessions.fetch_add(count, Ordering::Relaxed);
    }

    /// 记录一次完成的账号找回
    pub fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次密码修改
    pub fn record_password_change(&self) {
        self.password_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次两步验证启用
    pub fn record_two_factor_setup(&self) {
        self.two_factor_setups.fetch_add(1, Ordering::Relaxed);
    }

    /// 某身份的累计登录次数
    pub fn login_count(&self, identity: &Uuid) -> u64 {
        self.per_identity
            .read()
            .unwrap()
            .get(identity)
            .map(|s| s.login_count)
            .unwrap_or(0)
    }

    /// 某身份的最近登录时间
    pub fn last_login(&self, identity: &Uuid) -> Option<DateTime<Utc>> {
        self.per_identity
            .read()
            .unwrap()
            .get(identity)
            .map(|s| s.last_login_at)
    }

    /// 某身份的完整登录统计
    pub fn identity_stats(&self, identity: &Uuid) -> Option<IdentityStats> {
        self.per_identity.read().unwrap().get(identity).copied()
    }

    /// 删除某身份的登录统计（账号删除时调用）
    pub fn forget_identity(&self, identity: &Uuid) {
        self.per_identity.write().unwrap().remove(identity);
    }

    /// 读取全局计数快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            login_successes: self.login_successes.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            lockouts: self.lockouts.load(Ordering::Relaxed),
            expired_sessions: self.expired_sessions.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            password_changes: self.password_changes.load(Ordering::Relaxed),
            two_factor_setups: self.two_factor_setups.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let stats = GateStats::new();
        let id = Uuid::new_v4();

        stats.record_registration();
        stats.record_login_success(&id);
        stats.record_login_success(&id);
        stats.record_login_failure();
        stats.record_lockout();
        stats.record_expired_sessions(3);
        stats.record_recovery();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.login_successes, 2);
        assert_eq!(snapshot.login_failures, 1);
        assert_eq!(snapshot.lockouts, 1);
        assert_eq!(snapshot.expired_sessions, 3);
        assert_eq!(snapshot.recoveries, 1);
    }

    #[test]
    fn test_per_identity_login_tracking() {
        let stats = GateStats::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert_eq!(stats.login_count(&alice), 0);
        assert!(stats.last_login(&alice).is_none());

        stats.record_login_success(&alice);
        stats.record_login_success(&alice);
        stats.record_login_success(&bob);

        assert_eq!(stats.login_count(&alice), 2);
        assert_eq!(stats.login_count(&bob), 1);
        assert!(stats.last_login(&alice).is_some());
    }

    #[test]
    fn test_forget_identity() {
        let stats = GateStats::new();
        let id = Uuid::new_v4();

        stats.record_login_success(&id);
        stats.forget_identity(&id);

        assert_eq!(stats.login_count(&id), 0);
        assert!(stats.identity_stats(&id).is_none());
        // 全局计数不受影响
        assert_eq!(stats.snapshot().login_successes, 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let stats = Arc::new(GateStats::new());
        let id = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_login_success(&id);
                        stats.record_login_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.login_successes, 800);
        assert_eq!(snapshot.login_failures, 800);
        assert_eq!(stats.login_count(&id), 800);
    }
}
