//! 会话登记模块
//!
//! 按身份记录 "已登录" 状态。表中有记录即已登录，没有记录即匿名；
//! 会话只存在于进程内存中，每次登录都会重新创建。
//!
//! 活动刷新只对已登录的身份生效：登出和刷新竞争时登出获胜，
//! 不会出现登出后又被刷新 "复活" 的会话。空闲超时由
//! [`SessionRegistry::sweep`] 统一回收，返回被回收的身份列表，
//! 便于调用方通知宿主和记录审计。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::session::{SessionConfig, SessionRegistry};
//! use uuid::Uuid;
//!
//! let registry = SessionRegistry::with_default_config();
//! let player = Uuid::new_v4();
//!
//! registry.set_logged_in(player, "192.0.2.5".parse().unwrap());
//! assert!(registry.is_logged_in(&player));
//!
//! registry.set_logged_out(&player);
//! assert!(!registry.is_logged_in(&player));
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 单个已登录会话
#[derive(Debug, Clone)]
pub struct Session {
    /// 会话归属的身份
    pub identity: Uuid,

    /// 本次登录的开始时间
    pub session_start_at: DateTime<Utc>,

    /// 最后一次活动时间
    pub last_activity_at: DateTime<Utc>,

    /// 登录时绑定的来源地址
    pub bound_address: IpAddr,
}

impl Session {
    fn new(identity: Uuid, address: IpAddr) -> Self {
        let now = Utc::now();
        Self {
            identity,
            session_start_at: now,
            last_activity_at: now,
            bound_address: address,
        }
    }

    /// 距离开始登录过去了多久
    pub fn duration(&self) -> Duration {
        (Utc::now() - self.session_start_at).to_std().unwrap_or_default()
    }

    /// 距离最后一次活动过去了多久
    pub fn idle_time(&self) -> Duration {
        (Utc::now() - self.last_activity_at).to_std().unwrap_or_default()
    }
}

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 空闲超时；为零表示永不超时
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SessionConfig {
    /// 设置空闲超时
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// 关闭空闲超时
    pub fn without_idle_timeout() -> Self {
        Self {
            idle_timeout: Duration::ZERO,
        }
    }
}

/// 会话登记表
///
/// 读写都经过内部读写锁，方法只需要 `&self`，可放进 `Arc`
/// 与后台清理任务共享。
#[derive(Debug)]
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    /// 创建新的会话登记表
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 使用默认配置创建
    pub fn with_default_config() -> Self {
        Self::new(SessionConfig::default())
    }

    /// 获取配置引用
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 标记身份为已登录，绑定来源地址
    ///
    /// 重复登录会重新创建会话（开始时间与活动时间都重置）。
    pub fn set_logged_in(&self, identity: Uuid, address: IpAddr) {
        let session = Session::new(identity, address);
        self.sessions.write().unwrap().insert(identity, session);
    }

    /// 标记身份为已登出
    ///
    /// 返回之前是否处于登录状态。幂等。
    pub fn set_logged_out(&self, identity: &Uuid) -> bool {
        self.sessions.write().unwrap().remove(identity).is_some()
    }

    /// 移除会话并返回它（断开连接时使用，便于拿到最后的地址）
    pub fn remove(&self, identity: &Uuid) -> Option<Session> {
        self.sessions.write().unwrap().remove(identity)
    }

    /// 刷新身份的最后活动时间
    ///
    /// 只对已登录的身份生效；匿名身份的刷新被忽略并返回 `false`，
    /// 因此登出和刷新竞争时登出获胜。
    pub fn touch(&self, identity: &Uuid) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(identity) {
            Some(session) => {
                session.last_activity_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// 身份是否处于登录状态
    pub fn is_logged_in(&self, identity: &Uuid) -> bool {
        self.sessions.read().unwrap().contains_key(identity)
    }

    /// 获取身份的会话副本
    pub fn get(&self, identity: &Uuid) -> Option<Session> {
        self.sessions.read().unwrap().get(identity).cloned()
    }

    /// 查询本次登录持续了多久
    pub fn session_duration(&self, identity: &Uuid) -> Option<Duration> {
        self.sessions
            .read()
            .unwrap()
            .get(identity)
            .map(Session::duration)
    }

    /// 查询登录时绑定的地址
    pub fn session_address(&self, identity: &Uuid) -> Option<IpAddr> {
        self.sessions
            .read()
            .unwrap()
            .get(identity)
            .map(|s| s.bound_address)
    }

    /// 当前已登录的身份数量
    pub fn authenticated_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// 当前已登录的身份列表
    pub fn authenticated_identities(&self) -> Vec<Uuid> {
        self.sessions.read().unwrap().keys().copied().collect()
    }

    /// 回收空闲超时的会话，返回被回收的身份
    ///
    /// 空闲超时为零时不回收任何会话。幂等，可与其他身份上的
    /// 登录 / 刷新并发执行。
    pub fn sweep(&self) -> Vec<Uuid> {
        if self.config.idle_timeout.is_zero() {
            return Vec::new();
        }

        let deadline = Utc::now()
            - chrono::Duration::from_std(self.config.idle_timeout)
                .unwrap_or(chrono::Duration::MAX);

        let mut sessions = self.sessions.write().unwrap();
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, s)| s.last_activity_at < deadline)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            sessions.remove(id);
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired idle sessions");
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "192.0.2.33".parse().unwrap()
    }

    #[test]
    fn test_login_and_logout() {
        let registry = SessionRegistry::with_default_config();
        let id = Uuid::new_v4();

        assert!(!registry.is_logged_in(&id));

        registry.set_logged_in(id, addr());
        assert!(registry.is_logged_in(&id));
        assert_eq!(registry.session_address(&id), Some(addr()));
        assert_eq!(registry.authenticated_count(), 1);

        assert!(registry.set_logged_out(&id));
        assert!(!registry.is_logged_in(&id));
        assert_eq!(registry.authenticated_count(), 0);

        // 重复登出是幂等的
        assert!(!registry.set_logged_out(&id));
    }

    #[test]
    fn test_relogin_recreates_session() {
        let registry = SessionRegistry::with_default_config();
        let id = Uuid::new_v4();

        registry.set_logged_in(id, addr());
        let first_start = registry.get(&id).unwrap().session_start_at;

        std::thread::sleep(Duration::from_millis(20));
        registry.set_logged_in(id, "198.51.100.2".parse().unwrap());

        let session = registry.get(&id).unwrap();
        assert!(session.session_start_at > first_start);
        assert_eq!(session.bound_address, "198.51.100.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_touch_refreshes_activity() {
        let registry = SessionRegistry::with_default_config();
        let id = Uuid::new_v4();

        registry.set_logged_in(id, addr());
        let before = registry.get(&id).unwrap().last_activity_at;

        std::thread::sleep(Duration::from_millis(20));
        assert!(registry.touch(&id));

        let after = registry.get(&id).unwrap().last_activity_at;
        assert!(after > before);
    }

    #[test]
    fn test_touch_after_logout_is_ignored() {
        let registry = SessionRegistry::with_default_config();
        let id = Uuid::new_v4();

        registry.set_logged_in(id, addr());
        registry.set_logged_out(&id);

        // 登出获胜：刷新不会复活会话
        assert!(!registry.touch(&id));
        assert!(!registry.is_logged_in(&id));
    }

    #[test]
    fn test_sweep_expires_idle_sessions() {
        let config = SessionConfig::default().with_idle_timeout(Duration::from_millis(100));
        let registry = SessionRegistry::new(config);

        let idle = Uuid::new_v4();
        let active = Uuid::new_v4();
        registry.set_logged_in(idle, addr());
        registry.set_logged_in(active, addr());

        std::thread::sleep(Duration::from_millis(150));
        registry.touch(&active);

        let expired = registry.sweep();
        assert_eq!(expired, vec![idle]);
        assert!(!registry.is_logged_in(&idle));
        assert!(registry.is_logged_in(&active));

        // 再次回收没有新的过期会话
        assert!(registry.sweep().is_empty());
    }

    #[test]
    fn test_zero_timeout_disables_expiry() {
        let registry = SessionRegistry::new(SessionConfig::without_idle_timeout());
        let id = Uuid::new_v4();

        registry.set_logged_in(id, addr());
        std::thread::sleep(Duration::from_millis(50));

        assert!(registry.sweep().is_empty());
        assert!(registry.is_logged_in(&id));
    }

    #[test]
    fn test_session_duration_grows() {
        let registry = SessionRegistry::with_default_config();
        let id = Uuid::new_v4();

        registry.set_logged_in(id, addr());
        std::thread::sleep(Duration::from_millis(30));

        let duration = registry.session_duration(&id).unwrap();
        assert!(duration >= Duration::from_millis(25));

        assert_eq!(registry.session_duration(&Uuid::new_v4()), None);
    }

    #[test]
    fn test_authenticated_identities() {
        let registry = SessionRegistry::with_default_config();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.set_logged_in(a, addr());
        registry.set_logged_in(b, addr());

        let mut ids = registry.authenticated_identities();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
