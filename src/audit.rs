//! 审计日志模块
//!
//! 提供安全事件的记录和审计功能，包括：
//!
//! - **安全事件枚举**: 定义认证闸门关心的各种事件
//! - **审计日志 Trait**: 定义日志记录接口
//! - **内存实现**: 用于测试和查询的简单实现
//! - **tracing 实现**: 把事件转发到宿主的结构化日志
//!
//! ## 使用示例
//!
//! ### 基本用法
//!
//! ```rust
//! use authgate::audit::{AuditLogger, InMemoryAuditLogger, SecurityEvent};
//! use uuid::Uuid;
//!
//! let logger = InMemoryAuditLogger::new();
//! let identity = Uuid::new_v4();
//!
//! // 记录登录成功事件
//! logger.log(SecurityEvent::login_success(identity, "192.168.1.1".parse().unwrap()));
//!
//! // 记录登录失败事件
//! logger.log(SecurityEvent::login_failed(identity, "invalid password"));
//!
//! let events = logger.get_events();
//! assert_eq!(events.len(), 2);
//! ```
//!
//! ### 自定义事件
//!
//! ```rust
//! use authgate::audit::{EventSeverity, SecurityEvent};
//! use uuid::Uuid;
//!
//! let event = SecurityEvent::custom("command_abuse", EventSeverity::Warning)
//!     .with_identity(Uuid::new_v4())
//!     .with_detail("command", "/login")
//!     .with_detail("count", "50");
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 调试信息
    Debug,
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
    /// 严重/危险
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Debug => write!(f, "DEBUG"),
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Error => write!(f, "ERROR"),
            EventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 安全事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 注册成功
    Registered,
    /// 登录成功
    LoginSuccess,
    /// 登录失败
    LoginFailed,
    /// 登出
    Logout,
    /// 触发锁定
    LockoutTriggered,
    /// 管理员解锁
    Unlocked,
    /// 会话闲置过期
    SessionExpired,
    /// 两步验证启用
    TwoFactorEnabled,
    /// 两步验证关闭
    TwoFactorDisabled,
    /// 两步验证通过
    TwoFactorVerified,
    /// 两步验证失败
    TwoFactorFailed,
    /// 找回令牌签发
    RecoveryIssued,
    /// 找回流程完成
    RecoveryCompleted,
    /// 密码更改
    PasswordChanged,
    /// 管理员重置密码
    PasswordReset,
    /// 账号删除
    AccountDeleted,
    /// 连接被拒绝
    ConnectionBlocked,
    /// 自定义事件
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Registered => write!(f, "registered"),
            EventType::LoginSuccess => write!(f, "login_success"),
            EventType::LoginFailed => write!(f, "login_failed"),
            EventType::Logout => write!(f, "logout"),
            EventType::LockoutTriggered => write!(f, "lockout_triggered"),
            EventType::Unlocked => write!(f, "unlocked"),
            EventType::SessionExpired => write!(f, "session_expired"),
            EventType::TwoFactorEnabled => write!(f, "two_factor_enabled"),
            EventType::TwoFactorDisabled => write!(f, "two_factor_disabled"),
            EventType::TwoFactorVerified => write!(f, "two_factor_verified"),
            EventType::TwoFactorFailed => write!(f, "two_factor_failed"),
            EventType::RecoveryIssued => write!(f, "recovery_issued"),
            EventType::RecoveryCompleted => write!(f, "recovery_completed"),
            EventType::PasswordChanged => write!(f, "password_changed"),
            EventType::PasswordReset => write!(f, "password_reset"),
            EventType::AccountDeleted => write!(f, "account_deleted"),
            EventType::ConnectionBlocked => write!(f, "connection_blocked"),
            EventType::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// 安全事件
///
/// 表示一条要进审计记录的事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 相关身份（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Uuid>,
    /// 来源地址（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    /// 事件消息/描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            identity: None,
            address: None,
            message: None,
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// 创建自定义事件
    pub fn custom(name: impl Into<String>, severity: EventSeverity) -> Self {
        Self::new(EventType::Custom(name.into()), severity)
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 创建注册成功事件
    pub fn registered(identity: Uuid, address: IpAddr) -> Self {
        Self::new(EventType::Registered, EventSeverity::Info)
            .with_identity(identity)
            .with_address(address)
            .with_message("Account registered")
    }

    /// 创建登录成功事件
    pub fn login_success(identity: Uuid, address: IpAddr) -> Self {
        Self::new(EventType::LoginSuccess, EventSeverity::Info)
            .with_identity(identity)
            .with_address(address)
            .with_message("Logged in successfully")
    }

    /// 创建登录失败事件
    pub fn login_failed(identity: Uuid, reason: impl Into<String>) -> Self {
        Self::new(EventType::LoginFailed, EventSeverity::Warning)
            .with_identity(identity)
            .with_message(reason)
    }

    /// 创建登出事件
    pub fn logout(identity: Uuid) -> Self {
        Self::new(EventType::Logout, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Logged out")
    }

    /// 创建锁定触发事件
    pub fn lockout_triggered(identity: Uuid, scope: impl Into<String>) -> Self {
        Self::new(EventType::LockoutTriggered, EventSeverity::Warning)
            .with_identity(identity)
            .with_detail("scope", scope.into())
            .with_message("Too many failed attempts")
    }

    /// 创建管理员解锁事件
    pub fn unlocked(identity: Uuid) -> Self {
        Self::new(EventType::Unlocked, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Lockout cleared by admin")
    }

    /// 创建会话过期事件
    pub fn session_expired(identity: Uuid) -> Self {
        Self::new(EventType::SessionExpired, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Session expired after inactivity")
    }

    /// 创建两步验证启用事件
    pub fn two_factor_enabled(identity: Uuid) -> Self {
        Self::new(EventType::TwoFactorEnabled, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Two-factor authentication enabled")
    }

    /// 创建两步验证关闭事件
    pub fn two_factor_disabled(identity: Uuid) -> Self {
        Self::new(EventType::TwoFactorDisabled, EventSeverity::Warning)
            .with_identity(identity)
            .with_message("Two-factor authentication disabled")
    }

    /// 创建两步验证通过事件
    pub fn two_factor_verified(identity: Uuid) -> Self {
        Self::new(EventType::TwoFactorVerified, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Two-factor code accepted")
    }

    /// 创建两步验证失败事件
    pub fn two_factor_failed(identity: Uuid) -> Self {
        Self::new(EventType::TwoFactorFailed, EventSeverity::Warning)
            .with_identity(identity)
            .with_message("Two-factor code rejected")
    }

    /// 创建找回令牌签发事件
    pub fn recovery_issued(identity: Uuid) -> Self {
        Self::new(EventType::RecoveryIssued, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Recovery token issued")
    }

    /// 创建找回完成事件
    pub fn recovery_completed(identity: Uuid) -> Self {
        Self::new(EventType::RecoveryCompleted, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Password recovered via token")
    }

    /// 创建密码更改事件
    pub fn password_changed(identity: Uuid) -> Self {
        Self::new(EventType::PasswordChanged, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Password changed")
    }

    /// 创建管理员重置密码事件
    pub fn password_reset(identity: Uuid) -> Self {
        Self::new(EventType::PasswordReset, EventSeverity::Warning)
            .with_identity(identity)
            .with_message("Password reset by admin")
    }

    /// 创建账号删除事件
    pub fn account_deleted(identity: Uuid) -> Self {
        Self::new(EventType::AccountDeleted, EventSeverity::Warning)
            .with_identity(identity)
            .with_message("Account deleted")
    }

    /// 创建连接拒绝事件
    pub fn connection_blocked(address: IpAddr, reason: impl Into<String>) -> Self {
        Self::new(EventType::ConnectionBlocked, EventSeverity::Warning)
            .with_address(address)
            .with_message(reason)
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    /// 设置相关身份
    pub fn with_identity(mut self, identity: Uuid) -> Self {
        self.identity = Some(identity);
        self
    }

    /// 设置来源地址
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 设置严重程度
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    // ========================================================================
    // 查询方法
    // ========================================================================

    /// 获取事件类型名称
    pub fn event_name(&self) -> String {
        self.event_type.to_string()
    }

    /// 检查是否是高严重程度事件
    pub fn is_high_severity(&self) -> bool {
        matches!(
            self.severity,
            EventSeverity::Error | EventSeverity::Critical
        )
    }
}

/// 生成事件 ID
fn generate_event_id() -> String {
    use crate::random::generate_random_hex;
    format!(
        "evt_{}",
        generate_random_hex(16).unwrap_or_else(|_| "unknown".to_string())
    )
}

// ============================================================================
// AuditLogger Trait
// ============================================================================

/// 审计日志记录器 trait
///
/// 定义审计日志的记录接口
pub trait AuditLogger: Send + Sync {
    /// 记录安全事件
    fn log(&self, event: SecurityEvent);

    /// 批量记录事件
    fn log_batch(&self, events: Vec<SecurityEvent>) {
        for event in events {
            self.log(event);
        }
    }
}

// ============================================================================
// InMemoryAuditLogger
// ============================================================================

/// 内存审计日志记录器
///
/// 用于测试和开发环境，将事件存储在内存中
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: Arc<RwLock<Vec<SecurityEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志记录器
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: None,
        }
    }

    /// 创建带有最大事件数限制的日志记录器
    pub fn with_max_events(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: Some(max),
        }
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<SecurityEvent> {
        self.events.read().unwrap().clone()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// 按身份获取事件
    pub fn get_events_by_identity(&self, identity: &Uuid) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.identity.as_ref() == Some(identity))
            .cloned()
            .collect()
    }

    /// 按事件类型获取事件
    pub fn get_events_by_type(&self, event_type: &EventType) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| &e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// 按严重程度获取事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// 获取最近 N 个事件
    pub fn get_recent_events(&self, count: usize) -> Vec<SecurityEvent> {
        let events = self.events.read().unwrap();
        events.iter().rev().take(count).cloned().collect()
    }

    /// 获取高严重程度事件
    pub fn get_high_severity_events(&self) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.is_high_severity())
            .cloned()
            .collect()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        self.events.write().unwrap().clear();
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let mut events = self.events.write().unwrap();

        // 如果设置了最大事件数，删除最旧的事件
        if let Some(max) = self.max_events {
            while events.len() >= max {
                events.remove(0);
            }
        }

        events.push(event);
    }
}

impl Clone for InMemoryAuditLogger {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            max_events: self.max_events,
        }
    }
}

// ============================================================================
// TracingAuditLogger
// ============================================================================

/// 基于 tracing 的审计日志记录器
///
/// 把事件按严重程度映射到对应的日志级别，交给宿主已配置的
/// subscriber 输出。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let name = event.event_name();
        let identity = event.identity.map(|id| id.to_string()).unwrap_or_default();
        let address = event.address.map(|a| a.to_string()).unwrap_or_default();
        let message = event.message.as_deref().unwrap_or("");

        match event.severity {
            EventSeverity::Debug => {
                tracing::debug!(event = %name, %identity, %address, message, "audit")
            }
            EventSeverity::Info => {
                tracing::info!(event = %name, %identity, %address, message, "audit")
            }
            EventSeverity::Warning => {
                tracing::warn!(event = %name, %identity, %address, message, "audit")
            }
            EventSeverity::Error | EventSeverity::Critical => {
                tracing::error!(event = %name, %identity, %address, message, "audit")
            }
        }
    }
}

// ============================================================================
// NoOpAuditLogger
// ============================================================================

/// 空操作日志记录器
///
/// 不执行任何操作，用于禁用审计日志
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAuditLogger;

impl NoOpAuditLogger {
    /// 创建新的空操作日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _event: SecurityEvent) {
        // 不执行任何操作
    }
}

// ============================================================================
// 测试
// ============================================================================
