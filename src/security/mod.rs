//! 安全防护模块
//!
//! 提供登录路径上的各种防护机制。
//!
//! ## 子模块
//!
//! - **lockout**: 失败计数与渐进式锁定，防止暴力破解
//! - **ip_filter**: 地址白名单 / 黑名单
//!
//! ## 锁定示例
//!
//! ```rust
//! use authgate::security::{FailureOutcome, LockoutConfig, RateLimiter};
//! use std::time::Duration;
//! use uuid::Uuid;
//!
//! let config = LockoutConfig::default()
//!     .with_max_attempts(3)
//!     .with_lockout_duration(Duration::from_secs(300));
//! let limiter = RateLimiter::new(config).unwrap();
//!
//! let player = Uuid::new_v4();
//! limiter.record_failure(&player, None);
//! limiter.record_failure(&player, None);
//!
//! // 第三次失败触发锁定
//! let outcome = limiter.record_failure(&player, None);
//! assert!(outcome.is_locked());
//! ```
//!
//! ## 地址过滤示例
//!
//! ```rust
//! use authgate::security::IpFilter;
//!
//! let filter = IpFilter::new();
//! filter.blacklist_add("198.51.100.1".parse().unwrap());
//!
//! assert!(filter.is_blacklisted(&"198.51.100.1".parse().unwrap()));
//! assert!(!filter.is_blacklisted(&"198.51.100.2".parse().unwrap()));
//! ```

pub mod ip_filter;
pub mod lockout;

pub use ip_filter::{IpFilter, IpFilterSnapshot};
pub use lockout::{FailureOutcome, LockScope, LockoutConfig, RateLimiter};
