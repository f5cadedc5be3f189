//! 两步验证模块
//!
//! 提供 TOTP 验证码和一次性备用恢复码两种第二因素。
//!
//! ## 支持的验证方式
//!
//! - **TOTP**: 基于时间的一次性密码 (Google Authenticator 兼容)
//! - **备用恢复码**: 设备丢失时的一次性兜底验证码
//!
//! ## TOTP 示例
//!
//! ```rust
//! use authgate::mfa::{TotpConfig, TotpManager};
//!
//! let manager = TotpManager::new(TotpConfig::default());
//!
//! // 生成密钥和二维码 URI
//! let secret = manager.generate_secret().unwrap();
//! let uri = manager.generate_uri(&secret, "steve");
//!
//! // 验证用户输入的验证码
//! let code = manager.generate_code(&secret).unwrap();
//! assert!(manager.verify(&secret, &code).unwrap());
//! ```
//!
//! ## 启用流程示例
//!
//! ```rust
//! use authgate::mfa::{BackupCodeConfig, TotpConfig, TwoFactorEngine};
//! use uuid::Uuid;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = TwoFactorEngine::new(TotpConfig::default(), BackupCodeConfig::default());
//! let identity = Uuid::new_v4();
//!
//! // 开始启用：密钥和备用恢复码立即持久化为待确认状态
//! let setup = engine.begin_setup(&identity, "steve").await.unwrap();
//! println!("扫描二维码: {}", setup.otpauth_uri);
//!
//! // 用户回填第一个验证码后才真正启用
//! # let secret = authgate::mfa::TotpSecret::from_base32(&setup.secret_base32).unwrap();
//! # let code = engine.totp().generate_code(&secret).unwrap();
//! assert!(engine.confirm_setup(&identity, &code).await.unwrap());
//! # });
//! ```

pub mod backup;
pub mod engine;
pub mod totp;

pub use backup::{BackupCodeConfig, BackupCodeManager};
pub use engine::{TwoFactorEngine, TwoFactorSetup};
pub use totp::{TotpAlgorithm, TotpConfig, TotpManager, TotpSecret, TotpVerifyResult};
