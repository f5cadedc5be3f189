//! 密码哈希与策略模块
//!
//! 提供安全的密码哈希、验证与注册策略校验功能，支持多种哈希算法。
//!
//! ## 支持的算法
//!
//! - **Argon2** (推荐): 内存硬哈希算法，抵抗 GPU/ASIC 攻击（需启用 `argon2` feature）
//! - **bcrypt**: 经典的密码哈希算法，广泛使用（需启用 `bcrypt` feature）
//!
//! ## Features
//!
//! - `argon2` - 启用 Argon2id 密码哈希支持（默认启用）
//! - `bcrypt` - 启用 bcrypt 密码哈希支持（默认启用）
//!
//! ## 示例
//!
//! ### 使用默认算法
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
//! ### 使用指定算法
//!
#![cfg_attr(feature = "bcrypt", doc = "```rust")]
#![cfg_attr(not(feature = "bcrypt"), doc = "```rust,ignore")]
//! use authgate::password::{PasswordHasher, Algorithm};
//!
//! let hasher = PasswordHasher::new(Algorithm::Bcrypt).with_bcrypt_cost(4);
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! ```
//!
//! ### 注册时的密码策略
//!
//! ```rust
//! use authgate::password::PasswordPolicy;
//!
//! let policy = PasswordPolicy::strict();
//! assert!(policy.validate("weak").is_err());
//! assert!(policy.validate("Str0ng_P@ssword!").is_ok());
//! ```

mod hasher;
mod policy;

pub use hasher::{Algorithm, PasswordHasher, hash_password, verify_password};
pub use policy::{PasswordPolicy, validate_passwords_match};
