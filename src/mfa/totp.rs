//! TOTP (基于时间的一次性密码) 实现模块
//!
//! 提供 TOTP 的生成、验证功能，兼容 Google Authenticator、Authy 等应用。
//!
//! ## 特性
//!
//! - 符合 RFC 6238 标准
//! - 支持自定义时间步长和位数
//! - 生成 otpauth:// URI 供二维码使用
//!
//! ## 示例
//!
//! ```rust
//! use authgate::mfa::totp::{TotpConfig, TotpManager};
//!
//! // 创建 TOTP 管理器
//! let config = TotpConfig::default();
//! let manager = TotpManager::new(config);
//!
//! // 为用户生成密钥
//! let secret = manager.generate_secret().unwrap();
//!
//! // 生成当前 TOTP 码
//! let code = manager.generate_code(&secret).unwrap();
//!
//! // 验证用户输入的码
//! assert!(manager.verify(&secret, &code).unwrap());
//! ```

use base32::{Alphabet, decode as base32_decode, encode as base32_encode};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result, ValidationError};
use crate::random::{constant_time_compare, generate_random_bytes};

/// TOTP 哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotpAlgorithm {
    /// SHA-1（默认，最广泛支持）
    #[default]
    SHA1,
    /// SHA-256
    SHA256,
    /// SHA-512
    SHA512,
}

impl TotpAlgorithm {
    /// 获取算法名称（用于 otpauth URI）
    pub fn as_str(&self) -> &'static str {
        match self {
            TotpAlgorithm::SHA1 => "SHA1",
            TotpAlgorithm::SHA256 => "SHA256",
            TotpAlgorithm::SHA512 => "SHA512",
        }
    }
}

/// TOTP 配置
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// 时间步长（秒），默认 30 秒
    pub time_step: u64,

    /// 验证码位数，默认 6 位
    pub digits: u32,

    /// 哈希算法
    pub algorithm: TotpAlgorithm,

    /// 允许的时间偏差窗口（前后各多少个时间步）
    /// 默认为 1，即允许前后各 30 秒的误差
    pub skew: u64,

    /// 密钥长度（字节），默认 20 字节（160 位）
    pub secret_length: usize,

    /// 签发者名称（显示在认证器应用中）
    pub issuer: String,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            time_step: 30,
            digits: 6,
            algorithm: TotpAlgorithm::SHA1,
            skew: 1,
            secret_length: 20,
            issuer: "AuthGate".to_string(),
        }
    }
}

impl TotpConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置时间步长
    pub fn with_time_step(mut self, seconds: u64) -> Self {
        self.time_step = seconds;
        self
    }

    /// 设置验证码位数
    pub fn with_digits(mut self, digits: u32) -> Self {
        assert!((6..=8).contains(&digits), "digits must be between 6 and 8");
        self.digits = digits;
        self
    }

    /// 设置哈希算法
    pub fn with_algorithm(mut self, algorithm: TotpAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// 设置时间偏差窗口
    pub fn with_skew(mut self, skew: u64) -> Self {
        self.skew = skew;
        self
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// 设置密钥长度
    pub fn with_secret_length(mut self, length: usize) -> Self {
        assert!(length >= 16, "secret length must be at least 16 bytes");
        self.secret_length = length;
        self
    }
}

/// TOTP 密钥信息
#[derive(Debug, Clone)]
pub struct TotpSecret {
    /// 原始密钥字节
    pub raw: Vec<u8>,

    /// Base32 编码的密钥（用于显示和 URI）
    pub base32: String,
}

impl TotpSecret {
    /// 从原始字节创建
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let base32 = base32_encode(Alphabet::Rfc4648 { padding: false }, &bytes);
        Self { raw: bytes, base32 }
    }

    /// 从 Base32 字符串创建
    pub fn from_base32(base32: &str) -> Result<Self> {
        let clean = base32.replace([' ', '-'], "").to_uppercase();
        let raw = base32_decode(Alphabet::Rfc4648 { padding: false }, &clean).ok_or_else(|| {
            Error::Validation(ValidationError::Custom("invalid base32 secret".to_string()))
        })?;
        Ok(Self { raw, base32: clean })
    }
}

/// TOTP 验证结果
#[derive(Debug, Clone)]
pub struct TotpVerifyResult {
    /// 是否验证成功
    pub valid: bool,

    /// 匹配的时间步偏移量（0 表示当前步，负数表示过去，正数表示未来）
    pub time_step_offset: i64,
}

/// TOTP 管理器
#[derive(Debug, Clone)]
pub struct TotpManager {
    config: TotpConfig,
}

impl TotpManager {
    /// 创建新的 TOTP 管理器
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    /// 生成新的 TOTP 密钥
    pub fn generate_secret(&self) -> Result<TotpSecret> {
        let bytes = generate_random_bytes(self.config.secret_length)?;
        Ok(TotpSecret::from_bytes(bytes))
    }

    /// 生成当前的 TOTP 验证码
    pub fn generate_code(&self, secret: &TotpSecret) -> Result<String> {
        let timestamp = self.current_timestamp();
        self.generate_code_at(secret, timestamp)
    }

    /// 生成指定时间的 TOTP 验证码
    pub fn generate_code_at(&self, secret: &TotpSecret, timestamp: u64) -> Result<String> {
        let counter = timestamp / self.config.time_step;
        self.generate_hotp(&secret.raw, counter)
    }

    /// 验证 TOTP 验证码
    pub fn verify(&self, secret: &TotpSecret, code: &str) -> Result<bool> {
        let result = self.verify_with_result_at(secret, code, self.current_timestamp())?;
        Ok(result.valid)
    }

    /// 在指定时间点验证 TOTP 验证码并返回详细结果
    pub fn verify_with_result_at(
        &self,
        secret: &TotpSecret,
        code: &str,
        timestamp: u64,
    ) -> Result<TotpVerifyResult> {
        let current_counter = timestamp / self.config.time_step;

        // 规范化输入码
        let normalized_code = code.replace([' ', '-'], "");

        // 检查码的长度
        if normalized_code.len() != self.config.digits as usize {
            return Ok(TotpVerifyResult {
                valid: false,
                time_step_offset: 0,
            });
        }

        // 在允许的时间窗口内检查
        for offset in -(self.config.skew as i64)..=(self.config.skew as i64) {
            let check_counter = (current_counter as i64 + offset) as u64;
            let expected_code = self.generate_hotp(&secret.raw, check_counter)?;

            if constant_time_compare(normalized_code.as_bytes(), expected_code.as_bytes()) {
                return Ok(TotpVerifyResult {
                    valid: true,
                    time_step_offset: offset,
                });
            }
        }

        Ok(TotpVerifyResult {
            valid: false,
            time_step_offset: 0,
        })
    }

    /// 生成 otpauth:// URI
    ///
    /// 标签格式为 `Issuer:account`，URI 可用于生成二维码，
    /// 供认证器应用扫描
    pub fn generate_uri(&self, secret: &TotpSecret, account: &str) -> String {
        let label = format!("{}:{}", self.config.issuer, account);
        format!(
            "otpauth://totp/{}?secret={}&digits={}&period={}&algorithm={}&issuer={}",
            urlencoding::encode(&label),
            secret.base32,
            self.config.digits,
            self.config.time_step,
            self.config.algorithm.as_str(),
            urlencoding::encode(&self.config.issuer)
        )
    }

    /// 获取当前验证码的剩余有效时间（秒）
    pub fn time_remaining(&self) -> u64 {
        let timestamp = self.current_timestamp();
        self.config.time_step - (timestamp % self.config.time_step)
    }

    /// 获取配置
    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    // ========================================================================
    // 内部方法
    // ========================================================================

    /// 获取当前 Unix 时间戳
    fn current_timestamp(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs()
    }

    /// 生成 HOTP 验证码
    fn generate_hotp(&self, secret: &[u8], counter: u64) -> Result<String> {
        let counter_bytes = counter.to_be_bytes();

        let hash = match self.config.algorithm {
            TotpAlgorithm::SHA1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(secret).map_err(|_| {
                    Error::Validation(ValidationError::Custom("invalid secret key".to_string()))
                })?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
            TotpAlgorithm::SHA256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| {
                    Error::Validation(ValidationError::Custom("invalid secret key".to_string()))
                })?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
            TotpAlgorithm::SHA512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret).map_err(|_| {
                    Error::Validation(ValidationError::Custom("invalid secret key".to_string()))
                })?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
        };

        // 动态截断
        let offset = (hash.last().unwrap() & 0x0f) as usize;
        let binary = ((hash[offset] & 0x7f) as u32) << 24
            | (hash[offset + 1] as u32) << 16
            | (hash[offset + 2] as u32) << 8
            | (hash[offset + 3] as u32);

        // 取模得到指定位数的码
        let modulo = 10u32.pow(self.config.digits);
        let code = binary % modulo;

        // 左填充零
        Ok(format!(
            "{:0width$}",
            code,
            width = self.config.digits as usize
        ))
    }
}
