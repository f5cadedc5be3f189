//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成找回令牌、两步验证密钥与
//! 备用验证码等敏感数据。

use std::collections::HashSet;

use rand::{Rng, TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Arguments
///
/// * `length` - 要生成的字节数
///
/// # Returns
///
/// 返回包含随机字节的 `Vec<u8>`
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的十六进制随机字符串
///
/// # Arguments
///
/// * `byte_length` - 要生成的字节数（最终字符串长度为字节数的两倍）
///
/// # Returns
///
/// 返回十六进制编码的随机字符串
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_random_hex;
///
/// let hex = generate_random_hex(16).unwrap();
/// assert_eq!(hex.len(), 32); // 16 bytes = 32 hex chars
/// ```
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(hex_encode(&bytes))
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充）
///
/// # Arguments
///
/// * `byte_length` - 要生成的字节数
///
/// # Returns
///
/// 返回 Base64 URL 安全编码的随机字符串
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_random_base64_url;
///
/// let token = generate_random_base64_url(32).unwrap();
/// // URL 安全，可直接放进聊天消息或 URL 参数
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成账号找回令牌
///
/// 使用 32 字节（256 位）的随机数据，提供足够的熵
///
/// # Returns
///
/// 返回 Base64 URL 安全编码的找回令牌
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_recovery_token;
///
/// let token = generate_recovery_token().unwrap();
/// assert!(token.len() >= 40);
/// ```
pub fn generate_recovery_token() -> Result<String> {
    generate_random_base64_url(32)
}

/// 六位十进制备用码的总数（100000 到 999999）
pub const BACKUP_CODE_SPACE: usize = 900_000;

/// 生成一组两步验证备用码
///
/// 备用码为 6 位十进制数字（100000 到 999999），方便用户抄写；
/// 同一组内保证互不重复，数量不能超过 [`BACKUP_CODE_SPACE`]。
///
/// # Arguments
///
/// * `count` - 要生成的备用码数量
///
/// # Returns
///
/// 返回备用码列表；`count` 超出码空间时返回校验错误
///
/// # Example
///
/// ```rust
/// use authgate::random::generate_backup_codes;
///
/// let codes = generate_backup_codes(10).unwrap();
/// assert_eq!(codes.len(), 10);
/// for code in &codes {
///     assert_eq!(code.len(), 6);
///     assert!(code.chars().all(|c| c.is_ascii_digit()));
/// }
/// ```
pub fn generate_backup_codes(count: usize) -> Result<Vec<String>> {
    if count > BACKUP_CODE_SPACE {
        return Err(Error::validation(format!(
            "requested {} backup codes but only {} distinct codes exist",
            count, BACKUP_CODE_SPACE
        )));
    }

    let mut seen = HashSet::with_capacity(count);
    let mut codes = Vec::with_capacity(count);

    while codes.len() < count {
        let code = format!("{}", rand::rng().random_range(100_000u32..1_000_000));
        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }

    Ok(codes)
}

// ============================================================================
// 辅助函数
// ============================================================================

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
///
/// # Arguments
///
/// * `a` - 第一个字节切片
/// * `b` - 第二个字节切片
///
/// # Returns
///
/// 如果两个切片相等返回 true
///
/// # Example
///
/// ```rust
/// use authgate::random::constant_time_compare;
///
/// let a = b"secret_token";
/// let b = b"secret_token";
/// assert!(constant_time_compare(a, b));
///
/// let c = b"other_token!";
/// assert!(!constant_time_compare(a, c));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
///
/// # Arguments
///
/// * `a` - 第一个字符串
/// * `b` - 第二个字符串
///
/// # Returns
///
/// 如果两个字符串相等返回 true
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
