//! 统一错误类型模块
//!
//! 提供 authgate 库中所有操作的错误类型定义。
//!
//! 错误分为五大类：输入校验（[`ValidationError`]）、策略拒绝
//! （[`PolicyError`]，带剩余等待时间等细节）、存储故障
//! （[`StorageError`]，"记录不存在" 不属于错误，由 `Ok(None)` 表达）、
//! 外部身份校验故障（[`VerificationError`]）以及加密原语故障
//! （[`CryptoError`]）。网关中没有任何错误是致命的，所有失败路径
//! 都会降级为 "拒绝并提示"。

use std::fmt;
use std::time::Duration;

/// authgate 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// authgate 库的错误类型
#[derive(Debug)]
pub enum Error {
    /// 密码哈希错误
    PasswordHash(PasswordHashError),

    /// 输入校验错误（不改变任何状态）
    Validation(ValidationError),

    /// 策略拒绝（锁定、黑名单、未注册等）
    Policy(PolicyError),

    /// 存储错误
    Storage(StorageError),

    /// 外部身份校验错误
    Verification(VerificationError),

    /// 加密错误
    Crypto(CryptoError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个校验错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(ValidationError::Custom(msg.into()))
    }

    /// 创建一个身份锁定错误
    pub fn locked_out(retry_after: Duration) -> Self {
        Error::Policy(PolicyError::LockedOut { retry_after })
    }

    /// 创建一个地址锁定错误
    pub fn ip_locked_out(retry_after: Duration) -> Self {
        Error::Policy(PolicyError::IpLockedOut { retry_after })
    }

    /// 是否属于策略拒绝（对调用方而言可以直接转为提示信息）
    pub fn is_policy(&self) -> bool {
        matches!(self, Error::Policy(_))
    }
}

/// 密码哈希相关错误
///
/// 仅覆盖哈希的生成路径；校验路径按约定永不报错，格式损坏的
/// 摘要一律判为不匹配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    /// 哈希生成失败
    HashFailed(String),
}

/// 输入校验相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 密码太短
    PasswordTooShort { min_length: usize, actual: usize },
    /// 密码太长
    PasswordTooLong { max_length: usize, actual: usize },
    /// 两次输入的密码不一致
    PasswordMismatch,
    /// 密码缺少必需的字符类别（携带给用户看的缺失列表）
    PasswordMissingClasses(String),
    /// 找回令牌无效或已失效
    InvalidRecoveryToken,
    /// 字段为空
    EmptyField(String),
    /// 自定义校验错误
    Custom(String),
}

/// 策略拒绝
///
/// 这些不是程序故障，而是网关按规则给出的否定回答；
/// 除记录失败尝试的路径外不改变任何状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 身份处于锁定期
    LockedOut {
        /// 剩余等待时间
        retry_after: Duration,
    },
    /// 来源地址处于锁定期
    IpLockedOut {
        /// 剩余等待时间
        retry_after: Duration,
    },
    /// 密码错误，失败已计入
    InvalidPassword {
        /// 锁定前还可以再试几次
        attempts_remaining: u32,
    },
    /// 两步验证码错误，失败已计入
    InvalidTwoFactorCode {
        /// 锁定前还可以再试几次
        attempts_remaining: u32,
    },
    /// 来源地址在黑名单中
    Blacklisted,
    /// 尚未注册
    NotRegistered,
    /// 已经注册过
    AlreadyRegistered,
    /// 需要已登录的会话
    NotAuthenticated,
    /// 没有待完成的两步验证登录
    NoPendingTwoFactor,
    /// 两步验证已经启用
    TwoFactorAlreadyEnabled,
}

/// 存储相关错误
///
/// "记录不存在" 由 `Ok(None)` 表达，不进入这里。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 底层 I/O 失败
    Io(String),
    /// 记录内容无法解析
    Corrupt(String),
}

/// 外部身份校验相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// 校验请求超时
    Timeout,
    /// 校验服务不可达
    Unavailable(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PasswordHash(e) => write!(f, "Password hash error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Policy(e) => write!(f, "Rejected: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Verification(e) => write!(f, "Verification error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for PasswordHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordHashError::HashFailed(msg) => write!(f, "hash generation failed: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::PasswordTooShort { min_length, actual } => {
                write!(
                    f,
                    "password too short: minimum {} characters, got {}",
                    min_length, actual
                )
            }
            ValidationError::PasswordTooLong { max_length, actual } => {
                write!(
                    f,
                    "password too long: maximum {} characters, got {}",
                    max_length, actual
                )
            }
            ValidationError::PasswordMismatch => write!(f, "passwords do not match"),
            ValidationError::PasswordMissingClasses(missing) => {
                write!(f, "password needs: {}", missing)
            }
            ValidationError::InvalidRecoveryToken => {
                write!(f, "recovery token is invalid or expired")
            }
            ValidationError::EmptyField(field) => write!(f, "field '{}' cannot be empty", field),
            ValidationError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::LockedOut { retry_after } => {
                write!(
                    f,
                    "too many failed attempts, retry in {} seconds",
                    retry_after.as_secs()
                )
            }
            PolicyError::IpLockedOut { retry_after } => {
                write!(
                    f,
                    "too many failed attempts from this address, retry in {} seconds",
                    retry_after.as_secs()
                )
            }
            PolicyError::InvalidPassword { attempts_remaining } => {
                write!(
                    f,
                    "wrong password, {} attempts remaining",
                    attempts_remaining
                )
            }
            PolicyError::InvalidTwoFactorCode { attempts_remaining } => {
                write!(
                    f,
                    "wrong two-factor code, {} attempts remaining",
                    attempts_remaining
                )
            }
            PolicyError::Blacklisted => write!(f, "address is blacklisted"),
            PolicyError::NotRegistered => write!(f, "not registered, register first"),
            PolicyError::AlreadyRegistered => write!(f, "already registered"),
            PolicyError::NotAuthenticated => write!(f, "login required"),
            PolicyError::NoPendingTwoFactor => {
                write!(f, "no two-factor verification is pending")
            }
            PolicyError::TwoFactorAlreadyEnabled => write!(f, "two-factor is already enabled"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "I/O failed: {}", msg),
            StorageError::Corrupt(msg) => write!(f, "record corrupt: {}", msg),
        }
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationError::Timeout => write!(f, "verification request timed out"),
            VerificationError::Unavailable(msg) => {
                write!(f, "verification service unavailable: {}", msg)
            }
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for PasswordHashError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for PolicyError {}
impl std::error::Error for StorageError {}
impl std::error::Error for VerificationError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<PasswordHashError> for Error {
    fn from(err: PasswordHashError) -> Self {
        Error::PasswordHash(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<PolicyError> for Error {
    fn from(err: PolicyError) -> Self {
        Error::Policy(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<VerificationError> for Error {
    fn from(err: VerificationError) -> Self {
        Error::Verification(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(StorageError::Corrupt(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation(ValidationError::PasswordTooShort {
            min_length: 8,
            actual: 3,
        });
        assert_eq!(
            err.to_string(),
            "Validation error: password too short: minimum 8 characters, got 3"
        );

        let err = Error::locked_out(Duration::from_secs(300));
        assert_eq!(
            err.to_string(),
            "Rejected: too many failed attempts, retry in 300 seconds"
        );
    }

    #[test]
    fn test_policy_detection() {
        assert!(Error::Policy(PolicyError::Blacklisted).is_policy());
        assert!(Error::ip_locked_out(Duration::from_secs(60)).is_policy());
        assert!(!Error::internal("boom").is_policy());
    }

    #[test]
    fn test_from_sub_errors() {
        let err: Error = StorageError::Io("disk gone".into()).into();
        assert!(matches!(err, Error::Storage(StorageError::Io(_))));

        let err: Error = ValidationError::PasswordMismatch.into();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_missing_classes_message() {
        let err = ValidationError::PasswordMissingClasses("uppercase letter, number".into());
        assert_eq!(
            err.to_string(),
            "password needs: uppercase letter, number"
        );
    }
}
