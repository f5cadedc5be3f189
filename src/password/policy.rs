//! 密码策略校验
//!
//! 注册、改密和账号找回共用的密码规则：长度范围加可选的字符类别
//! 要求。校验失败时把缺失的类别汇总成一条人类可读的提示，而不是
//! 只报告第一个问题。

use crate::error::{Error, Result, ValidationError};

/// 密码策略配置
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// 最小长度
    pub min_length: usize,
    /// 最大长度
    pub max_length: usize,
    /// 是否要求小写字母
    pub require_lowercase: bool,
    /// 是否要求大写字母
    pub require_uppercase: bool,
    /// 是否要求数字
    pub require_digit: bool,
    /// 是否要求特殊字符
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 4,
            max_length: 128,
            require_lowercase: false,
            require_uppercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// 创建严格的密码策略
    pub fn strict() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
            require_special: true,
        }
    }

    /// 设置最小长度
    pub fn with_min_length(mut self, length: usize) -> Self {
        self.min_length = length;
        self
    }

    /// 设置最大长度
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    /// 设置是否要求小写字母
    pub fn with_lowercase(mut self, required: bool) -> Self {
        self.require_lowercase = required;
        self
    }

    /// 设置是否要求大写字母
    pub fn with_uppercase(mut self, required: bool) -> Self {
        self.require_uppercase = required;
        self
    }

    /// 设置是否要求数字
    pub fn with_digit(mut self, required: bool) -> Self {
        self.require_digit = required;
        self
    }

    /// 设置是否要求特殊字符
    pub fn with_special(mut self, required: bool) -> Self {
        self.require_special = required;
        self
    }

    /// 校验密码是否满足策略
    ///
    /// # Arguments
    ///
    /// * `password` - 要校验的明文密码
    ///
    /// # Returns
    ///
    /// 满足策略返回 `Ok(())`，否则返回带提示的校验错误
    ///
    /// # Example
    ///
    /// ```rust
    /// use authgate::password::PasswordPolicy;
    ///
    /// let policy = PasswordPolicy::strict();
    /// assert!(policy.validate("Str0ng!pass").is_ok());
    /// assert!(policy.validate("weak").is_err());
    /// ```
    pub fn validate(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(Error::Validation(ValidationError::EmptyField(
                "password".to_string(),
            )));
        }

        let len = password.chars().count();

        if len < self.min_length {
            return Err(Error::Validation(ValidationError::PasswordTooShort {
                min_length: self.min_length,
                actual: len,
            }));
        }

        if len > self.max_length {
            return Err(Error::Validation(ValidationError::PasswordTooLong {
                max_length: self.max_length,
                actual: len,
            }));
        }

        // 把缺失的类别一次性全部列出来
        let mut missing = Vec::new();

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            missing.push("uppercase letter");
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            missing.push("lowercase letter");
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            missing.push("number");
        }
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            missing.push("special character");
        }

        if !missing.is_empty() {
            return Err(Error::Validation(ValidationError::PasswordMissingClasses(
                missing.join(", "),
            )));
        }

        Ok(())
    }
}

/// 校验两次输入的密码一致
///
/// # Example
///
/// ```rust
/// use authgate::password::validate_passwords_match;
///
/// assert!(validate_passwords_match("abcd", "abcd").is_ok());
/// assert!(validate_passwords_match("abcd", "abce").is_err());
/// ```
pub fn validate_passwords_match(password: &str, confirmation: &str) -> Result<()> {
    if password != confirmation {
        return Err(Error::Validation(ValidationError::PasswordMismatch));
    }
    Ok(())
}
