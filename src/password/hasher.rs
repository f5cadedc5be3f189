//! 密码哈希实现
//!
//! 提供密码哈希和验证的核心功能。
//!
//! 验证走摘要前缀自动识别，因此换算法后旧摘要仍然可以验证；
//! 配合 [`PasswordHasher::needs_rehash`] 可以在登录成功时顺手升级摘要。

#[cfg(feature = "argon2")]
use argon2::Argon2;

#[cfg(feature = "argon2")]
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{Error, PasswordHashError, Result};

/// 支持的哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Argon2id - 推荐的默认算法
    /// 结合了 Argon2i（抵抗侧信道攻击）和 Argon2d（抵抗 GPU 攻击）的优点
    #[cfg(feature = "argon2")]
    Argon2id,

    /// bcrypt - 经典算法，广泛支持
    #[cfg(feature = "bcrypt")]
    Bcrypt,
}

// 编译时检查：至少需要启用一个密码哈希算法
#[cfg(not(any(feature = "argon2", feature = "bcrypt")))]
compile_error!(
    "At least one password hashing algorithm (argon2 or bcrypt) must be enabled. Enable one of the password hashing features."
);

#[allow(clippy::derivable_impls)]
impl Default for Algorithm {
    fn default() -> Self {
        #[cfg(feature = "argon2")]
        {
            Algorithm::Argon2id
        }
        #[cfg(all(not(feature = "argon2"), feature = "bcrypt"))]
        {
            Algorithm::Bcrypt
        }
    }
}

/// 密码哈希器配置
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    /// 使用的哈希算法
    algorithm: Algorithm,

    /// bcrypt 的 cost 参数 (4-31, 默认 10)
    #[cfg(feature = "bcrypt")]
    bcrypt_cost: u32,

    /// Argon2 内存开销，单位 KiB（默认 65536）
    #[cfg(feature = "argon2")]
    argon2_m_cost: u32,

    /// Argon2 迭代次数（默认 3）
    #[cfg(feature = "argon2")]
    argon2_t_cost: u32,

    /// Argon2 并行度（默认 4）
    #[cfg(feature = "argon2")]
    argon2_p_cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            #[cfg(feature = "bcrypt")]
            bcrypt_cost: 10,
            #[cfg(feature = "argon2")]
            argon2_m_cost: 65536,
            #[cfg(feature = "argon2")]
            argon2_t_cost: 3,
            #[cfg(feature = "argon2")]
            argon2_p_cost: 4,
        }
    }
}

impl PasswordHasher {
    /// 创建新的密码哈希器
    ///
    /// # Arguments
    ///
    /// * `algorithm` - 要使用的哈希算法
    ///
    /// # Example
    ///
    /// ```rust
    /// use authgate::password::{PasswordHasher, Algorithm};
    ///
    /// # #[cfg(feature = "argon2")]
    /// let hasher = PasswordHasher::new(Algorithm::Argon2id);
    /// ```
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// 设置 bcrypt 的 cost 参数
    ///
    /// # Arguments
    ///
    /// * `cost` - cost 参数，范围 4-31，默认 10
    ///
    /// # Panics
    ///
    /// 如果 cost 不在 4-31 范围内会 panic
    #[cfg(feature = "bcrypt")]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        assert!(
            (4..=31).contains(&cost),
            "bcrypt cost must be between 4 and 31"
        );
        self.bcrypt_cost = cost;
        self
    }

    /// 设置 Argon2 参数（内存 KiB、迭代次数、并行度）
    ///
    /// 参数在哈希时才会被校验，非法组合会在 [`PasswordHasher::hash`]
    /// 时报 [`PasswordHashError::HashFailed`]。
    #[cfg(feature = "argon2")]
    pub fn with_argon2_params(mut self, m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
        self.argon2_m_cost = m_cost;
        self.argon2_t_cost = t_cost;
        self.argon2_p_cost = p_cost;
        self
    }

    /// 哈希密码
    ///
    /// 每次调用产生新的随机盐，同一密码两次哈希的结果不同。
    ///
    /// # Arguments
    ///
    /// * `password` - 要哈希的明文密码
    ///
    /// # Returns
    ///
    /// 返回哈希后的密码字符串
    ///
    /// # Example
    ///
    /// ```rust
    /// use authgate::password::PasswordHasher;
    ///
    /// let hasher = PasswordHasher::default();
    /// let hash = hasher.hash("my_password").unwrap();
    /// # #[cfg(feature = "argon2")]
    /// assert!(hash.starts_with("$argon2"));
    /// ```
    pub fn hash(&self, password: &str) -> Result<String> {
        match self.algorithm {
            #[cfg(feature = "argon2")]
            Algorithm::Argon2id => self.hash_argon2(password),
            #[cfg(feature = "bcrypt")]
            Algorithm::Bcrypt => self.hash_bcrypt(password),
        }
    }

    /// 验证密码
    ///
    /// 哈希格式自动检测。验证永远不会报错：无法识别或已损坏的
    /// 摘要一律按不匹配处理，返回 `false`。
    ///
    /// # Arguments
    ///
    /// * `password` - 要验证的明文密码
    /// * `hash` - 存储的哈希值
    ///
    /// # Example
    ///
    /// ```rust
    /// use authgate::password::PasswordHasher;
    ///
    /// let hasher = PasswordHasher::default();
    /// let hash = hasher.hash("my_password").unwrap();
    ///
    /// assert!(hasher.verify("my_password", &hash));
    /// assert!(!hasher.verify("wrong_password", &hash));
    /// assert!(!hasher.verify("my_password", "not-a-digest"));
    /// ```
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        // 自动检测哈希格式
        #[cfg(feature = "argon2")]
        if hash.starts_with("$argon2") {
            return self.verify_argon2(password, hash);
        }
        #[cfg(feature = "bcrypt")]
        if hash.starts_with("$2") {
            return self.verify_bcrypt(password, hash);
        }
        false
    }

    /// 检查哈希是否需要重新生成
    ///
    /// 当算法或参数升级时，旧哈希可能需要重新生成
    ///
    /// # Arguments
    ///
    /// * `hash` - 要检查的哈希值
    ///
    /// # Returns
    ///
    /// 如果需要重新生成返回 `true`
    pub fn needs_rehash(&self, hash: &str) -> bool {
        match self.algorithm {
            #[cfg(feature = "argon2")]
            Algorithm::Argon2id => !hash.starts_with("$argon2id"),
            #[cfg(feature = "bcrypt")]
            Algorithm::Bcrypt => {
                if !hash.starts_with("$2") {
                    return true;
                }
                // 检查 cost 是否匹配
                if let Some(cost_str) = hash.get(4..6)
                    && let Ok(cost) = cost_str.parse::<u32>()
                {
                    return cost < self.bcrypt_cost;
                }
                true
            }
        }
    }

    // ========================================================================
    // Argon2 实现
    // ========================================================================

    #[cfg(feature = "argon2")]
    fn hash_argon2(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::fill(&mut salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "Failed to generate random salt: {}",
                e
            )))
        })?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "Failed to encode salt: {}",
                e
            )))
        })?;

        let params = argon2::Params::new(
            self.argon2_m_cost,
            self.argon2_t_cost,
            self.argon2_p_cost,
            None,
        )
        .map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "invalid Argon2 params: {}",
                e
            )))
        })?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "Argon2 hash failed: {}",
                    e
                )))
            })
    }

    #[cfg(feature = "argon2")]
    fn verify_argon2(&self, password: &str, hash: &str) -> bool {
        // 参数从摘要本身解析，解析不了就是不匹配
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    // ========================================================================
    // bcrypt 实现
    // ========================================================================

    #[cfg(feature = "bcrypt")]
    fn hash_bcrypt(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.bcrypt_cost).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "bcrypt hash failed: {}",
                e
            )))
        })
    }

    #[cfg(feature = "bcrypt")]
    fn verify_bcrypt(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

// ============================================================================
// 便捷函数
// ============================================================================

/// 使用默认算法哈希密码
///
/// 默认使用 Argon2id（如果启用），否则回退到 bcrypt
///
/// # Arguments
///
/// * `password` - 要哈希的明文密码
///
/// # Returns
///
/// 返回哈希后的密码字符串
///
/// # Example
///
/// ```rust
/// use authgate::password::hash_password;
///
/// let hash = hash_password("my_secure_password").unwrap();
/// println!("Hash: {}", hash);
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    PasswordHasher::default().hash(password)
}

/// 验证密码是否匹配哈希
///
/// 自动检测哈希格式（支持 Argon2 / bcrypt，取决于启用的 feature）
///
/// # Arguments
///
/// * `password` - 要验证的明文密码
/// * `hash` - 存储的哈希值
///
/// # Example
///
/// ```rust
/// use authgate::password::{hash_password, verify_password};
///
/// let hash = hash_password("my_secure_password").unwrap();
///
/// assert!(verify_password("my_secure_password", &hash));
/// assert!(!verify_password("wrong_password", &hash));
/// ```
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHasher::default().verify(password, hash)
}
