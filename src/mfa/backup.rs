//! 两步验证备用码
//!
//! 认证器不可用时的后备验证手段。每个备用码只能使用一次，
//! 匹配成功后由调用方把剩余的码持久化回存储。

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::random::{BACKUP_CODE_SPACE, constant_time_compare_str, generate_backup_codes};

/// 备用码配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCodeConfig {
    /// 每次生成的备用码数量
    pub count: usize,
}

impl Default for BackupCodeConfig {
    fn default() -> Self {
        Self { count: 10 }
    }
}

impl BackupCodeConfig {
    /// 设置备用码数量
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<()> {
        if self.count > BACKUP_CODE_SPACE {
            return Err(Error::validation(format!(
                "count must not exceed {}",
                BACKUP_CODE_SPACE
            )));
        }
        Ok(())
    }
}

/// 备用码管理器
#[derive(Debug, Clone, Default)]
pub struct BackupCodeManager {
    config: BackupCodeConfig,
}

impl BackupCodeManager {
    /// 创建新的备用码管理器
    pub fn new(config: BackupCodeConfig) -> Self {
        Self { config }
    }

    /// 生成一组新的备用码
    pub fn generate(&self) -> Result<Vec<String>> {
        generate_backup_codes(self.config.count)
    }

    /// 在存量备用码中查找匹配项
    ///
    /// 输入先去掉首尾空白再比较，比较为常量时间。
    /// 返回匹配的下标，由调用方负责删除并持久化。
    pub fn matches(&self, input: &str, stored: &[String]) -> Option<usize> {
        let normalized = input.trim();

        let mut found = None;
        for (index, code) in stored.iter().enumerate() {
            // 全量扫描，不提前返回
            if constant_time_compare_str(normalized, code) && found.is_none() {
                found = Some(index);
            }
        }
        found
    }

    /// 获取配置
    pub fn config(&self) -> &BackupCodeConfig {
        &self.config
    }
}
