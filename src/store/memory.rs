//! 内存凭据存储
//!
//! 所有记录放在进程内的哈希表里，进程退出即丢失。
//! 适合测试和不需要持久化的嵌入场景。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::{Credential, CredentialStore, RecoveryQa, TwoFactorRecord};

/// 内存存储实现
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<Uuid, Credential>>>,
    two_factor: Arc<RwLock<HashMap<Uuid, TwoFactorRecord>>>,
    recovery: Arc<RwLock<HashMap<Uuid, RecoveryQa>>>,
}

impl InMemoryCredentialStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的凭据数量
    pub fn len(&self) -> usize {
        self.credentials.read().unwrap().len()
    }

    /// 是否没有任何凭据
    pub fn is_empty(&self) -> bool {
        self.credentials.read().unwrap().is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credential(&self, identity: &Uuid) -> Result<Option<Credential>> {
        Ok(self.credentials.read().unwrap().get(identity).cloned())
    }

    async fn set_credential(&self, credential: Credential) -> Result<()> {
        self.credentials
            .write()
            .unwrap()
            .insert(credential.identity, credential);
        Ok(())
    }

    async fn delete_credential(&self, identity: &Uuid) -> Result<()> {
        self.credentials.write().unwrap().remove(identity);
        Ok(())
    }

    async fn get_two_factor(&self, identity: &Uuid) -> Result<Option<TwoFactorRecord>> {
        Ok(self.two_factor.read().unwrap().get(identity).cloned())
    }

    async fn set_two_factor(&self, record: TwoFactorRecord) -> Result<()> {
        self.two_factor
            .write()
            .unwrap()
            .insert(record.identity, record);
        Ok(())
    }

    async fn delete_two_factor(&self, identity: &Uuid) -> Result<()> {
        self.two_factor.write().unwrap().remove(identity);
        Ok(())
    }

    async fn get_recovery_qa(&self, identity: &Uuid) -> Result<Option<RecoveryQa>> {
        Ok(self.recovery.read().unwrap().get(identity).cloned())
    }

    async fn set_recovery_qa(&self, qa: RecoveryQa) -> Result<()> {
        self.recovery.write().unwrap().insert(qa.identity, qa);
        Ok(())
    }

    async fn delete_recovery_qa(&self, identity: &Uuid) -> Result<()> {
        self.recovery.write().unwrap().remove(identity);
        Ok(())
    }
}
