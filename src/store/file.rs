//! 单文件 JSON 凭据存储
//!
//! 三类记录放在同一个 JSON 文档里，按身份索引。每次写操作把
//! 完整文档写到临时文件再原子改名覆盖，崩溃时磁盘上要么是
//! 旧文档要么是新文档，不会出现写了一半的状态。
//!
//! 全部读写经过一把异步互斥锁，同一进程内的写入串行化，
//! 后写者胜出。
//!
//! 落盘失败的写操作会回滚内存中的改动，对外可见的状态始终
//! 等于磁盘上最后一次成功写入的文档。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::Result;

use super::{Credential, CredentialStore, RecoveryQa, TwoFactorRecord};

/// 磁盘上的完整文档
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    #[serde(default)]
    credentials: HashMap<Uuid, Credential>,
    #[serde(default)]
    two_factor: HashMap<Uuid, TwoFactorRecord>,
    #[serde(default)]
    recovery: HashMap<Uuid, RecoveryQa>,
}

/// 单文件 JSON 存储实现
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileCredentialStore {
    /// 打开（或初始化）指定路径上的存储
    ///
    /// 文件不存在按空文档处理；内容无法解析则报
    /// [`crate::error::StorageError::Corrupt`]。
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// 存储文件路径
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn persist(&self, state: &FileState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_credential(&self, identity: &Uuid) -> Result<Option<Credential>> {
        let state = self.state.lock().await;
        Ok(state.credentials.get(identity).cloned())
    }

    async fn set_credential(&self, credential: Credential) -> Result<()> {
        let mut state = self.state.lock().await;
        let identity = credential.identity;
        let displaced = state.credentials.insert(identity, credential);
        if let Err(e) = self.persist(&state).await {
            match displaced {
                Some(previous) => state.credentials.insert(identity, previous),
                None => state.credentials.remove(&identity),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_credential(&self, identity: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(removed) = state.credentials.remove(identity) {
            if let Err(e) = self.persist(&state).await {
                state.credentials.insert(*identity, removed);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn get_two_factor(&self, identity: &Uuid) -> Result<Option<TwoFactorRecord>> {
        let state = self.state.lock().await;
        Ok(state.two_factor.get(identity).cloned())
    }

    async fn set_two_factor(&self, record: TwoFactorRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let identity = record.identity;
        let displaced = state.two_factor.insert(identity, record);
        if let Err(e) = self.persist(&state).await {
            match displaced {
                Some(previous) => state.two_factor.insert(identity, previous),
                None => state.two_factor.remove(&identity),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_two_factor(&self, identity: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(removed) = state.two_factor.remove(identity) {
            if let Err(e) = self.persist(&state).await {
                state.two_factor.insert(*identity, removed);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn get_recovery_qa(&self, identity: &Uuid) -> Result<Option<RecoveryQa>> {
        let state = self.state.lock().await;
        Ok(state.recovery.get(identity).cloned())
    }

    async fn set_recovery_qa(&self, qa: RecoveryQa) -> Result<()> {
        let mut state = self.state.lock().await;
        let identity = qa.identity;
        let displaced = state.recovery.insert(identity, qa);
        if let Err(e) = self.persist(&state).await {
            match displaced {
                Some(previous) => state.recovery.insert(identity, previous),
                None => state.recovery.remove(&identity),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_recovery_qa(&self, identity: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(removed) = state.recovery.remove(identity) {
            if let Err(e) = self.persist(&state).await {
                state.recovery.insert(*identity, removed);
                return Err(e);
            }
        }
        Ok(())
    }
}
