//! 地址白名单与黑名单
//!
//! 黑名单中的地址在登录流程最前面被直接拒绝；白名单中的地址
//! 免于按地址的失败计数与锁定。两张表都在内存中维护，持久化
//! 由宿主通过 [`IpFilter::snapshot`] / [`IpFilter::from_snapshot`]
//! 自行处理。

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// 地址过滤表的可序列化快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpFilterSnapshot {
    /// 白名单地址
    pub whitelist: Vec<IpAddr>,
    /// 黑名单地址
    pub blacklist: Vec<IpAddr>,
}

/// 地址过滤器
///
/// 读多写少，内部用读写锁保护，可放进 `Arc` 共享。
#[derive(Debug, Default)]
pub struct IpFilter {
    whitelist: RwLock<HashSet<IpAddr>>,
    blacklist: RwLock<HashSet<IpAddr>>,
}

impl IpFilter {
    /// 创建空的过滤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从快照恢复过滤器
    pub fn from_snapshot(snapshot: IpFilterSnapshot) -> Self {
        Self {
            whitelist: RwLock::new(snapshot.whitelist.into_iter().collect()),
            blacklist: RwLock::new(snapshot.blacklist.into_iter().collect()),
        }
    }

    /// 把地址加入白名单
    ///
    /// 返回是否为新增（地址原先不在表中）。
    pub fn whitelist_add(&self, address: IpAddr) -> bool {
        self.whitelist.write().unwrap().insert(address)
    }

    /// 把地址移出白名单
    pub fn whitelist_remove(&self, address: &IpAddr) -> bool {
        self.whitelist.write().unwrap().remove(address)
    }

    /// 地址是否在白名单中
    pub fn is_whitelisted(&self, address: &IpAddr) -> bool {
        self.whitelist.read().unwrap().contains(address)
    }

    /// 把地址加入黑名单
    pub fn blacklist_add(&self, address: IpAddr) -> bool {
        self.blacklist.write().unwrap().insert(address)
    }

    /// 把地址移出黑名单
    pub fn blacklist_remove(&self, address: &IpAddr) -> bool {
        self.blacklist.write().unwrap().remove(address)
    }

    /// 地址是否在黑名单中
    pub fn is_blacklisted(&self, address: &IpAddr) -> bool {
        self.blacklist.read().unwrap().contains(address)
    }

    /// 导出当前内容（顺序不保证）
    pub fn snapshot(&self) -> IpFilterSnapshot {
        IpFilterSnapshot {
            whitelist: self.whitelist.read().unwrap().iter().copied().collect(),
            blacklist: self.blacklist.read().unwrap().iter().copied().collect(),
        }
    }
}
