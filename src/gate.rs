//! 未登录行为限制
//!
//! 定义宿主上报的行为类型，以及未认证身份的行为限制策略。
//! 每类行为可以单独开关，拦截时附带一条提示消息让玩家去
//! 登录或注册。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::gate::{ActivityKind, RestrictionConfig};
//!
//! let config = RestrictionConfig::default();
//!
//! // 未认证的玩家不能聊天
//! let decision = config.evaluate(ActivityKind::Chat, false);
//! assert!(!decision.allowed);
//! assert!(decision.message.is_some());
//!
//! // 已认证的玩家一路放行
//! assert!(config.evaluate(ActivityKind::Chat, true).allowed);
//! ```

use serde::{Deserialize, Serialize};

/// 宿主上报的行为类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    /// 聊天
    Chat,
    /// 跨方格移动
    Move,
    /// 放置方块
    Build,
    /// 破坏方块
    Break,
    /// 与方块或实体交互
    Interact,
}

/// 行为裁决：放行与否，拦截时附带提示消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub message: Option<String>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }
}

/// 未认证身份的行为限制配置
///
/// 所有限制默认开启，提示消息可按行为类型覆盖。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionConfig {
    pub block_chat: bool,
    pub block_movement: bool,
    pub block_build: bool,
    pub block_break: bool,
    pub block_interact: bool,
    pub chat_message: String,
    pub movement_message: String,
    pub build_message: String,
    pub break_message: String,
    pub interact_message: String,
}

impl Default for RestrictionConfig {
    fn default() -> Self {
        Self {
            block_chat: true,
            block_movement: true,
            block_build: true,
            block_break: true,
            block_interact: true,
            chat_message: "You must login first! Use /login <password>".to_string(),
            movement_message: "You're frozen until login! Use /login <password>".to_string(),
            build_message: "Can't build until login! Use /login <password>".to_string(),
            break_message: "Can't mine until login! Use /login <password>".to_string(),
            interact_message: "Can't interact until login! Use /login <password>".to_string(),
        }
    }
}

impl RestrictionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 关闭全部限制（只认证，不拦截）
    pub fn permissive() -> Self {
        Self {
            block_chat: false,
            block_movement: false,
            block_build: false,
            block_break: false,
            block_interact: false,
            ..Self::default()
        }
    }

    /// 设置是否拦截聊天
    pub fn with_block_chat(mut self, block: bool) -> Self {
        self.block_chat = block;
        self
    }

    /// 设置是否拦截移动
    pub fn with_block_movement(mut self, block: bool) -> Self {
        self.block_movement = block;
        self
    }

    /// 设置是否拦截放置方块
    pub fn with_block_build(mut self, block: bool) -> Self {
        self.block_build = block;
        self
    }

    /// 设置是否拦截破坏方块
    pub fn with_block_break(mut self, block: bool) -> Self {
        self.block_break = block;
        self
    }

    /// 设置是否拦截交互
    pub fn with_block_interact(mut self, block: bool) -> Self {
        self.block_interact = block;
        self
    }

    /// 覆盖某类行为的提示消息
    pub fn with_message(mut self, kind: ActivityKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ActivityKind::Chat => self.chat_message = message,
            ActivityKind::Move => self.movement_message = message,
            ActivityKind::Build => self.build_message = message,
            ActivityKind::Break => self.break_message = message,
            ActivityKind::Interact => self.interact_message = message,
        }
        self
    }

    fn blocks(&self, kind: ActivityKind) -> bool {
        match kind {
            ActivityKind::Chat => self.block_chat,
            ActivityKind::Move => self.block_movement,
            ActivityKind::Build => self.block_build,
            ActivityKind::Break => self.block_break,
            ActivityKind::Interact => self.block_interact,
        }
    }

    fn message(&self, kind: ActivityKind) -> &str {
        match kind {
            ActivityKind::Chat => &self.chat_message,
            ActivityKind::Move => &self.movement_message,
            ActivityKind::Build => &self.build_message,
            ActivityKind::Break => &self.break_message,
            ActivityKind::Interact => &self.interact_message,
        }
    }

    /// 对一次行为做出裁决
    ///
    /// 已认证一律放行；未认证时按对应开关决定，拦截时返回
    /// 该行为的提示消息。
    pub fn evaluate(&self, kind: ActivityKind, authenticated: bool) -> GateDecision {
        if authenticated || !self.blocks(kind) {
            return GateDecision::allow();
        }
        GateDecision::deny(self.message(kind))
    }
}
