//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 服务层方法与 `#[tauri::command]` 统一返回 `Result<T, AppError>`，
//! 前端收到结构化的 `{ code, message }`，可按错误码分支处理
//! （例如提示“该快捷键已被系统占用”）。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ParseError` / `RegisterError` 提供 `From` 转换，服务层直接 `?`。
//! - 手动实现 `Serialize`，输出错误码与消息两个字段。

use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::hotkey::{ParseError, RegisterError};

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 参数缺失或为空
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    /// 快捷键字符串无法解析
    #[error("{0}")]
    InvalidKeyCombo(#[from] ParseError),

    /// 组合被系统或常用工具占用
    #[error("{0} 是系统保留快捷键")]
    ReservedCombo(String),

    /// 两条注册通道都不可用
    #[error("平台错误: {0}")]
    PlatformFault(String),

    /// 设置文件读取失败
    #[error("存储错误: {0}")]
    Storage(String),
}

impl AppError {
    /// 前端使用的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidKeyCombo(_) => "INVALID_KEY_COMBO",
            Self::ReservedCombo(_) => "RESERVED_COMBO",
            Self::PlatformFault(_) => "PLATFORM_FAULT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<RegisterError> for AppError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Parse(err) => Self::InvalidKeyCombo(err),
            RegisterError::ReservedCombo(combo) => Self::ReservedCombo(combo),
            RegisterError::PlatformFault(message) => Self::PlatformFault(message),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Tauri IPC 要求返回值实现 `Serialize`。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
