//! # **rill** 错误定义

use thiserror::Error;

/// **rill** 错误枚举
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RillError {
    /// 写入流错误
    #[error("写入流错误：{0}")]
    WriteError(String),
    /// 读取流错误
    #[error("读取流错误：{0}")]
    ReadError(String),
    /// 消费者配置错误
    #[error("配置错误：{0}")]
    ConfigError(String),
}
