//! 统一错误类型
//!
//! 缺页、非法地址、越界等都是模拟结果（见 `translation::Translation`），
//! 不属于这里。这里只放会中止一次操作的错误。

use thiserror::Error;

use crate::{FrameIndex, Pid};

/// memviz 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemvizError {
    /// 帧表尚未配置
    #[error("Physical memory is not configured")]
    MemoryNotConfigured,

    /// 帧表分配失败
    #[error("Frame table allocation failed: {frames} frames requested")]
    AllocationFailed {
        /// 请求的帧数
        frames: usize,
    },

    /// 进程不存在
    #[error("Unknown process id: {0}")]
    UnknownProcess(Pid),

    /// 进程数已达上限
    #[error("Process limit reached: at most {limit} processes")]
    ProcessLimit {
        /// 上限
        limit: usize,
    },

    /// 帧表容量为零
    #[error("Frame table has no frames")]
    EmptyFrameTable,

    /// 仍有空闲帧时调用了置换算法
    #[error("Replacement requested while frame {0} is free")]
    FreeFrameAvailable(FrameIndex),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 配置错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 解析错误
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// 序列化错误
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, MemvizError>;
