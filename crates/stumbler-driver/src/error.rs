//! 驱动层错误类型定义

use thiserror::Error;

/// 驱动层错误类型
///
/// 传感器读取错误（[`stumbler_sensor::SensorError`]）不在此列：
/// 它们只在采样线程内部记录日志，不会返回给调用方。
#[derive(Error, Debug)]
pub enum StumblerError {
    /// 依赖的传感器未在宿主中注册
    #[error("Missing dependency: {name}")]
    MissingDependency { name: String },

    /// 配置缺少必填字段
    #[error("{path}: field \"{field}\" is required")]
    FieldRequired { path: String, field: &'static str },

    /// 配置无法解析
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 请求缺少必填字段
    #[error("Missing '{0}' field")]
    MissingField(&'static str),

    /// 未知命令
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// 采样线程创建失败
    #[error("Failed to spawn sampling worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
