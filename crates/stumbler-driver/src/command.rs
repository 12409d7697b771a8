//! 命令请求解析
//!
//! 请求和响应都是 JSON 对象，请求必须包含字符串字段 `command`。

use crate::error::StumblerError;
use serde_json::{Map, Value};

/// 命令请求
pub type Request = Map<String, Value>;

/// 命令响应
pub type Response = Map<String, Value>;

/// 支持的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 返回最近一次发布的运行总结
    Get,
}

impl Command {
    pub const FIELD: &'static str = "command";

    /// 从请求中解析命令
    ///
    /// # 错误
    /// - `StumblerError::MissingField`: 请求中没有 `command`
    /// - `StumblerError::UnknownCommand`: `command` 不是已知命令（非字符串值按 JSON 文本报告）
    pub fn parse(request: &Request) -> Result<Self, StumblerError> {
        let value = request
            .get(Self::FIELD)
            .ok_or(StumblerError::MissingField(Self::FIELD))?;

        match value {
            Value::String(s) if s == "get" => Ok(Command::Get),
            Value::String(s) => Err(StumblerError::UnknownCommand(s.clone())),
            other => Err(StumblerError::UnknownCommand(other.to_string())),
        }
    }
}
