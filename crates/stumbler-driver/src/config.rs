//! 组件配置
//!
//! 宿主以结构化对象（JSON）或 TOML 片段的形式下发配置。

use crate::error::StumblerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stumbler 组件配置
///
/// # Example
///
/// ```
/// use stumbler_driver::StumblerConfig;
///
/// let config = StumblerConfig::from_value(serde_json::json!({ "imu": "imu-1" })).unwrap();
/// assert_eq!(config.validate("components.stumbler").unwrap(), vec!["imu-1".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StumblerConfig {
    /// 依赖的运动传感器名称（必填）
    pub imu: String,

    /// 单次传感器读取的超时（毫秒）
    ///
    /// 不设置时读取无超时，挂死的读取会阻塞采样循环。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

impl StumblerConfig {
    pub fn new(imu: impl Into<String>) -> Self {
        Self {
            imu: imu.into(),
            read_timeout_ms: None,
        }
    }

    /// 设置读取超时
    ///
    /// 配置精度为毫秒，不足整毫秒的部分向上取整（`Duration::ZERO` 保持为 0，由校验拒绝）。
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.read_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// 从结构化对象解析配置
    pub fn from_value(value: serde_json::Value) -> Result<Self, StumblerError> {
        serde_json::from_value(value).map_err(|e| StumblerError::InvalidConfig(e.to_string()))
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, StumblerError> {
        toml::from_str(content).map_err(|e| StumblerError::InvalidConfig(e.to_string()))
    }

    /// 校验配置，返回依赖的资源名称列表
    ///
    /// # 参数
    /// - `path`: 配置在宿主配置树中的路径（用于错误信息）
    ///
    /// # 错误
    /// - `StumblerError::FieldRequired`: 缺少 `imu`
    /// - `StumblerError::InvalidConfig`: `read_timeout_ms` 为 0
    pub fn validate(&self, path: &str) -> Result<Vec<String>, StumblerError> {
        if self.imu.trim().is_empty() {
            return Err(StumblerError::FieldRequired {
                path: path.to_string(),
                field: "imu",
            });
        }
        if self.read_timeout_ms == Some(0) {
            return Err(StumblerError::InvalidConfig(format!(
                "{}: read_timeout_ms must be greater than 0",
                path
            )));
        }
        Ok(vec![self.imu.clone()])
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}
