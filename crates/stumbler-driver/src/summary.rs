//! 运行总结

use crate::aggregator::Averages;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stumbler_sensor::EulerAngles;

/// 采样循环退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 收到取消信号
    Cancelled,
    /// 达到迭代预算上限
    BudgetExhausted,
}

/// 一次采样运行结束时发布的总结
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// 运行序号（同一控制器内从 1 递增）
    pub run_id: u64,
    pub stop_reason: StopReason,
    /// 运行时长（秒）
    pub runtime_secs: f64,
    pub iterations: u64,
    /// 采样频率（迭代/秒）
    pub frequency_hz: f64,
    /// 退出时六个通道的窗口均值
    pub averages: Averages,
    pub acceleration_errors: u64,
    pub angular_velocity_errors: u64,
    /// 结束时的姿态，读取失败时为 `None`
    pub orientation: Option<EulerAngles>,
}

impl RunSummary {
    pub fn runtime(&self) -> Duration {
        Duration::from_secs_f64(self.runtime_secs.max(0.0))
    }
}

/// 计算采样频率（迭代/秒），耗时为 0 时返回 0.0
pub fn sampling_frequency(iterations: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    iterations as f64 / secs
}
