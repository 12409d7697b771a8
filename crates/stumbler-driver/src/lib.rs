//! 采样驱动模块
//!
//! 本模块提供运动传感器的后台采样功能，包括：
//! - 生命周期控制（配置 / 重新配置 / 停止，运行之间不重叠）
//! - 采样线程（协作式取消 + 迭代预算）
//! - 六通道滑动窗口均值
//! - 运行总结发布（ArcSwap 无锁读取）与命令查询
//!
//! # 使用场景
//!
//! 宿主创建传感器并注册到 [`Dependencies`]，再用 [`StumblerConfig`] 构造
//! [`Stumbler`]。组件在后台持续采样，宿主通过 [`Stumbler::do_command`]
//! 查询最近一次运行总结，退出时调用 [`Stumbler::close`]。

mod aggregator;
pub mod command;
mod config;
mod controller;
mod error;
pub mod metrics;
mod registry;
mod summary;
mod window;
pub mod worker;

pub use aggregator::{AggregatorState, Averages, AxisAverages};
pub use command::{Command, Request, Response};
pub use config::StumblerConfig;
pub use controller::Stumbler;
pub use error::StumblerError;
pub use metrics::{MetricsSnapshot, SamplerMetrics};
pub use registry::Dependencies;
pub use summary::{RunSummary, StopReason, sampling_frequency};
pub use window::{WINDOW_CAPACITY, WindowedAverage};
pub use worker::{CancellationToken, ITERATION_BUDGET, RunHandle, SamplingWorker, spawn_worker};
