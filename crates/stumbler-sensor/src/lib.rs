//! # Stumbler Sensor Layer
//!
//! 运动传感器抽象层，提供统一的传感器读取接口：
//! - 线加速度（m/s²）
//! - 角速度（rad/s）
//! - 姿态（四元数，可转换为 roll/pitch/yaw）
//!
//! 所有读取均为**阻塞调用**，实现方不保证超时。
//! 如需有界等待，使用 [`TimeoutSensor`] 包装。

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use nalgebra::Vector3;

mod orientation;
pub mod timeout;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use orientation::{EulerAngles, Orientation};
pub use timeout::TimeoutSensor;

/// 传感器层统一错误类型
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(String),
    #[error("Read timeout after {0:?}")]
    Timeout(Duration),
    #[error("Sensor disconnected")]
    Disconnected,
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
}

impl From<String> for SensorError {
    fn from(message: String) -> Self {
        Self::Device(message)
    }
}

impl From<&str> for SensorError {
    fn from(message: &str) -> Self {
        Self::Device(message.to_string())
    }
}

/// 运动传感器能力接口
///
/// 读取方法使用 `&self`，同一个传感器可以被控制器和采样线程共享，
/// 需要内部可变状态的实现自行加锁。
pub trait MovementSensor: Send + Sync {
    /// 读取线加速度（m/s²）
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError>;

    /// 读取角速度（rad/s）
    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError>;

    /// 读取当前姿态
    fn orientation(&self) -> Result<Orientation, SensorError> {
        Err(SensorError::NotSupported("orientation"))
    }
}

/// 共享传感器句柄
pub type SensorHandle = Arc<dyn MovementSensor>;

impl<T: MovementSensor + ?Sized> MovementSensor for Arc<T> {
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
        (**self).linear_acceleration()
    }

    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
        (**self).angular_velocity()
    }

    fn orientation(&self) -> Result<Orientation, SensorError> {
        (**self).orientation()
    }
}
