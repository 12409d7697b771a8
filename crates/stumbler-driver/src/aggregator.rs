//! 六通道均值聚合
//!
//! 线加速度 X/Y/Z 与角速度 X/Y/Z 各自维护一个独立的 [`WindowedAverage`]，
//! 通道之间没有任何耦合。

use crate::window::WindowedAverage;
use serde::{Deserialize, Serialize};
use stumbler_sensor::Vector3;

/// 三轴均值
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisAverages {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 六通道均值快照
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Averages {
    /// 线加速度均值（m/s²）
    pub acceleration: AxisAverages,
    /// 角速度均值（rad/s）
    pub angular_velocity: AxisAverages,
}

#[derive(Debug, Clone, Default)]
struct AxisWindows {
    x: WindowedAverage,
    y: WindowedAverage,
    z: WindowedAverage,
}

impl AxisWindows {
    fn add(&mut self, v: &Vector3<f64>) {
        self.x.add(v.x);
        self.y.add(v.y);
        self.z.add(v.z);
    }

    fn averages(&self) -> AxisAverages {
        AxisAverages {
            x: self.x.average(),
            y: self.y.average(),
            z: self.z.average(),
        }
    }
}

/// 单次采样运行的聚合状态
///
/// 每次运行新建，仅由所属的采样线程修改，运行结束后丢弃。
#[derive(Debug, Clone, Default)]
pub struct AggregatorState {
    acceleration: AxisWindows,
    angular_velocity: AxisWindows,
}

impl AggregatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_acceleration(&mut self, accel: &Vector3<f64>) {
        self.acceleration.add(accel);
    }

    pub fn add_angular_velocity(&mut self, gyro: &Vector3<f64>) {
        self.angular_velocity.add(gyro);
    }

    pub fn averages(&self) -> Averages {
        Averages {
            acceleration: self.acceleration.averages(),
            angular_velocity: self.angular_velocity.averages(),
        }
    }
}
