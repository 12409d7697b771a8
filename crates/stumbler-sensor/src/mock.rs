//! Mock 传感器（无硬件依赖）
//!
//! - [`MockSensor`]：固定读数 + 可切换的故障注入 + 读取计数，用于测试
//! - [`SimulatedImu`]：带随机噪声的静止 IMU，用于演示和联调

use crate::{MovementSensor, Orientation, SensorError, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// 读取次数快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockReadCounts {
    pub acceleration: u64,
    pub angular_velocity: u64,
    pub orientation: u64,
}

/// 测试用 Mock 传感器
///
/// 每次读取都会计数（包括失败的读取），故障开关可以在运行中切换。
#[derive(Debug)]
pub struct MockSensor {
    acceleration: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    orientation: Orientation,
    read_delay: Duration,
    fail_acceleration: AtomicBool,
    fail_angular_velocity: AtomicBool,
    fail_orientation: AtomicBool,
    acceleration_reads: AtomicU64,
    angular_velocity_reads: AtomicU64,
    orientation_reads: AtomicU64,
}

impl MockSensor {
    /// 创建返回固定读数的传感器
    pub fn constant(acceleration: Vector3<f64>, angular_velocity: Vector3<f64>) -> Self {
        Self {
            acceleration,
            angular_velocity,
            orientation: Orientation::default(),
            read_delay: Duration::ZERO,
            fail_acceleration: AtomicBool::new(false),
            fail_angular_velocity: AtomicBool::new(false),
            fail_orientation: AtomicBool::new(false),
            acceleration_reads: AtomicU64::new(0),
            angular_velocity_reads: AtomicU64::new(0),
            orientation_reads: AtomicU64::new(0),
        }
    }

    /// 创建所有读取都失败的传感器
    pub fn failing() -> Self {
        Self::constant(Vector3::zeros(), Vector3::zeros()).with_failures(true, true, true)
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// 每次读取前休眠，模拟总线延迟
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_failures(self, acceleration: bool, angular_velocity: bool, orientation: bool) -> Self {
        self.set_fail_acceleration(acceleration);
        self.set_fail_angular_velocity(angular_velocity);
        self.set_fail_orientation(orientation);
        self
    }

    pub fn set_fail_acceleration(&self, fail: bool) {
        self.fail_acceleration.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_angular_velocity(&self, fail: bool) {
        self.fail_angular_velocity.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_orientation(&self, fail: bool) {
        self.fail_orientation.store(fail, Ordering::Relaxed);
    }

    pub fn read_counts(&self) -> MockReadCounts {
        MockReadCounts {
            acceleration: self.acceleration_reads.load(Ordering::Relaxed),
            angular_velocity: self.angular_velocity_reads.load(Ordering::Relaxed),
            orientation: self.orientation_reads.load(Ordering::Relaxed),
        }
    }

    fn read<T>(
        &self,
        counter: &AtomicU64,
        fail: &AtomicBool,
        what: &str,
        value: T,
    ) -> Result<T, SensorError> {
        counter.fetch_add(1, Ordering::Relaxed);
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        if fail.load(Ordering::Relaxed) {
            return Err(SensorError::Device(format!("mock {} read failure", what)));
        }
        Ok(value)
    }
}

impl MovementSensor for MockSensor {
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
        self.read(
            &self.acceleration_reads,
            &self.fail_acceleration,
            "acceleration",
            self.acceleration,
        )
    }

    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
        self.read(
            &self.angular_velocity_reads,
            &self.fail_angular_velocity,
            "angular velocity",
            self.angular_velocity,
        )
    }

    fn orientation(&self) -> Result<Orientation, SensorError> {
        self.read(
            &self.orientation_reads,
            &self.fail_orientation,
            "orientation",
            self.orientation,
        )
    }
}

/// 模拟 IMU：静止放置、Z 轴朝上，叠加均匀分布噪声
pub struct SimulatedImu {
    rng: Mutex<StdRng>,
    noise: f64,
    failure_rate: f64,
    read_delay: Duration,
    orientation: Orientation,
}

impl SimulatedImu {
    /// 重力加速度（m/s²）
    pub const GRAVITY: f64 = 9.80665;

    /// # 参数
    /// - `seed`: 随机种子（相同种子产生相同序列）
    /// - `noise`: 每个轴的噪声幅值（非有限值按 0 处理）
    /// - `failure_rate`: 单次读取失败的概率，范围 [0, 1]（NaN 按 0 处理）
    pub fn new(seed: u64, noise: f64, failure_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            noise: if noise.is_finite() { noise.abs() } else { 0.0 },
            failure_rate: if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) },
            read_delay: Duration::ZERO,
            orientation: Orientation::default(),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    fn sample(&self, base: Vector3<f64>, what: &str) -> Result<Vector3<f64>, SensorError> {
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(SensorError::Device(format!("simulated {} dropout", what)));
        }
        if self.noise == 0.0 {
            return Ok(base);
        }
        // 先在 [-1, 1] 上采样再缩放，任意有限幅值都不会让区间溢出
        Ok(base
            + Vector3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * self.noise)
    }
}

impl MovementSensor for SimulatedImu {
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
        self.sample(Vector3::new(0.0, 0.0, Self::GRAVITY), "acceleration")
    }

    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
        self.sample(Vector3::zeros(), "angular velocity")
    }

    fn orientation(&self) -> Result<Orientation, SensorError> {
        Ok(self.orientation)
    }
}
