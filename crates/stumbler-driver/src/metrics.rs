//! 采样运行指标
//!
//! 采样线程在每次迭代中更新原子计数器，控制器可以在运行期间随时读取，
//! 不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 单次采样运行的实时指标
///
/// # 使用示例
///
/// ```rust
/// use stumbler_driver::SamplerMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(SamplerMetrics::default());
///
/// // 在采样线程中更新指标
/// metrics.iterations.fetch_add(1, Ordering::Relaxed);
///
/// // 在控制线程中读取快照
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.iterations, 1);
/// ```
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    /// 已完成的迭代次数
    pub iterations: AtomicU64,

    /// 线加速度读取失败次数
    pub acceleration_errors: AtomicU64,

    /// 角速度读取失败次数
    pub angular_velocity_errors: AtomicU64,
}

impl SamplerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            acceleration_errors: self.acceleration_errors.load(Ordering::Relaxed),
            angular_velocity_errors: self.angular_velocity_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub iterations: u64,
    pub acceleration_errors: u64,
    pub angular_velocity_errors: u64,
}

impl MetricsSnapshot {
    /// 读取失败率（百分比）
    ///
    /// 每次迭代包含两次读取（加速度 + 角速度）。`iterations` 为 0 时返回 0.0。
    pub fn read_error_rate(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        let errors = self.acceleration_errors + self.angular_velocity_errors;
        (errors as f64 / (self.iterations * 2) as f64) * 100.0
    }
}
