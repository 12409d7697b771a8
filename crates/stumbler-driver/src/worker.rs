//! 采样线程
//!
//! 负责后台采样循环：轮询传感器、更新六通道均值、执行错误与终止策略，
//! 结束时输出并发布运行总结。
//!
//! # 终止条件
//!
//! - 取消信号：每次迭代开始时检查一次（协作式，不会打断进行中的读取）
//! - 迭代预算：达到 [`ITERATION_BUDGET`] 次迭代后退出，与取消信号无关
//!
//! 传感器读取可能无限阻塞，此时取消信号和迭代预算都会被推迟，
//! 需要有界等待时在传感器外层包装 [`stumbler_sensor::TimeoutSensor`]。

use crate::aggregator::AggregatorState;
use crate::error::StumblerError;
use crate::metrics::{MetricsSnapshot, SamplerMetrics};
use crate::summary::{RunSummary, StopReason, sampling_frequency};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use stumbler_sensor::SensorHandle;
use tracing::{debug, error, info};

/// 单次运行的迭代上限
pub const ITERATION_BUDGET: u64 = 10_000;

/// 协作式取消令牌
///
/// 克隆后共享同一个标志，任意一方调用 [`cancel`](Self::cancel) 后所有持有者可见。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        // Release：保证取消前的写入对采样线程可见
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 完成信号守卫
///
/// 在采样线程闭包的最开始创建，线程退出（包括 panic 展开）时 Drop 发送完成信号。
struct CompletionGuard {
    done_tx: Sender<()>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // 容量为 1 且只发送一次，不会阻塞
        let _ = self.done_tx.try_send(());
    }
}

/// 采样循环
///
/// 绑定一个传感器快照和一个全新的 [`AggregatorState`]，[`run`](Self::run)
/// 在当前线程同步执行整个循环。通常通过 [`spawn_worker`] 在后台线程中运行。
pub struct SamplingWorker {
    run_id: u64,
    sensor: SensorHandle,
    token: CancellationToken,
    metrics: Arc<SamplerMetrics>,
}

impl SamplingWorker {
    pub fn new(
        run_id: u64,
        sensor: SensorHandle,
        token: CancellationToken,
        metrics: Arc<SamplerMetrics>,
    ) -> Self {
        Self {
            run_id,
            sensor,
            token,
            metrics,
        }
    }

    /// 执行采样循环直到取消或预算耗尽，返回运行总结
    pub fn run(self) -> RunSummary {
        let run_id = self.run_id;
        let start = Instant::now();
        let mut aggregator = AggregatorState::new();
        let mut iterations: u64 = 0;
        let mut acceleration_errors: u64 = 0;
        let mut angular_velocity_errors: u64 = 0;
        let mut stop_reason = StopReason::BudgetExhausted;

        debug!(run_id, "Sampling run started");

        while iterations < ITERATION_BUDGET {
            if self.token.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }

            // 读取失败只跳过本次对应通道的更新，不中断循环
            match self.sensor.linear_acceleration() {
                Ok(accel) => aggregator.add_acceleration(&accel),
                Err(e) => {
                    acceleration_errors += 1;
                    self.metrics.acceleration_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Linear acceleration read failed: {}", e);
                },
            }

            match self.sensor.angular_velocity() {
                Ok(gyro) => aggregator.add_angular_velocity(&gyro),
                Err(e) => {
                    angular_velocity_errors += 1;
                    self.metrics.angular_velocity_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Angular velocity read failed: {}", e);
                },
            }

            iterations += 1;
            self.metrics.iterations.fetch_add(1, Ordering::Relaxed);
        }

        let runtime = start.elapsed();
        let frequency_hz = sampling_frequency(iterations, runtime);
        let averages = aggregator.averages();

        info!(
            run_id,
            ?stop_reason,
            ?runtime,
            iterations,
            frequency_hz,
            acceleration_errors,
            angular_velocity_errors,
            "Run finished"
        );
        info!(
            run_id,
            x = averages.acceleration.x,
            y = averages.acceleration.y,
            z = averages.acceleration.z,
            rx = averages.angular_velocity.x,
            ry = averages.angular_velocity.y,
            rz = averages.angular_velocity.z,
            "Averages"
        );

        let orientation = match self.sensor.orientation() {
            Ok(pose) => {
                let angles = pose.euler_angles();
                info!(
                    run_id,
                    pitch = angles.pitch,
                    roll = angles.roll,
                    yaw = angles.yaw,
                    "Orientation"
                );
                Some(angles)
            },
            Err(e) => {
                error!("Orientation read failed: {}", e);
                None
            },
        };

        RunSummary {
            run_id,
            stop_reason,
            runtime_secs: runtime.as_secs_f64(),
            iterations,
            frequency_hz,
            averages,
            acceleration_errors,
            angular_velocity_errors,
            orientation,
        }
    }
}

/// 后台采样运行的句柄
///
/// 持有取消令牌、完成信号接收端和线程句柄。
/// Drop 时只发送取消信号，不等待线程退出；需要等待时使用
/// [`cancel_and_join`](Self::cancel_and_join)。
pub struct RunHandle {
    run_id: u64,
    token: CancellationToken,
    metrics: Arc<SamplerMetrics>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 发送取消信号（不等待）
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// 采样线程是否已经退出
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// 取消并等待采样线程退出
    ///
    /// 返回时运行总结已经发布、完成信号已经发出。
    /// 不设超时：进行中的传感器读取会阻塞这里。
    pub fn cancel_and_join(mut self) {
        self.token.cancel();

        // 正常退出收到 ()；发送端被丢弃（Disconnected）同样说明线程已结束
        let _ = self.done_rx.recv();

        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            error!("Sampling worker for run {} panicked", self.run_id);
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// 在后台线程中启动一次采样运行
///
/// # 参数
/// - `run_id`: 运行序号
/// - `sensor`: 传感器快照（运行期间不会再读取控制器中的句柄）
/// - `published`: 运行结束时写入总结的位置
///
/// # 错误
/// - `StumblerError::WorkerSpawn`: 线程创建失败
pub fn spawn_worker(
    run_id: u64,
    sensor: SensorHandle,
    published: Arc<ArcSwapOption<RunSummary>>,
) -> Result<RunHandle, StumblerError> {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let token = CancellationToken::new();
    let metrics = Arc::new(SamplerMetrics::new());

    let worker = SamplingWorker::new(run_id, sensor, token.clone(), metrics.clone());

    let thread = thread::Builder::new().name("stumbler-sampler".to_string()).spawn(move || {
        // 最先创建、最后析构：完成信号总是最后一步
        let _completion = CompletionGuard { done_tx };
        let summary = worker.run();
        published.store(Some(Arc::new(summary)));
    })?;

    Ok(RunHandle {
        run_id,
        token,
        metrics,
        done_rx,
        thread: Some(thread),
    })
}
