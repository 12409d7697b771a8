//! 带超时的传感器包装
//!
//! 底层驱动的读取可能永久阻塞（总线挂死、设备掉线）。`TimeoutSensor`
//! 把读取交给一个常驻的读取线程执行，调用方最多等待 `timeout`，超时后返回
//! [`SensorError::Timeout`]。

use crate::{MovementSensor, Orientation, SensorError, SensorHandle, Vector3};
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender};
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 交给读取线程执行的一次读取
type ReadJob = Box<dyn FnOnce(&SensorHandle) + Send>;

/// 为每次读取加上时间上限的传感器包装
///
/// 每个 `TimeoutSensor` 只有一个读取线程，同一时刻最多一次底层读取在进行。
/// 读取线程卡在挂死的读取上时，后续调用在等待交接的阶段就会超时，
/// 不会再创建新线程。包装被丢弃后，读取线程在当前读取返回时退出。
pub struct TimeoutSensor {
    jobs: Sender<ReadJob>,
    timeout: Duration,
}

impl TimeoutSensor {
    /// 创建包装并启动读取线程
    ///
    /// # 错误
    /// 读取线程创建失败时返回 IO 错误。
    pub fn new(inner: SensorHandle, timeout: Duration) -> io::Result<Self> {
        // 容量为 0：只有读取线程空闲时交接才会成功
        let (jobs, rx) = crossbeam_channel::bounded::<ReadJob>(0);

        thread::Builder::new().name("stumbler-reader".to_string()).spawn(move || {
            for job in rx {
                job(&inner);
            }
            trace!("Sensor reader thread exiting");
        })?;

        Ok(Self { jobs, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn call<T, F>(&self, what: &'static str, read: F) -> Result<T, SensorError>
    where
        T: Send + 'static,
        F: FnOnce(&SensorHandle) -> Result<T, SensorError> + Send + 'static,
    {
        // 交接和等待结果共用一个截止时间
        let deadline = Instant::now() + self.timeout;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        let job: ReadJob = Box::new(move |sensor: &SensorHandle| {
            // 调用方可能已经超时离开
            let _ = reply_tx.send(read(sensor));
        });

        match self.jobs.send_deadline(job, deadline) {
            Ok(()) => {},
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    "Sensor {} read skipped: previous read still in flight after {:?}",
                    what, self.timeout
                );
                return Err(SensorError::Timeout(self.timeout));
            },
            // 读取线程 panic 后退出
            Err(SendTimeoutError::Disconnected(_)) => return Err(SensorError::Disconnected),
        }

        match reply_rx.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Sensor {} read exceeded {:?}", what, self.timeout);
                Err(SensorError::Timeout(self.timeout))
            },
            // 读取过程中 panic，回复端被丢弃
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Disconnected),
        }
    }
}

impl MovementSensor for TimeoutSensor {
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
        self.call("accel", |sensor| sensor.linear_acceleration())
    }

    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
        self.call("gyro", |sensor| sensor.angular_velocity())
    }

    fn orientation(&self) -> Result<Orientation, SensorError> {
        self.call("orientation", |sensor| sensor.orientation())
    }
}
