//! 生命周期控制器
//!
//! 提供对外的 `Stumbler` 结构体，封装采样线程的启动、替换和停止。
//!
//! # 并发约定
//!
//! - 传感器句柄和当前运行句柄由同一把互斥锁保护
//! - `reconfigure` 在锁内完成「停止旧运行 → 启动新运行」，同一控制器的两次运行不会重叠
//! - `stop` 在锁内等待采样线程退出，是完整的 join 而不是 fire-and-forget
//! - 采样线程只持有启动时的句柄快照，从不获取这把锁

use crate::command::{Command, Request, Response};
use crate::config::StumblerConfig;
use crate::error::StumblerError;
use crate::metrics::MetricsSnapshot;
use crate::registry::Dependencies;
use crate::summary::RunSummary;
use crate::worker::{RunHandle, spawn_worker};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use stumbler_sensor::{SensorHandle, TimeoutSensor};
use tracing::{debug, info, warn};

/// 锁保护的共享状态
#[derive(Default)]
struct ControllerState {
    /// 当前配置的传感器
    sensor: Option<SensorHandle>,
    /// 当前运行（`None` 表示未启动或已停止）
    run: Option<RunHandle>,
}

impl ControllerState {
    /// 停止并等待当前运行，再用 `launch` 在 `sensor` 上启动新运行
    ///
    /// 新传感器只在启动成功后才写入。启动失败时组件处于停止状态：
    /// 旧运行已经结束，`sensor` 仍是旧句柄，`run` 为 `None`。
    fn restart<F>(&mut self, name: &str, sensor: SensorHandle, launch: F) -> Result<(), StumblerError>
    where
        F: FnOnce(SensorHandle) -> Result<RunHandle, StumblerError>,
    {
        if let Some(run) = self.run.take() {
            info!(
                "Stopping sampling run {} of '{}' before reconfigure",
                run.run_id(),
                name
            );
            run.cancel_and_join();
        }

        let run = launch(sensor.clone())?;
        self.sensor = Some(sensor);
        self.run = Some(run);
        Ok(())
    }
}

/// Stumbler 组件（对外 API）
///
/// # Example
///
/// ```rust
/// use stumbler_driver::{Dependencies, Stumbler, StumblerConfig};
/// use stumbler_sensor::{MovementSensor, SensorError, Vector3};
///
/// struct Level;
///
/// impl MovementSensor for Level {
///     fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
///         Ok(Vector3::new(0.0, 0.0, 9.81))
///     }
///     fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
///         Ok(Vector3::zeros())
///     }
/// }
///
/// let deps = Dependencies::new().with_sensor("imu", Level);
/// let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();
/// stumbler.close();
/// assert!(stumbler.latest_summary().is_some());
/// ```
pub struct Stumbler {
    /// 组件名称（同时作为配置校验时的路径）
    name: String,
    state: Mutex<ControllerState>,
    /// 最近一次发布的运行总结（采样线程写，查询方无锁读）
    latest: Arc<ArcSwapOption<RunSummary>>,
    /// 已启动的运行次数，同时用于分配运行序号
    runs_started: AtomicU64,
}

impl Stumbler {
    /// 创建组件并启动第一次采样运行
    ///
    /// # 错误
    /// - `StumblerError::FieldRequired`: 配置缺少 `imu`
    /// - `StumblerError::MissingDependency`: `imu` 指向的传感器未注册
    /// - `StumblerError::WorkerSpawn`: 采样线程创建失败
    ///
    /// 失败时不会留下任何运行中的采样线程。
    pub fn new(
        name: impl Into<String>,
        deps: &Dependencies,
        config: &StumblerConfig,
    ) -> Result<Self, StumblerError> {
        let stumbler = Self {
            name: name.into(),
            state: Mutex::new(ControllerState::default()),
            latest: Arc::new(ArcSwapOption::empty()),
            runs_started: AtomicU64::new(0),
        };
        stumbler.reconfigure(deps, config)?;
        Ok(stumbler)
    }

    /// 应用新配置：停止当前运行，绑定新传感器，启动新运行
    ///
    /// 配置校验和依赖解析在获取锁之前完成，失败时当前传感器和运行保持不变。
    /// 采样线程创建失败（`WorkerSpawn`）时旧运行已经停止，组件处于停止状态，
    /// 传感器句柄仍是旧的，可以再次调用 `reconfigure` 恢复。
    pub fn reconfigure(
        &self,
        deps: &Dependencies,
        config: &StumblerConfig,
    ) -> Result<(), StumblerError> {
        let sensor = self.resolve_sensor(deps, config)?;

        let mut state = self.state.lock();

        // 计数只在锁内修改
        let run_id = self.runs_started.load(Ordering::Relaxed) + 1;
        state.restart(&self.name, sensor, |sensor| {
            spawn_worker(run_id, sensor, self.latest.clone())
        })?;
        self.runs_started.store(run_id, Ordering::Relaxed);

        info!(
            "Started sampling run {} of '{}' on sensor '{}'",
            run_id, self.name, config.imu
        );
        Ok(())
    }

    fn resolve_sensor(
        &self,
        deps: &Dependencies,
        config: &StumblerConfig,
    ) -> Result<SensorHandle, StumblerError> {
        config.validate(&self.name)?;
        let sensor = deps.sensor(&config.imu)?;

        Ok(match config.read_timeout() {
            Some(timeout) => {
                debug!("Wrapping sensor '{}' with {:?} read timeout", config.imu, timeout);
                Arc::new(TimeoutSensor::new(sensor, timeout)?)
            },
            None => sensor,
        })
    }

    /// 停止当前运行并等待采样线程退出
    ///
    /// 幂等：没有运行时直接返回。不会失败，不设超时。
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(run) = state.run.take() {
            let run_id = run.run_id();
            run.cancel_and_join();
            info!("Sampling run {} of '{}' stopped", run_id, self.name);
        }
    }

    /// 关闭组件（`stop` 的别名）
    pub fn close(&self) {
        debug!("Closing '{}'", self.name);
        self.stop();
    }

    /// 处理命令请求
    ///
    /// `{"command": "get"}` 返回最近一次发布的运行总结；尚无总结时返回空对象。
    ///
    /// # 错误
    /// - `StumblerError::MissingField`: 请求中没有 `command`
    /// - `StumblerError::UnknownCommand`: 未知命令
    pub fn do_command(&self, request: &Request) -> Result<Response, StumblerError> {
        match Command::parse(request)? {
            Command::Get => Ok(self
                .latest_summary()
                .map(|summary| summary_response(&summary))
                .unwrap_or_default()),
        }
    }

    /// 最近一次发布的运行总结（无锁读取）
    pub fn latest_summary(&self) -> Option<Arc<RunSummary>> {
        self.latest.load_full()
    }

    /// 当前运行的实时指标，没有运行时返回 `None`
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.state.lock().run.as_ref().map(|run| run.metrics())
    }

    /// 当前是否有采样线程在运行
    ///
    /// 预算耗尽后采样线程自行退出，此时返回 `false`，但运行句柄要到 `stop` 时才释放。
    pub fn is_running(&self) -> bool {
        self.state.lock().run.as_ref().is_some_and(|run| !run.is_finished())
    }

    /// 当前绑定的传感器句柄
    pub fn sensor(&self) -> Option<SensorHandle> {
        self.state.lock().sensor.clone()
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Stumbler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn summary_response(summary: &RunSummary) -> Response {
    match serde_json::to_value(summary) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("Run summary serialized to non-object value: {}", other);
            Response::new()
        },
        Err(e) => {
            warn!("Failed to serialize run summary: {}", e);
            Response::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::ITERATION_BUDGET;
    use serde_json::json;
    use std::time::Duration;
    use stumbler_sensor::Vector3;
    use stumbler_sensor::mock::MockSensor;

    fn request(value: Value) -> Request {
        match value {
            Value::Object(map) => map,
            _ => panic!("request must be an object"),
        }
    }

    fn slow_sensor() -> MockSensor {
        MockSensor::constant(Vector3::new(1.0, 2.0, 3.0), Vector3::zeros())
            .with_read_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_new_starts_first_run() {
        let deps = Dependencies::new().with_sensor("imu", slow_sensor());
        let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

        assert!(stumbler.is_running());
        assert_eq!(stumbler.runs_started(), 1);
        assert!(stumbler.sensor().is_some());
        assert!(stumbler.metrics().is_some());

        stumbler.stop();
        assert!(!stumbler.is_running());
        assert!(stumbler.metrics().is_none());
    }

    #[test]
    fn test_missing_dependency_starts_nothing() {
        let deps = Dependencies::new();
        match Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")) {
            Err(StumblerError::MissingDependency { name }) => assert_eq!(name, "imu"),
            Err(e) => panic!("Expected MissingDependency, got {:?}", e),
            Ok(_) => panic!("Expected configure to fail"),
        }
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let deps = Dependencies::new().with_sensor("imu", slow_sensor());
        let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

        stumbler.stop();
        let summary = stumbler.latest_summary().expect("summary after stop");
        stumbler.stop();
        stumbler.close();

        // 第二次 stop 不会产生新的总结
        let again = stumbler.latest_summary().unwrap();
        assert!(Arc::ptr_eq(&summary, &again));
    }

    #[test]
    fn test_get_returns_latest_summary() {
        let deps = Dependencies::new().with_sensor("imu", slow_sensor());
        let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        stumbler.stop();

        let response = stumbler.do_command(&request(json!({ "command": "get" }))).unwrap();
        assert_eq!(response["run_id"], 1);
        assert_eq!(response["stop_reason"], "cancelled");
        let iterations = response["iterations"].as_u64().unwrap();
        assert!(iterations > 0 && iterations < ITERATION_BUDGET);
        assert_eq!(response["averages"]["acceleration"]["y"], 2.0);
    }

    #[test]
    fn test_query_errors_do_not_touch_state() {
        let deps = Dependencies::new().with_sensor("imu", slow_sensor());
        let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

        assert!(matches!(
            stumbler.do_command(&request(json!({ "command": "bogus" }))),
            Err(StumblerError::UnknownCommand(ref name)) if name == "bogus"
        ));
        assert!(matches!(
            stumbler.do_command(&request(json!({}))),
            Err(StumblerError::MissingField("command"))
        ));
        assert!(stumbler.is_running());
    }

    #[test]
    fn test_failed_launch_leaves_component_stopped() {
        let old: SensorHandle = Arc::new(slow_sensor());
        let new: SensorHandle = Arc::new(slow_sensor());
        let latest = Arc::new(ArcSwapOption::empty());
        let mut state = ControllerState::default();

        state
            .restart("stumbler", old.clone(), |sensor| {
                spawn_worker(1, sensor, latest.clone())
            })
            .unwrap();
        assert!(state.run.is_some());

        let result = state.restart("stumbler", new, |_| {
            Err(StumblerError::WorkerSpawn(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "no threads left",
            )))
        });
        assert!(matches!(result, Err(StumblerError::WorkerSpawn(_))));

        // 旧运行已经结束并发布总结，传感器仍是旧句柄
        assert!(state.run.is_none());
        assert!(Arc::ptr_eq(state.sensor.as_ref().unwrap(), &old));
        assert_eq!(latest.load_full().unwrap().run_id, 1);
    }

    #[test]
    fn test_read_timeout_wraps_sensor() {
        let deps = Dependencies::new().with_sensor(
            "imu",
            MockSensor::constant(Vector3::zeros(), Vector3::zeros())
                .with_read_delay(Duration::from_millis(200)),
        );
        let config = StumblerConfig::new("imu").with_read_timeout(Duration::from_millis(5));
        let stumbler = Stumbler::new("stumbler", &deps, &config).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let metrics = stumbler.metrics().unwrap();
        assert!(metrics.acceleration_errors > 0, "metrics: {:?}", metrics);

        // 超时后的读取不会阻塞 stop 超过一个超时周期
        let start = std::time::Instant::now();
        stumbler.stop();
        assert!(start.elapsed() < Duration::from_millis(150));
    }
}
