//! 生命周期集成测试
//!
//! 验证控制器的核心保证：
//! 1. 配置失败不启动采样线程，也不影响已有运行
//! 2. 重新配置先停止并等待旧运行，再启动新运行
//! 3. stop 是完整的 join，可以重复调用
//! 4. 预算耗尽的运行自行结束并发布总结
//! 5. 并发的 reconfigure / stop 之间不会出现两个同时运行的采样线程

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use stumbler_driver::{
    Dependencies, ITERATION_BUDGET, Request, StopReason, Stumbler, StumblerConfig, StumblerError,
};
use stumbler_sensor::mock::MockSensor;
use stumbler_sensor::{MovementSensor, SensorError, Vector3};

fn request(value: Value) -> Request {
    match value {
        Value::Object(map) => map,
        _ => panic!("request must be an object"),
    }
}

fn slow_sensor(accel_x: f64) -> Arc<MockSensor> {
    Arc::new(
        MockSensor::constant(Vector3::new(accel_x, 0.0, 0.0), Vector3::zeros())
            .with_read_delay(Duration::from_millis(1)),
    )
}

/// 等待条件成立（轮询），超时返回 false
fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_config_without_sensor_field_starts_nothing() {
    let sensor = slow_sensor(1.0);
    let mut deps = Dependencies::new();
    deps.insert("imu", sensor.clone());

    let config = StumblerConfig::from_value(json!({})).unwrap();
    match Stumbler::new("stumbler", &deps, &config) {
        Err(StumblerError::FieldRequired { field, .. }) => assert_eq!(field, "imu"),
        Err(e) => panic!("Expected FieldRequired, got {:?}", e),
        Ok(_) => panic!("Expected configure to fail"),
    }

    thread::sleep(Duration::from_millis(20));
    assert_eq!(sensor.read_counts().acceleration, 0);
}

#[test]
fn test_reconfigure_joins_previous_run() {
    let first = slow_sensor(1.0);
    let second = slow_sensor(2.0);
    let mut deps = Dependencies::new();
    deps.insert("first", first.clone());
    deps.insert("second", second.clone());

    let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("first")).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        first.read_counts().acceleration > 5
    }));

    stumbler.reconfigure(&deps, &StumblerConfig::new("second")).unwrap();

    // 旧运行的总结在新运行启动前已经发布
    let summary = stumbler.latest_summary().expect("first run summary");
    assert_eq!(summary.run_id, 1);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!((summary.averages.acceleration.x - 1.0).abs() < 1e-9);

    // 旧传感器不再被读取
    let frozen = first.read_counts();
    assert!(wait_until(Duration::from_secs(2), || {
        second.read_counts().acceleration > 5
    }));
    assert_eq!(first.read_counts(), frozen);

    stumbler.stop();
    let summary = stumbler.latest_summary().unwrap();
    assert_eq!(summary.run_id, 2);
    assert!((summary.averages.acceleration.x - 2.0).abs() < 1e-9);
    assert_eq!(stumbler.runs_started(), 2);
}

#[test]
fn test_failed_reconfigure_keeps_running_worker() {
    let sensor = slow_sensor(1.0);
    let mut deps = Dependencies::new();
    deps.insert("imu", sensor.clone());

    let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

    let result = stumbler.reconfigure(&deps, &StumblerConfig::new("missing"));
    assert!(matches!(
        result,
        Err(StumblerError::MissingDependency { ref name }) if name == "missing"
    ));

    let result = stumbler.reconfigure(&deps, &StumblerConfig::default());
    assert!(matches!(result, Err(StumblerError::FieldRequired { .. })));

    // 原运行继续采样
    assert!(stumbler.is_running());
    assert_eq!(stumbler.runs_started(), 1);
    let before = sensor.read_counts().acceleration;
    assert!(wait_until(Duration::from_secs(2), || {
        sensor.read_counts().acceleration > before
    }));
    assert!(stumbler.latest_summary().is_none());
}

#[test]
fn test_failing_sensor_exhausts_budget_through_controller() {
    let sensor = Arc::new(MockSensor::failing());
    let mut deps = Dependencies::new();
    deps.insert("imu", sensor.clone());

    let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

    assert!(wait_until(Duration::from_secs(30), || !stumbler.is_running()));
    stumbler.stop();

    let summary = stumbler.latest_summary().expect("summary should be published");
    assert_eq!(summary.iterations, ITERATION_BUDGET);
    assert_eq!(summary.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(summary.averages.acceleration.x, 0.0);
    assert_eq!(summary.averages.angular_velocity.z, 0.0);
    assert!(summary.orientation.is_none());
    assert_eq!(sensor.read_counts().orientation, 1);
}

#[test]
fn test_get_before_any_summary_is_empty() {
    let deps = Dependencies::new().with_sensor(
        "imu",
        MockSensor::constant(Vector3::zeros(), Vector3::zeros())
            .with_read_delay(Duration::from_millis(1)),
    );
    let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

    let response = stumbler.do_command(&request(json!({ "command": "get" }))).unwrap();
    assert!(response.is_empty());

    stumbler.close();
    let response = stumbler.do_command(&request(json!({ "command": "get" }))).unwrap();
    assert_eq!(response["run_id"], 1);
}

#[test]
fn test_concurrent_stop_is_safe() {
    let deps = Dependencies::new().with_sensor(
        "imu",
        MockSensor::constant(Vector3::zeros(), Vector3::zeros())
            .with_read_delay(Duration::from_millis(1)),
    );
    let stumbler = Arc::new(Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let s = stumbler.clone();
            thread::spawn(move || {
                s.stop();
                s.latest_summary().map(|summary| summary.run_id)
            })
        })
        .collect();

    for handle in handles {
        // 任何一个 stop 返回时总结都已经发布
        assert_eq!(handle.join().unwrap(), Some(1));
    }
    assert!(!stumbler.is_running());
}

#[test]
fn test_cancel_observed_between_reads() {
    let sensor = Arc::new(
        MockSensor::constant(Vector3::zeros(), Vector3::zeros())
            .with_read_delay(Duration::from_millis(5)),
    );
    let mut deps = Dependencies::new();
    deps.insert("imu", sensor.clone());
    let stumbler = Stumbler::new("stumbler", &deps, &StumblerConfig::new("imu")).unwrap();

    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    stumbler.stop();
    let elapsed = start.elapsed();

    // 一个迭代（2 × 5ms）+ 一次姿态读取（5ms），留出调度余量
    assert!(elapsed < Duration::from_millis(500), "stop took {:?}", elapsed);

    let summary = stumbler.latest_summary().unwrap();
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    // 每次迭代恰好读取一次加速度
    assert_eq!(sensor.read_counts().acceleration, summary.iterations);
}

/// 记录同时进行中的读取数量的传感器（多个实例共享计数）
struct OverlapSensor {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    reads: AtomicU64,
}

impl OverlapSensor {
    fn read(&self) -> Result<Vector3<f64>, SensorError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::Relaxed);
        thread::sleep(Duration::from_micros(200));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Vector3::zeros())
    }
}

impl MovementSensor for OverlapSensor {
    fn linear_acceleration(&self) -> Result<Vector3<f64>, SensorError> {
        self.read()
    }

    fn angular_velocity(&self) -> Result<Vector3<f64>, SensorError> {
        self.read()
    }
}

#[test]
fn test_reconfigure_racing_stop_never_overlaps() {
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let names = ["a", "b", "c"];

    let mut deps = Dependencies::new();
    let mut sensors = Vec::new();
    for name in names {
        let sensor = Arc::new(OverlapSensor {
            active: active.clone(),
            max_active: max_active.clone(),
            reads: AtomicU64::new(0),
        });
        deps.insert(name, sensor.clone());
        sensors.push(sensor);
    }
    let deps = Arc::new(deps);

    let stumbler = Arc::new(Stumbler::new("stumbler", &deps, &StumblerConfig::new("a")).unwrap());
    let successes = Arc::new(AtomicU64::new(1));
    let done = Arc::new(AtomicBool::new(false));

    // 观察者：已发布总结的 run_id 单调递增
    let watcher = {
        let s = stumbler.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut last = 0;
            while !done.load(Ordering::SeqCst) {
                if let Some(summary) = s.latest_summary() {
                    assert!(summary.run_id >= last, "run_id went back: {} < {}", summary.run_id, last);
                    last = summary.run_id;
                }
                thread::sleep(Duration::from_micros(500));
            }
            last
        })
    };

    let mut handles: Vec<_> = names
        .iter()
        .map(|name| {
            let s = stumbler.clone();
            let deps = deps.clone();
            let successes = successes.clone();
            let config = StumblerConfig::new(*name);
            thread::spawn(move || {
                for _ in 0..5 {
                    if s.reconfigure(&deps, &config).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                }
            })
        })
        .collect();
    handles.push({
        let s = stumbler.clone();
        thread::spawn(move || {
            for _ in 0..10 {
                s.stop();
                thread::sleep(Duration::from_millis(1));
            }
        })
    });

    for handle in handles {
        handle.join().unwrap();
    }
    stumbler.stop();
    done.store(true, Ordering::SeqCst);
    let last_seen = watcher.join().unwrap();

    // 每次成功的配置恰好启动一次运行
    let started = successes.load(Ordering::SeqCst);
    assert_eq!(started, 16);
    assert_eq!(stumbler.runs_started(), started);

    // 最后一次 stop 之后，最新总结来自最后一次运行
    let summary = stumbler.latest_summary().unwrap();
    assert_eq!(summary.run_id, started);
    assert!(summary.run_id >= last_seen);

    // 任意时刻最多一个采样线程在读取
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    let total_reads: u64 = sensors.iter().map(|s| s.reads.load(Ordering::Relaxed)).sum();
    assert!(total_reads > 0);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}
