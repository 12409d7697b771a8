//! # Stumbler CLI
//!
//! 演示宿主：注册一个模拟 IMU，启动后台采样，直到 Ctrl-C 或迭代预算耗尽，
//! 然后关闭组件并以 JSON 打印 `get` 命令的结果。
//!
//! ```bash
//! # 默认配置
//! stumbler
//!
//! # 使用配置文件，最多运行 5 秒
//! stumbler --config stumbler.toml --duration 5
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use stumbler_driver::{Dependencies, Request, Stumbler};
use stumbler_sensor::mock::SimulatedImu;
use tracing::info;

mod config;

use config::HostConfig;

/// 主循环轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stumbler - 后台 IMU 采样演示
#[derive(Parser, Debug)]
#[command(name = "stumbler")]
#[command(about = "Background IMU sampling demo host", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖 [stumbler] imu
    #[arg(long)]
    imu: Option<String>,

    /// 覆盖 [simulation] seed
    #[arg(long)]
    seed: Option<u64>,

    /// 覆盖 [simulation] failure_rate
    #[arg(long)]
    failure_rate: Option<f64>,

    /// 最长运行时间（秒），0 表示直到 Ctrl-C 或预算耗尽
    #[arg(short, long, default_value_t = 0)]
    duration: u64,
}

impl Cli {
    fn host_config(&self) -> Result<HostConfig> {
        let mut config = HostConfig::load(self.config.as_deref())?;
        if let Some(ref imu) = self.imu {
            config.stumbler.imu = imu.clone();
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(rate) = self.failure_rate {
            config.simulation.failure_rate = rate;
        }
        config.simulation.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stumbler=info".parse()?)
                .add_directive("stumbler_driver=info".parse()?)
                .add_directive("stumbler_sensor=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.host_config()?;

    // 注册模拟传感器（名称与配置中的 imu 一致）
    let sim = &config.simulation;
    let imu = SimulatedImu::new(sim.seed, sim.noise, sim.failure_rate)
        .with_read_delay(sim.read_delay());
    let deps = Dependencies::new().with_sensor(config.stumbler.imu.clone(), imu);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let stumbler = Stumbler::new("stumbler", &deps, &config.stumbler)
        .context("Failed to configure stumbler")?;

    let deadline = (cli.duration > 0).then(|| Instant::now() + Duration::from_secs(cli.duration));
    while stumbler.is_running() && !interrupted.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Duration limit reached");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    stumbler.close();

    let mut request = Request::new();
    request.insert("command".to_string(), json!("get"));
    let response = stumbler.do_command(&request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
