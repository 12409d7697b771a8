//! 宿主配置文件
//!
//! TOML 格式，两个表都可以省略：
//!
//! ```toml
//! [stumbler]
//! imu = "imu"
//! read_timeout_ms = 100
//!
//! [simulation]
//! seed = 7
//! noise = 0.05
//! failure_rate = 0.01
//! read_delay_us = 500
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use stumbler_driver::StumblerConfig;

/// 默认的传感器名称
pub const DEFAULT_SENSOR_NAME: &str = "imu";

/// 模拟传感器参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// 每个轴的噪声幅值
    pub noise: f64,
    /// 单次读取失败的概率
    pub failure_rate: f64,
    /// 单次读取耗时（微秒），模拟总线往返
    pub read_delay_us: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            noise: 0.05,
            failure_rate: 0.0,
            read_delay_us: 200,
        }
    }
}

impl SimulationConfig {
    pub fn read_delay(&self) -> Duration {
        Duration::from_micros(self.read_delay_us)
    }

    /// 校验噪声幅值和失败率
    pub fn validate(&self) -> Result<()> {
        if !self.noise.is_finite() || self.noise < 0.0 {
            bail!("simulation.noise must be a finite non-negative number, got {}", self.noise);
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            bail!(
                "simulation.failure_rate must be within [0, 1], got {}",
                self.failure_rate
            );
        }
        Ok(())
    }
}

/// 完整的宿主配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub stumbler: StumblerConfig,
    pub simulation: SimulationConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            stumbler: StumblerConfig::new(DEFAULT_SENSOR_NAME),
            simulation: SimulationConfig::default(),
        }
    }
}

impl HostConfig {
    /// 加载配置文件，`path` 为 `None` 时使用默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.simulation.validate()?;
        Ok(config)
    }
}
