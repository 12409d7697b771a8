//! 宿主依赖表
//!
//! 宿主在构造组件前把已经创建好的传感器按名称注册到 [`Dependencies`]，
//! 组件根据配置中的名称取出所需的句柄。

use crate::error::StumblerError;
use std::collections::HashMap;
use std::sync::Arc;
use stumbler_sensor::{MovementSensor, SensorHandle};

/// 名称到传感器句柄的映射
#[derive(Clone, Default)]
pub struct Dependencies {
    sensors: HashMap<String, SensorHandle>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册传感器，同名时覆盖并返回旧句柄
    pub fn insert(&mut self, name: impl Into<String>, sensor: SensorHandle) -> Option<SensorHandle> {
        self.sensors.insert(name.into(), sensor)
    }

    /// Builder 风格的注册
    pub fn with_sensor<S>(mut self, name: impl Into<String>, sensor: S) -> Self
    where
        S: MovementSensor + 'static,
    {
        self.insert(name, Arc::new(sensor));
        self
    }

    /// 按名称取出传感器句柄
    ///
    /// # 错误
    /// - `StumblerError::MissingDependency`: 名称未注册
    pub fn sensor(&self, name: &str) -> Result<SensorHandle, StumblerError> {
        self.sensors
            .get(name)
            .cloned()
            .ok_or_else(|| StumblerError::MissingDependency {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sensors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("sensors", &self.sensors.keys().collect::<Vec<_>>())
            .finish()
    }
}
