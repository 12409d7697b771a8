//! 姿态类型

use nalgebra::UnitQuaternion;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 欧拉角（弧度）
///
/// 采用 nalgebra 的约定：先绕 X 轴 roll，再绕 Y 轴 pitch，最后绕 Z 轴 yaw。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// 传感器姿态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    quaternion: UnitQuaternion<f64>,
}

impl Orientation {
    pub fn from_quaternion(quaternion: UnitQuaternion<f64>) -> Self {
        Self { quaternion }
    }

    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            quaternion: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    pub fn quaternion(&self) -> &UnitQuaternion<f64> {
        &self.quaternion
    }

    pub fn euler_angles(&self) -> EulerAngles {
        let (roll, pitch, yaw) = self.quaternion.euler_angles();
        EulerAngles { roll, pitch, yaw }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            quaternion: UnitQuaternion::identity(),
        }
    }
}
