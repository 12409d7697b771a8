//! 滑动窗口均值
//!
//! 固定容量的环形缓冲区 + 累加和，更新和查询都是 O(1)，
//! 与历史样本总数无关。

use std::collections::VecDeque;

/// 默认窗口容量（样本数）
pub const WINDOW_CAPACITY: usize = 50;

/// 单通道滑动窗口均值
///
/// # Example
///
/// ```
/// use stumbler_driver::WindowedAverage;
///
/// let mut avg = WindowedAverage::new();
/// assert_eq!(avg.average(), 0.0);
///
/// avg.add(1.0);
/// avg.add(3.0);
/// assert_eq!(avg.average(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct WindowedAverage {
    capacity: usize,
    buffer: VecDeque<f64>,
    sum: f64,
}

impl WindowedAverage {
    /// 创建容量为 [`WINDOW_CAPACITY`] 的窗口
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// 创建指定容量的窗口（容量至少为 1）
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
            sum: 0.0,
        }
    }

    /// 加入一个新样本，窗口已满时先淘汰最旧的样本
    ///
    /// NaN / 无穷样本会让累加和失效，此时按缓冲区重新求和，
    /// 异常样本离开窗口后均值随之恢复。
    pub fn add(&mut self, value: f64) {
        if self.buffer.len() == self.capacity
            && let Some(oldest) = self.buffer.pop_front()
        {
            self.sum -= oldest;
        }
        self.buffer.push_back(value);
        self.sum += value;

        if !self.sum.is_finite() {
            self.sum = self.buffer.iter().sum();
        }
    }

    /// 当前窗口均值，窗口为空时返回 0.0
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        self.sum / self.buffer.len() as f64
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for WindowedAverage {
    fn default() -> Self {
        Self::new()
    }
}
