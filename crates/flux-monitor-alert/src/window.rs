use std::collections::VecDeque;

/// 以 latest 为终点、跨度 millis 毫秒的窗口起点；超出 i64 的跨度按无穷远处理
pub fn window_start(latest: i64, millis: u64) -> i64 {
    latest.saturating_sub(i64::try_from(millis).unwrap_or(i64::MAX))
}

/// 单个样本
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// 毫秒时间戳
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// 按时间排序的样本窗口
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        let idx = self
            .samples
            .partition_point(|s| s.timestamp <= sample.timestamp);
        self.samples.insert(idx, sample);

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// 丢弃早于 cutoff 的样本
    pub fn prune_before(&mut self, cutoff: i64) {
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// 以最新样本为终点、向前 time_frame 毫秒内的样本；None 表示全部样本
    pub fn trailing(&self, time_frame: Option<u64>) -> Vec<Sample> {
        let Some(latest) = self.latest() else {
            return Vec::new();
        };

        match time_frame {
            Some(millis) => {
                let cutoff = window_start(latest.timestamp, millis);
                self.samples
                    .iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .copied()
                    .collect()
            }
            None => self.samples.iter().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
