use crate::threshold::{Threshold, ThresholdType};
use crate::window::{window_start, Sample, SampleWindow};
use flux_monitor_core::{Observation, SeriesKey};
use std::collections::HashMap;
use tracing::debug;

/// 每个指标序列保留的最大样本数
const DEFAULT_WINDOW_CAPACITY: usize = 1024;

/// 超限结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    /// 计算得到的当前值（瞬时值、平均值、百分比或速率）
    pub current_value: f64,
}

/// 评估结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Breach(Breach),
    NoBreach,
}

impl Evaluation {
    pub fn is_breach(&self) -> bool {
        matches!(self, Evaluation::Breach(_))
    }
}

/// 计算窗口内的当前值；样本不足或基数为零时返回 None
fn window_value(kind: ThresholdType, samples: &[Sample]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }

    let first = samples.first()?;
    let last = samples.last()?;

    match kind {
        ThresholdType::Value => Some(last.value),
        ThresholdType::RollingAvg => {
            Some(samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64)
        }
        ThresholdType::IncreasePercentage => {
            if first.value == 0.0 {
                return None;
            }
            Some((last.value - first.value) / first.value * 100.0)
        }
        ThresholdType::Rate => {
            let elapsed_secs = (last.timestamp - first.timestamp) as f64 / 1000.0;
            if elapsed_secs == 0.0 {
                return None;
            }
            Some((last.value - first.value) / elapsed_secs)
        }
    }
}

/// 对已按时间排序的窗口样本评估阈值
pub fn evaluate_window(samples: &[Sample], threshold: &Threshold) -> Evaluation {
    match window_value(threshold.kind, samples) {
        Some(current) if current.is_finite() && threshold.operator.compare(current, threshold.value) => {
            Evaluation::Breach(Breach {
                current_value: current,
            })
        }
        _ => Evaluation::NoBreach,
    }
}

/// 阈值评估器：按指标序列维护样本窗口
pub struct ThresholdEvaluator {
    windows: HashMap<SeriesKey, SampleWindow>,
    /// 最长时间窗口；None 表示只按容量淘汰
    retention: Option<u64>,
    capacity: usize,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: &[Threshold]) -> Self {
        let windowed: Vec<&Threshold> = thresholds.iter().filter(|t| t.kind.is_windowed()).collect();
        let retention = if windowed.iter().any(|t| t.time_frame.is_none()) {
            None
        } else {
            windowed.iter().filter_map(|t| t.time_frame).max()
        };

        Self {
            windows: HashMap::new(),
            retention,
            capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// 记录一个观测值
    pub fn observe(&mut self, observation: &Observation) {
        let capacity = self.capacity;
        let window = self
            .windows
            .entry(observation.series_key())
            .or_insert_with(|| SampleWindow::new(capacity));

        window.push(Sample::new(observation.timestamp, observation.value));

        let Some(retention) = self.retention else {
            return;
        };
        let Some(latest) = window.latest().map(|s| s.timestamp) else {
            return;
        };

        // 以最新观测为基准淘汰所有序列，样本全部过期的序列一并移除
        let cutoff = window_start(latest, retention);
        self.windows.retain(|_, window| {
            window.prune_before(cutoff);
            !window.is_empty()
        });
    }

    /// 评估观测值所在序列是否超过阈值
    pub fn evaluate(&self, observation: &Observation, threshold: &Threshold) -> Evaluation {
        if !threshold.applies_to(&observation.metric_name) {
            return Evaluation::NoBreach;
        }

        if threshold.kind == ThresholdType::Value {
            return if threshold.operator.compare(observation.value, threshold.value) {
                Evaluation::Breach(Breach {
                    current_value: observation.value,
                })
            } else {
                Evaluation::NoBreach
            };
        }

        let Some(window) = self.windows.get(&observation.series_key()) else {
            debug!(metric = %observation.metric_name, "No samples recorded for series");
            return Evaluation::NoBreach;
        };

        evaluate_window(&window.trailing(threshold.time_frame), threshold)
    }

    pub fn series_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Comparison;

    fn obs(t: i64, v: f64) -> Observation {
        Observation::new("cpu", v).with_timestamp(t)
    }

    fn feed(evaluator: &mut ThresholdEvaluator, samples: &[(i64, f64)]) -> Observation {
        let mut last = obs(0, 0.0);
        for (t, v) in samples {
            last = obs(*t, *v);
            evaluator.observe(&last);
        }
        last
    }

    #[test]
    fn test_value_threshold() {
        let threshold = Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0);
        let evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        assert_eq!(
            evaluator.evaluate(&obs(0, 150.0), &threshold),
            Evaluation::Breach(Breach { current_value: 150.0 })
        );
        assert_eq!(evaluator.evaluate(&obs(0, 50.0), &threshold), Evaluation::NoBreach);
    }

    #[test]
    fn test_rolling_average() {
        let threshold = Threshold::new(ThresholdType::RollingAvg, Comparison::GreaterOrEqual, 20.0)
            .with_time_frame(2000);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        // 窗口外的样本不参与平均
        let last = feed(&mut evaluator, &[(0, 100.0), (3000, 10.0), (4000, 20.0), (5000, 30.0)]);
        assert_eq!(
            evaluator.evaluate(&last, &threshold),
            Evaluation::Breach(Breach { current_value: 20.0 })
        );
    }

    #[test]
    fn test_increase_percentage() {
        let threshold =
            Threshold::new(ThresholdType::IncreasePercentage, Comparison::GreaterThan, 40.0)
                .with_time_frame(10_000);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        let last = feed(&mut evaluator, &[(0, 50.0), (1000, 60.0), (2000, 75.0)]);
        assert_eq!(
            evaluator.evaluate(&last, &threshold),
            Evaluation::Breach(Breach { current_value: 50.0 })
        );
    }

    #[test]
    fn test_rate() {
        let threshold =
            Threshold::new(ThresholdType::Rate, Comparison::GreaterThan, 5.0).with_time_frame(10_000);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        let last = feed(&mut evaluator, &[(0, 0.0), (2000, 20.0)]);
        assert_eq!(
            evaluator.evaluate(&last, &threshold),
            Evaluation::Breach(Breach { current_value: 10.0 })
        );

        let last = feed(&mut evaluator, &[(4000, 22.0)]);
        // (22 - 0) / 4s = 5.5
        assert!(evaluator.evaluate(&last, &threshold).is_breach());
    }

    #[test]
    fn test_insufficient_samples_is_no_breach() {
        for kind in [
            ThresholdType::RollingAvg,
            ThresholdType::IncreasePercentage,
            ThresholdType::Rate,
        ] {
            let threshold = Threshold::new(kind, Comparison::GreaterOrEqual, f64::MIN);
            assert_eq!(evaluate_window(&[], &threshold), Evaluation::NoBreach);
            assert_eq!(
                evaluate_window(&[Sample::new(0, 10.0)], &threshold),
                Evaluation::NoBreach
            );

            let evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));
            assert_eq!(evaluator.evaluate(&obs(0, 1.0), &threshold), Evaluation::NoBreach);
        }
    }

    #[test]
    fn test_zero_baseline_is_no_breach() {
        let pct = Threshold::new(ThresholdType::IncreasePercentage, Comparison::GreaterOrEqual, 0.0);
        assert_eq!(
            evaluate_window(&[Sample::new(0, 0.0), Sample::new(1000, 5.0)], &pct),
            Evaluation::NoBreach
        );

        let rate = Threshold::new(ThresholdType::Rate, Comparison::GreaterOrEqual, 0.0);
        assert_eq!(
            evaluate_window(&[Sample::new(1000, 1.0), Sample::new(1000, 5.0)], &rate),
            Evaluation::NoBreach
        );
    }

    #[test]
    fn test_series_are_independent() {
        let threshold = Threshold::new(ThresholdType::Rate, Comparison::GreaterThan, 0.0);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        evaluator.observe(&Observation::new("cpu", 1.0).with_timestamp(0));
        let other = Observation::new("mem", 100.0).with_timestamp(1000);
        evaluator.observe(&other);

        assert_eq!(evaluator.series_count(), 2);
        assert_eq!(evaluator.evaluate(&other, &threshold), Evaluation::NoBreach);
    }

    #[test]
    fn test_expired_series_are_dropped() {
        let threshold = Threshold::new(ThresholdType::RollingAvg, Comparison::GreaterThan, 0.0)
            .with_time_frame(1000);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        evaluator.observe(&Observation::new("cpu", 1.0).with_timestamp(0));
        evaluator.observe(&Observation::new("mem", 1.0).with_timestamp(500));
        assert_eq!(evaluator.series_count(), 2);

        evaluator.observe(&Observation::new("mem", 2.0).with_timestamp(5000));
        assert_eq!(evaluator.series_count(), 1);
    }

    #[test]
    fn test_huge_time_frame_does_not_empty_window() {
        let threshold = Threshold::new(ThresholdType::Rate, Comparison::GreaterThan, 0.5)
            .with_time_frame(u64::MAX);
        let mut evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));

        let last = feed(&mut evaluator, &[(0, 0.0), (2000, 2.0)]);
        assert_eq!(evaluator.series_count(), 1);
        assert_eq!(
            evaluator.evaluate(&last, &threshold),
            Evaluation::Breach(Breach { current_value: 1.0 })
        );
    }

    #[test]
    fn test_metric_selector() {
        let threshold =
            Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 1.0).for_metric("mem");
        let evaluator = ThresholdEvaluator::new(std::slice::from_ref(&threshold));
        assert_eq!(evaluator.evaluate(&obs(0, 5.0), &threshold), Evaluation::NoBreach);
    }
}
