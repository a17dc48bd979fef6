//! Recency-weighted aggregation of telemetry windows
//!
//! Samples arrive newest first. The newest of `n` samples carries weight `n`
//! and the oldest weight 1, normalized by the triangular number `n(n+1)/2`.
//! The core-pooled variant first averages sibling cores within a time slot
//! and then weights the slots.

use crate::error::{ScorerError, ScorerResult};
use crate::models::{Metric, MetricSample, MetricSet};

/// Recency-weighted mean of `values`, newest first.
///
/// The sum is taken over deviations from the newest value so that a
/// constant window reproduces its value exactly.
pub fn recency_weighted(values: &[f64]) -> Option<f64> {
    let (&anchor, _) = values.split_first()?;
    let n = values.len() as f64;
    let total_weight = n * (n + 1.0) / 2.0;

    let offset: f64 = values
        .iter()
        .enumerate()
        .map(|(j, v)| (v - anchor) * (n - j as f64))
        .sum();

    Some(anchor + offset / total_weight)
}

/// Plain mean anchored on the first value
fn anchored_mean(values: &[f64]) -> Option<f64> {
    let (&anchor, _) = values.split_first()?;
    let offset: f64 = values.iter().map(|v| v - anchor).sum();
    Some(anchor + offset / values.len() as f64)
}

/// Weighted average of each requested metric across `samples`
pub fn weighted_average(samples: &[MetricSample], metrics: &[Metric]) -> ScorerResult<MetricSet> {
    let mut result = MetricSet::default();

    for &metric in metrics {
        let values = column(samples, metric)?;
        let value = recency_weighted(&values).ok_or(ScorerError::EmptyInput(metric))?;
        result.set(metric, value);
    }

    Ok(result)
}

/// Core-pooled weighted average.
///
/// Rows are grouped into time slots: a slot closes as soon as a core that is
/// already part of it shows up again. Each slot is reduced to the mean across
/// its cores and the slot means are then recency-weighted.
pub fn weighted_average_cores(
    samples: &[MetricSample],
    metrics: &[Metric],
) -> ScorerResult<MetricSet> {
    let slots = time_slots(samples);
    let mut result = MetricSet::default();

    for &metric in metrics {
        let mut pooled = Vec::with_capacity(slots.len());
        for slot in &slots {
            let values = column(slot, metric)?;
            if let Some(mean) = anchored_mean(&values) {
                pooled.push(mean);
            }
        }

        let value = recency_weighted(&pooled).ok_or(ScorerError::EmptyInput(metric))?;
        result.set(metric, value);
    }

    Ok(result)
}

/// Split newest-first per-core rows into consecutive time slots
fn time_slots(samples: &[MetricSample]) -> Vec<&[MetricSample]> {
    let mut slots = Vec::new();
    let mut start = 0;

    for i in 0..samples.len() {
        let core = samples[i].core_id;
        let repeats = core.is_none() || samples[start..i].iter().any(|s| s.core_id == core);
        if i > start && repeats {
            slots.push(&samples[start..i]);
            start = i;
        }
    }
    if start < samples.len() {
        slots.push(&samples[start..]);
    }

    slots
}

/// Values of one metric across rows. Rows without the metric are skipped.
fn column(samples: &[MetricSample], metric: Metric) -> ScorerResult<Vec<f64>> {
    let mut values = Vec::with_capacity(samples.len());
    for sample in samples {
        if let Some(v) = sample.value(metric)? {
            values.push(v);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(metric: Metric, values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(1_000 - i as i64).with(metric, *v))
            .collect()
    }

    fn per_core(metric: Metric, cores: &[u32], values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .enumerate()
            .flat_map(move |(i, v)| {
                cores
                    .iter()
                    .map(move |c| MetricSample::new(1_000 - i as i64).on_core(*c).with(metric, *v))
            })
            .collect()
    }

    #[test]
    fn test_recency_weighted_favours_newest() {
        // weights 3, 2, 1 over 6
        let v = recency_weighted(&[6.0, 0.0, 0.0]).unwrap();
        assert!((v - 3.0).abs() < 1e-12);

        let v = recency_weighted(&[0.0, 0.0, 6.0]).unwrap();
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_recency_weighted_empty() {
        assert!(recency_weighted(&[]).is_none());
    }

    #[test]
    fn test_constant_window_is_exact() {
        for n in 1..=64 {
            for v in [0.1, 1.0 / 3.0, 2.2, 1e-9, 12345.678] {
                let values = vec![v; n];
                assert_eq!(recency_weighted(&values), Some(v), "n={n} v={v}");
            }
        }
    }

    #[test]
    fn test_weighted_average_within_bounds() {
        let windows: [&[f64]; 4] = [
            &[0.3, 0.9, 0.1, 0.7],
            &[5.0, -2.0, 3.5],
            &[1e-6, 1e6],
            &[0.42],
        ];
        for values in windows {
            let v = recency_weighted(values).unwrap();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(v >= min - 1e-9 && v <= max + 1e-9, "{v} outside [{min}, {max}]");
        }
    }

    #[test]
    fn test_weighted_average_over_samples() {
        let samples = series(Metric::Ipc, &[2.0, 1.0]);
        let set = weighted_average(&samples, &[Metric::Ipc]).unwrap();
        // (2*2 + 1*1) / 3
        assert!((set.ipc.unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(set.mem_read, None);
    }

    #[test]
    fn test_weighted_average_empty_input() {
        let err = weighted_average(&[], &[Metric::Ipc]).unwrap_err();
        assert!(matches!(err, ScorerError::EmptyInput(Metric::Ipc)));

        // rows exist but none carries the requested metric
        let samples = series(Metric::Ipc, &[1.0]);
        let err = weighted_average(&samples, &[Metric::MemRead]).unwrap_err();
        assert!(matches!(err, ScorerError::EmptyInput(Metric::MemRead)));
    }

    #[test]
    fn test_weighted_average_parse_error() {
        let mut sample = MetricSample::new(1);
        sample.values.insert("ipc".into(), json!("NaN-ish"));
        let err = weighted_average(&[sample], &[Metric::Ipc]).unwrap_err();
        assert!(matches!(err, ScorerError::Parse { .. }));
    }

    #[test]
    fn test_core_pooled_matches_single_core_for_identical_series() {
        let values = [0.2, 0.35, 0.1, 0.8, 0.05];
        let single = weighted_average(&series(Metric::C6Res, &values), &[Metric::C6Res]).unwrap();

        for cores in [vec![0], vec![0, 1], vec![20, 21, 22, 23], (0..16).collect()] {
            let pooled =
                weighted_average_cores(&per_core(Metric::C6Res, &cores, &values), &[Metric::C6Res])
                    .unwrap();
            assert_eq!(pooled.c6res, single.c6res, "cores={cores:?}");
        }
    }

    #[test]
    fn test_core_pooled_averages_within_slot_first() {
        // newest slot: cores at 0.0 and 0.6 -> 0.3; oldest slot: 0.9 and 0.9 -> 0.9
        let samples = vec![
            MetricSample::new(2).on_core(0).with(Metric::C6Res, 0.0),
            MetricSample::new(2).on_core(1).with(Metric::C6Res, 0.6),
            MetricSample::new(1).on_core(0).with(Metric::C6Res, 0.9),
            MetricSample::new(1).on_core(1).with(Metric::C6Res, 0.9),
        ];
        let set = weighted_average_cores(&samples, &[Metric::C6Res]).unwrap();
        let expected = (0.3 * 2.0 + 0.9) / 3.0;
        assert!((set.c6res.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_core_pooled_single_socket_level_row() {
        let samples = vec![MetricSample::new(5).with(Metric::C6Res, 0.2)];
        let set = weighted_average_cores(&samples, &[Metric::C6Res]).unwrap();
        assert_eq!(set.c6res, Some(0.2));
    }

    #[test]
    fn test_core_pooled_empty_input() {
        let err = weighted_average_cores(&[], &[Metric::C6Res]).unwrap_err();
        assert!(matches!(err, ScorerError::EmptyInput(Metric::C6Res)));
    }

    #[test]
    fn test_time_slots_split_on_repeated_core() {
        let samples = per_core(Metric::C6Res, &[4, 5, 6], &[0.1, 0.2]);
        let slots = time_slots(&samples);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.len() == 3));
    }
}
