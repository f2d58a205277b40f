//! Historical calibration (§4.7: "Historical calibration", §4.7.S).
//!
//! Grounded on `backend/services/confidence_calculator.py`'s `_compute_historical_calibration`
//! for the bucketing and penalty arithmetic. The snapshot of calibrated samples is cached for
//! `calibration_window_days`' worth of data behind a `tokio::sync::RwLock`, refreshed at most
//! once per TTL window (§5: "Calibration cache").

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::document::Severity;

/// One human-reviewed classification used as a calibration data point.
#[derive(Debug, Clone)]
pub struct CalibrationSample {
    /// The model's raw confidence for this prediction.
    pub confidence: f64,
    /// The label the model (pre-rule, pre-review) predicted.
    pub predicted_label: Severity,
    /// The label a human reviewer confirmed as correct.
    pub true_label: Severity,
}

fn confidence_bin(confidence: f64) -> usize {
    ((confidence * 10.0).floor() as i64).clamp(0, 9) as usize
}

/// Compute the calibration factor for a new prediction, given the cached sample set.
///
/// Returns `1.0` (no adjustment) if fewer than 10 calibrated samples exist overall, per §4.7.
pub fn compute_calibration_factor(my_confidence: f64, predicted_label: Severity, samples: &[CalibrationSample]) -> f64 {
    if samples.len() < 10 {
        return 1.0;
    }

    let my_bin = confidence_bin(my_confidence);
    let in_bin: Vec<&CalibrationSample> = samples.iter().filter(|s| confidence_bin(s.confidence) == my_bin).collect();
    let accuracy_for_bin = if in_bin.is_empty() {
        0.5
    } else {
        in_bin.iter().filter(|s| s.predicted_label == s.true_label).count() as f64 / in_bin.len() as f64
    };

    let same_label: Vec<&CalibrationSample> = samples.iter().filter(|s| s.predicted_label == predicted_label).collect();
    let mean_confidence_for_label = if same_label.is_empty() {
        my_confidence
    } else {
        same_label.iter().map(|s| s.confidence).sum::<f64>() / same_label.len() as f64
    };

    let deviation_penalty = (0.5 * (my_confidence - mean_confidence_for_label).abs()).min(0.3);
    let factor = 0.5 + 0.8 * (accuracy_for_bin - 0.5) - deviation_penalty;
    factor.clamp(0.5, 1.5)
}

struct Snapshot {
    samples: Vec<CalibrationSample>,
    refreshed_at: DateTime<Utc>,
}

/// Process-wide calibration snapshot, refreshed lazily on expiry.
pub struct CalibrationCache {
    ttl: chrono::Duration,
    inner: RwLock<Option<Snapshot>>,
}

impl CalibrationCache {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: chrono::Duration::seconds(ttl_seconds),
            inner: RwLock::new(None),
        }
    }

    /// Return the current sample snapshot, refreshing it via `fetch` if expired or absent.
    /// Concurrent readers during a refresh observe the stale (or absent) snapshot rather than
    /// blocking on the fetch, other than the single refresher (§5).
    pub async fn samples<F, Fut>(&self, fetch: F) -> Vec<CalibrationSample>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Vec<CalibrationSample>>,
    {
        {
            let guard = self.inner.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if Utc::now() - snapshot.refreshed_at < self.ttl {
                    return snapshot.samples.clone();
                }
            }
        }

        let mut guard = self.inner.write().await;
        // Re-check: another writer may have refreshed while we waited for the write lock.
        if let Some(snapshot) = guard.as_ref() {
            if Utc::now() - snapshot.refreshed_at < self.ttl {
                return snapshot.samples.clone();
            }
        }

        let samples = fetch().await;
        *guard = Some(Snapshot {
            samples: samples.clone(),
            refreshed_at: Utc::now(),
        });
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(confidence: f64, predicted: Severity, actual: Severity) -> CalibrationSample {
        CalibrationSample {
            confidence,
            predicted_label: predicted,
            true_label: actual,
        }
    }

    fn many_accurate_samples() -> Vec<CalibrationSample> {
        (0..12).map(|_| sample(0.9, Severity::High, Severity::High)).collect()
    }

    #[test]
    fn fewer_than_ten_samples_yields_neutral_factor() {
        let samples = vec![sample(0.9, Severity::High, Severity::High); 5];
        assert_eq!(compute_calibration_factor(0.9, Severity::High, &samples), 1.0);
    }

    #[test]
    fn consistently_accurate_bin_raises_the_factor() {
        let samples = many_accurate_samples();
        let factor = compute_calibration_factor(0.9, Severity::High, &samples);
        assert!(factor > 1.0);
    }

    #[test]
    fn factor_is_clamped_to_valid_range() {
        let mut samples = many_accurate_samples();
        samples.extend((0..12).map(|_| sample(0.1, Severity::Low, Severity::Critical)));
        let factor = compute_calibration_factor(0.1, Severity::Low, &samples);
        assert!((0.5..=1.5).contains(&factor));
    }

    #[tokio::test]
    async fn cache_refreshes_only_once_within_ttl() {
        let cache = CalibrationCache::new(3600);
        let calls = std::sync::atomic::AtomicU32::new(0);
        for _ in 0..3 {
            cache
                .samples(|| async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    vec![sample(0.9, Severity::High, Severity::High)]
                })
                .await;
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
