use serde::{Deserialize, Serialize};

/// Statistics for a confidence bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub mid_confidence: f64,
    pub actual_accuracy: f64,
    pub sample_count: usize,
    pub calibration_gap: f64,
}

/// How well issued confidence matched settled outcomes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Expected Calibration Error (lower is better, 0 is perfect)
    pub ece: f64,
    /// Maximum Calibration Error
    pub mce: f64,
    /// Brier Score (lower is better)
    pub brier_score: f64,
    /// Fraction of proposals that reached their target
    pub hit_rate: f64,
    pub sample_size: usize,
    pub bucket_stats: Vec<BucketStats>,
}

const BUCKETS: usize = 10;

impl CalibrationReport {
    /// Build from (issued confidence, success) pairs
    pub fn from_pairs(data: &[(f64, bool)]) -> Self {
        if data.is_empty() {
            return Self::default();
        }

        let mut buckets: Vec<Vec<bool>> = vec![Vec::new(); BUCKETS];
        for (conf, outcome) in data {
            let bucket = ((conf.clamp(0.0, 1.0) * BUCKETS as f64) as usize).min(BUCKETS - 1);
            buckets[bucket].push(*outcome);
        }

        let bucket_stats: Vec<BucketStats> = buckets
            .into_iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, bucket)| {
                let mid = (i as f64 + 0.5) / BUCKETS as f64;
                let accuracy = bucket.iter().filter(|&&x| x).count() as f64 / bucket.len() as f64;
                BucketStats {
                    bucket_start: i as f64 / BUCKETS as f64,
                    bucket_end: (i + 1) as f64 / BUCKETS as f64,
                    mid_confidence: mid,
                    actual_accuracy: accuracy,
                    sample_count: bucket.len(),
                    calibration_gap: mid - accuracy,
                }
            })
            .collect();

        let n = data.len() as f64;
        let ece: f64 = bucket_stats
            .iter()
            .map(|b| b.calibration_gap.abs() * b.sample_count as f64 / n)
            .sum();
        let mce = bucket_stats
            .iter()
            .map(|b| b.calibration_gap.abs())
            .fold(0.0_f64, f64::max);

        let brier_score = data
            .iter()
            .map(|(conf, outcome)| {
                let y = if *outcome { 1.0 } else { 0.0 };
                (conf - y).powi(2)
            })
            .sum::<f64>()
            / n;
        let hit_rate = data.iter().filter(|(_, o)| *o).count() as f64 / n;

        Self {
            ece,
            mce,
            brier_score,
            hit_rate,
            sample_size: data.len(),
            bucket_stats,
        }
    }

    /// Get a human-readable assessment
    pub fn assessment(&self) -> String {
        if self.sample_size < 30 {
            "Insufficient data for reliable calibration assessment".to_string()
        } else if self.ece < 0.05 {
            "Excellent calibration - confidence tracks outcomes closely".to_string()
        } else if self.ece < 0.1 {
            "Good calibration - confidence is reasonably reliable".to_string()
        } else if self.ece < 0.2 {
            "Moderate calibration - multipliers may need more history".to_string()
        } else {
            "Poor calibration - confidence diverges from outcomes".to_string()
        }
    }

    /// Issued confidence above 50% ran ahead of realized hit rates
    pub fn is_overconfident(&self) -> bool {
        self.upper_gap() > 0.0
    }

    pub fn is_underconfident(&self) -> bool {
        self.upper_gap() < 0.0
    }

    fn upper_gap(&self) -> f64 {
        self.bucket_stats
            .iter()
            .filter(|b| b.mid_confidence > 0.5)
            .map(|b| b.calibration_gap)
            .sum()
    }
}
