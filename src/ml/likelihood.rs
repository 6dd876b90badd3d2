//! Likelihood scoring and prediction result types

use serde::{Deserialize, Serialize};

use super::model::TargetStats;

/// How a raw prediction was mapped into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikelihoodScale {
    /// Linear scaling against the observed training range
    MinMax,
    /// Logistic of the z-score, used when the training range is degenerate
    Sigmoid,
}

/// Training range reported alongside each prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelInfo {
    pub y_min: f64,
    pub y_max: f64,
}

/// Result of scoring one request. Output only; `scale` is not serialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Raw linear prediction; may be negative or exceed `y_max`.
    pub predicted_incount: f64,
    /// Always within [0, 1].
    pub likelihood: f64,
    pub model_info: ModelInfo,
    #[serde(skip)]
    pub scale: LikelihoodScale,
}

/// Map a raw in-count prediction into [0, 1].
///
/// A NaN prediction (opposite-signed overflow in the linear sum) scores 0.5.
pub fn likelihood(predicted_incount: f64, stats: &TargetStats) -> (f64, LikelihoodScale) {
    let range = stats.max - stats.min;
    if range > 0.0 {
        let scaled = (predicted_incount - stats.min) / range;
        (bounded(scaled), LikelihoodScale::MinMax)
    } else {
        let z = (predicted_incount - stats.mean) / stats.std;
        (bounded(sigmoid(z)), LikelihoodScale::Sigmoid)
    }
}

fn bounded(score: f64) -> f64 {
    if score.is_nan() {
        0.5
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(min: f64, max: f64, mean: f64, std: f64) -> TargetStats {
        TargetStats { min, max, mean, std }
    }

    #[test]
    fn test_min_max_scaling() {
        let (l, scale) = likelihood(75.0, &stats(50.0, 150.0, 90.0, 20.0));
        assert!((l - 0.25).abs() < 1e-12);
        assert_eq!(scale, LikelihoodScale::MinMax);
    }

    #[test]
    fn test_min_max_clamps_extrapolation() {
        let s = stats(0.0, 10.0, 5.0, 2.0);
        assert_eq!(likelihood(-40.0, &s).0, 0.0);
        assert_eq!(likelihood(400.0, &s).0, 1.0);
        assert_eq!(likelihood(10.0, &s).0, 1.0);
    }

    #[test]
    fn test_sigmoid_fallback_on_degenerate_range() {
        let s = stats(7.0, 7.0, 7.0, 1.0);

        let (at_mean, scale) = likelihood(7.0, &s);
        assert!((at_mean - 0.5).abs() < 1e-12);
        assert_eq!(scale, LikelihoodScale::Sigmoid);

        assert!((likelihood(10_000.0, &s).0 - 1.0).abs() < 1e-12);
        assert!(likelihood(-10_000.0, &s).0.abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_is_monotonic() {
        let s = stats(3.0, 3.0, 3.0, 1.0);
        let low = likelihood(2.0, &s).0;
        let high = likelihood(4.0, &s).0;
        assert!(low < 0.5 && high > 0.5);
    }

    #[test]
    fn test_nan_prediction_scores_midpoint() {
        let (ranged, _) = likelihood(f64::NAN, &stats(0.0, 10.0, 5.0, 2.0));
        let (degenerate, scale) = likelihood(f64::NAN, &stats(4.0, 4.0, 4.0, 1.0));

        assert_eq!(ranged, 0.5);
        assert_eq!(degenerate, 0.5);
        assert_eq!(scale, LikelihoodScale::Sigmoid);
    }

    #[test]
    fn test_infinite_prediction_clamps() {
        let ranged = stats(0.0, 10.0, 5.0, 2.0);
        let degenerate = stats(4.0, 4.0, 4.0, 1.0);

        assert_eq!(likelihood(f64::INFINITY, &ranged).0, 1.0);
        assert_eq!(likelihood(f64::NEG_INFINITY, &ranged).0, 0.0);
        assert_eq!(likelihood(f64::INFINITY, &degenerate).0, 1.0);
        assert_eq!(likelihood(f64::NEG_INFINITY, &degenerate).0, 0.0);
    }

    #[test]
    fn test_prediction_serializes_without_scale() {
        let prediction = Prediction {
            predicted_incount: 12.5,
            likelihood: 0.4,
            model_info: ModelInfo { y_min: 0.0, y_max: 30.0 },
            scale: LikelihoodScale::MinMax,
        };

        let json = serde_json::to_value(prediction).unwrap();

        assert_eq!(json["predicted_incount"], 12.5);
        assert_eq!(json["model_info"]["y_max"], 30.0);
        assert!(json.get("scale").is_none());
    }
}
