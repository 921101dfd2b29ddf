use crate::domain::round2;
use serde::Serialize;

/// Window sizes for trend classification and prediction.
const TREND_WINDOW: usize = 7;
const REGRESSION_WINDOW: usize = 14;
const FORECAST_STEPS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

/// Compares the mean of the last 7 observed costs against the mean of the
/// up-to-7 points immediately preceding that window. A shift of more than
/// ±5% classifies the trend; fewer than 2 points is insufficient data and
/// reads as stable.
pub fn classify_trend(prices: &[f64]) -> Trend {
    if prices.len() < 2 {
        return Trend::Stable;
    }

    let recent_start = prices.len().saturating_sub(TREND_WINDOW);
    let recent = &prices[recent_start..];
    let older_start = recent_start.saturating_sub(TREND_WINDOW);
    let older = &prices[older_start..recent_start];

    let recent_avg = mean(recent);
    let older_avg = if older.is_empty() { recent_avg } else { mean(older) };
    if older_avg == 0.0 {
        return Trend::Stable;
    }

    let change = (recent_avg - older_avg) / older_avg * 100.0;
    if change < -5.0 {
        Trend::Decreasing
    } else if change > 5.0 {
        Trend::Increasing
    } else {
        Trend::Stable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePrediction {
    pub price: f64,
    /// Fixed constants (0.3 for thin data, 0.7 otherwise), not statistically
    /// derived. A known simplification carried over deliberately.
    pub confidence: f64,
}

/// Short-horizon forecast: ordinary least-squares over the last up-to-14
/// points extrapolated one week out. With fewer than 3 points the last known
/// price is returned at low confidence; an empty series has no last known
/// price and yields `None`.
pub fn predict_next_week(prices: &[f64]) -> Option<PricePrediction> {
    let last = *prices.last()?;
    if prices.len() < 3 {
        return Some(PricePrediction {
            price: round2(last),
            confidence: 0.3,
        });
    }

    let n = prices.len().min(REGRESSION_WINDOW);
    let recent = &prices[prices.len() - n..];

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, &y) in recent.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let n_f = n as f64;
    let slope = (n_f * sum_xy - sum_x * sum_y) / (n_f * sum_x2 - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n_f;
    let predicted = slope * (n_f + FORECAST_STEPS as f64) + intercept;

    Some(PricePrediction {
        price: round2(predicted.max(0.0)),
        confidence: 0.7,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub current_price: f64,
    pub lowest_price: f64,
    pub highest_price: f64,
    pub average_price: f64,
}

/// Summary statistics over an observed price series.
pub fn history_stats(prices: &[f64]) -> Option<HistoryStats> {
    let current = *prices.last()?;
    let lowest = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let highest = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(HistoryStats {
        current_price: current,
        lowest_price: lowest,
        highest_price: highest,
        average_price: round2(mean(prices)),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_is_stable() {
        let prices = [100.0; 8];
        assert_eq!(classify_trend(&prices), Trend::Stable);
    }

    #[test]
    fn twenty_percent_drop_is_decreasing() {
        let mut prices = vec![100.0; 7];
        prices.extend(std::iter::repeat(80.0).take(7));
        assert_eq!(classify_trend(&prices), Trend::Decreasing);
    }

    #[test]
    fn rising_series_is_increasing() {
        let mut prices = vec![100.0; 7];
        prices.extend(std::iter::repeat(120.0).take(7));
        assert_eq!(classify_trend(&prices), Trend::Increasing);
    }

    #[test]
    fn small_shift_stays_stable() {
        let mut prices = vec![100.0; 7];
        prices.extend(std::iter::repeat(103.0).take(7));
        assert_eq!(classify_trend(&prices), Trend::Stable);
    }

    #[test]
    fn too_few_points_reads_as_stable() {
        assert_eq!(classify_trend(&[]), Trend::Stable);
        assert_eq!(classify_trend(&[42.0]), Trend::Stable);
    }

    #[test]
    fn short_series_stays_stable_with_no_prior_window() {
        // 2..=7 points: nothing precedes the recent window
        assert_eq!(classify_trend(&[100.0, 50.0]), Trend::Stable);
        assert_eq!(classify_trend(&[10.0, 20.0, 80.0, 90.0]), Trend::Stable);
    }

    #[test]
    fn thin_history_predicts_last_price_with_low_confidence() {
        let prediction = predict_next_week(&[120.0, 110.0]).unwrap();
        assert_eq!(prediction.price, 110.0);
        assert_eq!(prediction.confidence, 0.3);
    }

    #[test]
    fn empty_history_has_no_prediction() {
        assert!(predict_next_week(&[]).is_none());
    }

    #[test]
    fn constant_series_predicts_itself() {
        let prediction = predict_next_week(&[50.0; 10]).unwrap();
        assert_eq!(prediction.price, 50.0);
        assert_eq!(prediction.confidence, 0.7);
    }

    #[test]
    fn linear_series_extrapolates_the_slope() {
        // y = 100 + x over 10 points; forecast point is x = n + 7 = 17
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let prediction = predict_next_week(&prices).unwrap();
        assert_eq!(prediction.price, 117.0);
    }

    #[test]
    fn falling_forecast_is_clamped_at_zero() {
        let prices: Vec<f64> = (0..10).map(|i| 50.0 - 10.0 * i as f64).collect();
        let prediction = predict_next_week(&prices).unwrap();
        assert_eq!(prediction.price, 0.0);
    }

    #[test]
    fn stats_summarize_the_series() {
        let stats = history_stats(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(stats.current_price, 2.0);
        assert_eq!(stats.lowest_price, 1.0);
        assert_eq!(stats.highest_price, 3.0);
        assert_eq!(stats.average_price, 2.0);
        assert!(history_stats(&[]).is_none());
    }
}
