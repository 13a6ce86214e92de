/// Relative Strength Index for every bar, using Wilder's smoothing.
///
/// The first value appears at index `period` (it needs `period` price changes).
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period]
        .iter()
        .filter(|c| **c < 0.0)
        .map(|c| c.abs())
        .sum::<f64>()
        / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for (i, change) in changes.iter().enumerate().skip(period) {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5,
            46.0, 46.5, 46.25, 46.0, 46.5,
        ];

        let rsi = rsi_series(&prices, 14);
        let rsi_value = rsi[14].unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
        assert!(rsi[..14].iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        assert!(rsi_series(&prices, 14).iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0];
        let rsi = rsi_series(&prices, 5);
        assert_eq!(rsi[5], Some(100.0)); // All gains = RSI 100
        assert_eq!(rsi[6], Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices = vec![106.0, 105.0, 104.0, 103.0, 102.0, 101.0];
        let rsi = rsi_series(&prices, 5);
        assert_eq!(rsi[5], Some(0.0));
    }
}
