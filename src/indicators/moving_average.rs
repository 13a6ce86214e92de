/// Simple Moving Average for every bar; `None` until `period` bars are available
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; prices.len()];
    }

    let mut out = Vec::with_capacity(prices.len());
    let mut sum = 0.0;
    for (i, price) in prices.iter().enumerate() {
        sum += price;
        if i >= period {
            sum -= prices[i - period];
        }
        out.push(if i + 1 >= period {
            Some(sum / period as f64)
        } else {
            None
        });
    }
    out
}

/// Exponential Moving Average for every bar
///
/// Seeded with the SMA of the first `period` prices, then
/// `ema = (price - ema) * 2 / (period + 1) + ema`.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, price) in prices.iter().enumerate().skip(period) {
        ema = (price - ema) * multiplier + ema;
        out[i] = Some(ema);
    }
    out
}

/// Rolling sample standard deviation (n - 1 denominator)
pub fn rolling_std_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    if period < 2 {
        return vec![None; prices.len()];
    }

    (0..prices.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &prices[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let var = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
            Some(var.sqrt())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = sma_series(&prices, 5);
        assert_eq!(sma[4], Some(104.0));
        assert!(sma[..4].iter().all(Option::is_none));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        assert!(sma_series(&prices, 5).iter().all(Option::is_none));
    }

    #[test]
    fn test_ema() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = ema_series(&prices, 5);
        assert_eq!(ema[4], Some(104.0)); // seeded with the SMA
        assert!(ema[5].unwrap() > 104.0);
    }

    #[test]
    fn test_rolling_std() {
        let prices = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = rolling_std_series(&prices, 8);
        let value = std[7].unwrap();
        assert!((value - 2.138_089_935).abs() < 1e-6);
    }
}
