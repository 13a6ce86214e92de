use super::moving_average::{rolling_std_series, sma_series};

/// Bollinger Bands around an SMA
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// `middle = SMA(period)`, `upper/lower = middle ± std_dev * rolling std`
pub fn bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma_series(prices, period);
    let std = rolling_std_series(prices, period);

    let band = |sign: f64| -> Vec<Option<f64>> {
        middle
            .iter()
            .zip(&std)
            .map(|(m, s)| Some(m.as_ref()? + sign * std_dev * s.as_ref()?))
            .collect()
    };

    BollingerBands {
        upper: band(1.0),
        lower: band(-1.0),
        middle,
    }
}
