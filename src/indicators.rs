use std::collections::VecDeque;

/// Trailing simple moving average.
///
/// Until `period` values have been seen the average covers only what is
/// available, so the first output equals the first input.
#[derive(Debug, Clone)]
pub struct Sma {
    window: VecDeque<f64>,
    period: usize,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            window: VecDeque::with_capacity(period),
            period,
            sum: 0.0,
        }
    }

    pub fn update(&mut self, value: f64) -> f64 {
        self.sum += value;
        self.window.push_back(value);
        if self.window.len() > self.period {
            self.sum -= self.window.pop_front().unwrap_or(0.0);
        }
        self.get()
    }

    pub fn get(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum / self.window.len() as f64
        }
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.period
    }
}

/// Moving-average series aligned one-to-one with `values`.
pub fn moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let mut sma = Sma::new(period);
    values.iter().map(|v| sma.update(*v)).collect()
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_min_periods() {
        let mut sma = Sma::new(3);
        assert!((sma.update(0.1) - 0.1).abs() < 1e-12);
        assert!(!sma.is_ready());
        assert!((sma.update(0.2) - 0.15).abs() < 1e-12);
        assert!((sma.update(0.3) - 0.2).abs() < 1e-12);
        assert!(sma.is_ready());
        assert!((sma.update(0.4) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_zero_period_acts_as_one() {
        let series = moving_average(&[0.2, 0.8], 0);
        assert_eq!(series.len(), 2);
        assert!((series[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_mean_empty() {
        assert!(mean(&[]).is_none());
        assert!((mean(&[1.0, 3.0]).unwrap() - 2.0).abs() < 1e-12);
    }
}
