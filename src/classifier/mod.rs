//! Classifier boundary: image in, probability out.
//!
//! The model itself is opaque. This module owns the preprocessing the model
//! expects and checks that what comes back is a usable probability.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

pub mod http;
pub mod preprocess;

pub use http::HttpClassifier;
pub use preprocess::{decode_image, preprocess, ImageInfo, RgbImage, Tensor, INPUT_SIZE};

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Fails when the model cannot be reached or loaded.
    async fn health_check(&self) -> Result<()>;

    /// One scalar per call for an NHWC tensor of shape `[1, INPUT_SIZE, INPUT_SIZE, 3]`.
    async fn classify(&self, tensor: &Tensor) -> Result<f64>;
}

/// Rejects non-finite or out-of-range model outputs.
pub fn validate_probability(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(anyhow!("classifier returned {} outside [0, 1]", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_probability() {
        assert_eq!(validate_probability(0.0).unwrap(), 0.0);
        assert_eq!(validate_probability(1.0).unwrap(), 1.0);
        assert!(validate_probability(1.01).is_err());
        assert!(validate_probability(-0.1).is_err());
        assert!(validate_probability(f64::NAN).is_err());
    }
}
