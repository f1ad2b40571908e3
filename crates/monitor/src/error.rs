//! User-facing error taxonomy of a deforestation check.
//!
//! The `Display` text of each variant is exactly what the session reports.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Please select a district.")]
    MissingDistrict,

    #[error("Invalid number of days: '{0}'")]
    InvalidDays(String),

    #[error("Unknown district: {0}")]
    DistrictNotFound(String),

    #[error("Imagery source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Pixel budget exceeded: {pixels} pixels requested, budget is {budget}")]
    ResourceLimit { pixels: u64, budget: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid district registry: {0}")]
    Registry(String),

    #[error("{0}")]
    Core(forestwatch_core::Error),
}

impl From<forestwatch_core::Error> for MonitorError {
    fn from(err: forestwatch_core::Error) -> Self {
        use forestwatch_core::Error as E;
        match err {
            E::SourceUnavailable(msg) => MonitorError::SourceUnavailable(msg),
            E::ResourceLimit { pixels, budget } => MonitorError::ResourceLimit { pixels, budget },
            other => MonitorError::Core(other),
        }
    }
}

impl MonitorError {
    /// Input errors are rejected before any computation starts
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingDistrict | Self::InvalidDays(_) | Self::DistrictNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(MonitorError::MissingDistrict.to_string(), "Please select a district.");
        assert_eq!(
            MonitorError::InvalidDays("abc".into()).to_string(),
            "Invalid number of days: 'abc'"
        );
        assert_eq!(
            MonitorError::DistrictNotFound("Atlantis".into()).to_string(),
            "Unknown district: Atlantis"
        );
    }

    #[test]
    fn test_core_errors_keep_their_category() {
        let e: MonitorError = forestwatch_core::Error::SourceUnavailable("timeout".into()).into();
        assert!(matches!(e, MonitorError::SourceUnavailable(_)));

        let e: MonitorError = forestwatch_core::Error::ResourceLimit { pixels: 10, budget: 5 }.into();
        assert!(matches!(e, MonitorError::ResourceLimit { pixels: 10, budget: 5 }));
        assert!(!e.is_input_error());

        let e: MonitorError = forestwatch_core::Error::Other("x".into()).into();
        assert!(matches!(e, MonitorError::Core(_)));
    }
}
