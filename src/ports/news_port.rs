//! News headline port trait.

use crate::domain::error::DeskError;
use crate::domain::sentiment::NEUTRAL_HEADLINES;
use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

pub trait NewsPort {
    /// Headlines for a news category; may be empty.
    fn fetch_headlines(&self, category: &str) -> Result<Vec<String>, DeskError>;
}

/// Headlines for `category`, or the neutral set when the source fails.
pub fn headlines_or_neutral(
    news: &dyn NewsPort,
    category: &str,
    telemetry: &dyn TelemetryPort,
) -> Vec<String> {
    match news.fetch_headlines(category) {
        Ok(headlines) => headlines,
        Err(err) => {
            telemetry.record(TelemetryEvent::NewsFallback {
                category: category.to_string(),
                reason: err.to_string(),
            });
            NEUTRAL_HEADLINES.iter().map(|h| h.to_string()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_telemetry::MemoryTelemetry;

    struct Unreadable;

    impl NewsPort for Unreadable {
        fn fetch_headlines(&self, _: &str) -> Result<Vec<String>, DeskError> {
            Err(DeskError::Io(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )))
        }
    }

    #[test]
    fn failing_source_yields_neutral_headlines() {
        let telemetry = MemoryTelemetry::new();
        let headlines = headlines_or_neutral(&Unreadable, "market", &telemetry);
        assert_eq!(headlines, NEUTRAL_HEADLINES.to_vec());
        assert_eq!(telemetry.events().len(), 1);
        assert!(matches!(
            &telemetry.events()[0],
            TelemetryEvent::NewsFallback { category, .. } if category == "market"
        ));
    }
}
