//! Aggregate source trait definitions

use crate::{AggregateCounts, PeriodQuery, Result};

/// A read-only backend able to count outreach events
#[async_trait::async_trait]
pub trait AggregateSource: Send + Sync {
    /// Fetch the six (channel, outcome) counts for one user and date range
    async fn fetch_counts(&self, query: &PeriodQuery) -> Result<AggregateCounts>;

    /// Whether the source currently believes it can serve requests
    fn is_ready(&self) -> bool {
        true
    }

    /// Release backend resources (sign out, drop sessions)
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComparePeriod, FilterSelection, Period, PeriodField, WeekStart};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use uuid::Uuid;

    struct FixedSource(AggregateCounts);

    #[async_trait::async_trait]
    impl AggregateSource for FixedSource {
        async fn fetch_counts(&self, _query: &PeriodQuery) -> Result<AggregateCounts> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_default_methods() {
        let source: Arc<dyn AggregateSource> = Arc::new(FixedSource(AggregateCounts::default()));
        assert!(source.is_ready());

        let selection = FilterSelection::new(Uuid::nil(), Period::CurrentWeek, ComparePeriod::None);
        let query = selection
            .resolve(
                PeriodField::Period,
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                WeekStart::Sunday,
            )
            .unwrap()
            .unwrap();

        let counts = source.fetch_counts(&query).await.unwrap();
        assert_eq!(counts, AggregateCounts::default());
        assert!(source.shutdown().await.is_ok());
    }
}
