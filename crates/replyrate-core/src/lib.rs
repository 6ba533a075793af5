//! ReplyRate Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout ReplyRate:
//! - Filter selections and the period resolver
//! - Aggregate counts and the chart data shaper
//! - The aggregate source trait abstraction
//! - Core error types

pub mod charts;
pub mod counts;
pub mod error;
pub mod period;
pub mod source;

pub use charts::{ChartData, ChartRecord, ComparisonRecord, PercentRecord, shape};
pub use counts::{AggregateCounts, Channel, Outcome};
pub use error::{Error, Result};
pub use period::{
    ComparePeriod, DateRange, FilterSelection, Period, PeriodField, PeriodQuery, WeekStart,
};
pub use source::AggregateSource;
