//! Stats module - KPIs, breakdowns and correlation

mod calculator;

pub use calculator::{
    format_currency, Breakdown, CorrelationMatrix, CorrelationView, GroupTotal,
    Kpis, Metric, StatsCalculator,
};
