//! Dashboard Views
//!
//! Turns the backend's aggregate analytics into chart configurations.
//!
//! - **analytics**: typed navigation over the `GET /dashboard` payload
//! - **charts**: ECharts option builders (trends, rankings, heatmap, query rows)
//! - **view**: the page-level view model, including the "no data" state

mod analytics;
mod charts;
mod view;

pub use analytics::{kpi_label, ChartKind, DashboardAnalytics, KpiSeries, RankingEntry, MONTHS};
pub use charts::{chart_from_rows, performance_matrix_option, ranking_option, time_series_option};
pub use view::{DashboardPanels, DashboardView, KpiChart, SummaryCard};
