//! Dashboard View Model
//!
//! Everything the dashboard page needs to render, derived from one
//! analytics payload.

use serde::Serialize;
use serde_json::{Map, Value};

use super::analytics::{kpi_label, DashboardAnalytics};
use super::charts::{performance_matrix_option, ranking_option, time_series_option};

/// A headline number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryCard {
    pub label: String,
    pub value: String,
}

/// A chart tied to a KPI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiChart {
    pub kpi: String,
    pub title: String,
    pub option: Value,
}

/// Rendered dashboard content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPanels {
    pub cards: Vec<SummaryCard>,
    pub trends: Vec<KpiChart>,
    pub rankings: Vec<KpiChart>,
    pub matrix: Option<Value>,
}

impl DashboardPanels {
    /// Trend chart for a single KPI, matched by key or display label
    pub fn trend(&self, kpi: &str) -> Option<&KpiChart> {
        self.trends
            .iter()
            .find(|c| c.kpi == kpi || c.title.eq_ignore_ascii_case(kpi))
    }
}

/// What the dashboard page shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardView {
    /// Nothing to chart yet, typically before the first upload
    NoData { reason: String },
    Ready(DashboardPanels),
}

impl DashboardView {
    pub fn build(analytics: &DashboardAnalytics) -> Self {
        if !analytics.has_time_series() {
            return DashboardView::NoData {
                reason: "No time series data available. Upload a KPI workbook to populate the dashboard."
                    .to_string(),
            };
        }

        let trends: Vec<KpiChart> = analytics
            .time_series()
            .iter()
            .filter(|s| s.has_data())
            .map(|s| KpiChart {
                kpi: s.kpi.clone(),
                title: kpi_label(&s.kpi),
                option: time_series_option(s),
            })
            .collect();

        if trends.is_empty() {
            return DashboardView::NoData {
                reason: "Time series data contains no values.".to_string(),
            };
        }

        let rankings = analytics
            .ranked_kpis()
            .into_iter()
            .filter_map(|kpi| {
                let entries = analytics.ranking(&kpi);
                if entries.is_empty() {
                    return None;
                }
                Some(KpiChart {
                    title: format!("{} ranking", kpi_label(&kpi)),
                    option: ranking_option(&kpi, &entries),
                    kpi,
                })
            })
            .collect();

        DashboardView::Ready(DashboardPanels {
            cards: summary_cards(analytics),
            trends,
            rankings,
            matrix: analytics
                .performance_matrix()
                .and_then(performance_matrix_option),
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DashboardView::NoData { .. })
    }
}

fn summary_cards(analytics: &DashboardAnalytics) -> Vec<SummaryCard> {
    let mut cards = vec![
        SummaryCard {
            label: "Suppliers".to_string(),
            value: analytics.total_suppliers().to_string(),
        },
        SummaryCard {
            label: "KPIs tracked".to_string(),
            value: analytics.total_kpis().to_string(),
        },
    ];

    let Some(summary) = analytics.summary() else {
        return cards;
    };

    let sources: [(&str, &str, &str, Unit); 5] = [
        ("safety", "safetyRate", "Zero-accident suppliers", Unit::Percent),
        ("delivery", "averageDeliveryRate", "Average OK delivery", Unit::Percent),
        ("production", "totalTrips", "Total trips", Unit::Count),
        ("production", "totalQuantityShipped", "Quantity shipped", Unit::Count),
        ("production", "totalProductionLoss", "Production loss", Unit::Hours),
    ];

    for (section, key, label, unit) in sources {
        if let Some(v) = nested_f64(summary, section, key) {
            cards.push(SummaryCard {
                label: label.to_string(),
                value: unit.format(v),
            });
        }
    }

    cards
}

fn nested_f64(map: &Map<String, Value>, section: &str, key: &str) -> Option<f64> {
    map.get(section)?.get(key)?.as_f64()
}

#[derive(Clone, Copy)]
enum Unit {
    Percent,
    Count,
    Hours,
}

impl Unit {
    fn format(self, v: f64) -> String {
        match self {
            Unit::Percent => format!("{:.1}%", v),
            Unit::Count => format!("{:.0}", v),
            Unit::Hours => format!("{:.1} h", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_time_series_is_no_data() {
        let analytics = DashboardAnalytics::from_response(json!({
            "message": "ok",
            "data": {"summary": {"totalSuppliers": 3}},
            "totalSuppliers": 3
        }));
        let view = DashboardView::build(&analytics);
        assert!(view.is_empty());
    }

    #[test]
    fn test_all_null_series_is_no_data() {
        let analytics = DashboardAnalytics::from_response(json!({
            "data": {"timeSeries": {"trips": {"monthlyData": {"Jan": null}}}}
        }));
        assert!(DashboardView::build(&analytics).is_empty());
    }

    #[test]
    fn test_ready_view() {
        let analytics = DashboardAnalytics::from_response(json!({
            "data": {
                "summary": {
                    "safety": {"safetyRate": 66.666},
                    "production": {"totalTrips": 120, "totalProductionLoss": 3.26}
                },
                "timeSeries": {
                    "trips": {"monthlyData": {"Jan": 60, "Feb": 60}, "chartType": "bar"}
                },
                "rankings": {"trips": [{"supplier": "Acme", "score": 120}], "accidents": []},
                "performanceMatrix": {
                    "matrixData": [{"supplier": "Acme", "trips": 60}],
                    "kpiNames": ["trips"]
                }
            },
            "totalSuppliers": 1,
            "totalKPIs": 1
        }));

        let DashboardView::Ready(panels) = DashboardView::build(&analytics) else {
            panic!("expected a ready dashboard");
        };

        assert_eq!(panels.trends.len(), 1);
        assert!(panels.trend("Trips").is_some());
        assert_eq!(panels.rankings.len(), 1);
        assert!(panels.matrix.is_some());

        let labels: Vec<&str> = panels.cards.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Suppliers", "KPIs tracked", "Zero-accident suppliers", "Total trips", "Production loss"]
        );
        assert_eq!(panels.cards[2].value, "66.7%");
        assert_eq!(panels.cards[4].value, "3.3 h");
    }
}
