//! Dashboard Analytics Payload
//!
//! Read-only view over the aggregate object returned by `GET /dashboard`.
//! The backend owns the math; this type only navigates the JSON and never
//! panics on a missing section.

use serde::Serialize;
use serde_json::{Map, Value};

/// Calendar month labels in display order
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// How a KPI series should be charted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

impl ChartKind {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some(k) if k.eq_ignore_ascii_case("line") => ChartKind::Line,
            _ => ChartKind::Bar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
        }
    }
}

/// Month-by-month aggregate of one KPI across all suppliers
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSeries {
    pub kpi: String,
    pub unit: String,
    pub kind: ChartKind,
    /// `(month, value)` in calendar order; `None` marks a month with no data
    pub points: Vec<(&'static str, Option<f64>)>,
}

impl KpiSeries {
    fn from_value(kpi: &str, value: &Value) -> Option<Self> {
        let monthly = value.get("monthlyData")?.as_object()?;

        let points: Vec<(&'static str, Option<f64>)> = MONTHS
            .iter()
            .filter(|m| monthly.contains_key(**m))
            .map(|m| (*m, monthly.get(*m).and_then(Value::as_f64)))
            .collect();

        Some(Self {
            kpi: kpi.to_string(),
            unit: value
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind: ChartKind::parse(value.get("chartType").and_then(Value::as_str)),
            points,
        })
    }

    pub fn has_data(&self) -> bool {
        self.points.iter().any(|(_, v)| v.is_some())
    }
}

/// One supplier's position in a KPI ranking
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub supplier: String,
    pub score: f64,
    pub average: f64,
    pub trend: String,
}

/// Aggregate analytics payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardAnalytics {
    data: Value,
    total_suppliers: u64,
    total_kpis: u64,
}

impl DashboardAnalytics {
    /// Build from the `GET /dashboard` body.
    ///
    /// The backend wraps analytics in `{message, data, totalSuppliers,
    /// totalKPIs}`; an unwrapped analytics object is accepted as well.
    pub fn from_response(body: Value) -> Self {
        let envelope_total = |key: &str| body.get(key).and_then(Value::as_u64);
        let total_suppliers = envelope_total("totalSuppliers");
        let total_kpis = envelope_total("totalKPIs");

        let data = match body.get("data").filter(|d| d.is_object()).cloned() {
            Some(inner) => inner,
            None => body,
        };

        let metadata_total = |key: &str| {
            data.get("metadata")
                .and_then(|m| m.get(key))
                .and_then(Value::as_u64)
        };

        Self {
            total_suppliers: total_suppliers
                .or_else(|| metadata_total("totalSuppliers"))
                .unwrap_or(0),
            total_kpis: total_kpis.or_else(|| metadata_total("totalKPIs")).unwrap_or(0),
            data,
        }
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }

    pub fn total_suppliers(&self) -> u64 {
        self.total_suppliers
    }

    pub fn total_kpis(&self) -> u64 {
        self.total_kpis
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.data.get(key).and_then(Value::as_object)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.section("metadata")
    }

    pub fn summary(&self) -> Option<&Map<String, Value>> {
        self.section("summary")
    }

    pub fn operational_insights(&self) -> Option<&Map<String, Value>> {
        self.section("operationalInsights")
    }

    pub fn suppliers(&self) -> Vec<String> {
        string_list(self.data.get("suppliers"))
    }

    pub fn kpi_names(&self) -> Vec<String> {
        string_list(self.data.get("kpiNames"))
    }

    pub fn has_time_series(&self) -> bool {
        self.section("timeSeries").is_some_and(|ts| !ts.is_empty())
    }

    /// Time series per KPI, in the backend's KPI order
    pub fn time_series(&self) -> Vec<KpiSeries> {
        self.section("timeSeries")
            .map(|ts| {
                ts.iter()
                    .filter_map(|(kpi, v)| KpiSeries::from_value(kpi, v))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ranking for one KPI, in the backend's rank order
    pub fn ranking(&self, kpi: &str) -> Vec<RankingEntry> {
        let Some(entries) = self
            .section("rankings")
            .and_then(|r| r.get(kpi))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|e| {
                Some(RankingEntry {
                    supplier: e.get("supplier")?.as_str()?.to_string(),
                    score: e.get("score")?.as_f64()?,
                    average: e.get("average").and_then(Value::as_f64).unwrap_or_default(),
                    trend: e
                        .get("trend")
                        .and_then(Value::as_str)
                        .unwrap_or("stable")
                        .to_string(),
                })
            })
            .collect()
    }

    /// KPIs that have a ranking, in the backend's order
    pub fn ranked_kpis(&self) -> Vec<String> {
        self.section("rankings")
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn performance_matrix(&self) -> Option<&Map<String, Value>> {
        self.section("performanceMatrix")
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Turn a camelCase KPI key into a display label
pub fn kpi_label(kpi: &str) -> String {
    let mut label = String::with_capacity(kpi.len() + 4);
    let mut prev: Option<char> = None;
    for c in kpi.chars() {
        match prev {
            None => label.extend(c.to_uppercase()),
            Some(p) if c.is_uppercase() && p.is_lowercase() => {
                label.push(' ');
                label.push(c);
            }
            _ => label.push(c),
        }
        prev = Some(c);
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "message": "Dashboard analytics generated successfully",
            "data": {
                "metadata": {"totalSuppliers": 2, "totalKPIs": 2},
                "summary": {"totalSuppliers": 2, "kpiCategories": 2},
                "timeSeries": {
                    "okDeliveryPercent": {
                        "monthlyData": {"Jan": 91.5, "Feb": null, "Mar": 94.0},
                        "unit": "%",
                        "chartType": "line"
                    },
                    "trips": {
                        "monthlyData": {"Jan": 10, "Feb": 12},
                        "unit": "count",
                        "chartType": "bar"
                    }
                },
                "rankings": {
                    "trips": [
                        {"supplier": "Beta", "score": 22, "average": 11, "trend": "increasing"},
                        {"supplier": "Acme", "score": 9, "average": 4.5}
                    ]
                },
                "suppliers": ["Acme", "Beta"],
                "kpiNames": ["okDeliveryPercent", "trips"]
            },
            "totalSuppliers": 2,
            "totalKPIs": 2
        })
    }

    #[test]
    fn test_envelope_unwrapped() {
        let analytics = DashboardAnalytics::from_response(sample());
        assert_eq!(analytics.total_suppliers(), 2);
        assert_eq!(analytics.total_kpis(), 2);
        assert_eq!(analytics.suppliers(), vec!["Acme", "Beta"]);
        assert!(analytics.summary().is_some());
    }

    #[test]
    fn test_totals_from_metadata() {
        let analytics = DashboardAnalytics::from_response(json!({
            "metadata": {"totalSuppliers": 5, "totalKPIs": 9}
        }));
        assert_eq!(analytics.total_suppliers(), 5);
        assert_eq!(analytics.total_kpis(), 9);
    }

    #[test]
    fn test_time_series_in_calendar_order() {
        let analytics = DashboardAnalytics::from_response(sample());
        let series = analytics.time_series();
        assert_eq!(series.len(), 2);

        let delivery = &series[0];
        assert_eq!(delivery.kpi, "okDeliveryPercent");
        assert_eq!(delivery.kind, ChartKind::Line);
        assert_eq!(
            delivery.points,
            vec![("Jan", Some(91.5)), ("Feb", None), ("Mar", Some(94.0))]
        );
        assert_eq!(series[1].kind, ChartKind::Bar);
    }

    #[test]
    fn test_ranking() {
        let analytics = DashboardAnalytics::from_response(sample());
        let ranking = analytics.ranking("trips");
        assert_eq!(ranking[0].supplier, "Beta");
        assert_eq!(ranking[1].trend, "stable");
        assert!(analytics.ranking("accidents").is_empty());
        assert_eq!(analytics.ranked_kpis(), vec!["trips"]);
    }

    #[test]
    fn test_missing_sections_do_not_panic() {
        let analytics = DashboardAnalytics::from_response(json!({"data": {}}));
        assert!(!analytics.has_time_series());
        assert!(analytics.time_series().is_empty());
        assert!(analytics.suppliers().is_empty());
        assert!(analytics.performance_matrix().is_none());
        assert_eq!(analytics.total_suppliers(), 0);
    }

    #[test]
    fn test_kpi_label() {
        assert_eq!(kpi_label("okDeliveryPercent"), "Ok Delivery Percent");
        assert_eq!(kpi_label("trips"), "Trips");
        assert_eq!(kpi_label("vehicleTAT"), "Vehicle TAT");
    }
}
