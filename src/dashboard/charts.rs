//! Chart Option Builders
//!
//! Maps analytics payloads and query rows into ECharts option objects.
//! Builders return plain JSON; rendering is the caller's business.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::analytics::{kpi_label, ChartKind, KpiSeries, RankingEntry, MONTHS};

/// Line or bar chart of a KPI's monthly aggregate.
///
/// Months without data are emitted as `null` so the chart shows a gap.
pub fn time_series_option(series: &KpiSeries) -> Value {
    let labels: Vec<&str> = series.points.iter().map(|(m, _)| *m).collect();
    let values: Vec<Value> = series
        .points
        .iter()
        .map(|(_, v)| v.map(|v| json!(round4(v))).unwrap_or(Value::Null))
        .collect();

    let mut line = json!({
        "name": kpi_label(&series.kpi),
        "type": series.kind.as_str(),
        "data": values,
    });
    if series.kind == ChartKind::Line {
        line["smooth"] = json!(true);
        line["connectNulls"] = json!(false);
    }

    json!({
        "title": {"text": kpi_label(&series.kpi)},
        "tooltip": {"trigger": "axis"},
        "xAxis": {"type": "category", "data": labels},
        "yAxis": {"type": "value", "name": series.unit},
        "series": [line],
    })
}

/// Horizontal bar chart of a KPI ranking, best-ranked supplier on top
pub fn ranking_option(kpi: &str, entries: &[RankingEntry]) -> Value {
    let suppliers: Vec<&str> = entries.iter().map(|e| e.supplier.as_str()).collect();
    let scores: Vec<f64> = entries.iter().map(|e| round4(e.score)).collect();

    json!({
        "title": {"text": format!("{} ranking", kpi_label(kpi))},
        "tooltip": {"trigger": "axis", "axisPointer": {"type": "shadow"}},
        "xAxis": {"type": "value"},
        "yAxis": {"type": "category", "data": suppliers, "inverse": true},
        "series": [{"type": "bar", "data": scores}],
    })
}

/// Supplier x KPI heatmap from the `performanceMatrix` section.
///
/// Each KPI column is scaled to 0-100 on its own, inverted for
/// `lower_better` KPIs, so colors compare suppliers rather than units.
/// Cells are `[kpi_index, supplier_index, score, raw_value]`; empty cells are
/// left out. Returns `None` when the section has no usable cells.
pub fn performance_matrix_option(matrix: &Map<String, Value>) -> Option<Value> {
    let rows = matrix.get("matrixData")?.as_array()?;
    let kpis: Vec<&str> = matrix
        .get("kpiNames")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    let types = matrix.get("performanceTypes").and_then(Value::as_object);

    let suppliers: Vec<&str> = rows
        .iter()
        .filter_map(|r| r.get("supplier").and_then(Value::as_str))
        .collect();

    let mut cells = Vec::new();
    for (x, kpi) in kpis.iter().enumerate() {
        let column: Vec<(usize, f64)> = rows
            .iter()
            .filter(|r| r.get("supplier").and_then(Value::as_str).is_some())
            .enumerate()
            .filter_map(|(y, r)| r.get(*kpi).and_then(Value::as_f64).map(|v| (y, v)))
            .collect();
        if column.is_empty() {
            continue;
        }

        let min = column.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = column.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        let lower_better = types
            .and_then(|t| t.get(*kpi))
            .and_then(Value::as_str)
            == Some("lower_better");

        for (y, raw) in column {
            let scaled = if max > min {
                (raw - min) / (max - min) * 100.0
            } else {
                100.0
            };
            let score = if lower_better { 100.0 - scaled } else { scaled };
            cells.push(json!([x, y, (score * 10.0).round() / 10.0, round4(raw)]));
        }
    }

    if cells.is_empty() {
        return None;
    }

    let labels: Vec<String> = kpis.iter().map(|k| kpi_label(k)).collect();
    Some(json!({
        "title": {"text": "Supplier performance matrix"},
        "tooltip": {"position": "top"},
        "xAxis": {"type": "category", "data": labels, "splitArea": {"show": true}},
        "yAxis": {"type": "category", "data": suppliers, "splitArea": {"show": true}},
        "visualMap": {
            "min": 0,
            "max": 100,
            "calculable": true,
            "orient": "horizontal",
            "left": "center",
        },
        "series": [{"type": "heatmap", "data": cells, "label": {"show": false}}],
    }))
}

/// Basic chart from tabular query rows.
///
/// With a `month` column and a numeric column: a smooth line chart of the
/// first other numeric column summed per month, in calendar order. Otherwise: a bar
/// chart of the first numeric column summed per category, in first-seen
/// order. Returns an empty object when neither shape fits.
pub fn chart_from_rows(rows: &[Value], question: &str) -> Value {
    let Some(first) = rows
        .iter()
        .filter_map(Value::as_object)
        .find(|r| !r.is_empty())
    else {
        return json!({});
    };
    let keys: Vec<&String> = first.keys().collect();

    let mut numeric_keys = Vec::new();
    let mut categorical_keys = Vec::new();
    for key in &keys {
        let sample = rows
            .iter()
            .filter_map(|r| r.get(key.as_str()))
            .find(|v| !v.is_null());
        if sample.is_some_and(Value::is_number) {
            numeric_keys.push(key.as_str());
        } else {
            categorical_keys.push(key.as_str());
        }
    }

    let month_key = keys
        .iter()
        .find(|k| k.eq_ignore_ascii_case("month"))
        .map(|k| k.as_str());

    // A numeric month column is an axis, not a measure
    let Some(y_key) = numeric_keys
        .iter()
        .copied()
        .find(|k| Some(*k) != month_key)
    else {
        return json!({});
    };

    if let Some(month_key) = month_key {
        let mut by_month: [Option<f64>; 12] = [None; 12];
        for row in rows {
            let (Some(m), Some(v)) = (
                row.get(month_key).and_then(month_index),
                row.get(y_key).and_then(Value::as_f64),
            ) else {
                continue;
            };
            *by_month[m].get_or_insert(0.0) += v;
        }

        let (labels, data): (Vec<&str>, Vec<f64>) = by_month
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (MONTHS[i], round4(v))))
            .unzip();

        if !data.is_empty() {
            return json!({
                "title": {"text": title_or(question, "Trend by Month")},
                "tooltip": {"trigger": "axis"},
                "xAxis": {"type": "category", "data": labels},
                "yAxis": {"type": "value"},
                "series": [{"type": "line", "data": data, "smooth": true}],
            });
        }
    }

    if categorical_keys.is_empty() {
        return json!({});
    }

    const PREFERRED: [&str; 3] = ["supplier_name", "kpi_name", "year"];
    let x_key = PREFERRED
        .iter()
        .find_map(|pref| {
            categorical_keys
                .iter()
                .find(|k| k.eq_ignore_ascii_case(pref))
                .copied()
        })
        .unwrap_or(categorical_keys[0]);

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in rows {
        let (Some(x), Some(y)) = (
            row.get(x_key).filter(|v| !v.is_null()),
            row.get(y_key).and_then(Value::as_f64),
        ) else {
            continue;
        };
        let label = match x {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !totals.contains_key(&label) {
            order.push(label.clone());
        }
        *totals.entry(label).or_insert(0.0) += y;
    }

    if order.is_empty() {
        return json!({});
    }

    let data: Vec<f64> = order.iter().map(|k| round4(totals[k])).collect();
    json!({
        "title": {"text": title_or(question, "Summary")},
        "tooltip": {"trigger": "item"},
        "xAxis": {"type": "category", "data": order},
        "yAxis": {"type": "value"},
        "series": [{"type": "bar", "data": data}],
    })
}

/// Zero-based month index from a number (1-12) or a month name
fn month_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => {
            let m = n.as_f64()? as i64;
            (1..=12).contains(&m).then(|| (m - 1) as usize)
        }
        Value::String(s) => {
            let prefix: String = s.trim().chars().take(3).collect();
            MONTHS.iter().position(|m| m.eq_ignore_ascii_case(&prefix))
        }
        _ => None,
    }
}

fn title_or(question: &str, fallback: &str) -> String {
    if question.trim().is_empty() {
        fallback.to_string()
    } else {
        question.to_string()
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_line_with_gap() {
        let series = KpiSeries {
            kpi: "okDeliveryPercent".to_string(),
            unit: "%".to_string(),
            kind: ChartKind::Line,
            points: vec![("Jan", Some(91.5)), ("Feb", None)],
        };
        let option = time_series_option(&series);
        assert_eq!(option["xAxis"]["data"], json!(["Jan", "Feb"]));
        assert_eq!(option["series"][0]["data"], json!([91.5, null]));
        assert_eq!(option["series"][0]["type"], "line");
        assert_eq!(option["yAxis"]["name"], "%");
    }

    #[test]
    fn test_ranking_option() {
        let entries = vec![
            RankingEntry {
                supplier: "Beta".to_string(),
                score: 22.0,
                average: 11.0,
                trend: "stable".to_string(),
            },
            RankingEntry {
                supplier: "Acme".to_string(),
                score: 9.0,
                average: 4.5,
                trend: "stable".to_string(),
            },
        ];
        let option = ranking_option("trips", &entries);
        assert_eq!(option["yAxis"]["data"], json!(["Beta", "Acme"]));
        assert_eq!(option["series"][0]["data"], json!([22.0, 9.0]));
    }

    #[test]
    fn test_matrix_scaling_and_inversion() {
        let matrix = json!({
            "matrixData": [
                {"supplier": "Acme", "accidents": 0, "trips": 10},
                {"supplier": "Beta", "accidents": 4, "trips": null}
            ],
            "kpiNames": ["accidents", "trips"],
            "performanceTypes": {"accidents": "lower_better", "trips": "neutral"}
        });
        let option = performance_matrix_option(matrix.as_object().unwrap()).unwrap();
        let cells = option["series"][0]["data"].as_array().unwrap();

        assert_eq!(cells.len(), 3);
        // Acme has the fewest accidents, so the best score
        assert_eq!(cells[0], json!([0, 0, 100.0, 0.0]));
        assert_eq!(cells[1], json!([0, 1, 0.0, 4.0]));
        assert_eq!(cells[2], json!([1, 0, 100.0, 10.0]));
        assert_eq!(option["yAxis"]["data"], json!(["Acme", "Beta"]));
    }

    #[test]
    fn test_matrix_without_cells() {
        let matrix = json!({"matrixData": [], "kpiNames": ["trips"]});
        assert!(performance_matrix_option(matrix.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_rows_month_line_chart() {
        let rows = vec![
            json!({"month": 3, "trips": 5}),
            json!({"month": "January", "trips": 2.5}),
            json!({"month": 1.0, "trips": 1}),
            json!({"month": 13, "trips": 100}),
        ];
        let option = chart_from_rows(&rows, "Trips by month");
        assert_eq!(option["series"][0]["type"], "line");
        assert_eq!(option["xAxis"]["data"], json!(["Jan", "Mar"]));
        assert_eq!(option["series"][0]["data"], json!([3.5, 5.0]));
        assert_eq!(option["title"]["text"], "Trips by month");
    }

    #[test]
    fn test_rows_bar_chart_prefers_supplier() {
        let rows = vec![
            json!({"kpi_name": "trips", "supplier_name": "Beta", "value": 1.23456}),
            json!({"kpi_name": "trips", "supplier_name": "Acme", "value": 2}),
            json!({"kpi_name": "trips", "supplier_name": "Beta", "value": 1}),
        ];
        let option = chart_from_rows(&rows, "");
        assert_eq!(option["series"][0]["type"], "bar");
        assert_eq!(option["xAxis"]["data"], json!(["Beta", "Acme"]));
        assert_eq!(option["series"][0]["data"], json!([2.2346, 2.0]));
        assert_eq!(option["title"]["text"], "Summary");
    }

    #[test]
    fn test_rows_without_numbers() {
        let rows = vec![json!({"supplier_name": "Acme"})];
        assert_eq!(chart_from_rows(&rows, "q"), json!({}));
        assert_eq!(chart_from_rows(&[], "q"), json!({}));
        assert_eq!(chart_from_rows(&[json!("not a row")], "q"), json!({}));
    }
}
