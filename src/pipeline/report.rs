//! Report stage: comparison table, bar chart and markdown rendering
//!
//! The chart is written before any narrative is requested, so a failing
//! text-generation service can never cost the operator the chart.

use super::compare::compare;
use super::StageOutcome;
use crate::data::artifacts::{write_atomically, ArtifactStore, Layer};
use crate::data::codec;
use crate::error::{FxError, Result};
use crate::types::{AggregatedSnapshot, ComparisonRow, BASE_CURRENCY, COLLECTED_DATE, DATE_FORMAT};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const CHART_WIDTH: f64 = 1000.0;
const CHART_HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 160.0;
const RISE_COLOR: &str = "#2ca02c";
const FALL_COLOR: &str = "#d62728";

/// What the report could be built from
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBody {
    /// Today compared with yesterday
    DayOverDay(Vec<ComparisonRow>),
    /// Only today's snapshot was available
    SingleDay(AggregatedSnapshot),
}

impl ReportBody {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ReportBody::SingleDay(_))
    }

    pub fn base_currency(&self) -> Option<&str> {
        match self {
            ReportBody::DayOverDay(rows) => rows.first().map(|r| r.base_currency.as_str()),
            ReportBody::SingleDay(snapshot) => {
                snapshot.rows.first().map(|r| r.base_currency.as_str())
            }
        }
    }
}

/// One bar of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Output of the report stage
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub date: NaiveDate,
    pub body: ReportBody,
    pub chart_path: PathBuf,
    /// Non-fatal problems met while building the report
    pub warnings: Vec<String>,
}

impl ComparisonReport {
    pub fn base_currency(&self) -> &str {
        self.body.base_currency().unwrap_or("?")
    }
}

/// Bars to draw: finite percentage changes, or today's values for a single-day report
pub fn chart_points(body: &ReportBody) -> Vec<ChartPoint> {
    match body {
        ReportBody::DayOverDay(rows) => rows
            .first()
            .map(|row| {
                row.entries
                    .iter()
                    .filter_map(|e| {
                        e.finite_change().map(|value| ChartPoint {
                            label: e.change_column(),
                            value,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        ReportBody::SingleDay(snapshot) => snapshot
            .rows
            .first()
            .map(|row| {
                snapshot
                    .columns
                    .iter()
                    .filter_map(|c| {
                        row.get(c).filter(|v| v.is_finite()).map(|value| ChartPoint {
                            label: c.clone(),
                            value,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

pub fn chart_title(body: &ReportBody) -> String {
    let base = body.base_currency().unwrap_or("?");
    match body {
        ReportBody::DayOverDay(_) => {
            format!("Exchange rate change (base {}): today vs yesterday", base)
        }
        ReportBody::SingleDay(_) => format!("Exchange rates (base {}): today only", base),
    }
}

fn y_label(body: &ReportBody) -> &'static str {
    match body {
        ReportBody::DayOverDay(_) => "Change %",
        ReportBody::SingleDay(_) => "Rate",
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render a bar chart as a standalone SVG document
pub fn render_svg(title: &str, y_label: &str, points: &[ChartPoint]) -> String {
    let plot_w = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let min = points.iter().map(|p| p.value).fold(0.0_f64, f64::min);
    let span = if max - min > 0.0 { max - min } else { 1.0 };
    let y_of = |v: f64| MARGIN_TOP + (max - v) / span * plot_h;
    let zero_y = y_of(0.0);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"##,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        svg,
        r##"<text x="{x}" y="32" font-size="18" text-anchor="middle">{t}</text>"##,
        x = CHART_WIDTH / 2.0,
        t = escape_xml(title)
    );
    let _ = writeln!(
        svg,
        r##"<text x="24" y="{y}" font-size="13" text-anchor="middle" transform="rotate(-90 24 {y})">{l}</text>"##,
        y = MARGIN_TOP + plot_h / 2.0,
        l = escape_xml(y_label)
    );

    if points.is_empty() {
        let _ = writeln!(
            svg,
            r##"<text x="{x}" y="{y}" font-size="14" text-anchor="middle">No data to plot</text>"##,
            x = CHART_WIDTH / 2.0,
            y = MARGIN_TOP + plot_h / 2.0
        );
    }

    let slot = plot_w / points.len().max(1) as f64;
    let bar_w = slot * 0.6;
    for (i, point) in points.iter().enumerate() {
        let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_w) / 2.0;
        let top = y_of(point.value).min(zero_y);
        let height = (y_of(point.value) - zero_y).abs();
        let color = if point.value >= 0.0 { RISE_COLOR } else { FALL_COLOR };
        let label_x = x + bar_w / 2.0;
        let label_y = MARGIN_TOP + plot_h + 16.0;

        let _ = writeln!(
            svg,
            r##"<rect x="{x:.2}" y="{top:.2}" width="{bar_w:.2}" height="{height:.2}" fill="{color}"><title>{label}: {value:.4}</title></rect>"##,
            label = escape_xml(&point.label),
            value = point.value
        );
        let _ = writeln!(
            svg,
            r##"<text x="{label_x:.2}" y="{label_y:.2}" font-size="12" text-anchor="end" transform="rotate(-45 {label_x:.2} {label_y:.2})">{label}</text>"##,
            label = escape_xml(&point.label)
        );
    }

    let _ = writeln!(
        svg,
        r##"<line x1="{x1}" y1="{y:.2}" x2="{x2}" y2="{y:.2}" stroke="#333333" stroke-width="1"/>"##,
        x1 = MARGIN_LEFT,
        x2 = CHART_WIDTH - MARGIN_RIGHT,
        y = zero_y
    );
    svg.push_str("</svg>\n");
    svg
}

/// `exchange_report_YYYYMMDD.svg`
pub fn chart_file_name(date: NaiveDate) -> String {
    format!("exchange_report_{}.svg", date.format("%Y%m%d"))
}

/// Write the chart into `dir` as `exchange_report_YYYYMMDD.svg`, replacing any earlier one
pub fn write_chart(dir: &Path, date: NaiveDate, svg: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(chart_file_name(date));
    write_atomically(dir, &path, svg.as_bytes())?;
    Ok(path)
}

fn fmt_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.6}", v),
        _ => "n/a".to_string(),
    }
}

fn markdown_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn markdown_table_from(header: Vec<String>, rows: Vec<Vec<String>>) -> String {
    let mut out = String::new();
    out.push_str(&markdown_row(&header));
    out.push('\n');
    out.push_str(&markdown_row(&vec!["---".to_string(); header.len()]));
    out.push('\n');
    for row in rows {
        out.push_str(&markdown_row(&row));
        out.push('\n');
    }
    out
}

/// Gold snapshot as a markdown table
pub fn snapshot_markdown(snapshot: &AggregatedSnapshot) -> String {
    let header = snapshot.output_columns();
    let rows = snapshot
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.collected_date.format(DATE_FORMAT).to_string(),
                row.base_currency.clone(),
            ];
            cells.extend(snapshot.columns.iter().map(|c| fmt_cell(row.get(c))));
            cells
        })
        .collect();
    markdown_table_from(header, rows)
}

/// Report body as a markdown table; each rate column is followed by its change
pub fn markdown_table(body: &ReportBody) -> String {
    let rows = match body {
        ReportBody::SingleDay(snapshot) => return snapshot_markdown(snapshot),
        ReportBody::DayOverDay(rows) => rows,
    };

    let mut header = vec![COLLECTED_DATE.to_string(), BASE_CURRENCY.to_string()];
    if let Some(first) = rows.first() {
        for entry in &first.entries {
            header.push(entry.change_column());
            header.push(entry.column.clone());
        }
    }

    let cells = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.collected_date.format(DATE_FORMAT).to_string(),
                row.base_currency.clone(),
            ];
            for entry in &row.entries {
                cells.push(fmt_cell(entry.change_pct));
                cells.push(fmt_cell(Some(entry.today)));
            }
            cells
        })
        .collect();

    markdown_table_from(header, cells)
}

fn load_gold<S: ArtifactStore>(store: &S, date: NaiveDate) -> Result<Option<AggregatedSnapshot>> {
    let key = date.format(DATE_FORMAT).to_string();
    match store.get(Layer::Gold, &key)? {
        Some(bytes) => Ok(Some(codec::decode_gold(bytes)?)),
        None => Ok(None),
    }
}

/// Compare today's gold snapshot with yesterday's and write the chart
pub fn run_report<S: ArtifactStore>(
    store: &S,
    report_dir: &Path,
    date: NaiveDate,
) -> Result<StageOutcome<ComparisonReport>> {
    let today = match load_gold(store, date)? {
        Some(snapshot) => snapshot,
        None => return Ok(StageOutcome::missing(Layer::Gold)),
    };
    let yesterday = match date.pred_opt() {
        Some(prev) => load_gold(store, prev)?,
        None => None,
    };

    let mut warnings = Vec::new();
    let body = match compare(date, &today, yesterday.as_ref()) {
        Ok(rows) => {
            log::info!("Compared {} against the previous day", date);
            ReportBody::DayOverDay(rows)
        }
        Err(e @ FxError::ComparisonUnavailable { .. }) => {
            log::warn!("{}; rendering today's data only", e);
            warnings.push(e.to_string());
            ReportBody::SingleDay(today)
        }
        Err(e) => return Err(e),
    };

    let points = chart_points(&body);
    let svg = render_svg(&chart_title(&body), y_label(&body), &points);
    let chart_path = write_chart(report_dir, date, &svg)?;
    log::info!("Chart with {} bars saved to {}", points.len(), chart_path.display());

    Ok(StageOutcome::Completed(ComparisonReport {
        date,
        body,
        chart_path,
        warnings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryArtifactStore;
    use crate::types::{ChangeEntry, SnapshotRow};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
    }

    fn snapshot(date: NaiveDate, usd: f64) -> AggregatedSnapshot {
        let mut values = BTreeMap::new();
        values.insert("BRL_to_USD".to_string(), usd);
        AggregatedSnapshot {
            columns: vec!["BRL_to_USD".to_string()],
            rows: vec![SnapshotRow {
                collected_date: date,
                base_currency: "BRL".to_string(),
                values,
            }],
        }
    }

    fn put_gold(store: &InMemoryArtifactStore, snapshot: &AggregatedSnapshot) {
        let key = snapshot.rows[0].collected_date.format(DATE_FORMAT).to_string();
        store
            .put(Layer::Gold, &key, &codec::encode_gold(snapshot).unwrap())
            .unwrap();
    }

    #[test]
    fn test_chart_excludes_missing_changes() {
        let body = ReportBody::DayOverDay(vec![ComparisonRow {
            collected_date: today(),
            base_currency: "BRL".to_string(),
            entries: vec![
                ChangeEntry {
                    column: "BRL_to_USD".to_string(),
                    today: 0.19,
                    change_pct: Some(1.5),
                },
                ChangeEntry {
                    column: "BRL_to_EUR".to_string(),
                    today: 0.16,
                    change_pct: None,
                },
                ChangeEntry {
                    column: "USD_to_EUR".to_string(),
                    today: 0.85,
                    change_pct: Some(f64::INFINITY),
                },
            ],
        }]);

        let points = chart_points(&body);
        assert_eq!(
            points,
            vec![ChartPoint {
                label: "BRL_to_USD_CHANGE_PCT".to_string(),
                value: 1.5
            }]
        );
    }

    #[test]
    fn test_svg_colors_by_sign() {
        let points = vec![
            ChartPoint {
                label: "UP".to_string(),
                value: 2.0,
            },
            ChartPoint {
                label: "DOWN".to_string(),
                value: -1.0,
            },
        ];
        let svg = render_svg("A & B", "Change %", &points);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(RISE_COLOR));
        assert!(svg.contains(FALL_COLOR));
        assert!(svg.contains("A &amp; B"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_markdown_table_layout() {
        let body = ReportBody::DayOverDay(vec![ComparisonRow {
            collected_date: today(),
            base_currency: "BRL".to_string(),
            entries: vec![ChangeEntry {
                column: "BRL_to_USD".to_string(),
                today: 5.0,
                change_pct: Some(25.0),
            }],
        }]);
        let table = markdown_table(&body);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[0],
            "| collected_date | base_currency | BRL_to_USD_CHANGE_PCT | BRL_to_USD |"
        );
        assert_eq!(lines[1], "| --- | --- | --- | --- |");
        assert_eq!(lines[2], "| 2025-09-30 | BRL | 25.000000 | 5.000000 |");
    }

    #[test]
    fn test_chart_file_name() {
        assert_eq!(chart_file_name(today()), "exchange_report_20250930.svg");
    }

    #[test]
    fn test_write_chart_replaces_earlier_chart() {
        let dir = TempDir::new().unwrap();
        let charts = dir.path().join("reports");

        let first = write_chart(&charts, today(), "<svg>old</svg>").unwrap();
        let second = write_chart(&charts, today(), "<svg>new</svg>").unwrap();

        assert_eq!(first, second);
        assert_eq!(first, charts.join("exchange_report_20250930.svg"));
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "<svg>new</svg>");
        assert_eq!(std::fs::read_dir(&charts).unwrap().count(), 1);
    }

    #[test]
    fn test_run_report_day_over_day() {
        let store = InMemoryArtifactStore::new();
        put_gold(&store, &snapshot(today(), 5.0));
        put_gold(&store, &snapshot(today().pred_opt().unwrap(), 4.0));
        let dir = TempDir::new().unwrap();

        let report = run_report(&store, dir.path(), today())
            .unwrap()
            .completed()
            .unwrap();

        assert!(!report.body.is_degraded());
        assert!(report.warnings.is_empty());
        assert!(report.chart_path.exists());
        match &report.body {
            ReportBody::DayOverDay(rows) => {
                assert_eq!(rows[0].value("BRL_to_USD_CHANGE_PCT"), Some(25.0))
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_run_report_single_day() {
        let store = InMemoryArtifactStore::new();
        put_gold(&store, &snapshot(today(), 5.0));
        let dir = TempDir::new().unwrap();

        let report = run_report(&store, dir.path(), today())
            .unwrap()
            .completed()
            .unwrap();

        assert!(report.body.is_degraded());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(chart_points(&report.body).len(), 1);
        assert!(dir.path().join("exchange_report_20250930.svg").exists());
    }

    #[test]
    fn test_run_report_without_today_is_skipped() {
        let store = InMemoryArtifactStore::new();
        put_gold(&store, &snapshot(today().pred_opt().unwrap(), 4.0));
        let dir = TempDir::new().unwrap();

        let outcome = run_report(&store, dir.path(), today()).unwrap();
        assert!(outcome.is_skipped());
        assert!(!dir.path().join("exchange_report_20250930.svg").exists());
    }
}
