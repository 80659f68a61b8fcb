//! Flat-record export and import for spreadsheet collaborators.
//!
//! A record is a `serde_json::Map` of column name to primitive value. Export
//! writes one record per line item plus a `TOTAL` row; import matches records
//! to line items by (department, category) and merges all-or-nothing.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Map, Value};

use crate::error::{PlanError, PlanResult};
use crate::config::Config;
use crate::logging::{log, log_import, log_import_rejected, obj, v_str, Domain, Level};
use crate::model::{LineItem, Scenario};
use crate::store::{reseed, ScenarioStore};
use crate::totals::TotalsCalculator;

pub type Record = Map<String, Value>;

pub const COL_DEPARTMENT: &str = "Department";
pub const COL_CATEGORY: &str = "Category";
pub const COL_SCENARIO: &str = "Scenario";
pub const COL_BASELINE: &str = "Baseline";
pub const COL_ACTUAL: &str = "Actual";
pub const COL_THRESHOLD: &str = "Threshold %";
pub const COL_DRIVER: &str = "Driver %";
pub const COL_SUGGESTED: &str = "Suggested";
pub const COL_ADJUSTED: &str = "Adjusted";
pub const COL_VARIANCE: &str = "Variance";
pub const COL_VARIANCE_PCT: &str = "Variance %";
pub const COL_ALERT: &str = "Alert";
pub const COL_JUSTIFICATION: &str = "Justification";

/// Export column order.
pub const EXPORT_COLUMNS: [&str; 13] = [
    COL_DEPARTMENT,
    COL_CATEGORY,
    COL_SCENARIO,
    COL_BASELINE,
    COL_ACTUAL,
    COL_THRESHOLD,
    COL_DRIVER,
    COL_SUGGESTED,
    COL_ADJUSTED,
    COL_VARIANCE,
    COL_VARIANCE_PCT,
    COL_ALERT,
    COL_JUSTIFICATION,
];

/// Department cell marking the totals row. The row also has a blank category.
pub const TOTAL_ROW: &str = "TOTAL";

// =============================================================================
// Export
// =============================================================================

pub fn export_rows(items: &[LineItem], scenario: Scenario, calc: &TotalsCalculator) -> Vec<Record> {
    let mut rows: Vec<Record> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let value = item.value(scenario);
            let report = calc.analyze_line(i, item, scenario);
            obj(&[
                (COL_DEPARTMENT, v_str(&item.department)),
                (COL_CATEGORY, v_str(&item.category)),
                (COL_SCENARIO, v_str(scenario.label())),
                (COL_BASELINE, json!(item.baseline)),
                (COL_ACTUAL, json!(item.actual)),
                (COL_THRESHOLD, json!(report.threshold)),
                (COL_DRIVER, json!(value.driver_pct)),
                (COL_SUGGESTED, json!(value.suggested)),
                (COL_ADJUSTED, json!(value.adjusted)),
                (COL_VARIANCE, json!(report.variance)),
                (COL_VARIANCE_PCT, json!(report.variance_pct)),
                (COL_ALERT, v_str(report.tier.as_str())),
                (COL_JUSTIFICATION, v_str(&value.justification)),
            ])
        })
        .collect();

    let totals = calc.compute(items, scenario);
    rows.push(obj(&[
        (COL_DEPARTMENT, v_str(TOTAL_ROW)),
        (COL_CATEGORY, v_str("")),
        (COL_SCENARIO, v_str(scenario.label())),
        (COL_BASELINE, json!(totals.budgeted)),
        (COL_ACTUAL, json!(totals.actual)),
        (COL_THRESHOLD, Value::Null),
        (COL_DRIVER, json!(totals.weighted_driver)),
        (COL_SUGGESTED, json!(totals.suggested)),
        (COL_ADJUSTED, json!(totals.adjusted)),
        (COL_VARIANCE, json!(totals.variance)),
        (COL_VARIANCE_PCT, json!(totals.variance_pct)),
        (COL_ALERT, json!(totals.tiers.flagged())),
        (COL_JUSTIFICATION, v_str("")),
    ]));

    log(
        Level::Debug,
        Domain::Export,
        "export_rows",
        obj(&[
            ("scenario", v_str(scenario.as_str())),
            ("rows", json!(rows.len())),
        ]),
    );
    rows
}

/// Renders records as CSV in `columns` order. Missing cells are empty.
pub fn to_csv(records: &[Record], columns: &[&str]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| match record.get(*c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("failed to flush CSV buffer: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

// =============================================================================
// File readers (collaborator boundary)
// =============================================================================

/// Parses CSV text with a header row. Blank lines and `#` comments are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(|h| h.is_empty()) {
        bail!("missing header row");
    }
    reader
        .records()
        .enumerate()
        .map(|(i, row)| -> Result<Record> {
            let row = row.with_context(|| format!("CSV record {}", i + 1))?;
            let record: Record = header
                .iter()
                .zip(row.iter())
                .map(|(k, v)| (k.clone(), Value::String(v.to_string())))
                .collect();
            Ok(record)
        })
        .collect()
}

/// Parses a JSON array of flat objects.
pub fn parse_json(text: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(text).context("invalid JSON")?;
    let rows = value
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array of records"))?;
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row.as_object()
                .cloned()
                .ok_or_else(|| anyhow!("record {} is not an object", i + 1))
        })
        .collect()
}

/// Reads a `.csv` or `.json` file into records.
pub fn read_import_file(path: &Path) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("file could not be read: {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => parse_csv(&text),
        "json" => parse_json(&text),
        other => bail!("unsupported import format: {:?}", other),
    }
}

// =============================================================================
// Import
// =============================================================================

/// Outcome of a successful merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub merged: usize,
    /// Natural keys with no matching line item.
    pub unmatched: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Patch {
    index: usize,
    scenario: Scenario,
    actual: Option<f64>,
    driver_pct: Option<f64>,
    suggested: Option<f64>,
    adjusted: Option<f64>,
    justification: Option<String>,
}

/// Case-insensitive column lookup.
fn cell<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record
        .iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(column))
        .map(|(_, v)| v)
}

fn text_cell(record: &Record, column: &str) -> Option<String> {
    match cell(record, column)? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric cell; blank is `None`, unparseable text is an error.
fn number_cell(record: &Record, column: &str, row: usize) -> PlanResult<Option<f64>> {
    let malformed = |raw: &str| PlanError::MalformedRecord {
        row,
        reason: format!("{} is not a number: {:?}", column, raw),
    };
    match cell(record, column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| malformed(&n.to_string())),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            if cleaned.trim().is_empty() {
                return Ok(None);
            }
            match cleaned.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(malformed(s)),
            }
        }
        Some(other) => Err(malformed(&other.to_string())),
    }
}

/// Validates every record against `items` before anything is written.
fn plan_import(
    items: &[LineItem],
    records: &[Record],
    default: Scenario,
) -> PlanResult<(Vec<Patch>, ImportSummary)> {
    let mut patches = Vec::new();
    let mut summary = ImportSummary::default();
    for (i, record) in records.iter().enumerate() {
        let row = i + 1;
        let department = text_cell(record, COL_DEPARTMENT).filter(|s| !s.is_empty());
        let category = text_cell(record, COL_CATEGORY);
        if department.as_deref() == Some(TOTAL_ROW)
            && category.as_deref().map_or(true, str::is_empty)
        {
            continue;
        }
        let (department, category) = match (department, category) {
            (Some(d), Some(c)) => (d, c),
            _ => {
                return Err(PlanError::MalformedRecord {
                    row,
                    reason: format!("missing {} or {}", COL_DEPARTMENT, COL_CATEGORY),
                })
            }
        };
        let scenario = match text_cell(record, COL_SCENARIO).filter(|s| !s.is_empty()) {
            Some(name) => name.parse::<Scenario>().map_err(|_| PlanError::MalformedRecord {
                row,
                reason: format!("unknown scenario {:?}", name),
            })?,
            None => default,
        };
        let patch = Patch {
            index: 0,
            scenario,
            actual: number_cell(record, COL_ACTUAL, row)?,
            driver_pct: number_cell(record, COL_DRIVER, row)?,
            suggested: number_cell(record, COL_SUGGESTED, row)?,
            adjusted: number_cell(record, COL_ADJUSTED, row)?,
            justification: text_cell(record, COL_JUSTIFICATION),
        };
        match items.iter().position(|it| it.key() == (department.as_str(), category.as_str())) {
            Some(index) => {
                patches.push(Patch { index, ..patch });
                summary.merged += 1;
            }
            None => summary.unmatched.push((department, category)),
        }
    }
    Ok((patches, summary))
}

fn apply(item: &mut LineItem, patch: &Patch, config: &Config) {
    if let Some(actual) = patch.actual {
        item.actual = actual;
    }
    let baseline = item.baseline;
    let value = item.scenarios.entry(patch.scenario).or_default();
    if let Some(d) = patch.driver_pct {
        value.driver_pct = d;
        if patch.suggested.is_none() {
            reseed(value, baseline, config.multiplier(patch.scenario));
        }
    }
    if let Some(s) = patch.suggested {
        value.suggested = s;
    }
    if let Some(a) = patch.adjusted {
        value.adjusted = a;
    }
    if let Some(j) = &patch.justification {
        value.justification = j.clone();
    }
}

/// Scenarios a set of patches writes to, deduplicated and ordered.
fn patched_scenarios(patches: &[Patch]) -> Vec<&'static str> {
    let set: BTreeSet<Scenario> = patches.iter().map(|p| p.scenario).collect();
    set.into_iter().map(|sc| sc.as_str()).collect()
}

/// Merges `records` into the store under `scenario` (or each record's own
/// `Scenario` column). Nothing is written unless every record validates.
pub fn import_records(
    store: &mut ScenarioStore,
    records: &[Record],
    scenario: Scenario,
) -> PlanResult<ImportSummary> {
    let planned = plan_import(store.items(), records, scenario).and_then(|(patches, summary)| {
        match patches.iter().find(|p| !store.is_declared(p.scenario)) {
            Some(p) => Err(PlanError::UndeclaredScenario(p.scenario.as_str().to_string())),
            None => Ok((patches, summary)),
        }
    });
    let (patches, summary) = match planned {
        Ok(p) => p,
        Err(err) => {
            log_import_rejected(&err.to_string());
            return Err(err);
        }
    };

    let config = store.config().clone();
    let items = store.items_mut();
    for patch in &patches {
        apply(&mut items[patch.index], patch, &config);
    }
    if !patches.is_empty() {
        store.touch();
    }
    log_import(&patched_scenarios(&patches), summary.merged, summary.unmatched.len());
    Ok(summary)
}

/// Reads and merges a file. Any read, parse or validation failure is
/// reported as one error and leaves the store unchanged.
pub fn import_file(
    store: &mut ScenarioStore,
    path: &Path,
    scenario: Scenario,
) -> Result<ImportSummary> {
    let records = read_import_file(path).map_err(|err| {
        log_import_rejected(&format!("{:#}", err));
        err
    })?;
    Ok(import_records(store, &records, scenario)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::ScenarioValue;

    fn store() -> ScenarioStore {
        ScenarioStore::new(
            vec![
                LineItem::new("IT", "Software", 80_000.0)
                    .with_actual(82_000.0)
                    .with_threshold(5.0)
                    .with_scenario(Scenario::Baseline, ScenarioValue::new(2.0, 81_600.0)),
                LineItem::new("HR", "Training", 10_000.0),
            ],
            &[Scenario::Baseline, Scenario::BestCase],
            Config::default(),
        )
    }

    #[test]
    fn export_has_line_rows_and_total() {
        let s = store();
        let rows = export_rows(s.items(), Scenario::Baseline, s.calculator());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][COL_VARIANCE_PCT], json!(2.5));
        assert_eq!(rows[0][COL_ALERT], json!("none"));
        assert_eq!(rows[2][COL_DEPARTMENT], json!(TOTAL_ROW));
        assert_eq!(rows[2][COL_BASELINE], json!(90_000.0));
    }

    #[test]
    fn csv_round_trip_through_text() {
        let s = store();
        let rows = export_rows(s.items(), Scenario::Baseline, s.calculator());
        let text = to_csv(&rows, &EXPORT_COLUMNS).unwrap();
        let parsed = parse_csv(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1][COL_CATEGORY], json!("Training"));
    }

    #[test]
    fn quoted_cells_parse() {
        let parsed = parse_csv(
            "Department,Category,Justification\nIT,\"Cloud, hosting\",\"say \"\"hi\"\"\"\n",
        )
        .unwrap();
        assert_eq!(parsed[0][COL_CATEGORY], json!("Cloud, hosting"));
        assert_eq!(parsed[0][COL_JUSTIFICATION], json!("say \"hi\""));
    }

    #[test]
    fn multi_line_justification_survives_export_and_import() {
        let mut s = store();
        s.update(0, "justification", "Renewal\nthree years, \"firm\"", None).unwrap();
        let rows = export_rows(s.items(), Scenario::Baseline, s.calculator());
        let text = to_csv(&rows, &EXPORT_COLUMNS).unwrap();
        let parsed = parse_csv(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0][COL_JUSTIFICATION], json!("Renewal\nthree years, \"firm\""));

        let before = s.items()[0].clone();
        import_records(&mut s, &parsed, Scenario::Baseline).unwrap();
        assert_eq!(s.items()[0], before);
    }

    #[test]
    fn import_overwrites_only_present_fields() {
        let mut s = store();
        let records = parse_csv(
            "Department,Category,Adjusted,Justification\nIT,Software,90000,Vendor renewal\nOps,Travel,5,x\n",
        )
        .unwrap();
        let summary = import_records(&mut s, &records, Scenario::Baseline).unwrap();
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.unmatched, vec![("Ops".to_string(), "Travel".to_string())]);
        let v = s.items()[0].value(Scenario::Baseline);
        assert_eq!(v.adjusted, 90_000.0);
        assert_eq!(v.suggested, 81_600.0);
        assert_eq!(v.justification, "Vendor renewal");
        assert_eq!(s.items()[0].actual, 82_000.0);
        assert!(s.has_unsaved_changes());
    }

    #[test]
    fn imported_driver_recomputes_amounts() {
        let mut s = store();
        let records = parse_csv("Department,Category,Driver %\nIT,Software,20\n").unwrap();
        import_records(&mut s, &records, Scenario::Baseline).unwrap();
        let v = s.items()[0].value(Scenario::Baseline);
        assert_eq!(v.driver_pct, 20.0);
        assert_eq!(v.suggested, 96_000.0);
        assert_eq!(v.adjusted, 96_000.0);

        let mut edited = store();
        edited.update(0, "driver_pct", "20", None).unwrap();
        assert_eq!(edited.items()[0], s.items()[0]);
    }

    #[test]
    fn imported_driver_keeps_explicit_amounts() {
        let mut s = store();
        let records = parse_csv(
            "Department,Category,Driver %,Suggested,Adjusted\nIT,Software,20,90000,91000\n",
        )
        .unwrap();
        import_records(&mut s, &records, Scenario::Baseline).unwrap();
        let v = s.items()[0].value(Scenario::Baseline);
        assert_eq!(v.suggested, 90_000.0);
        assert_eq!(v.adjusted, 91_000.0);

        let mut s = store();
        let records =
            parse_csv("Department,Category,Driver %,Adjusted\nIT,Software,20,91000\n").unwrap();
        import_records(&mut s, &records, Scenario::Baseline).unwrap();
        let v = s.items()[0].value(Scenario::Baseline);
        assert_eq!(v.suggested, 96_000.0);
        assert_eq!(v.adjusted, 91_000.0);
    }

    #[test]
    fn routed_rows_report_their_own_scenarios() {
        let s = store();
        let records = parse_json(
            r#"[{"Department":"HR","Category":"Training","Scenario":"Best Case","Adjusted":1},
                {"Department":"IT","Category":"Software","Scenario":"best_case","Adjusted":2}]"#,
        )
        .unwrap();
        let (patches, _) = plan_import(s.items(), &records, Scenario::Baseline).unwrap();
        assert_eq!(patched_scenarios(&patches), vec!["best_case"]);
        assert!(patched_scenarios(&[]).is_empty());
    }

    #[test]
    fn department_named_total_still_imports() {
        let mut s = store();
        s.add_line(LineItem::new(TOTAL_ROW, "Reserve", 1_000.0));
        let rows = export_rows(s.items(), Scenario::Baseline, s.calculator());
        let mut records = parse_csv(&to_csv(&rows, &EXPORT_COLUMNS).unwrap()).unwrap();
        records[2].insert(COL_ADJUSTED.to_string(), json!("1500"));
        records[3].insert(COL_ADJUSTED.to_string(), json!("1"));
        let summary = import_records(&mut s, &records, Scenario::Baseline).unwrap();
        assert_eq!(summary.merged, 3);
        assert!(summary.unmatched.is_empty());
        assert_eq!(s.items()[2].value(Scenario::Baseline).adjusted, 1_500.0);
    }

    #[test]
    fn malformed_record_rejects_whole_import() {
        let mut s = store();
        let before = s.items().to_vec();
        let records = parse_csv("Department,Category,Adjusted\nIT,Software,1\nHR,Training,lots\n").unwrap();
        let err = import_records(&mut s, &records, Scenario::Baseline).unwrap_err();
        assert!(matches!(err, PlanError::MalformedRecord { row: 2, .. }));
        assert_eq!(s.items(), before.as_slice());
        assert!(!s.has_unsaved_changes());
    }

    #[test]
    fn scenario_column_routes_rows() {
        let mut s = store();
        let records = parse_json(
            r#"[{"Department":"HR","Category":"Training","Scenario":"Best Case","Adjusted":12000}]"#,
        )
        .unwrap();
        import_records(&mut s, &records, Scenario::Baseline).unwrap();
        assert_eq!(s.items()[1].value(Scenario::BestCase).adjusted, 12_000.0);
        assert_eq!(s.items()[1].value(Scenario::Baseline).adjusted, 0.0);
    }

    #[test]
    fn undeclared_scenario_rejects_import() {
        let mut s = store();
        let records = parse_json(
            r#"[{"Department":"HR","Category":"Training","Scenario":"aggressive","Adjusted":1}]"#,
        )
        .unwrap();
        assert!(import_records(&mut s, &records, Scenario::Baseline).is_err());
        assert!(s.items()[1].scenarios.is_empty());
    }

    #[test]
    fn parse_json_rejects_non_objects() {
        assert!(parse_json("[1,2]").is_err());
        assert!(parse_json("{\"a\":1}").is_err());
        assert!(parse_json("not json").is_err());
    }

    #[test]
    fn parse_csv_rejects_ragged_rows() {
        assert!(parse_csv("Department,Category\nIT\n").is_err());
        assert!(parse_csv("\n# only comments\n").is_err());
    }
}
