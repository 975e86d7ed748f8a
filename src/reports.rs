//! Per revision change summaries.

use crate::api_error::ApiError;
use crate::models::*;
use crate::settings::Settings;
use crate::store::{Lookups, Store, Table};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Colorcode {
    Red,
    Green,
    Yellow,
    None,
}

impl Colorcode {
    pub fn as_str(self) -> &'static str {
        match self {
            Colorcode::Red => "red",
            Colorcode::Green => "green",
            Colorcode::Yellow => "yellow",
            Colorcode::None => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeRow {
    pub benchmark: String,
    pub benchmark_id: i32,
    pub value: f64,
    pub std_dev: Option<f64>,
    pub val_min: Option<f64>,
    pub val_max: Option<f64>,
    /// Percent change against the previous revision.
    pub change: Option<f64>,
    /// Percent deviation from the mean of earlier revisions.
    pub trend: Option<f64>,
}

/// Rows sharing units, so their changes may be averaged.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeGroup {
    pub units_title: String,
    pub units: String,
    pub lessisbetter: bool,
    pub average_change: Option<f64>,
    pub average_trend: Option<f64>,
    pub rows: Vec<ChangeRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangesTable {
    pub revision: Revision,
    pub previous: Option<Revision>,
    pub executable_id: i32,
    pub environment_id: i32,
    pub groups: Vec<ChangeGroup>,
}

fn percent(value: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((value - base) / base * 100.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn is_worse(change: f64, lessisbetter: bool) -> bool {
    (change > 0.0) == lessisbetter
}

fn change_color(change: f64, lessisbetter: bool) -> Colorcode {
    if is_worse(change, lessisbetter) {
        Colorcode::Red
    } else {
        Colorcode::Green
    }
}

/// The most recent revision on the same branch dated before `revision`.
pub fn previous_revision(
    store: &dyn Store,
    revision: &Revision,
) -> Result<Option<Revision>, ApiError> {
    let mut earlier = store.revisions_on_branch(revision.branch_id, Some(revision.date), 1)?;
    Ok(earlier.pop())
}

pub fn changes_table(
    store: &dyn Store,
    settings: &Settings,
    revision_id: i32,
    executable_id: i32,
    environment_id: i32,
) -> Result<ChangesTable, ApiError> {
    let revision = Table::<Revision>::load(store, revision_id)?
        .ok_or_else(|| ApiError::new(404, format!("Revision {} not found", revision_id)))?;

    let earlier = store.revisions_on_branch(
        revision.branch_id,
        Some(revision.date),
        settings.trend_depth.max(1),
    )?;
    let previous = earlier.first().cloned();

    let current = store.results_for_revisions(&[revision.id], executable_id, environment_id)?;

    let earlier_ids = earlier.iter().map(|r| r.id).collect::<Vec<_>>();
    let mut history: HashMap<i32, Vec<f64>> = HashMap::new();
    let mut previous_values: HashMap<i32, f64> = HashMap::new();
    for result in store.results_for_revisions(&earlier_ids, executable_id, environment_id)? {
        if previous.as_ref().map(|p| p.id) == Some(result.revision_id) {
            previous_values.insert(result.benchmark_id, result.value);
        }
        history.entry(result.benchmark_id).or_default().push(result.value);
    }

    let mut groups: BTreeMap<(String, String, bool), Vec<ChangeRow>> = BTreeMap::new();
    for result in current {
        let benchmark = Table::<Benchmark>::load(store, result.benchmark_id)?.ok_or_else(|| {
            ApiError::new(500, format!("Result {} has no benchmark", result.id))
        })?;

        let change = previous_values
            .get(&benchmark.id)
            .and_then(|prev| percent(result.value, *prev));
        let trend = history
            .get(&benchmark.id)
            .and_then(|values| mean(values))
            .and_then(|avg| percent(result.value, avg));

        groups
            .entry((
                benchmark.units_title.clone(),
                benchmark.units.clone(),
                benchmark.lessisbetter,
            ))
            .or_default()
            .push(ChangeRow {
                benchmark: benchmark.name,
                benchmark_id: benchmark.id,
                value: result.value,
                std_dev: result.std_dev,
                val_min: result.val_min,
                val_max: result.val_max,
                change,
                trend,
            });
    }

    let groups = groups
        .into_iter()
        .map(|((units_title, units, lessisbetter), mut rows)| {
            rows.sort_by(|a, b| a.benchmark.cmp(&b.benchmark));
            let changes = rows.iter().filter_map(|r| r.change).collect::<Vec<_>>();
            let trends = rows.iter().filter_map(|r| r.trend).collect::<Vec<_>>();
            ChangeGroup {
                units_title,
                units,
                lessisbetter,
                average_change: mean(&changes),
                average_trend: mean(&trends),
                rows,
            }
        })
        .collect();

    Ok(ChangesTable {
        revision,
        previous,
        executable_id,
        environment_id,
        groups,
    })
}

/// Picks the most notable change of a table. Group averages win over
/// single benchmarks, which win over trends.
pub fn summarize(table: &ChangesTable, settings: &Settings) -> (String, Colorcode) {
    let above = |threshold: f64| move |v: &f64| v.abs() > threshold;
    let by_magnitude = |a: &f64, b: &f64| {
        a.abs()
            .partial_cmp(&b.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    };

    let group = table
        .groups
        .iter()
        .filter_map(|g| {
            g.average_change
                .filter(above(settings.change_threshold))
                .map(|c| (g, c))
        })
        .max_by(|a, b| by_magnitude(&a.1, &b.1));
    if let Some((group, change)) = group {
        return (
            format!("Average {} {:+.1}%", group.units_title, change),
            change_color(change, group.lessisbetter),
        );
    }

    let rows = || {
        table
            .groups
            .iter()
            .flat_map(|g| g.rows.iter().map(move |r| (g, r)))
    };

    let single = rows()
        .filter_map(|(g, r)| {
            r.change
                .filter(above(settings.change_threshold))
                .map(|c| (g, r, c))
        })
        .max_by(|a, b| by_magnitude(&a.2, &b.2));
    if let Some((group, row, change)) = single {
        return (
            format!("{} {:+.1}%", row.benchmark, change),
            change_color(change, group.lessisbetter),
        );
    }

    let trend = rows()
        .filter_map(|(_, r)| {
            r.trend
                .filter(above(settings.trend_threshold))
                .map(|t| (r, t))
        })
        .max_by(|a, b| by_magnitude(&a.1, &b.1));
    if let Some((row, trend)) = trend {
        return (
            format!("{} trend {:+.1}%", row.benchmark, trend),
            Colorcode::Yellow,
        );
    }

    (String::new(), Colorcode::None)
}

/// Creates or refreshes the report of a revision once it has at least as
/// many results as the revision before it. Returns `None` when skipped.
pub fn create_report_if_enough_data(
    store: &dyn Store,
    settings: &Settings,
    revision_id: i32,
    executable_id: i32,
    environment_id: i32,
) -> Result<Option<Report>, ApiError> {
    let revision = match Table::<Revision>::load(store, revision_id)? {
        Some(revision) => revision,
        None => return Ok(None),
    };
    let previous = match previous_revision(store, &revision)? {
        Some(previous) => previous,
        None => {
            debug!("No revision before {}, skipping report", revision.commitid);
            return Ok(None);
        }
    };

    let current = store.results_for_revisions(&[revision.id], executable_id, environment_id)?;
    let before = store.results_for_revisions(&[previous.id], executable_id, environment_id)?;
    if current.len() < before.len() {
        debug!(
            "Revision {} has {} of {} results, skipping report",
            revision.commitid,
            current.len(),
            before.len()
        );
        return Ok(None);
    }

    let table = changes_table(store, settings, revision_id, executable_id, environment_id)?;
    let (summary, colorcode) = summarize(&table, settings);
    let new = NewReport {
        revision_id,
        environment_id,
        executable_id,
        summary,
        colorcode: colorcode.as_str().to_string(),
        updated_at: Utc::now().naive_utc(),
    };

    let report = match store.report_by_key(revision_id, executable_id, environment_id)? {
        Some(existing) => Table::<Report>::update(store, existing.id, new)?
            .ok_or_else(|| ApiError::new(500, format!("Report {} vanished", existing.id)))?,
        None => Table::<Report>::insert(store, new)?,
    };
    info!(
        "Report for revision {}: {:?} ({})",
        revision.commitid, report.summary, report.colorcode
    );

    Ok(Some(report))
}
