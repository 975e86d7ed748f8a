use crate::api_error::ApiError;
use crate::models::*;
use crate::results::DATETIME_FORMAT;
use crate::store::{Lookups, Store, Table};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct TimelineQuery {
    pub executables: Vec<i32>,
    pub environment: i32,
    /// Benchmark name; every benchmark when `None`.
    pub benchmark: Option<String>,
    pub revisions: i64,
    pub branch: String,
}

impl TimelineQuery {
    /// Parses a comma separated id list such as `1,3`.
    pub fn parse_ids(ids: &str) -> Result<Vec<i32>, ApiError> {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse()
                    .map_err(|_| ApiError::bad_request(format!("Invalid executable id \"{}\"", id)))
            })
            .collect()
    }
}

/// Results of one benchmark, one series per executable.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub benchmark: String,
    pub benchmark_id: i32,
    pub units: String,
    pub units_title: String,
    pub lessisbetter: bool,
    pub branch: String,
    /// Executable id to `[date, value, std_dev, commitid]` points, oldest first.
    pub executables: BTreeMap<i32, Vec<Value>>,
}

pub fn timelines(store: &dyn Store, query: &TimelineQuery) -> Result<Vec<Timeline>, ApiError> {
    if query.executables.is_empty() {
        return Err(ApiError::bad_request("No executables given"));
    }
    if Table::<Environment>::load(store, query.environment)?.is_none() {
        return Err(ApiError::bad_request(format!(
            "Environment {} not found",
            query.environment
        )));
    }

    let benchmarks = match &query.benchmark {
        Some(name) => vec![store
            .benchmark_by_name(name)?
            .ok_or_else(|| ApiError::bad_request(format!("Benchmark \"{}\" not found", name)))?],
        None => Table::<Benchmark>::select(store, None, 0)?,
    };

    // points per executable, counted after dropping revisions without a result
    let limit = usize::try_from(query.revisions.max(0)).unwrap_or(usize::MAX);

    // executable id -> (revisions newest first, results)
    let mut series = Vec::new();
    for exe_id in &query.executables {
        let executable = Table::<Executable>::load(store, *exe_id)?
            .ok_or_else(|| ApiError::bad_request(format!("Executable {} not found", exe_id)))?;
        let branch = match store.branch_by_name(executable.project_id, &query.branch)? {
            Some(branch) => branch,
            None => continue,
        };
        let revisions = store.revisions_on_branch(branch.id, None, i64::MAX)?;
        let ids = revisions.iter().map(|r| r.id).collect::<Vec<_>>();
        let results = store.results_for_revisions(&ids, executable.id, query.environment)?;
        series.push((executable.id, revisions, results));
    }

    let mut timelines = Vec::new();
    for benchmark in benchmarks {
        let mut executables = BTreeMap::new();
        for (exe_id, revisions, results) in &series {
            let mut points = revisions
                .iter()
                .filter_map(|revision| {
                    results
                        .iter()
                        .find(|r| r.revision_id == revision.id && r.benchmark_id == benchmark.id)
                        .map(|r| {
                            json!([
                                revision.date.format(DATETIME_FORMAT).to_string(),
                                r.value,
                                r.std_dev,
                                revision.commitid,
                            ])
                        })
                })
                .take(limit)
                .collect::<Vec<_>>();
            points.reverse();
            if !points.is_empty() {
                executables.insert(*exe_id, points);
            }
        }
        if executables.is_empty() {
            continue;
        }
        timelines.push(Timeline {
            benchmark: benchmark.name,
            benchmark_id: benchmark.id,
            units: benchmark.units,
            units_title: benchmark.units_title,
            lessisbetter: benchmark.lessisbetter,
            branch: query.branch.clone(),
            executables,
        });
    }

    Ok(timelines)
}
