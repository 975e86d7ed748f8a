//! Turning flat result dictionaries into stored results.
//!
//! Clients identify everything by natural key (project name, commit id,
//! ...). [`ResultBundle`] is the strict variant used by the REST API: every
//! referenced row must already exist. [`save_result`] backs the legacy form
//! endpoints and creates missing revisions, executables and benchmarks on
//! the fly.

use crate::api_error::ApiError;
use crate::models::*;
use crate::store::{Lookups, ResultKey, Store, Table};
use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const MANDATORY_KEYS: [&str; 7] = [
    "commitid",
    "branch",
    "project",
    "executable",
    "benchmark",
    "environment",
    "result_value",
];

/// A flat `key -> value` result submission.
pub type ResultData = Map<String, Value>;

fn text(data: &ResultData, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn check_mandatory(data: &ResultData) -> Result<(), ApiError> {
    for key in MANDATORY_KEYS.iter() {
        if !data.contains_key(*key) {
            return Err(ApiError::bad_request(format!(
                "Key \"{}\" missing from request",
                key
            )));
        }
        if text(data, key).map_or(true, |v| v.is_empty()) {
            return Err(ApiError::bad_request(format!(
                "Value for key \"{}\" empty in request",
                key
            )));
        }
    }
    Ok(())
}

/// Mandatory text field; only call after [`check_mandatory`].
fn field(data: &ResultData, key: &str) -> Result<String, ApiError> {
    text(data, key).ok_or_else(|| {
        ApiError::bad_request(format!("Value for key \"{}\" empty in request", key))
    })
}

fn number(data: &ResultData, key: &str) -> Result<Option<f64>, ApiError> {
    let invalid = || {
        ApiError::bad_request(format!("Value for key \"{}\" is not a number", key))
    };
    let parsed = match data.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_f64().ok_or_else(invalid)?),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().map_err(|_| invalid())?),
        Some(_) => return Err(invalid()),
    };
    match parsed {
        Some(v) if !v.is_finite() => Err(invalid()),
        other => Ok(other),
    }
}

fn date(data: &ResultData, key: &str) -> Result<Option<NaiveDateTime>, ApiError> {
    let value = match text(data, key) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(None),
    };
    NaiveDateTime::parse_from_str(&value, DATETIME_FORMAT)
        .map(Some)
        .map_err(|_| {
            ApiError::bad_request(format!(
                "Invalid date \"{}\" for key \"{}\", expected format YYYY-MM-DD HH:MM:SS",
                value, key
            ))
        })
}

fn flag(data: &ResultData, key: &str) -> Result<Option<bool>, ApiError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => match text(data, key).as_deref() {
            Some("") => Ok(None),
            Some("1") | Some("true") | Some("True") => Ok(Some(true)),
            Some("0") | Some("false") | Some("False") => Ok(Some(false)),
            _ => Err(ApiError::bad_request(format!(
                "Value for key \"{}\" is not a boolean",
                key
            ))),
        },
    }
}

fn not_found(kind: &str, name: &str) -> ApiError {
    ApiError::bad_request(format!("{} \"{}\" not found", kind, name))
}

fn project(store: &dyn Store, data: &ResultData) -> Result<Project, ApiError> {
    let name = field(data, "project")?;
    store
        .project_by_name(&name)?
        .ok_or_else(|| not_found("Project", &name))
}

fn environment(store: &dyn Store, data: &ResultData) -> Result<Environment, ApiError> {
    let name = field(data, "environment")?;
    store
        .environment_by_name(&name)?
        .ok_or_else(|| not_found("Environment", &name))
}

fn branch(store: &dyn Store, project: &Project, data: &ResultData) -> Result<Branch, ApiError> {
    let name = field(data, "branch")?;
    store
        .branch_by_name(project.id, &name)?
        .ok_or_else(|| not_found("Branch", &name))
}

/// A validated result submission whose references are all resolved.
#[derive(Debug, Clone)]
pub struct ResultBundle {
    pub project: Project,
    pub branch: Branch,
    pub revision: Revision,
    pub executable: Executable,
    pub benchmark: Benchmark,
    pub environment: Environment,
    pub result: NewBenchmarkResult,
}

impl ResultBundle {
    /// Validates `data` and resolves every natural key. Fails with a client
    /// error when a key is missing or empty, a referenced row does not
    /// exist, or a value is malformed.
    pub fn new(store: &dyn Store, data: &ResultData) -> Result<ResultBundle, ApiError> {
        check_mandatory(data)?;

        let project = project(store, data)?;
        let environment = environment(store, data)?;
        let branch = branch(store, &project, data)?;

        let name = field(data, "executable")?;
        let executable = store
            .executable_by_name(project.id, &name)?
            .ok_or_else(|| not_found("Executable", &name))?;

        let name = field(data, "benchmark")?;
        let benchmark = store
            .benchmark_by_name(&name)?
            .ok_or_else(|| not_found("Benchmark", &name))?;

        let commitid = field(data, "commitid")?;
        let revision = store
            .revision_by_commitid(branch.id, &commitid)?
            .ok_or_else(|| not_found("Revision", &commitid))?;

        let value = number(data, "result_value")?.ok_or_else(|| {
            ApiError::bad_request("Value for key \"result_value\" empty in request")
        })?;

        let result = NewBenchmarkResult {
            value,
            std_dev: number(data, "std_dev")?,
            val_min: number(data, "val_min")?,
            val_max: number(data, "val_max")?,
            date: date(data, "date")?.unwrap_or_else(|| Utc::now().naive_utc()),
            revision_id: revision.id,
            executable_id: executable.id,
            benchmark_id: benchmark.id,
            environment_id: environment.id,
        };
        result.validate()?;

        Ok(ResultBundle {
            project,
            branch,
            revision,
            executable,
            benchmark,
            environment,
            result,
        })
    }

    /// Inserts the result. A result for the same revision, executable,
    /// benchmark and environment already stored is a conflict.
    pub fn save(&self, store: &dyn Store) -> Result<BenchmarkResult, ApiError> {
        Table::<BenchmarkResult>::insert(store, self.result.clone())
    }
}

/// The natural-key view of a stored result, shaped like a submission.
pub fn describe(store: &dyn Store, result: &BenchmarkResult) -> Result<Value, ApiError> {
    let missing = |what: &str| ApiError::new(500, format!("Result {} has no {}", result.id, what));

    let revision = Table::<Revision>::load(store, result.revision_id)?
        .ok_or_else(|| missing("revision"))?;
    let branch = Table::<Branch>::load(store, revision.branch_id)?
        .ok_or_else(|| missing("branch"))?;
    let project = Table::<Project>::load(store, revision.project_id)?
        .ok_or_else(|| missing("project"))?;
    let executable = Table::<Executable>::load(store, result.executable_id)?
        .ok_or_else(|| missing("executable"))?;
    let benchmark = Table::<Benchmark>::load(store, result.benchmark_id)?
        .ok_or_else(|| missing("benchmark"))?;
    let environment = Table::<Environment>::load(store, result.environment_id)?
        .ok_or_else(|| missing("environment"))?;

    Ok(json!({
        "id": result.id,
        "commitid": revision.commitid,
        "branch": branch.name,
        "project": project.name,
        "executable": executable.name,
        "benchmark": benchmark.name,
        "environment": environment.name,
        "result_value": result.value,
        "std_dev": result.std_dev,
        "val_min": result.val_min,
        "val_max": result.val_max,
        "date": result.date.format(DATETIME_FORMAT).to_string(),
        "resource_uri": resource_uri(BenchmarkResult::RESOURCE, result.id),
    }))
}

/// Rows a legacy submission touched; reports are keyed on these.
#[derive(Debug, Clone)]
pub struct SavedResult {
    pub revision: Revision,
    pub executable: Executable,
    pub environment: Environment,
    pub result: BenchmarkResult,
}

/// Saves a legacy submission. Environment, project and branch must exist;
/// revision, executable and benchmark are created when missing, and an
/// existing result with the same key is overwritten.
pub fn save_result(store: &dyn Store, data: &ResultData) -> Result<SavedResult, ApiError> {
    check_mandatory(data)?;

    let environment = environment(store, data)?;
    let project = project(store, data)?;
    let branch = branch(store, &project, data)?;

    let value = number(data, "result_value")?
        .ok_or_else(|| ApiError::bad_request("Value for key \"result_value\" empty in request"))?;
    let std_dev = number(data, "std_dev")?;
    let val_min = number(data, "val_min")?;
    let val_max = number(data, "val_max")?;
    let revision_date = date(data, "revision_date")?;
    let result_date = date(data, "result_date")?;

    let commitid = field(data, "commitid")?;
    let revision = match store.revision_by_commitid(branch.id, &commitid)? {
        Some(revision) => revision,
        None => {
            let date = revision_date.unwrap_or_else(|| Utc::now().naive_utc());
            let revision = Table::<Revision>::insert(
                store,
                NewRevision::on_branch(&branch, &commitid, date),
            )?;
            debug!("Created revision {} on {}", commitid, branch.name);
            revision
        }
    };

    let name = field(data, "executable")?;
    let executable = match store.executable_by_name(project.id, &name)? {
        Some(executable) => executable,
        None => Table::<Executable>::insert(
            store,
            NewExecutable {
                name,
                description: String::new(),
                project_id: project.id,
            },
        )?,
    };

    let name = field(data, "benchmark")?;
    let benchmark = match store.benchmark_by_name(&name)? {
        Some(benchmark) => benchmark,
        None => {
            let mut new = NewBenchmark::named(&name);
            if let Some(units) = text(data, "units").filter(|u| !u.is_empty()) {
                new.units = units;
            }
            if let Some(units_title) = text(data, "units_title").filter(|u| !u.is_empty()) {
                new.units_title = units_title;
            }
            if let Some(lessisbetter) = flag(data, "lessisbetter")? {
                new.lessisbetter = lessisbetter;
            }
            Table::<Benchmark>::insert(store, new)?
        }
    };

    let new = NewBenchmarkResult {
        value,
        std_dev,
        val_min,
        val_max,
        date: result_date.unwrap_or_else(|| Utc::now().naive_utc()),
        revision_id: revision.id,
        executable_id: executable.id,
        benchmark_id: benchmark.id,
        environment_id: environment.id,
    };
    new.validate()?;

    let key = ResultKey {
        revision_id: revision.id,
        executable_id: executable.id,
        benchmark_id: benchmark.id,
        environment_id: environment.id,
    };
    let result = match store.result_by_key(key)? {
        Some(existing) => Table::<BenchmarkResult>::update(store, existing.id, new)?
            .ok_or_else(|| ApiError::new(500, format!("Result {} vanished", existing.id)))?,
        None => Table::<BenchmarkResult>::insert(store, new)?,
    };

    Ok(SavedResult {
        revision,
        executable,
        environment,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_util::{fixture, result_data};

    fn data1() -> ResultData {
        result_data(json!({
            "commitid": "2",
            "branch": "default",
            "project": "MyProject",
            "executable": "myexe O3 64bits",
            "benchmark": "float",
            "environment": "Bulldozer",
            "result_value": 4000,
        }))
    }

    fn store() -> MemoryStore {
        let store = fixture();
        Table::<Environment>::insert(&store, NewEnvironment::named("Bulldozer")).unwrap();
        store
    }

    #[test]
    fn populate_and_save() {
        let store = store();
        let bundle = ResultBundle::new(&store, &data1()).unwrap();
        assert_eq!(bundle.environment.name, "Bulldozer");
        assert_eq!(bundle.revision.commitid, "2");
        let saved = bundle.save(&store).unwrap();
        assert_eq!(saved.value, 4000.0);
    }

    #[test]
    fn save_same_result_again() {
        let store = store();
        let mut data = data1();
        data.insert("environment".into(), json!("Dual Core"));
        // the fixture already holds this result
        let bundle = ResultBundle::new(&store, &data).unwrap();
        assert_eq!(bundle.save(&store).unwrap_err().status_code, 409);
    }

    #[test]
    fn nonexistent_environment() {
        let store = store();
        let mut data = data1();
        data.insert("environment".into(), json!("Foo the Bar"));
        let err = ResultBundle::new(&store, &data).unwrap_err();
        assert_eq!(err.status_code, 400);
        assert_eq!(err.message, "Environment \"Foo the Bar\" not found");
    }

    #[test]
    fn insufficient_data() {
        let store = store();
        let mut data = data1();
        data.remove("environment");
        let err = ResultBundle::new(&store, &data).unwrap_err();
        assert_eq!(err.message, "Key \"environment\" missing from request");

        let mut data = data1();
        data.insert("project".into(), json!(""));
        let err = ResultBundle::new(&store, &data).unwrap_err();
        assert_eq!(err.message, "Value for key \"project\" empty in request");
    }

    #[test]
    fn unknown_revision_is_rejected() {
        let store = store();
        let mut data = data1();
        data.insert("commitid".into(), json!("deadbeef"));
        let err = ResultBundle::new(&store, &data).unwrap_err();
        assert_eq!(err.message, "Revision \"deadbeef\" not found");
    }

    #[test]
    fn date_attr_set() {
        let store = store();
        let before = Utc::now().naive_utc();
        let bundle = ResultBundle::new(&store, &data1()).unwrap();
        let saved = bundle.save(&store).unwrap();
        assert!(saved.date >= before);

        let mut data = data1();
        data.insert("date".into(), json!("2011-05-05T03:01:45"));
        assert_eq!(ResultBundle::new(&store, &data).unwrap_err().status_code, 400);
    }

    #[test]
    fn optional_data() {
        let store = store();
        let mut data = data1();
        data.insert("std_dev".into(), json!(0.2));
        data.insert("val_min".into(), json!(2.23));
        data.insert("val_max".into(), json!(3.42));
        data.insert("date".into(), json!("2011-05-05 03:01:45"));
        let saved = ResultBundle::new(&store, &data).unwrap().save(&store).unwrap();
        assert_eq!(saved.std_dev, Some(0.2));
        assert_eq!(saved.val_min, Some(2.23));
        assert_eq!(saved.val_max, Some(3.42));
        assert_eq!(
            saved.date,
            NaiveDateTime::parse_from_str("2011-05-05 03:01:45", DATETIME_FORMAT).unwrap()
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let store = store();
        let mut data = data1();
        data.insert("result_value".into(), json!("4000.5"));
        data.insert("std_dev".into(), json!(""));
        let bundle = ResultBundle::new(&store, &data).unwrap();
        assert_eq!(bundle.result.value, 4000.5);
        assert_eq!(bundle.result.std_dev, None);

        data.insert("result_value".into(), json!("fast"));
        assert_eq!(ResultBundle::new(&store, &data).unwrap_err().status_code, 400);
    }

    #[test]
    fn describe_uses_natural_keys() {
        let store = store();
        let saved = ResultBundle::new(&store, &data1()).unwrap().save(&store).unwrap();
        let described = describe(&store, &saved).unwrap();
        assert_eq!(described["project"], "MyProject");
        assert_eq!(described["environment"], "Bulldozer");
        assert_eq!(described["commitid"], "2");
        assert_eq!(described["result_value"], 4000.0);
    }

    #[test]
    fn save_result_creates_missing_rows() {
        let store = store();
        let data = result_data(json!({
            "commitid": "a1b2c3",
            "branch": "default",
            "project": "MyProject",
            "executable": "myexe O2",
            "benchmark": "richards",
            "environment": "Dual Core",
            "result_value": "1.5",
            "units": "ms",
            "lessisbetter": "0",
            "revision_date": "2011-06-01 10:00:00",
        }));
        let saved = save_result(&store, &data).unwrap();
        assert_eq!(saved.revision.commitid, "a1b2c3");
        assert_eq!(
            saved.revision.date,
            NaiveDateTime::parse_from_str("2011-06-01 10:00:00", DATETIME_FORMAT).unwrap()
        );
        assert_eq!(saved.executable.name, "myexe O2");

        let benchmark = store.benchmark_by_name("richards").unwrap().unwrap();
        assert_eq!(benchmark.units, "ms");
        assert!(!benchmark.lessisbetter);
    }

    #[test]
    fn save_result_overwrites_existing_result() {
        let store = store();
        let mut data = data1();
        data.insert("environment".into(), json!("Dual Core"));
        data.insert("result_value".into(), json!(1234.5));
        let before = Table::<BenchmarkResult>::count(&store).unwrap();
        let saved = save_result(&store, &data).unwrap();
        assert_eq!(saved.result.value, 1234.5);
        assert_eq!(Table::<BenchmarkResult>::count(&store).unwrap(), before);
    }

    #[test]
    fn save_result_requires_existing_branch() {
        let store = store();
        let mut data = data1();
        data.insert("branch".into(), json!("feature"));
        let err = save_result(&store, &data).unwrap_err();
        assert_eq!(err.message, "Branch \"feature\" not found");
    }
}
