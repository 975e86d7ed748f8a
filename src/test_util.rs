//! Shared data set for tests: one project with two benchmarks measured on
//! four consecutive revisions.

use crate::models::*;
use crate::results::{ResultData, DATETIME_FORMAT};
use crate::settings::Settings;
use crate::store::{Lookups, MemoryStore, Store, Table};
use actix_web::web;
use chrono::NaiveDateTime;
use serde_json::Value;
use std::sync::Arc;

const FLOAT_VALUES: [f64; 4] = [4000.0, 4100.0, 4000.0, 3000.0];
const INT_VALUES: [f64; 4] = [1200.0, 1200.0, 1220.0, 1210.0];

pub fn date(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).unwrap()
}

pub fn fixture() -> MemoryStore {
    let store = MemoryStore::new();

    let mut environment = NewEnvironment::named("Dual Core");
    environment.cpu = "Core 2 Duo 8200".to_string();
    environment.memory = "2GB".to_string();
    environment.os = "Arch Linux".to_string();
    environment.kernel = "2.6.29".to_string();
    let environment = Table::<Environment>::insert(&store, environment).unwrap();

    let project = Table::<Project>::insert(&store, NewProject::named("MyProject")).unwrap();
    let branch = Table::<Branch>::insert(
        &store,
        NewBranch {
            name: "default".to_string(),
            project_id: project.id,
        },
    )
    .unwrap();
    let executable = Table::<Executable>::insert(
        &store,
        NewExecutable {
            name: "myexe O3 64bits".to_string(),
            description: String::new(),
            project_id: project.id,
        },
    )
    .unwrap();
    let float = Table::<Benchmark>::insert(&store, NewBenchmark::named("float")).unwrap();
    let int = Table::<Benchmark>::insert(&store, NewBenchmark::named("int")).unwrap();

    for (i, (float_value, int_value)) in FLOAT_VALUES.iter().zip(INT_VALUES.iter()).enumerate() {
        let when = date(&format!("2011-04-0{} 10:00:00", i + 1));
        let revision = Table::<Revision>::insert(
            &store,
            NewRevision::on_branch(&branch, &(i + 1).to_string(), when),
        )
        .unwrap();
        for (benchmark, value) in [(&float, *float_value), (&int, *int_value)] {
            Table::<BenchmarkResult>::insert(
                &store,
                NewBenchmarkResult {
                    value,
                    std_dev: None,
                    val_min: None,
                    val_max: None,
                    date: when,
                    revision_id: revision.id,
                    executable_id: executable.id,
                    benchmark_id: benchmark.id,
                    environment_id: environment.id,
                },
            )
            .unwrap();
        }
    }

    store
}

/// Id of the fixture revision with `commitid` on the default branch.
pub fn revision_id(store: &MemoryStore, commitid: &str) -> i32 {
    let branch = store.branch_by_name(1, "default").unwrap().unwrap();
    store
        .revision_by_commitid(branch.id, commitid)
        .unwrap()
        .unwrap()
        .id
}

pub fn result_data(value: Value) -> ResultData {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

pub fn app_data(
    store: MemoryStore,
    settings: Settings,
) -> (web::Data<dyn Store>, web::Data<Settings>) {
    let store: Arc<dyn Store> = Arc::new(store);
    (web::Data::from(store), web::Data::new(settings))
}
