use super::{default_true, required, ApiResource, Entity, ResourceRef};
use crate::api_error::ApiError;
use crate::schema::benchmarks;
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Benchmark {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub benchmark_type: String,
    pub data_type: String,
    pub description: String,
    pub units_title: String,
    pub units: String,
    pub lessisbetter: bool,
    pub default_on_changes: bool,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "benchmarks"]
#[changeset_options(treat_none_as_null = "true")]
pub struct NewBenchmark {
    pub name: String,
    pub parent_id: Option<i32>,
    pub benchmark_type: String,
    pub data_type: String,
    pub description: String,
    pub units_title: String,
    pub units: String,
    pub lessisbetter: bool,
    pub default_on_changes: bool,
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkInput {
    pub name: String,
    pub parent: Option<ResourceRef>,
    pub benchmark_type: Option<String>,
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: String,
    pub units_title: Option<String>,
    pub units: Option<String>,
    #[serde(default = "default_true")]
    pub lessisbetter: bool,
    #[serde(default = "default_true")]
    pub default_on_changes: bool,
}

impl NewBenchmark {
    /// Cross-project benchmark measured in seconds, less is better.
    pub fn named(name: &str) -> NewBenchmark {
        NewBenchmark {
            name: name.to_string(),
            parent_id: None,
            benchmark_type: "C".to_string(),
            data_type: "U".to_string(),
            description: String::new(),
            units_title: "Time".to_string(),
            units: "seconds".to_string(),
            lessisbetter: true,
            default_on_changes: true,
        }
    }
}

impl Entity for Benchmark {
    const RESOURCE: &'static str = "benchmark";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[("parent_id", "benchmark")];

    type New = NewBenchmark;

    fn id(&self) -> i32 {
        self.id
    }
}

fn choice(field: &str, value: Option<String>, allowed: &[&str]) -> Result<String, ApiError> {
    let value = match value {
        Some(v) => v,
        None => return Ok(allowed[0].to_string()),
    };
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid {} \"{}\", expected one of {}",
            field,
            value,
            allowed.join(", ")
        )))
    }
}

impl ApiResource for Benchmark {
    type Input = BenchmarkInput;

    fn hydrate(store: &dyn Store, input: BenchmarkInput) -> Result<NewBenchmark, ApiError> {
        let parent_id = match &input.parent {
            Some(parent) => Some(parent.resolve::<Benchmark, _>(store)?.id),
            None => None,
        };
        let defaults = NewBenchmark::named(&input.name);

        Ok(NewBenchmark {
            name: required("name", input.name)?,
            parent_id,
            benchmark_type: choice("benchmark_type", input.benchmark_type, &["C", "O"])?,
            data_type: choice("data_type", input.data_type, &["U", "M"])?,
            description: input.description,
            units_title: input.units_title.unwrap_or(defaults.units_title),
            units: input.units.unwrap_or(defaults.units),
            lessisbetter: input.lessisbetter,
            default_on_changes: input.default_on_changes,
        })
    }

    fn check_id(id: i32, new: &NewBenchmark) -> Result<(), ApiError> {
        if new.parent_id == Some(id) {
            return Err(ApiError::bad_request(format!(
                "Benchmark {} can not be its own parent",
                id
            )));
        }
        Ok(())
    }
}
