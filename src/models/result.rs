use super::{
    ApiResource, Benchmark, Entity, Environment, Executable, ResourceRef, Revision,
};
use crate::api_error::ApiError;
use crate::schema::results;
use crate::store::{ResultKey, Store};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One measurement of a benchmark for a revision, executable and environment.
#[derive(Debug, Clone, Serialize, Queryable)]
pub struct BenchmarkResult {
    pub id: i32,
    pub value: f64,
    pub std_dev: Option<f64>,
    pub val_min: Option<f64>,
    pub val_max: Option<f64>,
    pub date: NaiveDateTime,
    pub revision_id: i32,
    pub executable_id: i32,
    pub benchmark_id: i32,
    pub environment_id: i32,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "results"]
#[changeset_options(treat_none_as_null = "true")]
pub struct NewBenchmarkResult {
    pub value: f64,
    pub std_dev: Option<f64>,
    pub val_min: Option<f64>,
    pub val_max: Option<f64>,
    pub date: NaiveDateTime,
    pub revision_id: i32,
    pub executable_id: i32,
    pub benchmark_id: i32,
    pub environment_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkResultInput {
    pub value: f64,
    pub std_dev: Option<f64>,
    pub val_min: Option<f64>,
    pub val_max: Option<f64>,
    pub date: Option<NaiveDateTime>,
    pub revision: ResourceRef,
    pub executable: ResourceRef,
    pub benchmark: ResourceRef,
    pub environment: ResourceRef,
}

impl BenchmarkResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            revision_id: self.revision_id,
            executable_id: self.executable_id,
            benchmark_id: self.benchmark_id,
            environment_id: self.environment_id,
        }
    }
}

impl NewBenchmarkResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            revision_id: self.revision_id,
            executable_id: self.executable_id,
            benchmark_id: self.benchmark_id,
            environment_id: self.environment_id,
        }
    }

    /// Checks the optional statistics against each other.
    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.value.is_finite() {
            return Err(ApiError::bad_request("Result value must be a finite number"));
        }
        if let (Some(min), Some(max)) = (self.val_min, self.val_max) {
            if min > max {
                return Err(ApiError::bad_request(format!(
                    "val_min {} is greater than val_max {}",
                    min, max
                )));
            }
        }
        if let Some(std_dev) = self.std_dev {
            if std_dev < 0.0 {
                return Err(ApiError::bad_request("std_dev may not be negative"));
            }
        }
        Ok(())
    }
}

impl Entity for BenchmarkResult {
    const RESOURCE: &'static str = "result";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[
        ("revision_id", "revision"),
        ("executable_id", "executable"),
        ("benchmark_id", "benchmark"),
        ("environment_id", "environment"),
    ];

    type New = NewBenchmarkResult;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for BenchmarkResult {
    type Input = BenchmarkResultInput;

    fn hydrate(
        store: &dyn Store,
        input: BenchmarkResultInput,
    ) -> Result<NewBenchmarkResult, ApiError> {
        let revision: Revision = input.revision.resolve(store)?;
        let executable: Executable = input.executable.resolve(store)?;
        let benchmark: Benchmark = input.benchmark.resolve(store)?;
        let environment: Environment = input.environment.resolve(store)?;

        let result = NewBenchmarkResult {
            value: input.value,
            std_dev: input.std_dev,
            val_min: input.val_min,
            val_max: input.val_max,
            date: input.date.unwrap_or_else(|| Utc::now().naive_utc()),
            revision_id: revision.id,
            executable_id: executable.id,
            benchmark_id: benchmark.id,
            environment_id: environment.id,
        };
        result.validate()?;
        Ok(result)
    }
}
