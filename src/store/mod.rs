mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::DieselStore;

use crate::api_error::ApiError;
use crate::models::*;
use chrono::NaiveDateTime;

/// Row-level storage for one entity type.
pub trait Table<E: Entity> {
    fn insert(&self, new: E::New) -> Result<E, ApiError>;
    /// Inserts at a caller-chosen id; used when a PUT targets a missing row.
    fn insert_with_id(&self, id: i32, new: E::New) -> Result<E, ApiError>;
    fn load(&self, id: i32) -> Result<Option<E>, ApiError>;
    /// Rows ordered by id. `limit` of `None` means no limit.
    fn select(&self, limit: Option<i64>, offset: i64) -> Result<Vec<E>, ApiError>;
    fn count(&self) -> Result<i64, ApiError>;
    fn update(&self, id: i32, new: E::New) -> Result<Option<E>, ApiError>;
    fn delete(&self, id: i32) -> Result<bool, ApiError>;
}

/// Ids a client may choose for a new row. `i32::MAX` is kept back so the
/// id sequence can always move past an explicitly placed row.
pub fn check_explicit_id(id: i32) -> Result<(), ApiError> {
    if id <= 0 || id == i32::MAX {
        return Err(ApiError::bad_request(format!(
            "Id {} is out of range, expected 1 to {}",
            id,
            i32::MAX - 1
        )));
    }
    Ok(())
}

/// Unique key of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub revision_id: i32,
    pub executable_id: i32,
    pub benchmark_id: i32,
    pub environment_id: i32,
}

/// Queries by natural key and along relationships.
pub trait Lookups {
    fn project_by_name(&self, name: &str) -> Result<Option<Project>, ApiError>;
    fn environment_by_name(&self, name: &str) -> Result<Option<Environment>, ApiError>;
    fn branch_by_name(&self, project_id: i32, name: &str) -> Result<Option<Branch>, ApiError>;
    fn executable_by_name(&self, project_id: i32, name: &str)
        -> Result<Option<Executable>, ApiError>;
    fn benchmark_by_name(&self, name: &str) -> Result<Option<Benchmark>, ApiError>;
    fn revision_by_commitid(
        &self,
        branch_id: i32,
        commitid: &str,
    ) -> Result<Option<Revision>, ApiError>;
    fn result_by_key(&self, key: ResultKey) -> Result<Option<BenchmarkResult>, ApiError>;
    fn report_by_key(
        &self,
        revision_id: i32,
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Option<Report>, ApiError>;
    fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;

    /// Revisions on a branch, newest first, optionally only those dated
    /// strictly before `before`.
    fn revisions_on_branch(
        &self,
        branch_id: i32,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> Result<Vec<Revision>, ApiError>;

    fn results_for_revisions(
        &self,
        revision_ids: &[i32],
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Vec<BenchmarkResult>, ApiError>;
}

pub trait Store:
    Table<Project>
    + Table<Environment>
    + Table<Branch>
    + Table<Revision>
    + Table<Executable>
    + Table<Benchmark>
    + Table<BenchmarkResult>
    + Table<Report>
    + Table<User>
    + Lookups
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: Table<Project>
        + Table<Environment>
        + Table<Branch>
        + Table<Revision>
        + Table<Executable>
        + Table<Benchmark>
        + Table<BenchmarkResult>
        + Table<Report>
        + Table<User>
        + Lookups
        + Send
        + Sync
{
}
