use super::{check_explicit_id, Lookups, ResultKey, Table};
use crate::api_error::ApiError;
use crate::db;
use crate::models::*;
use crate::schema::*;
use chrono::NaiveDateTime;
use diesel::prelude::*;

/// Postgres-backed store on top of the shared connection pool in [`db`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DieselStore;

impl DieselStore {
    /// Runs pending migrations and returns the store.
    pub fn connect() -> Result<DieselStore, ApiError> {
        db::init()?;
        Ok(DieselStore)
    }
}

/// Moves a serial sequence past ids inserted explicitly.
fn bump_sequence(conn: &PgConnection, table: &str) -> Result<(), ApiError> {
    diesel::sql_query(format!(
        "SELECT setval(pg_get_serial_sequence('{0}', 'id'), (SELECT MAX(id) FROM {0}))",
        table
    ))
    .execute(conn)?;
    Ok(())
}

macro_rules! diesel_table {
    ($entity:ty, $new:ty, $table:ident) => {
        impl Table<$entity> for DieselStore {
            fn insert(&self, new: $new) -> Result<$entity, ApiError> {
                let conn = db::connection()?;

                let row = diesel::insert_into($table::table)
                    .values(&new)
                    .get_result(&conn)?;

                Ok(row)
            }

            fn insert_with_id(&self, id: i32, new: $new) -> Result<$entity, ApiError> {
                check_explicit_id(id)?;
                let conn = db::connection()?;

                let row = conn.transaction::<_, ApiError, _>(|| {
                    let row = diesel::insert_into($table::table)
                        .values(($table::id.eq(id), &new))
                        .get_result(&conn)?;
                    bump_sequence(&conn, stringify!($table))?;
                    Ok(row)
                })?;

                Ok(row)
            }

            fn load(&self, id: i32) -> Result<Option<$entity>, ApiError> {
                let conn = db::connection()?;

                let row = $table::table.find(id).first(&conn).optional()?;

                Ok(row)
            }

            fn select(&self, limit: Option<i64>, offset: i64) -> Result<Vec<$entity>, ApiError> {
                let conn = db::connection()?;

                let mut query = $table::table
                    .order($table::id.asc())
                    .offset(offset)
                    .into_boxed();
                if let Some(limit) = limit {
                    query = query.limit(limit);
                }

                Ok(query.load(&conn)?)
            }

            fn count(&self) -> Result<i64, ApiError> {
                let conn = db::connection()?;

                Ok($table::table.count().get_result(&conn)?)
            }

            fn update(&self, id: i32, new: $new) -> Result<Option<$entity>, ApiError> {
                let conn = db::connection()?;

                let row = diesel::update($table::table.find(id))
                    .set(&new)
                    .get_result(&conn)
                    .optional()?;

                Ok(row)
            }

            fn delete(&self, id: i32) -> Result<bool, ApiError> {
                let conn = db::connection()?;

                let res = diesel::delete($table::table.find(id)).execute(&conn)?;

                Ok(res > 0)
            }
        }
    };
}

diesel_table!(Project, NewProject, projects);
diesel_table!(Environment, NewEnvironment, environments);
diesel_table!(Branch, NewBranch, branches);
diesel_table!(Revision, NewRevision, revisions);
diesel_table!(Executable, NewExecutable, executables);
diesel_table!(Benchmark, NewBenchmark, benchmarks);
diesel_table!(BenchmarkResult, NewBenchmarkResult, results);
diesel_table!(Report, NewReport, reports);
diesel_table!(User, NewUser, users);

impl Lookups for DieselStore {
    fn project_by_name(&self, name: &str) -> Result<Option<Project>, ApiError> {
        let conn = db::connection()?;

        Ok(projects::table
            .filter(projects::name.eq(name))
            .first(&conn)
            .optional()?)
    }

    fn environment_by_name(&self, name: &str) -> Result<Option<Environment>, ApiError> {
        let conn = db::connection()?;

        Ok(environments::table
            .filter(environments::name.eq(name))
            .first(&conn)
            .optional()?)
    }

    fn branch_by_name(&self, project_id: i32, name: &str) -> Result<Option<Branch>, ApiError> {
        let conn = db::connection()?;

        Ok(branches::table
            .filter(branches::project_id.eq(project_id))
            .filter(branches::name.eq(name))
            .first(&conn)
            .optional()?)
    }

    fn executable_by_name(
        &self,
        project_id: i32,
        name: &str,
    ) -> Result<Option<Executable>, ApiError> {
        let conn = db::connection()?;

        Ok(executables::table
            .filter(executables::project_id.eq(project_id))
            .filter(executables::name.eq(name))
            .first(&conn)
            .optional()?)
    }

    fn benchmark_by_name(&self, name: &str) -> Result<Option<Benchmark>, ApiError> {
        let conn = db::connection()?;

        Ok(benchmarks::table
            .filter(benchmarks::name.eq(name))
            .first(&conn)
            .optional()?)
    }

    fn revision_by_commitid(
        &self,
        branch_id: i32,
        commitid: &str,
    ) -> Result<Option<Revision>, ApiError> {
        let conn = db::connection()?;

        Ok(revisions::table
            .filter(revisions::branch_id.eq(branch_id))
            .filter(revisions::commitid.eq(commitid))
            .first(&conn)
            .optional()?)
    }

    fn result_by_key(&self, key: ResultKey) -> Result<Option<BenchmarkResult>, ApiError> {
        let conn = db::connection()?;

        Ok(results::table
            .filter(results::revision_id.eq(key.revision_id))
            .filter(results::executable_id.eq(key.executable_id))
            .filter(results::benchmark_id.eq(key.benchmark_id))
            .filter(results::environment_id.eq(key.environment_id))
            .first(&conn)
            .optional()?)
    }

    fn report_by_key(
        &self,
        revision_id: i32,
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Option<Report>, ApiError> {
        let conn = db::connection()?;

        Ok(reports::table
            .filter(reports::revision_id.eq(revision_id))
            .filter(reports::executable_id.eq(executable_id))
            .filter(reports::environment_id.eq(environment_id))
            .first(&conn)
            .optional()?)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let conn = db::connection()?;

        Ok(users::table
            .filter(users::username.eq(username))
            .first(&conn)
            .optional()?)
    }

    fn revisions_on_branch(
        &self,
        branch_id: i32,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> Result<Vec<Revision>, ApiError> {
        let conn = db::connection()?;

        let mut query = revisions::table
            .filter(revisions::branch_id.eq(branch_id))
            .into_boxed();
        if let Some(before) = before {
            query = query.filter(revisions::date.lt(before));
        }

        Ok(query
            .order((revisions::date.desc(), revisions::id.desc()))
            .limit(limit)
            .load(&conn)?)
    }

    fn results_for_revisions(
        &self,
        revision_ids: &[i32],
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Vec<BenchmarkResult>, ApiError> {
        let conn = db::connection()?;

        Ok(results::table
            .filter(results::revision_id.eq_any(revision_ids.to_vec()))
            .filter(results::executable_id.eq(executable_id))
            .filter(results::environment_id.eq(environment_id))
            .load(&conn)?)
    }
}
