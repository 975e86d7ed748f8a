use super::{check_explicit_id, Lookups, ResultKey, Table};
use crate::api_error::ApiError;
use crate::models::*;
use chrono::NaiveDateTime;
use std::collections::btree_map::{BTreeMap, Values};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct Rows<E> {
    next_id: i32,
    rows: BTreeMap<i32, E>,
}

impl<E> Default for Rows<E> {
    fn default() -> Self {
        Rows {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<E> Rows<E> {
    fn values(&self) -> Values<'_, i32, E> {
        self.rows.values()
    }
}

#[derive(Debug, Default)]
pub struct Data {
    projects: Rows<Project>,
    environments: Rows<Environment>,
    branches: Rows<Branch>,
    revisions: Rows<Revision>,
    executables: Rows<Executable>,
    benchmarks: Rows<Benchmark>,
    results: Rows<BenchmarkResult>,
    reports: Rows<Report>,
    users: Rows<User>,
}

/// Store kept in process memory. Used for tests and when no database is
/// configured; everything is lost on restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    conn: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<MutexGuard<'_, Data>, ApiError> {
        self.conn
            .lock()
            .map_err(|_| ApiError::new(500, "memory store lock poisoned".to_string()))
    }

    /// Leaves the store unusable, every later call fails with a 500.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let conn = Arc::clone(&self.conn);
        let _ = std::thread::spawn(move || {
            let _data = conn.lock();
            panic!("poisoning memory store");
        })
        .join();
    }
}

/// Per-entity glue for the in-memory tables.
pub trait MemoryEntity: Entity {
    fn rows(data: &mut Data) -> &mut Rows<Self>;

    fn build(id: i32, new: Self::New) -> Self;

    /// Values that must be unique across the table, one string per constraint.
    fn unique_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Removes or detaches rows referencing the deleted row.
    fn cascade(_data: &mut Data, _id: i32) {}
}

fn check_unique<E: MemoryEntity>(rows: &Rows<E>, candidate: &E) -> Result<(), ApiError> {
    let keys = candidate.unique_keys();
    for row in rows.values().filter(|row| row.id() != candidate.id()) {
        if let Some(key) = row.unique_keys().into_iter().find(|k| keys.contains(k)) {
            return Err(ApiError::new(
                409,
                format!("duplicate key value violates unique constraint: {}", key),
            ));
        }
    }
    Ok(())
}

impl<E: MemoryEntity> Table<E> for MemoryStore {
    fn insert(&self, new: E::New) -> Result<E, ApiError> {
        let mut data = self.data()?;
        let id = E::rows(&mut data).next_id;
        self.insert_with_id_locked(&mut data, id, new)
    }

    fn insert_with_id(&self, id: i32, new: E::New) -> Result<E, ApiError> {
        check_explicit_id(id)?;
        let mut data = self.data()?;
        if E::rows(&mut data).rows.contains_key(&id) {
            return Err(ApiError::new(
                409,
                format!("{} {} already exists", E::RESOURCE, id),
            ));
        }
        self.insert_with_id_locked(&mut data, id, new)
    }

    fn load(&self, id: i32) -> Result<Option<E>, ApiError> {
        let mut data = self.data()?;
        Ok(E::rows(&mut data).rows.get(&id).cloned())
    }

    fn select(&self, limit: Option<i64>, offset: i64) -> Result<Vec<E>, ApiError> {
        let mut data = self.data()?;
        let rows = E::rows(&mut data).values().skip(offset.max(0) as usize);
        Ok(match limit {
            Some(limit) => rows.take(limit.max(0) as usize).cloned().collect(),
            None => rows.cloned().collect(),
        })
    }

    fn count(&self) -> Result<i64, ApiError> {
        let mut data = self.data()?;
        Ok(E::rows(&mut data).rows.len() as i64)
    }

    fn update(&self, id: i32, new: E::New) -> Result<Option<E>, ApiError> {
        let mut data = self.data()?;
        let rows = E::rows(&mut data);
        if !rows.rows.contains_key(&id) {
            return Ok(None);
        }
        let row = E::build(id, new);
        check_unique(rows, &row)?;
        rows.rows.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete(&self, id: i32) -> Result<bool, ApiError> {
        let mut data = self.data()?;
        if E::rows(&mut data).rows.remove(&id).is_none() {
            return Ok(false);
        }
        E::cascade(&mut data, id);
        Ok(true)
    }
}

impl MemoryStore {
    fn insert_with_id_locked<E: MemoryEntity>(
        &self,
        data: &mut Data,
        id: i32,
        new: E::New,
    ) -> Result<E, ApiError> {
        let rows = E::rows(data);
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| ApiError::new(500, format!("{} ids are exhausted", E::RESOURCE)))?;
        let row = E::build(id, new);
        check_unique(rows, &row)?;
        rows.rows.insert(id, row.clone());
        rows.next_id = rows.next_id.max(next_id);
        Ok(row)
    }
}

impl MemoryEntity for Project {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.projects
    }

    fn build(id: i32, new: NewProject) -> Self {
        Project {
            id,
            name: new.name,
            repo_type: new.repo_type,
            repo_path: new.repo_path,
            repo_user: new.repo_user,
            repo_pass: new.repo_pass,
            commit_browsing_url: new.commit_browsing_url,
            track: new.track,
            default_branch: new.default_branch,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("name={}", self.name)]
    }

    fn cascade(data: &mut Data, id: i32) {
        let branches: Vec<i32> = data
            .branches
            .values()
            .filter(|b| b.project_id == id)
            .map(|b| b.id)
            .collect();
        for branch in branches {
            data.branches.rows.remove(&branch);
            Branch::cascade(data, branch);
        }
        let executables: Vec<i32> = data
            .executables
            .values()
            .filter(|e| e.project_id == id)
            .map(|e| e.id)
            .collect();
        for executable in executables {
            data.executables.rows.remove(&executable);
            Executable::cascade(data, executable);
        }
    }
}

impl MemoryEntity for Environment {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.environments
    }

    fn build(id: i32, new: NewEnvironment) -> Self {
        Environment {
            id,
            name: new.name,
            cpu: new.cpu,
            memory: new.memory,
            os: new.os,
            kernel: new.kernel,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("name={}", self.name)]
    }

    fn cascade(data: &mut Data, id: i32) {
        data.results.rows.retain(|_, r| r.environment_id != id);
        data.reports.rows.retain(|_, r| r.environment_id != id);
    }
}

impl MemoryEntity for Branch {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.branches
    }

    fn build(id: i32, new: NewBranch) -> Self {
        Branch {
            id,
            name: new.name,
            project_id: new.project_id,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("name={},project={}", self.name, self.project_id)]
    }

    fn cascade(data: &mut Data, id: i32) {
        let revisions: Vec<i32> = data
            .revisions
            .values()
            .filter(|r| r.branch_id == id)
            .map(|r| r.id)
            .collect();
        for revision in revisions {
            data.revisions.rows.remove(&revision);
            Revision::cascade(data, revision);
        }
    }
}

impl MemoryEntity for Revision {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.revisions
    }

    fn build(id: i32, new: NewRevision) -> Self {
        Revision {
            id,
            commitid: new.commitid,
            tag: new.tag,
            date: new.date,
            message: new.message,
            author: new.author,
            project_id: new.project_id,
            branch_id: new.branch_id,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("commitid={},branch={}", self.commitid, self.branch_id)]
    }

    fn cascade(data: &mut Data, id: i32) {
        data.results.rows.retain(|_, r| r.revision_id != id);
        data.reports.rows.retain(|_, r| r.revision_id != id);
    }
}

impl MemoryEntity for Executable {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.executables
    }

    fn build(id: i32, new: NewExecutable) -> Self {
        Executable {
            id,
            name: new.name,
            description: new.description,
            project_id: new.project_id,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("name={},project={}", self.name, self.project_id)]
    }

    fn cascade(data: &mut Data, id: i32) {
        data.results.rows.retain(|_, r| r.executable_id != id);
        data.reports.rows.retain(|_, r| r.executable_id != id);
    }
}

impl MemoryEntity for Benchmark {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.benchmarks
    }

    fn build(id: i32, new: NewBenchmark) -> Self {
        Benchmark {
            id,
            name: new.name,
            parent_id: new.parent_id,
            benchmark_type: new.benchmark_type,
            data_type: new.data_type,
            description: new.description,
            units_title: new.units_title,
            units: new.units,
            lessisbetter: new.lessisbetter,
            default_on_changes: new.default_on_changes,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!("name={}", self.name)]
    }

    fn cascade(data: &mut Data, id: i32) {
        data.results.rows.retain(|_, r| r.benchmark_id != id);
        for child in data.benchmarks.rows.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
    }
}

impl MemoryEntity for BenchmarkResult {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.results
    }

    fn build(id: i32, new: NewBenchmarkResult) -> Self {
        BenchmarkResult {
            id,
            value: new.value,
            std_dev: new.std_dev,
            val_min: new.val_min,
            val_max: new.val_max,
            date: new.date,
            revision_id: new.revision_id,
            executable_id: new.executable_id,
            benchmark_id: new.benchmark_id,
            environment_id: new.environment_id,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!(
            "revision={},executable={},benchmark={},environment={}",
            self.revision_id, self.executable_id, self.benchmark_id, self.environment_id
        )]
    }
}

impl MemoryEntity for Report {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.reports
    }

    fn build(id: i32, new: NewReport) -> Self {
        Report {
            id,
            revision_id: new.revision_id,
            environment_id: new.environment_id,
            executable_id: new.executable_id,
            summary: new.summary,
            colorcode: new.colorcode,
            updated_at: new.updated_at,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![format!(
            "revision={},executable={},environment={}",
            self.revision_id, self.executable_id, self.environment_id
        )]
    }
}

impl MemoryEntity for User {
    fn rows(data: &mut Data) -> &mut Rows<Self> {
        &mut data.users
    }

    fn build(id: i32, new: NewUser) -> Self {
        User {
            id,
            username: new.username,
            email: new.email,
            password: new.password,
            api_key: new.api_key,
            created_at: new.created_at,
        }
    }

    fn unique_keys(&self) -> Vec<String> {
        vec![
            format!("username={}", self.username),
            format!("api_key={}", self.api_key),
        ]
    }
}

impl Lookups for MemoryStore {
    fn project_by_name(&self, name: &str) -> Result<Option<Project>, ApiError> {
        let data = self.data()?;
        Ok(data.projects.values().find(|p| p.name == name).cloned())
    }

    fn environment_by_name(&self, name: &str) -> Result<Option<Environment>, ApiError> {
        let data = self.data()?;
        Ok(data.environments.values().find(|e| e.name == name).cloned())
    }

    fn branch_by_name(&self, project_id: i32, name: &str) -> Result<Option<Branch>, ApiError> {
        let data = self.data()?;
        Ok(data
            .branches
            .values()
            .find(|b| b.project_id == project_id && b.name == name)
            .cloned())
    }

    fn executable_by_name(
        &self,
        project_id: i32,
        name: &str,
    ) -> Result<Option<Executable>, ApiError> {
        let data = self.data()?;
        Ok(data
            .executables
            .values()
            .find(|e| e.project_id == project_id && e.name == name)
            .cloned())
    }

    fn benchmark_by_name(&self, name: &str) -> Result<Option<Benchmark>, ApiError> {
        let data = self.data()?;
        Ok(data.benchmarks.values().find(|b| b.name == name).cloned())
    }

    fn revision_by_commitid(
        &self,
        branch_id: i32,
        commitid: &str,
    ) -> Result<Option<Revision>, ApiError> {
        let data = self.data()?;
        Ok(data
            .revisions
            .values()
            .find(|r| r.branch_id == branch_id && r.commitid == commitid)
            .cloned())
    }

    fn result_by_key(&self, key: ResultKey) -> Result<Option<BenchmarkResult>, ApiError> {
        let data = self.data()?;
        Ok(data.results.values().find(|r| r.key() == key).cloned())
    }

    fn report_by_key(
        &self,
        revision_id: i32,
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Option<Report>, ApiError> {
        let data = self.data()?;
        Ok(data
            .reports
            .values()
            .find(|r| {
                r.revision_id == revision_id
                    && r.executable_id == executable_id
                    && r.environment_id == environment_id
            })
            .cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let data = self.data()?;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    fn revisions_on_branch(
        &self,
        branch_id: i32,
        before: Option<NaiveDateTime>,
        limit: i64,
    ) -> Result<Vec<Revision>, ApiError> {
        let data = self.data()?;
        let mut revisions: Vec<Revision> = data
            .revisions
            .values()
            .filter(|r| r.branch_id == branch_id)
            .filter(|r| before.map_or(true, |before| r.date < before))
            .cloned()
            .collect();
        revisions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        revisions.truncate(limit.max(0) as usize);
        Ok(revisions)
    }

    fn results_for_revisions(
        &self,
        revision_ids: &[i32],
        executable_id: i32,
        environment_id: i32,
    ) -> Result<Vec<BenchmarkResult>, ApiError> {
        let data = self.data()?;
        Ok(data
            .results
            .values()
            .filter(|r| revision_ids.contains(&r.revision_id))
            .filter(|r| r.executable_id == executable_id && r.environment_id == environment_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let a = Table::<Environment>::insert(&store, NewEnvironment::named("a")).unwrap();
        assert!(Table::<Environment>::delete(&store, a.id).unwrap());
        let b = Table::<Environment>::insert(&store, NewEnvironment::named("b")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn unique_names_are_enforced() {
        let store = MemoryStore::new();
        Table::<Environment>::insert(&store, NewEnvironment::named("Dual Core")).unwrap();
        let err =
            Table::<Environment>::insert(&store, NewEnvironment::named("Dual Core")).unwrap_err();
        assert_eq!(err.status_code, 409);
    }

    #[test]
    fn update_may_keep_its_own_unique_key() {
        let store = MemoryStore::new();
        let env = Table::<Environment>::insert(&store, NewEnvironment::named("env")).unwrap();
        let mut changed = NewEnvironment::named("env");
        changed.cpu = "z80".to_string();
        let updated = Table::<Environment>::update(&store, env.id, changed)
            .unwrap()
            .unwrap();
        assert_eq!(updated.cpu, "z80");
    }

    #[test]
    fn insert_with_id_advances_the_sequence() {
        let store = MemoryStore::new();
        Table::<Environment>::insert_with_id(&store, 5, NewEnvironment::named("five")).unwrap();
        let next = Table::<Environment>::insert(&store, NewEnvironment::named("six")).unwrap();
        assert_eq!(next.id, 6);
    }

    #[test]
    fn explicit_ids_must_be_in_range() {
        let store = MemoryStore::new();
        for id in [0, -1, i32::MAX] {
            let err = Table::<Environment>::insert_with_id(&store, id, NewEnvironment::named("x"))
                .unwrap_err();
            assert_eq!(err.status_code, 400);
        }

        let last = i32::MAX - 1;
        Table::<Environment>::insert_with_id(&store, last, NewEnvironment::named("last")).unwrap();
        let err = Table::<Environment>::insert(&store, NewEnvironment::named("next")).unwrap_err();
        assert_eq!(err.status_code, 500);
        assert_eq!(Table::<Environment>::count(&store).unwrap(), 1);
    }

    #[test]
    fn deleting_a_project_cascades() {
        let store = MemoryStore::new();
        let project = Table::<Project>::insert(&store, NewProject::named("PyPy")).unwrap();
        let branch = Table::<Branch>::insert(
            &store,
            NewBranch {
                name: "default".to_string(),
                project_id: project.id,
            },
        )
        .unwrap();
        let revision = Table::<Revision>::insert(
            &store,
            NewRevision::on_branch(&branch, "1", chrono::Utc::now().naive_utc()),
        )
        .unwrap();

        assert!(Table::<Project>::delete(&store, project.id).unwrap());
        assert!(Table::<Branch>::load(&store, branch.id).unwrap().is_none());
        assert!(Table::<Revision>::load(&store, revision.id)
            .unwrap()
            .is_none());
    }
}
