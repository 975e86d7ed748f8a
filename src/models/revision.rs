use super::{required, ApiResource, Branch, Entity, Project, ResourceRef};
use crate::api_error::ApiError;
use crate::schema::revisions;
use crate::store::Store;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Revision {
    pub id: i32,
    pub commitid: String,
    pub tag: String,
    pub date: NaiveDateTime,
    pub message: String,
    pub author: String,
    pub project_id: i32,
    pub branch_id: i32,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "revisions"]
pub struct NewRevision {
    pub commitid: String,
    pub tag: String,
    pub date: NaiveDateTime,
    pub message: String,
    pub author: String,
    pub project_id: i32,
    pub branch_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct RevisionInput {
    pub commitid: String,
    #[serde(default)]
    pub tag: String,
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    pub project: ResourceRef,
    pub branch: ResourceRef,
}

impl NewRevision {
    pub fn on_branch(branch: &Branch, commitid: &str, date: NaiveDateTime) -> NewRevision {
        NewRevision {
            commitid: commitid.to_string(),
            tag: String::new(),
            date,
            message: String::new(),
            author: String::new(),
            project_id: branch.project_id,
            branch_id: branch.id,
        }
    }
}

impl Entity for Revision {
    const RESOURCE: &'static str = "revision";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] =
        &[("project_id", "project"), ("branch_id", "branch")];

    type New = NewRevision;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Revision {
    type Input = RevisionInput;

    fn hydrate(store: &dyn Store, input: RevisionInput) -> Result<NewRevision, ApiError> {
        let project: Project = input.project.resolve(store)?;
        let branch: Branch = input.branch.resolve(store)?;
        if branch.project_id != project.id {
            return Err(ApiError::bad_request(format!(
                "Branch \"{}\" does not belong to project \"{}\"",
                branch.name, project.name
            )));
        }

        Ok(NewRevision {
            commitid: required("commitid", input.commitid)?,
            tag: input.tag,
            date: input.date.unwrap_or_else(|| Utc::now().naive_utc()),
            message: input.message,
            author: input.author,
            project_id: project.id,
            branch_id: branch.id,
        })
    }
}
