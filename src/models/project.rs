use super::{default_true, required, ApiResource, Entity};
use crate::api_error::ApiError;
use crate::schema::projects;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Version control system a project's revisions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    NoLogs,
    Git,
    Github,
    Mercurial,
    Subversion,
}

impl RepoType {
    pub fn code(self) -> &'static str {
        match self {
            RepoType::NoLogs => "N",
            RepoType::Git => "G",
            RepoType::Github => "H",
            RepoType::Mercurial => "M",
            RepoType::Subversion => "S",
        }
    }
}

impl FromStr for RepoType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(RepoType::NoLogs),
            "G" => Ok(RepoType::Git),
            "H" => Ok(RepoType::Github),
            "M" => Ok(RepoType::Mercurial),
            "S" => Ok(RepoType::Subversion),
            other => Err(ApiError::bad_request(format!(
                "Unknown repo_type \"{}\", expected one of N, G, H, M, S",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub repo_type: String,
    pub repo_path: String,
    pub repo_user: String,
    pub repo_pass: String,
    pub commit_browsing_url: String,
    pub track: bool,
    pub default_branch: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "projects"]
pub struct NewProject {
    pub name: String,
    pub repo_type: String,
    pub repo_path: String,
    pub repo_user: String,
    pub repo_pass: String,
    pub commit_browsing_url: String,
    pub track: bool,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    pub repo_type: Option<String>,
    #[serde(default)]
    pub repo_path: String,
    #[serde(default)]
    pub repo_user: String,
    #[serde(default)]
    pub repo_pass: String,
    #[serde(default)]
    pub commit_browsing_url: String,
    #[serde(default = "default_true")]
    pub track: bool,
    pub default_branch: Option<String>,
}

impl NewProject {
    /// A tracked-nothing project with every optional field at its default.
    pub fn named(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            repo_type: RepoType::NoLogs.code().to_string(),
            repo_path: String::new(),
            repo_user: String::new(),
            repo_pass: String::new(),
            commit_browsing_url: String::new(),
            track: true,
            default_branch: "default".to_string(),
        }
    }
}

impl Entity for Project {
    const RESOURCE: &'static str = "project";

    type New = NewProject;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Project {
    type Input = ProjectInput;

    fn hydrate(_store: &dyn Store, input: ProjectInput) -> Result<NewProject, ApiError> {
        let repo_type = match input.repo_type {
            Some(code) => code.parse::<RepoType>()?,
            None => RepoType::NoLogs,
        };

        Ok(NewProject {
            name: required("name", input.name)?,
            repo_type: repo_type.code().to_string(),
            repo_path: input.repo_path,
            repo_user: input.repo_user,
            repo_pass: input.repo_pass,
            commit_browsing_url: input.commit_browsing_url,
            track: input.track,
            default_branch: input
                .default_branch
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| "default".to_string()),
        })
    }
}
