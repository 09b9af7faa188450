//! `ghostwriter_project`: look up a project by its codename.

use super::{required_str, DataSource};
use crate::client::{null_as_default, GhostwriterClient};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const QUERY_PROJECT: &str = r#"query Project ($name: String) {
    project(where: {codename: {_eq: $name}}) {
        id, clientId, operatorId, projectTypeId, codename, complete, startDate, startTime, endDate, endTime, timezone, note, slackChannel
    }
}"#;

/// Resolves a project codename to the project's details.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDataSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRow {
    id: i64,
    client_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    operator_id: i64,
    project_type_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    complete: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    start_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    start_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    end_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    end_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    timezone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    slack_channel: String,
}

#[derive(Debug, Deserialize)]
struct QueryProject {
    #[serde(default)]
    project: Vec<ProjectRow>,
}

#[derive(Debug, Serialize)]
struct ProjectState {
    id: i64,
    code_name: String,
    client_id: i64,
    project_type_id: i64,
    operator_id: i64,
    complete: bool,
    start_date: String,
    start_time: String,
    end_date: String,
    end_time: String,
    timezone: String,
    note: String,
    slack_channel: String,
}

impl ProjectState {
    fn from_row(code_name: &str, row: ProjectRow) -> Self {
        Self {
            id: row.id,
            code_name: code_name.to_string(),
            client_id: row.client_id,
            project_type_id: row.project_type_id,
            operator_id: row.operator_id,
            complete: row.complete,
            start_date: row.start_date,
            start_time: row.start_time,
            end_date: row.end_date,
            end_time: row.end_time,
            timezone: row.timezone,
            note: row.note,
            slack_channel: row.slack_channel,
        }
    }
}

#[async_trait::async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_project"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Search an existing project in Ghostwriter.")
            .with_attribute(
                "code_name",
                Attribute::required_string().with_description("The codename of the project."),
            )
            .with_attribute(
                "id",
                Attribute::computed_int64().with_description("The identifier of the project."),
            )
            .with_attribute(
                "client_id",
                Attribute::computed_int64().with_description("The client the project belongs to."),
            )
            .with_attribute(
                "project_type_id",
                Attribute::computed_int64().with_description("The type of the project."),
            )
            .with_attribute(
                "operator_id",
                Attribute::computed_int64()
                    .with_description("The operator who created the project."),
            )
            .with_attribute(
                "complete",
                Attribute::computed_bool().with_description("Whether the project is complete."),
            )
            .with_attribute(
                "start_date",
                Attribute::computed_string().with_description("The start date of the project."),
            )
            .with_attribute(
                "start_time",
                Attribute::computed_string().with_description("The daily start time."),
            )
            .with_attribute(
                "end_date",
                Attribute::computed_string().with_description("The end date of the project."),
            )
            .with_attribute(
                "end_time",
                Attribute::computed_string().with_description("The daily end time."),
            )
            .with_attribute(
                "timezone",
                Attribute::computed_string().with_description("The timezone of the project."),
            )
            .with_attribute(
                "note",
                Attribute::computed_string().with_description("Notes about the project."),
            )
            .with_attribute(
                "slack_channel",
                Attribute::computed_string()
                    .with_description("The Slack channel used for project notifications."),
            )
    }

    async fn read(&self, client: &GhostwriterClient, config: Value) -> Result<Value, ProviderError> {
        let code_name = required_str(&config, "code_name")?;
        debug!(code_name, "Looking up project");

        let data: QueryProject = client
            .execute(QUERY_PROJECT, json!({ "name": code_name }))
            .await?;

        let mut rows = data.project;
        if rows.len() != 1 {
            return Err(ProviderError::NotFound(
                "Project not found or multiple projects found with the same name.".to_string(),
            ));
        }
        let state = rows
            .pop()
            .map(|row| ProjectState::from_row(code_name, row))
            .ok_or_else(|| ProviderError::InvalidResponse("project row vanished".to_string()))?;

        Ok(serde_json::to_value(state)?)
    }
}
