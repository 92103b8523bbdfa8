pub mod folder_commands;
pub mod settings_commands;
pub mod tree_commands;

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql::{Context, EmptySubscription, MergedObject, Schema};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};

use crate::services::settings_service;
use crate::state::AppState;

use folder_commands::{FolderMutation, FolderQuery};
use settings_commands::{SettingsMutation, SettingsQuery};
use tree_commands::{TreeMutation, TreeQuery};

#[derive(MergedObject, Default)]
pub struct QueryRoot(FolderQuery, TreeQuery, SettingsQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(FolderMutation, TreeMutation, SettingsMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(state: Arc<AppState>) -> AppSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(state)
        .finish()
}

pub(crate) fn app_state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Arc<AppState>> {
    ctx.data::<Arc<AppState>>()
}

/// Appends to the persisted activity log. Failures are logged, never fatal.
pub(crate) fn record_activity(state: &AppState, action: &str, node_id: Option<&str>, details: Option<&str>) {
    let conn = state.db();
    if let Err(err) = settings_service::log_activity(&conn, action, node_id, details) {
        tracing::warn!(%err, action, "failed to record activity");
    }
}

async fn graphql_handler(
    State(schema): State<AppSchema>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(schema.execute(request).await)
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health() -> &'static str {
    "FolderTree PRO backend is running"
}

pub fn router(schema: AppSchema) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/graphql", get(graphiql).post(graphql_handler))
        .with_state(schema)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn schema() -> (AppSchema, Arc<AppState>) {
        let state = Arc::new(crate::state::test_state());
        (build_schema(state.clone()), state)
    }

    pub async fn run(schema: &AppSchema, query: &str) -> serde_json::Value {
        let response = schema.execute(query).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.into_json().unwrap()
    }

    pub async fn run_err(schema: &AppSchema, query: &str) -> String {
        let response = schema.execute(query).await;
        assert!(!response.errors.is_empty(), "expected an error for {query}");
        response.errors[0].message.clone()
    }
}
