use async_graphql::{Context, Object};

use crate::commands::{app_state, record_activity};
use crate::models::filter::FilterInput;
use crate::models::settings::{ActivityEntry, SearchPreset, Theme, UiSettings};
use crate::services::settings_service;

#[derive(Default)]
pub struct SettingsQuery;

#[Object]
impl SettingsQuery {
    async fn theme(&self, ctx: &Context<'_>) -> async_graphql::Result<Theme> {
        Ok(settings_service::get_theme(&app_state(ctx)?.db())?)
    }

    async fn favorites(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<String>> {
        let favorites = settings_service::get_favorites(&app_state(ctx)?.db())?;
        Ok(favorites.into_iter().collect())
    }

    /// Newest first.
    async fn activity(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<ActivityEntry>> {
        Ok(settings_service::get_activity(&app_state(ctx)?.db())?)
    }

    async fn settings(&self, ctx: &Context<'_>) -> async_graphql::Result<UiSettings> {
        Ok(settings_service::get_settings(&app_state(ctx)?.db())?)
    }

    async fn presets(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<SearchPreset>> {
        Ok(settings_service::get_presets(&app_state(ctx)?.db())?)
    }
}

#[derive(Default)]
pub struct SettingsMutation;

#[Object]
impl SettingsMutation {
    async fn set_theme(&self, ctx: &Context<'_>, theme: Theme) -> async_graphql::Result<Theme> {
        Ok(settings_service::set_theme(&app_state(ctx)?.db(), theme)?)
    }

    /// Returns whether `id` is a favorite after the toggle.
    async fn toggle_favorite(&self, ctx: &Context<'_>, id: String) -> async_graphql::Result<bool> {
        let state = app_state(ctx)?;
        let favorite = settings_service::toggle_favorite(&state.db(), &id)?;
        let details = if favorite { "Added to favorites" } else { "Removed from favorites" };
        record_activity(state, "favorite", Some(&id), Some(details));
        Ok(favorite)
    }

    async fn clear_activity(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        settings_service::clear_activity(&app_state(ctx)?.db())?;
        Ok(true)
    }

    async fn save_settings(&self, ctx: &Context<'_>, settings: UiSettings) -> async_graphql::Result<UiSettings> {
        settings_service::save_settings(&app_state(ctx)?.db(), &settings)?;
        Ok(settings)
    }

    async fn reset_settings(&self, ctx: &Context<'_>) -> async_graphql::Result<UiSettings> {
        Ok(settings_service::reset_settings(&app_state(ctx)?.db())?)
    }

    async fn save_preset(
        &self,
        ctx: &Context<'_>,
        name: String,
        filters: FilterInput,
    ) -> async_graphql::Result<Vec<SearchPreset>> {
        Ok(settings_service::save_preset(&app_state(ctx)?.db(), &name, filters.into())?)
    }

    async fn delete_preset(&self, ctx: &Context<'_>, name: String) -> async_graphql::Result<bool> {
        Ok(settings_service::delete_preset(&app_state(ctx)?.db(), &name)?)
    }
}
