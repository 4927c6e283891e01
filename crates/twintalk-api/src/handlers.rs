//! Axum handlers realizing the CRUD surface of §6. Each extracts the
//! bearer token from `Authorization`, delegates to `TwinsService`, and
//! relies on `ApiError`'s `IntoResponse` for the failure path.

use crate::dto::{CreateTwinRequest, ListQuery, PageResponse, StateResponse, TwinResponse, UpdateTwinRequest};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use twintalk_core::{Definition, TwinFilter, TwinId};

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(twintalk_core::Error::Auth("missing bearer token".to_string())))
}

pub async fn create_twin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTwinRequest>,
) -> Result<Json<TwinResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let (name, owner, metadata, definition) = body.into_definition();
    let twin = state.service.add_twin(token, owner, name, metadata, definition).await?;
    Ok(Json(twin.into()))
}

pub async fn update_twin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateTwinRequest>,
) -> Result<(), ApiError> {
    let token = bearer_token(&headers)?;
    let definition = body.attributes.map(|attributes| {
        let mut def = Definition::new(0, attributes);
        if let Some(delta_ns) = body.delta_ns {
            def = def.with_delta_ns(delta_ns);
        }
        def
    });
    state
        .service
        .update_twin(token, &TwinId::from(id), body.name, body.metadata, definition)
        .await?;
    Ok(())
}

pub async fn view_twin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TwinResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let twin = state.service.view_twin(token, &TwinId::from(id)).await?;
    Ok(Json(twin.into()))
}

pub async fn list_twins(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<TwinResponse>>, ApiError> {
    let token = bearer_token(&headers)?;
    let metadata = query.metadata_filter()?;
    let filter = TwinFilter {
        owner: query.owner,
        name: query.name,
        metadata,
    };
    let page = state
        .service
        .list_twins(token, query.offset, query.limit, filter)
        .await?;
    Ok(Json(page.into()))
}

pub async fn remove_twin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    let token = bearer_token(&headers)?;
    state.service.remove_twin(token, &TwinId::from(id)).await?;
    Ok(())
}

pub async fn list_states(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse<StateResponse>>, ApiError> {
    let token = bearer_token(&headers)?;
    let page = state
        .service
        .list_states(token, query.offset, query.limit, &TwinId::from(id))
        .await?;
    Ok(Json(page.into()))
}
