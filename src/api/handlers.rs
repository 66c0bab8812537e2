//! HTTP request handlers

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiResult;
use crate::error::LokalisointiError;
use crate::resolution::QueryParams;
use crate::serving::{format_http_date, parse_http_date, FileResponse};
use crate::service::LokalisointiService;
use crate::types::{
    CopyRequest, Environment, Localisation, LocalisationOverride, MassUpdateResult, OverrideId,
    Status, UiConfig,
};

/// Shared state of the handlers
pub type AppState = Arc<LokalisointiService>;

/// Header carrying the user authenticated by the fronting proxy
pub const USER_HEADER: &str = "x-user";
pub const ANONYMOUS: &str = "anonymous";

fn user_of(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub async fn health(State(service): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "environment": service.config().env_name,
        "findCache": service.base().cache().stats(),
    }))
}

/// Query string of the localisation query
#[derive(Debug, Default, Deserialize)]
pub struct LocalisationQuery {
    pub id: Option<OverrideId>,
    pub category: Option<String>,
    pub namespace: Option<String>,
    pub key: Option<String>,
    pub locale: Option<String>,
    pub cache: Option<bool>,
}

pub async fn query_localisations(
    State(service): State<AppState>,
    Query(query): Query<LocalisationQuery>,
) -> ApiResult<Response> {
    let params = QueryParams {
        id: query.id,
        category: query.category,
        namespace: query.namespace,
        locale: query.locale,
        key: query.key,
    };
    let localisations = service.resolution().query(&params).await?;
    let directive = service.query_cache_directive(query.cache.unwrap_or(true));

    Ok((
        [(header::CACHE_CONTROL, header_value(&directive.header_value()))],
        Json(localisations),
    )
        .into_response())
}

pub async fn update_localisations(
    State(service): State<AppState>,
    headers: HeaderMap,
    Json(batch): Json<Vec<Localisation>>,
) -> ApiResult<Json<MassUpdateResult>> {
    let user = user_of(&headers);
    Ok(Json(service.update_localisations(&batch, &user).await?))
}

pub async fn list_overrides(
    State(service): State<AppState>,
) -> ApiResult<Json<Vec<LocalisationOverride>>> {
    Ok(Json(service.resolution().find_overrides()?))
}

pub async fn create_override(
    State(service): State<AppState>,
    headers: HeaderMap,
    Json(localisation): Json<Localisation>,
) -> ApiResult<Json<LocalisationOverride>> {
    let user = user_of(&headers);
    Ok(Json(service.resolution().save_override(&localisation, &user)?))
}

pub async fn update_override(
    State(service): State<AppState>,
    Path(id): Path<OverrideId>,
    headers: HeaderMap,
    Json(localisation): Json<Localisation>,
) -> ApiResult<Json<LocalisationOverride>> {
    let user = user_of(&headers);
    Ok(Json(
        service
            .resolution()
            .update_override(id, &localisation, &user)?,
    ))
}

pub async fn delete_override(
    State(service): State<AppState>,
    Path(id): Path<OverrideId>,
) -> ApiResult<Json<Status>> {
    service.resolution().delete_override(id)?;
    Ok(Json(Status::ok()))
}

pub async fn override_namespaces(
    State(service): State<AppState>,
) -> ApiResult<Json<BTreeSet<String>>> {
    Ok(Json(service.override_namespaces().await?))
}

pub async fn copy_localisations(
    State(service): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CopyRequest>,
) -> impl IntoResponse {
    tracing::info!(
        "Copy from {} requested by {}",
        request.source,
        user_of(&headers)
    );
    let status = service.sync().copy_status(&request).await;
    let code = if status == Status::ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (code, Json(status))
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceQuery {
    pub source: Option<String>,
}

pub async fn copy_available_namespaces(
    State(service): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> ApiResult<Json<BTreeSet<String>>> {
    let source = query
        .source
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Environment>())
        .transpose()
        .map_err(LokalisointiError::Validation)?;
    Ok(Json(service.sync().available_namespaces(source).await?))
}

/// `namespaces` may repeat, so the query is read as raw pairs
pub async fn localisation_files(
    State(service): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let namespaces: Vec<String> = pairs
        .into_iter()
        .filter(|(name, _)| name == "namespaces")
        .flat_map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect();

    let archive = service.sync().export_archive(Some(namespaces.as_slice())).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=localisations.zip"),
            ),
        ],
        archive,
    )
        .into_response())
}

pub async fn ui_config(State(service): State<AppState>) -> Json<UiConfig> {
    Json(service.ui_config())
}

pub async fn root_file(
    State(service): State<AppState>,
    Path((slug, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    serve_file(&service, &slug, None, &file, &headers).await
}

pub async fn namespace_file(
    State(service): State<AppState>,
    Path((slug, namespace, file)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    serve_file(&service, &slug, Some(&namespace), &file, &headers).await
}

async fn serve_file(
    service: &LokalisointiService,
    slug: &str,
    namespace: Option<&str>,
    file: &str,
    headers: &HeaderMap,
) -> Response {
    let Some(locale) = file.strip_suffix(".json").filter(|l| !l.is_empty()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    let if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    let serving = service.serving();
    let cache_control = header_value(&serving.cache_directive().header_value());

    match serving
        .get_file(slug, namespace, locale, if_none_match, if_modified_since)
        .await
    {
        Ok(FileResponse::Fresh {
            content,
            etag,
            last_modified,
        }) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(
                header::CONTENT_DISPOSITION,
                header_value(&format!("attachment; filename={}.json", locale)),
            )
            .header(header::ETAG, header_value(&etag))
            .header(
                header::LAST_MODIFIED,
                header_value(&format_http_date(&last_modified)),
            )
            .header(header::CACHE_CONTROL, cache_control)
            .body(Body::from(content))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Ok(FileResponse::NotModified {
            etag,
            last_modified,
        }) => Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, header_value(&etag))
            .header(
                header::LAST_MODIFIED,
                header_value(&format_http_date(&last_modified)),
            )
            .header(header::CACHE_CONTROL, cache_control)
            .body(Body::empty())
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Ok(FileResponse::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
