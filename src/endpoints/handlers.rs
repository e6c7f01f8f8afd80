use crate::imagery::RenderMode;
use crate::imagery::ndvi::render_legend_png;
use crate::models::{Bounds, Product};
use crate::models::observation::Marker;
use crate::server::AppState;
use crate::session::SelectOptions;
use crate::settings::SettingKey;
use crate::timeline::{ZoomDirection, nearest};
use crate::traits::Viewer;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

const LEGEND_WIDTH: u32 = 256;
const LEGEND_HEIGHT: u32 = 16;

#[derive(Serialize)]
struct CatalogResponse {
    summary: String,
    products: Vec<Product>,
}

#[derive(Deserialize)]
pub struct NearestQuery {
    time: String,
}

#[derive(Serialize)]
struct ObservationsResponse {
    status: String,
    bounds: Option<Bounds>,
    markers: Vec<Marker>,
}

#[derive(Serialize)]
struct SettingsResponse {
    summary: String,
    api: Option<String>,
    payload_saved: bool,
    token_saved: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    status: Option<String>,
    active: Option<String>,
    mode: RenderMode,
}

#[derive(Deserialize)]
pub struct ModeRequest {
    mode: RenderMode,
}

#[derive(Deserialize)]
pub struct ZoomRequest {
    direction: ZoomDirection,
}

#[derive(Deserialize)]
pub struct ClockRequest {
    time: DateTime<Utc>,
}

fn status_of(state: &AppState) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.presenter.status(),
        active: state.session.active().map(|p| p.id),
        mode: state.session.mode(),
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    status_of(&state)
}

pub async fn post_select(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.session.select_id(&id, SelectOptions::EXPLICIT).await {
        status_of(&state).into_response()
    } else {
        (StatusCode::NOT_FOUND, format!("No product with id '{}'", id)).into_response()
    }
}

pub async fn post_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> impl IntoResponse {
    state.session.set_mode(request.mode).await;
    status_of(&state)
}

pub async fn post_timeline_zoom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ZoomRequest>,
) -> impl IntoResponse {
    match state.session.zoom_timeline(request.direction) {
        Some(range) => Json(range).into_response(),
        None => (StatusCode::NOT_FOUND, "No products available.").into_response(),
    }
}

/// Move the time cursor; the selection follows when a product is close.
pub async fn post_clock(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClockRequest>,
) -> impl IntoResponse {
    state.session.viewer().set_clock(request.time);
    state.session.on_clock_tick(request.time).await;
    status_of(&state)
}

pub async fn get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let catalog = state.session.catalog();
    Json(CatalogResponse {
        summary: catalog.summary(),
        products: catalog.products().to_vec(),
    })
}

pub async fn get_nearest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearestQuery>,
) -> impl IntoResponse {
    let time = match DateTime::parse_from_rfc3339(query.time.trim()) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid time '{}': {}", query.time, e),
            )
                .into_response();
        }
    };
    let catalog = state.session.catalog();
    match nearest(&catalog, time) {
        Some(product) => Json(product.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "No products available.").into_response(),
    }
}

pub async fn get_timeline(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.timeline() {
        Some(range) => Json(range).into_response(),
        None => (StatusCode::NOT_FOUND, "No products available.").into_response(),
    }
}

pub async fn get_ndvi_legend(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ramp = state.session.imagery().ramp();
    match render_legend_png(ramp, LEGEND_WIDTH, LEGEND_HEIGHT) {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => {
            error!("Unable to render NDVI legend: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn get_observations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.observations {
        Some(set) => Json(ObservationsResponse {
            status: set.status(),
            bounds: set.bounds(),
            markers: set.markers(),
        })
        .into_response(),
        None => (StatusCode::NOT_FOUND, "No observations loaded").into_response(),
    }
}

pub async fn get_observation_article(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    match state.observations.as_ref().and_then(|set| set.article(index)) {
        Some(article) => Json(article).into_response(),
        None => (StatusCode::NOT_FOUND, "No such observation").into_response(),
    }
}

/// What is stored, without ever echoing the token.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let settings = &state.settings;
    Json(SettingsResponse {
        summary: settings.saved_summary(),
        api: settings.get(SettingKey::Api),
        payload_saved: settings.get(SettingKey::Payload).is_some(),
        token_saved: settings.get(SettingKey::Token).is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessImageryHost, HeadlessSession};
    use crate::models::observation::ObservationSet;
    use crate::reader::SampleCatalogReader;
    use crate::settings::SettingsStore;
    use crate::utils::style::NdviRamp;
    use axum::body::to_bytes;
    use axum::response::Response;
    use serde_json::Value;

    async fn state(load: bool) -> Arc<AppState> {
        let headless = HeadlessSession::new(NdviRamp::default(), HeadlessImageryHost::offline());
        if load {
            headless.session.load(&SampleCatalogReader).await.unwrap();
        }
        let observations = ObservationSet::from_json(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[-122.0,37.4]},
                 "properties":{"title":"Marsh","articleHtml":"<p>x</p>"}}]}"#,
        )
        .unwrap();
        let settings = SettingsStore::session();
        settings.set(SettingKey::Token, "secret-token").unwrap();
        settings.set(SettingKey::Api, "https://api.example.com").unwrap();
        Arc::new(AppState {
            session: headless.session,
            presenter: headless.presenter,
            observations: Some(observations),
            settings,
        })
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_lists_sorted_products() {
        let state = state(true).await;
        let body = json(get_catalog(State(state)).await.into_response()).await;
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 11);
        assert!(body["summary"].as_str().unwrap().starts_with("11 products from"));
        assert!(products[0]["date"].as_str() < products[10]["date"].as_str());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_active_product() {
        let state = state(true).await;
        let newest = state.session.catalog().last().unwrap().clone();
        let body = json(get_status(State(state)).await.into_response()).await;
        assert_eq!(body["active"], newest.id.as_str());
        assert_eq!(body["mode"], "rgb");
        assert_eq!(
            body["status"].as_str().unwrap(),
            format!("{} loaded · RGB mode", newest.name)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_nearest_query() {
        let state = state(true).await;
        let catalog = state.session.catalog();
        let first = catalog.first().unwrap();

        let query = NearestQuery {
            time: "2000-01-01T00:00:00Z".into(),
        };
        let response = get_nearest(State(state.clone()), Query(query)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["id"], first.id.as_str());

        let bad = NearestQuery {
            time: "yesterday".into(),
        };
        let response = get_nearest(State(state), Query(bad)).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_by_id() {
        let state = state(true).await;
        let first = state.session.catalog().first().unwrap().clone();

        let response = post_select(State(state.clone()), Path(first.id.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["active"], first.id.as_str());

        let missing = post_select(State(state), Path("nope".into()))
            .await
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_reloads_overlay() {
        let state = state(true).await;
        let newest = state.session.active().unwrap();
        let request = ModeRequest {
            mode: RenderMode::Ndvi,
        };
        let body = json(post_mode(State(state.clone()), Json(request)).await.into_response()).await;
        assert_eq!(body["mode"], "ndvi");
        assert_eq!(body["status"], format!("{} loaded · NDVI mode", newest.name));
        assert_eq!(
            state.session.imagery().active(),
            Some((newest.id, RenderMode::Ndvi))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zoom_timeline() {
        let loaded = state(true).await;
        let before = loaded.session.timeline().unwrap();
        let request = ZoomRequest {
            direction: ZoomDirection::Out,
        };
        let response = post_timeline_zoom(State(loaded.clone()), Json(request))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(loaded.session.timeline().unwrap().span(), before.span() * 2);

        let empty = state(false).await;
        let request = ZoomRequest {
            direction: ZoomDirection::In,
        };
        let response = post_timeline_zoom(State(empty), Json(request)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_moves_selection_to_nearby_product() {
        let state = state(true).await;
        let first = state.session.catalog().first().unwrap().clone();
        let time = first.time + chrono::Duration::hours(3);

        let request = ClockRequest { time };
        let body = json(post_clock(State(state.clone()), Json(request)).await.into_response()).await;
        assert_eq!(body["active"], first.id.as_str());
        assert_eq!(state.session.viewer().clock(), Some(time));
    }

    #[tokio::test]
    async fn test_empty_catalog_has_no_timeline() {
        let state = state(false).await;
        let response = get_timeline(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let query = NearestQuery {
            time: "2020-01-01T00:00:00Z".into(),
        };
        let response = get_nearest(State(state), Query(query)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_legend_is_png() {
        let state = state(false).await;
        let response = get_ndvi_legend(State(state)).await.into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (LEGEND_WIDTH, LEGEND_HEIGHT));
    }

    #[tokio::test]
    async fn test_observations_and_articles() {
        let state = state(false).await;
        let body = json(get_observations(State(state.clone())).await.into_response()).await;
        assert_eq!(body["status"], "1 observations loaded");
        assert_eq!(body["markers"][0]["title"], "Marsh");
        assert_eq!(body["bounds"]["west"], -122.0);

        let article = get_observation_article(State(state.clone()), Path(0))
            .await
            .into_response();
        assert_eq!(json(article).await["body_html"], "<p>x</p>");

        let missing = get_observation_article(State(state), Path(5))
            .await
            .into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_settings_never_expose_token() {
        let state = state(false).await;
        let response = get_settings(State(state)).await.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("secret-token"));

        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["token_saved"], true);
        assert_eq!(body["api"], "https://api.example.com");
        assert_eq!(
            body["summary"],
            "Saved settings loaded for token, API URL."
        );
    }
}
