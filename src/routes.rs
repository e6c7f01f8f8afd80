use crate::endpoints::handlers::{
    get_catalog, get_ndvi_legend, get_nearest, get_observation_article, get_observations,
    get_settings, get_status, get_timeline, post_clock, post_mode, post_select,
    post_timeline_zoom,
};
use crate::server::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// JSON API under `/api`, everything else served from `static_dir`.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/catalog", get(get_catalog))
        .route("/catalog/nearest", get(get_nearest))
        .route("/timeline", get(get_timeline))
        .route("/styles/ndvi/legend.png", get(get_ndvi_legend))
        .route("/observations", get(get_observations))
        .route("/observations/{index}/article", get(get_observation_article))
        .route("/settings", get(get_settings))
        .route("/select/{id}", post(post_select))
        .route("/mode", post(post_mode))
        .route("/timeline/zoom", post(post_timeline_zoom))
        .route("/clock", post(post_clock))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(static_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessImageryHost, HeadlessSession};
    use crate::settings::SettingsStore;
    use crate::utils::style::NdviRamp;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_api_and_static_files_share_a_port() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>cogtour</h1>").unwrap();

        let headless = HeadlessSession::new(NdviRamp::default(), HeadlessImageryHost::offline());
        let state = Arc::new(AppState {
            session: headless.session,
            presenter: headless.presenter,
            observations: None,
            settings: SettingsStore::session(),
        });
        let app = router(state, tmp.path());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = reqwest::Client::new();
        let page = client
            .get(format!("http://{}/index.html", addr))
            .send()
            .await
            .unwrap();
        assert!(page.status().is_success());
        assert_eq!(page.text().await.unwrap(), "<h1>cogtour</h1>");

        let catalog: serde_json::Value = client
            .get(format!("http://{}/api/catalog", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(catalog["summary"], "No products available.");

        let observations = client
            .get(format!("http://{}/api/observations", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(observations.status(), reqwest::StatusCode::NOT_FOUND);

        let mode: serde_json::Value = client
            .post(format!("http://{}/api/mode", addr))
            .json(&serde_json::json!({ "mode": "ndvi" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(mode["mode"], "ndvi");

        let select = client
            .post(format!("http://{}/api/select/nope", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(select.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
