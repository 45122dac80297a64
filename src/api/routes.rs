use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Snapshot endpoints
        .route("/api/snapshots", get(handlers::list_snapshots))
        .route("/api/stats/:id", get(handlers::get_snapshot))
        // Analysis endpoints
        .route("/api/compare", get(handlers::compare))
        .route("/api/top", get(handlers::top_heroes))
        // Health
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SnapshotStore;
    use crate::domain::{Combination, HeroRate, Input, Mode, Region, Tier};
    use crate::services::QueryService;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    async fn seeded_router() -> (Router, i64) {
        let store = SnapshotStore::in_memory().await.unwrap();
        let combination =
            Combination::all_maps(Mode::Competitive, Input::Pc, Region::Europe, Tier::Gold);
        let id = store
            .insert_at(
                &combination,
                "digest",
                &[
                    HeroRate::new("ana", Some(10.0), Some(50.0)),
                    HeroRate::new("mercy", Some(30.0), Some(48.0)),
                ],
                Utc::now() - Duration::hours(1),
            )
            .await
            .unwrap()
            .snapshot_id()
            .unwrap();

        let router = create_router(AppState::new(QueryService::new(store)));
        (router, id)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
        (status, body)
    }

    #[tokio::test]
    async fn test_list_snapshots() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(router, "/api/snapshots?mode=competitive&limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["hero_count"], 2);
        assert_eq!(body[0]["tier"], "Gold");
    }

    #[tokio::test]
    async fn test_snapshot_by_id_and_not_found() {
        let (router, id) = seeded_router().await;
        let (status, body) = get(router.clone(), &format!("/api/stats/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hero_rates"].as_array().unwrap().len(), 2);

        let (status, _) = get(router, "/api/stats/9999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_top_requires_combination() {
        let (router, _) = seeded_router().await;
        let (status, _) = get(router, "/api/top?mode=competitive").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_top_rejects_unknown_metric() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(
            router,
            "/api/top?mode=competitive&input=PC&region=Europe&tier=Gold&metric=kda",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.as_str().unwrap().contains("Invalid metric"));
    }

    #[tokio::test]
    async fn test_top_by_pick_rate() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(
            router,
            "/api/top?mode=competitive&input=PC&region=Europe&tier=Gold&metric=pick_rate&limit=1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["hero_id"], "mercy");
    }

    #[tokio::test]
    async fn test_compare_without_data_is_empty_list() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(
            router,
            "/api/compare?mode=quick-play&input=Console&region=Asia&tier=All",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = seeded_router().await;
        let (status, body) = get(router, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["total_snapshots"], 1);
    }
}
