#[cfg(test)]
mod tests {
    use crate::server::{healthz_handler, metrics_handler, readyz_handler, ServerState};
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_healthz_is_always_ok() {
        assert_eq!(healthz_handler().await.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_follows_flag() {
        let state = Arc::new(ServerState::default());
        let response = readyz_handler(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true);
        let response = readyz_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_only_after_cache_sync() {
        let state = Arc::new(ServerState::default());
        let (synced_tx, synced_rx) = tokio::sync::oneshot::channel::<()>();

        let waiter = tokio::spawn({
            let state = state.clone();
            async move { state.set_ready_when(async { synced_rx.await.is_ok() }).await }
        });
        tokio::task::yield_now().await;
        assert!(!state.is_ready());

        synced_tx.send(()).unwrap();
        waiter.await.unwrap();
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_not_ready_when_cache_closes_unsynced() {
        let state = ServerState::default();
        state.set_ready_when(async { false }).await;
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_text() {
        crate::metrics::record_requeue("KlusterletAddonConfig", "steady");
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[test]
    fn test_router_builds() {
        let _router = crate::server::router(Arc::new(ServerState::default()));
    }
}
