use std::sync::Arc;

use anyhow::Result;
use salvo::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::resolver::IdentityResolver;

pub mod handlers;
pub mod middleware;

use self::handlers::{health::health_check, identity::whoami, metrics::metrics};
use self::middleware::auth::RequireIdentity;

pub fn create_router(resolver: IdentityResolver) -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("metrics").get(metrics))
        .push(
            Router::with_path("whoami")
                .hoop(RequireIdentity::new(resolver))
                .get(whoami),
        )
}

#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
    resolver: IdentityResolver,
}

impl WebServer {
    pub fn new(config: Arc<Config>, resolver: IdentityResolver) -> Self {
        Self { config, resolver }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        info!(
            backend = self.resolver.backend_name(),
            "Starting web server on {}", bind_addr
        );

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor)
            .serve(create_router(self.resolver.clone()))
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use salvo::prelude::*;
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::{Value, json};

    use super::create_router;
    use crate::db::stores::testing::{ScriptedStore, StaticStore};
    use crate::db::{DatabaseError, FIXTURE_TOKEN, IdentityRecord};
    use crate::resolver::{IdentityResolver, RetryPolicy};

    const BASE: &str = "http://127.0.0.1:7070";

    fn policy() -> RetryPolicy {
        RetryPolicy {
            transient_retries: 1,
            delay: Duration::from_millis(5),
            budget: Duration::from_secs(2),
        }
    }

    fn service() -> Service {
        let store = StaticStore::new(vec![IdentityRecord::fixture()]);
        let resolver = IdentityResolver::new(Arc::new(store), policy());
        Service::new(create_router(resolver))
    }

    async fn whoami(service: &Service, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut request = TestClient::get(format!("{BASE}/whoami"));
        if let Some(value) = authorization {
            request = request.add_header("authorization", value, true);
        }
        let mut res = request.send(service).await;
        let body = res.take_string().await.expect("response body");
        let status = res.status_code.unwrap_or(StatusCode::OK);
        (status, serde_json::from_str(&body).expect("json body"))
    }

    #[tokio::test]
    async fn whoami_returns_the_resolved_user() {
        let service = service();
        let (status, body) = whoami(&service, Some(&format!("Bearer {FIXTURE_TOKEN}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "userid": "admin" }));
    }

    #[tokio::test]
    async fn every_rejection_looks_the_same() {
        let service = service();
        let unavailable = {
            let store = ScriptedStore::always(|| {
                Err(DatabaseError::Connection("connection refused".to_string()))
            });
            Service::new(create_router(IdentityResolver::new(Arc::new(store), policy())))
        };

        let rejections = vec![
            whoami(&service, None).await,
            whoami(&service, Some("Bearer")).await,
            whoami(&service, Some("Bearer nonexistent-token")).await,
            whoami(&unavailable, Some(&format!("Bearer {FIXTURE_TOKEN}"))).await,
        ];

        for (status, body) in rejections {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({ "error": "unauthorized" }));
        }
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let mut res = TestClient::get(format!("{BASE}/health"))
            .send(&service())
            .await;
        let body: Value =
            serde_json::from_str(&res.take_string().await.expect("body")).expect("json body");
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_are_prometheus_text() {
        let mut res = TestClient::get(format!("{BASE}/metrics"))
            .send(&service())
            .await;
        let body = res.take_string().await.expect("body");
        assert!(body.contains("identity_resolutions_total"));
    }
}
