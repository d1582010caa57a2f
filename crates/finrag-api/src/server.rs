use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Bind `host:port` and serve `app` with request tracing and permissive CORS
/// until the process exits.
pub async fn serve(app: Router, host: &str, port: u16, service: &'static str) -> std::io::Result<()> {
    let app = app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, service, "listening");
    axum::serve(listener, app).await
}
