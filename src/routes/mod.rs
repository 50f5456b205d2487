use axum::Router;

mod health;

// ---

/// Gateway router for the engine's ops surface.
///
/// The alert engine has no interactive API; everything it produces lands in
/// the alert ledger. The only route exposed is `/health`, for container
/// orchestrators and deploy checks.
pub fn router() -> Router {
    // ---
    Router::new().merge(health::router())
}
