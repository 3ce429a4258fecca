//! API routes for the turbulence server.

pub mod control;
mod routes;

use axum::Router;
use std::sync::Arc;

use crate::engine::AnalyticsEngine;

pub fn routes() -> Router<Arc<AnalyticsEngine>> {
    routes::create_router()
}

#[cfg(test)]
mod tests;
