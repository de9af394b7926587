//! Character entitlement lookup backed by Stripe subscriptions.
//!
//! Given a customer email, the service finds the matching Stripe customers,
//! their active subscriptions and the products behind them, and sums the
//! character allowance each product grants according to the
//! [`entitlements::EntitlementTable`].

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod billing;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod event;
pub mod handler;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub aggregator: billing::BillingAggregator,
}

impl AppState {
    /// Wires the Stripe client and entitlement table described by `config`.
    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let table = match &config.entitlements_path {
            Some(path) => entitlements::EntitlementTable::from_json_file(path)?,
            None => entitlements::EntitlementTable::default(),
        };
        tracing::info!(products = table.entries().len(), "entitlement table loaded");

        let stripe = billing::StripeClient::from_config(&config)?;
        let aggregator = billing::BillingAggregator::new(
            Arc::new(stripe),
            Arc::new(table),
            config.customer_lookup_limit,
        );

        Ok(Self {
            config: Arc::new(config),
            aggregator,
        })
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(state.clone()))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
