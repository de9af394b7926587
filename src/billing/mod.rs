mod aggregator;
pub mod models;
mod stripe;

use async_trait::async_trait;

pub use aggregator::BillingAggregator;
pub use models::{
    Customer, Product, Subscription, SubscriptionDetails, SubscriptionStatus, SubscriptionSummary,
};
pub use stripe::StripeClient;

#[cfg(test)]
pub(crate) use aggregator::tests as aggregator_tests;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("billing provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("billing provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected billing provider response: {0}")]
    Decode(String),

    #[error("subscription {0} has no line items")]
    MissingLineItem(String),
}

/// Which subscriptions a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Stripe's default: everything except canceled subscriptions.
    Default,
    /// Every subscription regardless of status.
    All,
}

impl StatusFilter {
    /// Value for the `status` query parameter, if one is sent.
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            StatusFilter::Default => None,
            StatusFilter::All => Some("all"),
        }
    }
}

/// The three billing provider calls the aggregator needs.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn list_customers_by_email(
        &self,
        email: &str,
        limit: u32,
    ) -> Result<Vec<Customer>, BillingError>;

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: StatusFilter,
    ) -> Result<Vec<Subscription>, BillingError>;

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError>;
}
