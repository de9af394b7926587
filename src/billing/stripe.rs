use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::models::{Customer, List, Product, Subscription};
use super::{BillingError, BillingProvider, StatusFilter};
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Stripe REST client authenticated with the account's secret key.
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    api_version: String,
}

impl StripeClient {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            api_version: api_version.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BillingError> {
        Self::new(
            &config.stripe_api_base,
            &config.stripe_secret_key,
            &config.stripe_api_version,
            config.stripe_timeout,
        )
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BillingError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", &self.api_version)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<StripeErrorBody>(&body) {
                Ok(parsed) => {
                    let detail = parsed.error;
                    match (detail.kind, detail.message) {
                        (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
                        (None, Some(msg)) => msg,
                        (Some(kind), None) => kind,
                        (None, None) => body,
                    }
                }
                Err(_) => body,
            };
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json()
            .await
            .map_err(|e| BillingError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn list_customers_by_email(
        &self,
        email: &str,
        limit: u32,
    ) -> Result<Vec<Customer>, BillingError> {
        let limit = limit.to_string();
        let list: List<Customer> = self
            .get("/v1/customers", &[("email", email), ("limit", &limit)])
            .await?;
        Ok(list.data)
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: StatusFilter,
    ) -> Result<Vec<Subscription>, BillingError> {
        let mut query = vec![("customer", customer_id)];
        if let Some(value) = status.as_query_value() {
            query.push(("status", value));
        }
        let list: List<Subscription> = self.get("/v1/subscriptions", &query).await?;
        Ok(list.data)
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError> {
        let path = format!("/v1/products/{}", urlencoding::encode(product_id));
        self.get(&path, &[]).await
    }
}
