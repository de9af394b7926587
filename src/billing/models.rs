use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stripe list envelope (`{"object": "list", "data": [...]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub start_date: i64,
    pub current_period_end: i64,
    pub items: List<SubscriptionItem>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
    pub product: ProductRef,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub currency: String,
}

/// `price.product` is an id unless the request expanded it into the full object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(String),
    Expanded(Product),
}

impl ProductRef {
    pub fn id(&self) -> &str {
        match self {
            ProductRef::Id(id) => id,
            ProductRef::Expanded(product) => &product.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// What a caller sees about one active subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub product_id: String,
    pub product_name: String,
    pub start_date: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub amount: i64,
    pub currency: String,
}

/// One subscription of any status, as listed with `status=all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: SubscriptionStatus,
    pub product_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}

impl From<&Subscription> for SubscriptionSummary {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id.clone(),
            status: sub.status,
            product_id: sub.first_item().map(|item| item.price.product.id().to_string()),
            start_date: from_epoch_seconds(sub.start_date),
            current_period_end: from_epoch_seconds(sub.current_period_end),
        }
    }
}

/// Epoch seconds to UTC; out-of-range values clamp to the epoch.
pub fn from_epoch_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
