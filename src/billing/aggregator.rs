use std::sync::Arc;

use super::models::{from_epoch_seconds, Subscription, SubscriptionDetails};
use super::{BillingError, BillingProvider, StatusFilter};
use crate::entitlements::EntitlementTable;

/// Turns a customer email into subscription details and character entitlements.
///
/// Provider calls are issued one at a time: customers in the order Stripe
/// returns them, then each customer's subscriptions in order. Any provider
/// failure aborts the whole lookup.
#[derive(Clone)]
pub struct BillingAggregator {
    provider: Arc<dyn BillingProvider>,
    table: Arc<EntitlementTable>,
    customer_limit: u32,
}

impl BillingAggregator {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        table: Arc<EntitlementTable>,
        customer_limit: u32,
    ) -> Self {
        Self {
            provider,
            table,
            customer_limit,
        }
    }

    pub fn table(&self) -> &EntitlementTable {
        &self.table
    }

    pub async fn customer_ids_by_email(&self, email: &str) -> Result<Vec<String>, BillingError> {
        let customers = self
            .provider
            .list_customers_by_email(email, self.customer_limit)
            .await
            .inspect_err(|e| tracing::error!("error fetching customer ids: {e}"))?;

        Ok(customers.into_iter().map(|c| c.id).collect())
    }

    pub async fn active_subscription_details(
        &self,
        email: &str,
    ) -> Result<Vec<SubscriptionDetails>, BillingError> {
        self.collect_active_details(email)
            .await
            .inspect_err(|e| tracing::error!("error fetching subscription details: {e}"))
    }

    async fn collect_active_details(
        &self,
        email: &str,
    ) -> Result<Vec<SubscriptionDetails>, BillingError> {
        let mut details = Vec::new();

        for customer_id in self.customer_ids_by_email(email).await? {
            let subscriptions = self
                .provider
                .list_subscriptions(&customer_id, StatusFilter::Default)
                .await?;

            for subscription in subscriptions.iter().filter(|s| s.is_active()) {
                details.push(self.describe(subscription).await?);
            }
        }

        Ok(details)
    }

    async fn describe(
        &self,
        subscription: &Subscription,
    ) -> Result<SubscriptionDetails, BillingError> {
        let item = subscription
            .first_item()
            .ok_or_else(|| BillingError::MissingLineItem(subscription.id.clone()))?;
        let product = self.provider.retrieve_product(item.price.product.id()).await?;

        Ok(SubscriptionDetails {
            product_name: product.name.unwrap_or_else(|| "N/A".to_string()),
            product_id: product.id,
            start_date: from_epoch_seconds(subscription.start_date),
            current_period_end: from_epoch_seconds(subscription.current_period_end),
            amount: item.price.unit_amount.unwrap_or(0),
            currency: item.price.currency.clone(),
        })
    }

    /// Sum of entitlement characters over every active subscription of every
    /// customer matching `email`. Unknown products count as 0 and the sum
    /// saturates at `u64::MAX`.
    pub async fn total_chars_for_active_subscriptions(
        &self,
        email: &str,
    ) -> Result<u64, BillingError> {
        let details = self.active_subscription_details(email).await.inspect_err(|e| {
            tracing::error!("error fetching total chars for active subscriptions: {e}")
        })?;

        let total = details.iter().fold(0u64, |acc, d| {
            acc.saturating_add(self.table.chars_for(&d.product_id))
        });

        tracing::debug!(
            subscriptions = details.len(),
            total,
            "computed character entitlement"
        );
        Ok(total)
    }

    /// True as soon as any matching customer has an active subscription.
    pub async fn has_active_subscription(&self, email: &str) -> Result<bool, BillingError> {
        self.find_active(email)
            .await
            .inspect_err(|e| tracing::error!("error checking subscription: {e}"))
    }

    async fn find_active(&self, email: &str) -> Result<bool, BillingError> {
        for customer_id in self.customer_ids_by_email(email).await? {
            let subscriptions = self
                .provider
                .list_subscriptions(&customer_id, StatusFilter::Default)
                .await?;
            if subscriptions.iter().any(Subscription::is_active) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every subscription, whatever its status, across all matching customers.
    pub async fn subscriptions_for_email(
        &self,
        email: &str,
    ) -> Result<Vec<Subscription>, BillingError> {
        let mut all = Vec::new();
        for customer_id in self.customer_ids_by_email(email).await? {
            let subscriptions = self
                .provider
                .list_subscriptions(&customer_id, StatusFilter::All)
                .await
                .inspect_err(|e| {
                    tracing::error!(customer_id = %customer_id, "error listing subscriptions: {e}")
                })?;
            all.extend(subscriptions);
        }
        Ok(all)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::billing::models::{List, Price, ProductRef, SubscriptionItem};
    use crate::billing::{Customer, Product, SubscriptionStatus};
    use crate::entitlements::Entitlement;

    /// In-memory provider keyed by email / customer id / product id.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub customers: HashMap<String, Vec<String>>,
        pub subscriptions: HashMap<String, Vec<Subscription>>,
        pub products: HashMap<String, String>,
        pub fail_products: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        pub fn customer(mut self, email: &str, customer_id: &str) -> Self {
            self.customers
                .entry(email.to_string())
                .or_default()
                .push(customer_id.to_string());
            self
        }

        pub fn subscription(
            mut self,
            customer_id: &str,
            status: SubscriptionStatus,
            product_id: &str,
        ) -> Self {
            let subs = self.subscriptions.entry(customer_id.to_string()).or_default();
            let id = format!("sub_{}_{}", customer_id, subs.len());
            subs.push(subscription(&id, status, Some(product_id)));
            self.products
                .entry(product_id.to_string())
                .or_insert_with(|| format!("{product_id} name"));
            self
        }

        pub fn raw_subscription(mut self, customer_id: &str, sub: Subscription) -> Self {
            self.subscriptions
                .entry(customer_id.to_string())
                .or_default()
                .push(sub);
            self
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub(crate) fn subscription(
        id: &str,
        status: SubscriptionStatus,
        product_id: Option<&str>,
    ) -> Subscription {
        let items = product_id
            .map(|p| SubscriptionItem {
                price: Price {
                    id: format!("price_{p}"),
                    product: ProductRef::Id(p.to_string()),
                    unit_amount: Some(1500),
                    currency: "usd".to_string(),
                },
            })
            .into_iter()
            .collect();

        Subscription {
            id: id.to_string(),
            status,
            start_date: 1_690_000_000,
            current_period_end: 1_692_678_400,
            items: List {
                data: items,
                has_more: false,
            },
        }
    }

    #[async_trait]
    impl BillingProvider for FakeProvider {
        async fn list_customers_by_email(
            &self,
            email: &str,
            limit: u32,
        ) -> Result<Vec<Customer>, BillingError> {
            self.record(format!("customers:{email}:{limit}"));
            Ok(self
                .customers
                .get(email)
                .into_iter()
                .flatten()
                .take(limit as usize)
                .map(|id| Customer {
                    id: id.clone(),
                    email: Some(email.to_string()),
                })
                .collect())
        }

        async fn list_subscriptions(
            &self,
            customer_id: &str,
            status: StatusFilter,
        ) -> Result<Vec<Subscription>, BillingError> {
            let filter = status.as_query_value().unwrap_or("default");
            self.record(format!("subscriptions:{customer_id}:{filter}"));
            let subs = self.subscriptions.get(customer_id).cloned().unwrap_or_default();
            Ok(match status {
                StatusFilter::All => subs,
                StatusFilter::Default => subs
                    .into_iter()
                    .filter(|s| s.status != SubscriptionStatus::Canceled)
                    .collect(),
            })
        }

        async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError> {
            self.record(format!("product:{product_id}"));
            if self.fail_products {
                return Err(BillingError::Api {
                    status: 500,
                    message: "api_error: boom".to_string(),
                });
            }
            let name = self.products.get(product_id).cloned();
            Ok(Product {
                id: product_id.to_string(),
                name,
            })
        }
    }

    pub(crate) fn aggregator(provider: FakeProvider) -> (BillingAggregator, Arc<FakeProvider>) {
        aggregator_with_table(provider, EntitlementTable::default())
    }

    fn aggregator_with_table(
        provider: FakeProvider,
        table: EntitlementTable,
    ) -> (BillingAggregator, Arc<FakeProvider>) {
        let provider = Arc::new(provider);
        let aggregator = BillingAggregator::new(
            Arc::clone(&provider) as Arc<dyn BillingProvider>,
            Arc::new(table),
            10,
        );
        (aggregator, provider)
    }

    async fn total(agg: &BillingAggregator, email: &str) -> u64 {
        agg.total_chars_for_active_subscriptions(email).await.unwrap()
    }

    #[tokio::test]
    async fn no_customers_means_zero() {
        let (agg, provider) = aggregator(FakeProvider::default());
        assert_eq!(total(&agg, "nobody@example.com").await, 0);
        assert_eq!(provider.calls(), ["customers:nobody@example.com:10"]);
    }

    #[tokio::test]
    async fn single_active_tts_50k_subscription() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_ORHkZD7RnyjpJt");
        let (agg, _) = aggregator(fake);
        assert_eq!(total(&agg, "a@example.com").await, 50_000);
    }

    #[tokio::test]
    async fn unmapped_product_contributes_nothing() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_ORVVQvf4NNIrHM")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_not_in_table");
        let (agg, _) = aggregator(fake);
        assert_eq!(total(&agg, "a@example.com").await, 500_000);
    }

    #[tokio::test]
    async fn non_active_statuses_are_ignored() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .raw_subscription(
                "cus_1",
                subscription("sub_c", SubscriptionStatus::Canceled, Some("prod_ORHkZD7RnyjpJt")),
            )
            .subscription("cus_1", SubscriptionStatus::Trialing, "prod_ORVRHvcGGnacnS")
            .subscription("cus_1", SubscriptionStatus::PastDue, "prod_ORVTaqllmu66Sh");
        let (agg, provider) = aggregator(fake);
        assert_eq!(total(&agg, "a@example.com").await, 0);
        assert!(!provider.calls().iter().any(|c| c.starts_with("product:")));
    }

    #[tokio::test]
    async fn sums_across_customers_and_counts_repeats() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .customer("a@example.com", "cus_2")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_ORVRHvcGGnacnS")
            .subscription("cus_2", SubscriptionStatus::Active, "prod_ORVRHvcGGnacnS")
            .subscription("cus_2", SubscriptionStatus::Active, "prod_L5FdspKcIm93KY");
        let (agg, provider) = aggregator(fake);
        assert_eq!(total(&agg, "a@example.com").await, 250_000);

        assert_eq!(
            provider.calls(),
            [
                "customers:a@example.com:10",
                "subscriptions:cus_1:default",
                "product:prod_ORVRHvcGGnacnS",
                "subscriptions:cus_2:default",
                "product:prod_ORVRHvcGGnacnS",
                "product:prod_L5FdspKcIm93KY",
            ]
        );
    }

    #[tokio::test]
    async fn adding_a_mapped_subscription_increases_total_by_its_chars() {
        let base = || {
            FakeProvider::default()
                .customer("a@example.com", "cus_1")
                .subscription("cus_1", SubscriptionStatus::Active, "prod_ORHkZD7RnyjpJt")
        };
        let (before, _) = aggregator(base());
        let (after, _) = aggregator(base().subscription(
            "cus_1",
            SubscriptionStatus::Active,
            "prod_ORVTaqllmu66Sh",
        ));

        let before = total(&before, "a@example.com").await;
        let after = total(&after, "a@example.com").await;
        assert_eq!(after - before, 250_000);
    }

    #[tokio::test]
    async fn repeated_lookups_are_stable() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_MSKBmbdLqGnUgQ");
        let (agg, _) = aggregator(fake);
        let first = total(&agg, "a@example.com").await;
        let second = total(&agg, "a@example.com").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn provider_failure_aborts_without_partial_sum() {
        let mut fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_ORHkZD7RnyjpJt");
        fake.fail_products = true;
        let (agg, _) = aggregator(fake);

        let err = agg
            .total_chars_for_active_subscriptions("a@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Api { status: 500, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn active_subscription_without_items_is_an_error() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .raw_subscription(
                "cus_1",
                subscription("sub_empty", SubscriptionStatus::Active, None),
            );
        let (agg, _) = aggregator(fake);

        let err = agg.active_subscription_details("a@example.com").await.unwrap_err();
        assert!(
            matches!(err, BillingError::MissingLineItem(ref id) if id == "sub_empty"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn details_carry_price_and_dates() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_ORHkZD7RnyjpJt");
        let (agg, _) = aggregator(fake);

        let details = agg.active_subscription_details("a@example.com").await.unwrap();
        assert_eq!(details.len(), 1);
        let d = &details[0];
        assert_eq!(d.product_id, "prod_ORHkZD7RnyjpJt");
        assert_eq!(d.product_name, "prod_ORHkZD7RnyjpJt name");
        assert_eq!(d.amount, 1500);
        assert_eq!(d.currency, "usd");
        assert_eq!(d.start_date.timestamp(), 1_690_000_000);
        assert_eq!(d.current_period_end.timestamp(), 1_692_678_400);
    }

    #[tokio::test]
    async fn missing_product_name_and_amount_fall_back() {
        let mut sub = subscription("sub_1", SubscriptionStatus::Active, Some("prod_nameless"));
        sub.items.data[0].price.unit_amount = None;
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .raw_subscription("cus_1", sub);
        let (agg, _) = aggregator(fake);

        let details = agg.active_subscription_details("a@example.com").await.unwrap();
        assert_eq!(details[0].product_name, "N/A");
        assert_eq!(details[0].amount, 0);
    }

    #[tokio::test]
    async fn has_active_subscription_stops_at_first_hit() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .customer("a@example.com", "cus_2")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_x")
            .subscription("cus_2", SubscriptionStatus::Active, "prod_y");
        let (agg, provider) = aggregator(fake);

        assert!(agg.has_active_subscription("a@example.com").await.unwrap());
        assert_eq!(
            provider.calls(),
            ["customers:a@example.com:10", "subscriptions:cus_1:default"]
        );
        assert!(!agg.has_active_subscription("b@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn subscriptions_for_email_include_canceled() {
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .raw_subscription(
                "cus_1",
                subscription("sub_c", SubscriptionStatus::Canceled, Some("prod_x")),
            )
            .subscription("cus_1", SubscriptionStatus::Active, "prod_y");
        let (agg, provider) = aggregator(fake);

        let subs = agg.subscriptions_for_email("a@example.com").await.unwrap();
        assert_eq!(subs.len(), 2);
        assert!(provider.calls().contains(&"subscriptions:cus_1:all".to_string()));
    }

    #[tokio::test]
    async fn total_saturates_instead_of_overflowing() {
        let huge = |id: &str| Entitlement {
            product_id: id.to_string(),
            product_name: id.to_string(),
            chars: u64::MAX,
        };
        let table = EntitlementTable::new(vec![huge("prod_big_a"), huge("prod_big_b")]).unwrap();
        let fake = FakeProvider::default()
            .customer("a@example.com", "cus_1")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_big_a")
            .subscription("cus_1", SubscriptionStatus::Active, "prod_big_b");
        let (agg, _) = aggregator_with_table(fake, table);

        assert_eq!(total(&agg, "a@example.com").await, u64::MAX);
    }
}
