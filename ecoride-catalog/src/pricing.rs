use ecoride_core::repository::{PromotionLookup, SubscriptionLookup};
use ecoride_core::{CoreError, CoreResult, Promotion, Subscription, Trip};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_SERVICE_FEE_PERCENT: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Share of the seat price kept as service fee
    pub service_fee_percent: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { service_fee_percent: DEFAULT_SERVICE_FEE_PERCENT }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedPromotion {
    pub id: Uuid,
    pub name: String,
    pub fee_discount_percent: u32,
}

/// Per-seat and total amounts for a booking, all in cents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub seats: u32,
    pub base_price_cents: i64,
    pub service_fee_cents: i64,
    pub discounted_fee_cents: i64,
    pub total_discount_percent: u32,
    pub total_cents: i64,
    pub savings_cents: i64,
    pub applied_promotions: Vec<AppliedPromotion>,
    pub tree_multiplier: f64,
}

/// Stacks the subscription reduction and promotion discounts on the service fee.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        price_per_seat_cents: i64,
        seats: u32,
        subscription: Option<&Subscription>,
        promotions: &[Promotion],
    ) -> CoreResult<PriceBreakdown> {
        if price_per_seat_cents < 0 {
            return Err(CoreError::validation("price must not be negative"));
        }
        if seats == 0 {
            return Err(CoreError::validation("at least one seat is required"));
        }

        let fee_percent = self.config.service_fee_percent.min(100) as i64;
        let fee = price_per_seat_cents * fee_percent / 100;
        let base = price_per_seat_cents - fee;

        let discount = subscription
            .map(|s| s.reduction_percent)
            .into_iter()
            .chain(promotions.iter().map(|p| p.fee_discount_percent))
            .fold(0u32, |acc, pct| acc.saturating_add(pct))
            .min(100);
        let discounted_fee = fee * (100 - discount as i64) / 100;

        let tree_multiplier = subscription
            .map(|s| s.tree_multiplier)
            .into_iter()
            .chain(promotions.iter().map(|p| p.tree_multiplier))
            .fold(None, |best: Option<f64>, m| Some(best.map_or(m, |b| b.max(m))))
            .unwrap_or(1.0);

        let seats_i = seats as i64;
        Ok(PriceBreakdown {
            seats,
            base_price_cents: base,
            service_fee_cents: fee,
            discounted_fee_cents: discounted_fee,
            total_discount_percent: discount,
            total_cents: (base + discounted_fee) * seats_i,
            savings_cents: (fee - discounted_fee) * seats_i,
            applied_promotions: promotions
                .iter()
                .map(|p| AppliedPromotion {
                    id: p.id,
                    name: p.name.clone(),
                    fee_discount_percent: p.fee_discount_percent,
                })
                .collect(),
            tree_multiplier,
        })
    }
}

/// Fetches the passenger's subscription and the trip's eligible promotions, then prices.
#[derive(Clone)]
pub struct PriceQuoter {
    engine: PricingEngine,
    subscriptions: Arc<dyn SubscriptionLookup>,
    promotions: Arc<dyn PromotionLookup>,
}

impl PriceQuoter {
    pub fn new(
        engine: PricingEngine,
        subscriptions: Arc<dyn SubscriptionLookup>,
        promotions: Arc<dyn PromotionLookup>,
    ) -> Self {
        Self { engine, subscriptions, promotions }
    }

    pub async fn quote(&self, trip: &Trip, passenger_id: Uuid, seats: u32) -> CoreResult<PriceBreakdown> {
        let subscription = self.subscriptions.get_active_for_user(passenger_id).await?;
        let attributes = trip.attributes();
        let promotions: Vec<Promotion> = self
            .promotions
            .list_eligible(&attributes)
            .await?
            .into_iter()
            .filter(|p| p.applies_to(&attributes))
            .collect();

        tracing::debug!(
            trip_id = %trip.id,
            subscription = subscription.is_some(),
            promotions = promotions.len(),
            "Pricing booking"
        );

        self.engine
            .calculate(trip.price_per_seat_cents, seats, subscription.as_ref(), &promotions)
    }
}
