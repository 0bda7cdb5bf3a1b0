use async_trait::async_trait;
use chrono::NaiveDate;
use ecoride_core::repository::{EcoLedger, EcoSettingsProvider, PromotionLookup, SubscriptionLookup};
use ecoride_core::{EcoCredit, EcoFactors, GeoBounds, Promotion, StoreError, Subscription, TripAttributes};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Subscriptions, promotions and eco settings. Read-only except for the eco ledger.
pub struct StoreReferenceRepository {
    pool: PgPool,
    default_factors: EcoFactors,
}

impl StoreReferenceRepository {
    pub fn new(pool: PgPool, default_factors: EcoFactors) -> Self {
        Self { pool, default_factors }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    reduction_percent: i32,
    tree_multiplier: f64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            reduction_percent: u32::try_from(row.reduction_percent)?,
            tree_multiplier: row.tree_multiplier,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    name: String,
    fee_discount_percent: i32,
    tree_multiplier: f64,
    valid_from: NaiveDate,
    valid_until: NaiveDate,
    min_latitude: Option<f64>,
    max_latitude: Option<f64>,
    min_longitude: Option<f64>,
    max_longitude: Option<f64>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = StoreError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        // A region needs all four edges
        let region = match (row.min_latitude, row.max_latitude, row.min_longitude, row.max_longitude) {
            (Some(min_latitude), Some(max_latitude), Some(min_longitude), Some(max_longitude)) => Some(GeoBounds {
                min_latitude,
                max_latitude,
                min_longitude,
                max_longitude,
            }),
            _ => None,
        };

        Ok(Promotion {
            id: row.id,
            name: row.name,
            fee_discount_percent: u32::try_from(row.fee_discount_percent)?,
            tree_multiplier: row.tree_multiplier,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            region,
        })
    }
}

#[async_trait]
impl SubscriptionLookup for StoreReferenceRepository {
    async fn get_active_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, name, reduction_percent, tree_multiplier
            FROM subscriptions
            WHERE user_id = $1 AND active
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }
}

#[async_trait]
impl PromotionLookup for StoreReferenceRepository {
    async fn list_eligible(&self, trip: &TripAttributes) -> Result<Vec<Promotion>, StoreError> {
        let date = trip.departure_at.date_naive();

        // Region containment is checked by `Promotion::applies_to`
        let rows: Vec<PromotionRow> = sqlx::query_as(
            r#"
            SELECT id, name, fee_discount_percent, tree_multiplier, valid_from, valid_until,
                   min_latitude, max_latitude, min_longitude, max_longitude
            FROM promotions
            WHERE valid_from <= $1 AND valid_until >= $1
            ORDER BY name
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let promotions = rows
            .into_iter()
            .map(Promotion::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(promotions.into_iter().filter(|p| p.applies_to(trip)).collect())
    }
}

#[async_trait]
impl EcoSettingsProvider for StoreReferenceRepository {
    async fn get_factors(&self) -> Result<EcoFactors, StoreError> {
        let row: Option<(f64, f64)> =
            sqlx::query_as("SELECT co2_per_km, trees_per_km FROM eco_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|(co2_per_km, trees_per_km)| EcoFactors { co2_per_km, trees_per_km })
            .unwrap_or(self.default_factors))
    }
}

#[async_trait]
impl EcoLedger for StoreReferenceRepository {
    async fn credit_driver(&self, driver_id: Uuid, trip_id: Uuid, credit: EcoCredit) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO driver_eco_credits (trip_id, driver_id, co2_kg, trees)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (trip_id) DO NOTHING
            "#,
        )
        .bind(trip_id)
        .bind(driver_id)
        .bind(credit.co2_kg)
        .bind(credit.trees)
        .execute(&self.pool)
        .await?;

        info!("Credited driver {} with {} kg CO2 for trip {}", driver_id, credit.co2_kg, trip_id);
        Ok(())
    }
}
