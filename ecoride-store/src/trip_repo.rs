use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use ecoride_core::repository::TripRepository;
use ecoride_core::{Location, StoreError, Trip, TripChanges, TripFilters, TripStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreTripRepository {
    pool: PgPool,
}

impl StoreTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRIP_COLUMNS: &str = "id, driver_id, start_address, start_latitude, start_longitude, \
     end_address, end_latitude, end_longitude, departure_at, distance_km, price_per_seat_cents, \
     total_seats, taken_seats, status, co2_saved_kg, trees_equivalent, created_at, opened_at";

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    start_address: String,
    start_latitude: f64,
    start_longitude: f64,
    end_address: String,
    end_latitude: f64,
    end_longitude: f64,
    departure_at: DateTime<Utc>,
    distance_km: f64,
    price_per_seat_cents: i64,
    total_seats: i32,
    taken_seats: i32,
    status: String,
    co2_saved_kg: i64,
    trees_equivalent: i64,
    created_at: DateTime<Utc>,
    opened_at: Option<DateTime<Utc>>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            start: Location {
                address: row.start_address,
                latitude: row.start_latitude,
                longitude: row.start_longitude,
            },
            end: Location {
                address: row.end_address,
                latitude: row.end_latitude,
                longitude: row.end_longitude,
            },
            departure_at: row.departure_at,
            distance_km: row.distance_km,
            price_per_seat_cents: row.price_per_seat_cents,
            total_seats: u32::try_from(row.total_seats)?,
            taken_seats: u32::try_from(row.taken_seats)?,
            status: row.status.parse::<TripStatus>()?,
            co2_saved_kg: row.co2_saved_kg,
            trees_equivalent: row.trees_equivalent,
            created_at: row.created_at,
            opened_at: row.opened_at,
        })
    }
}

fn into_trips(rows: Vec<TripRow>) -> Result<Vec<Trip>, StoreError> {
    rows.into_iter().map(Trip::try_from).collect()
}

fn to_db_int(value: u32) -> Result<i32, StoreError> {
    Ok(i32::try_from(value)?)
}

#[async_trait]
impl TripRepository for StoreTripRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let row: Option<TripRow> = sqlx::query_as(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Trip::try_from).transpose()
    }

    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, driver_id, start_address, start_latitude, start_longitude,
                end_address, end_latitude, end_longitude, departure_at, distance_km,
                price_per_seat_cents, total_seats, taken_seats, status, co2_saved_kg,
                trees_equivalent, created_at, opened_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(trip.id)
        .bind(trip.driver_id)
        .bind(&trip.start.address)
        .bind(trip.start.latitude)
        .bind(trip.start.longitude)
        .bind(&trip.end.address)
        .bind(trip.end.latitude)
        .bind(trip.end.longitude)
        .bind(trip.departure_at)
        .bind(trip.distance_km)
        .bind(trip.price_per_seat_cents)
        .bind(to_db_int(trip.total_seats)?)
        .bind(to_db_int(trip.taken_seats)?)
        .bind(trip.status.as_str())
        .bind(trip.co2_saved_kg)
        .bind(trip.trees_equivalent)
        .bind(trip.created_at)
        .bind(trip.opened_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_fields(&self, id: Uuid, changes: &TripChanges) -> Result<Option<Trip>, StoreError> {
        let start = changes.start.as_ref();
        let end = changes.end.as_ref();

        let row: Option<TripRow> = sqlx::query_as(&format!(
            r#"
            UPDATE trips SET
                start_address = COALESCE($2, start_address),
                start_latitude = COALESCE($3, start_latitude),
                start_longitude = COALESCE($4, start_longitude),
                end_address = COALESCE($5, end_address),
                end_latitude = COALESCE($6, end_latitude),
                end_longitude = COALESCE($7, end_longitude),
                departure_at = COALESCE($8, departure_at),
                price_per_seat_cents = COALESCE($9, price_per_seat_cents),
                total_seats = COALESCE($10, total_seats),
                taken_seats = COALESCE($11, taken_seats),
                status = COALESCE($12, status),
                opened_at = COALESCE($13, opened_at),
                co2_saved_kg = COALESCE($14, co2_saved_kg),
                trees_equivalent = COALESCE($15, trees_equivalent)
            WHERE id = $1
            RETURNING {}
            "#,
            TRIP_COLUMNS
        ))
        .bind(id)
        .bind(start.map(|l| l.address.clone()))
        .bind(start.map(|l| l.latitude))
        .bind(start.map(|l| l.longitude))
        .bind(end.map(|l| l.address.clone()))
        .bind(end.map(|l| l.latitude))
        .bind(end.map(|l| l.longitude))
        .bind(changes.departure_at)
        .bind(changes.price_per_seat_cents)
        .bind(changes.total_seats.map(to_db_int).transpose()?)
        .bind(changes.taken_seats.map(to_db_int).transpose()?)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.opened_at)
        .bind(changes.co2_saved_kg)
        .bind(changes.trees_equivalent)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Trip::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, StoreError> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trips WHERE driver_id = $1 ORDER BY departure_at DESC",
            TRIP_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        into_trips(rows)
    }

    async fn list_available(&self, filters: &TripFilters, after: DateTime<Utc>) -> Result<Vec<Trip>, StoreError> {
        let from = filters.departure_from.map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let until = filters
            .departure_to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());

        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM trips
            WHERE status = 'available'
              AND taken_seats < total_seats
              AND departure_at > $1
              AND ($2::timestamptz IS NULL OR departure_at >= $2)
              AND ($3::timestamptz IS NULL OR departure_at < $3)
            ORDER BY departure_at ASC
            "#,
            TRIP_COLUMNS
        ))
        .bind(after)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        into_trips(rows)
    }

    async fn list_by_status(&self, statuses: &[TripStatus]) -> Result<Vec<Trip>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trips WHERE status = ANY($1) ORDER BY departure_at ASC",
            TRIP_COLUMNS
        ))
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;

        into_trips(rows)
    }
}
