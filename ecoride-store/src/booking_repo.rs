use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecoride_core::repository::BookingRepository;
use ecoride_core::{Booking, BookingChanges, BookingStatus, Review, StoreError};
use ecoride_shared::Masked;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, trip_id, passenger_id, seats_booked, status, validation_code, \
     code_used, booking_date, total_price_cents, rating, review_comment, reviewed_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    seats_booked: i32,
    status: String,
    validation_code: String,
    code_used: bool,
    booking_date: DateTime<Utc>,
    total_price_cents: i64,
    rating: Option<i16>,
    review_comment: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let review = match (row.rating, row.reviewed_at) {
            (Some(rating), Some(reviewed_at)) => Some(Review {
                rating: u8::try_from(rating)?,
                comment: row.review_comment,
                reviewed_at,
            }),
            _ => None,
        };

        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            seats_booked: u32::try_from(row.seats_booked)?,
            status: row.status.parse::<BookingStatus>()?,
            validation_code: Masked(row.validation_code),
            code_used: row.code_used,
            booking_date: row.booking_date,
            total_price_cents: row.total_price_cents,
            review,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn get_by_validation_code(&self, code: &str) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE validation_code = $1",
            BOOKING_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn create(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, trip_id, passenger_id, seats_booked, status, validation_code,
                code_used, booking_date, total_price_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.trip_id)
        .bind(booking.passenger_id)
        .bind(i32::try_from(booking.seats_booked)?)
        .bind(booking.status.as_str())
        .bind(booking.validation_code.expose())
        .bind(booking.code_used)
        .bind(booking.booking_date)
        .bind(booking.total_price_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_fields(&self, id: Uuid, changes: &BookingChanges) -> Result<Option<Booking>, StoreError> {
        let review = changes.review.as_ref();

        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET
                status = COALESCE($2, status),
                code_used = COALESCE($3, code_used),
                rating = COALESCE($4, rating),
                review_comment = COALESCE($5, review_comment),
                reviewed_at = COALESCE($6, reviewed_at)
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.code_used)
        .bind(review.map(|r| r.rating as i16))
        .bind(review.and_then(|r| r.comment.clone()))
        .bind(review.map(|r| r.reviewed_at))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE passenger_id = $1 ORDER BY booking_date DESC",
            BOOKING_COLUMNS
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        into_bookings(rows)
    }

    async fn list_by_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE trip_id = $1 ORDER BY booking_date ASC",
            BOOKING_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        into_bookings(rows)
    }
}
