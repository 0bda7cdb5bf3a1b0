use chrono::NaiveDate;
use ecoride_core::{geo, CoreError, CoreResult, Trip, TripFilters};
use serde::Deserialize;

use crate::lifecycle::TripLifecycleManager;

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripSearch {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
}

enum Matcher {
    Radius { start: (f64, f64), end: (f64, f64), radius_m: f64 },
    Text { start: Option<String>, end: Option<String> },
    All,
}

impl TripSearch {
    fn matcher(&self) -> CoreResult<Matcher> {
        if let (Some(slat), Some(slng), Some(elat), Some(elng)) =
            (self.start_latitude, self.start_longitude, self.end_latitude, self.end_longitude)
        {
            if !geo::is_valid_coordinate(slat, slng) || !geo::is_valid_coordinate(elat, elng) {
                return Err(CoreError::validation("search coordinates are out of range"));
            }
            let radius_km = self.radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
            if radius_km <= 0.0 {
                return Err(CoreError::validation("search radius must be positive"));
            }
            return Ok(Matcher::Radius { start: (slat, slng), end: (elat, elng), radius_m: radius_km * 1000.0 });
        }

        let needle = |s: &Option<String>| {
            s.as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
        };
        let start = needle(&self.start_address);
        let end = needle(&self.end_address);
        if start.is_some() || end.is_some() {
            return Ok(Matcher::Text { start, end });
        }
        Ok(Matcher::All)
    }

    fn filters(&self) -> CoreResult<TripFilters> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(CoreError::validation("date_from must not be after date_to"));
            }
        }
        Ok(TripFilters { departure_from: self.date_from, departure_to: self.date_to })
    }
}

impl Matcher {
    fn matches(&self, trip: &Trip) -> bool {
        match self {
            Matcher::Radius { start, end, radius_m } => {
                geo::outside_radius(start.0, start.1, trip.start.latitude, trip.start.longitude, *radius_m).is_none()
                    && geo::outside_radius(end.0, end.1, trip.end.latitude, trip.end.longitude, *radius_m).is_none()
            }
            Matcher::Text { start, end } => {
                start.as_ref().map_or(true, |s| trip.start.address.to_lowercase().contains(s))
                    && end.as_ref().map_or(true, |e| trip.end.address.to_lowercase().contains(e))
            }
            Matcher::All => true,
        }
    }
}

impl TripLifecycleManager {
    /// Bookable future trips; coordinates take precedence over address text.
    pub async fn search(&self, query: &TripSearch) -> CoreResult<Vec<Trip>> {
        let filters = query.filters()?;
        let matcher = query.matcher()?;

        let trips = self.trips.list_available(&filters, self.clock.now()).await?;
        Ok(trips.into_iter().filter(|t| matcher.matches(t)).collect())
    }
}
