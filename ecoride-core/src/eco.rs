use serde::{Deserialize, Serialize};

pub const DEFAULT_CO2_PER_KM: f64 = 0.15;
pub const DEFAULT_TREES_PER_KM: f64 = 0.01;

/// Per passenger-kilometre conversion factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EcoFactors {
    pub co2_per_km: f64,
    pub trees_per_km: f64,
}

impl Default for EcoFactors {
    fn default() -> Self {
        Self { co2_per_km: DEFAULT_CO2_PER_KM, trees_per_km: DEFAULT_TREES_PER_KM }
    }
}

impl EcoFactors {
    /// Accrual for a completed trip, floored to whole units.
    pub fn accrue(&self, distance_km: f64, passengers: u32) -> EcoCredit {
        let passenger_km = distance_km * passengers as f64;
        EcoCredit {
            co2_kg: (passenger_km * self.co2_per_km).floor() as i64,
            trees: (passenger_km * self.trees_per_km).floor() as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EcoCredit {
    pub co2_kg: i64,
    pub trees: i64,
}
