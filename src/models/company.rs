//! Modelo de Company
//!
//! Empresa participante en la mutualización de flotas. El depósito de la
//! empresa es el fallback cuando un vehículo no tiene depósito propio.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub company_name: String,
    pub depot_lat: Option<f64>,
    pub depot_lng: Option<f64>,
}

impl Company {
    pub fn depot(&self) -> Option<(f64, f64)> {
        match (self.depot_lat, self.depot_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}
