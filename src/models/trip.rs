//! Modelo de Trip
//!
//! Un viaje del diario de una empresa: origen/destino, ventana temporal,
//! carga y los campos que el optimizador escribe al cerrar el batch.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vehicle::VehicleCategory;

/// Estado del viaje dentro de su ciclo de vida
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Planned => "planned",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "planned" => Some(TripStatus::Planned),
            "in_progress" => Some(TripStatus::InProgress),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }
}

/// Estado del viaje frente al optimizador nocturno
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Pending,
    Assigned,
    Completed,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStatus::Pending => "pending",
            OptimizationStatus::Assigned => "assigned",
            OptimizationStatus::Completed => "completed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(OptimizationStatus::Pending),
            "assigned" => Some(OptimizationStatus::Assigned),
            "completed" => Some(OptimizationStatus::Completed),
            _ => None,
        }
    }
}

/// Categoría de carga. El prefijo del código determina la categoría de
/// vehículo requerida (ver services::compatibility).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CargoCategory {
    #[serde(rename = "a01_produits_frais")]
    A01ProduitsFrais,
    #[serde(rename = "a02_produits_surgeles")]
    A02ProduitsSurgeles,
    #[serde(rename = "a03_produits_secs")]
    A03ProduitsSecs,
    #[serde(rename = "a04_boissons_liquides")]
    A04BoissonsLiquides,
    #[serde(rename = "b01_materiaux_vrac")]
    B01MateriauxVrac,
    #[serde(rename = "b02_materiaux_solides")]
    B02MateriauxSolides,
    #[serde(rename = "b03_beton_pret")]
    B03BetonPret,
    #[serde(rename = "i01_produits_finis")]
    I01ProduitsFinis,
    #[serde(rename = "i02_pieces_detachees")]
    I02PiecesDetachees,
    #[serde(rename = "c01_chimiques_liquides")]
    C01ChimiquesLiquides,
    #[serde(rename = "c02_chimiques_solides")]
    C02ChimiquesSolides,
}

impl CargoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CargoCategory::A01ProduitsFrais => "a01_produits_frais",
            CargoCategory::A02ProduitsSurgeles => "a02_produits_surgeles",
            CargoCategory::A03ProduitsSecs => "a03_produits_secs",
            CargoCategory::A04BoissonsLiquides => "a04_boissons_liquides",
            CargoCategory::B01MateriauxVrac => "b01_materiaux_vrac",
            CargoCategory::B02MateriauxSolides => "b02_materiaux_solides",
            CargoCategory::B03BetonPret => "b03_beton_pret",
            CargoCategory::I01ProduitsFinis => "i01_produits_finis",
            CargoCategory::I02PiecesDetachees => "i02_pieces_detachees",
            CargoCategory::C01ChimiquesLiquides => "c01_chimiques_liquides",
            CargoCategory::C02ChimiquesSolides => "c02_chimiques_solides",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a01_produits_frais" => Some(CargoCategory::A01ProduitsFrais),
            "a02_produits_surgeles" => Some(CargoCategory::A02ProduitsSurgeles),
            "a03_produits_secs" => Some(CargoCategory::A03ProduitsSecs),
            "a04_boissons_liquides" => Some(CargoCategory::A04BoissonsLiquides),
            "b01_materiaux_vrac" => Some(CargoCategory::B01MateriauxVrac),
            "b02_materiaux_solides" => Some(CargoCategory::B02MateriauxSolides),
            "b03_beton_pret" => Some(CargoCategory::B03BetonPret),
            "i01_produits_finis" => Some(CargoCategory::I01ProduitsFinis),
            "i02_pieces_detachees" => Some(CargoCategory::I02PiecesDetachees),
            "c01_chimiques_liquides" => Some(CargoCategory::C01ChimiquesLiquides),
            "c02_chimiques_solides" => Some(CargoCategory::C02ChimiquesSolides),
            _ => None,
        }
    }
}

/// Trip principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub company_id: Uuid,

    pub departure_point: String,
    pub arrival_point: String,
    pub departure_lat: Option<f64>,
    pub departure_lng: Option<f64>,
    pub arrival_lat: Option<f64>,
    pub arrival_lng: Option<f64>,

    pub trip_date: NaiveDate,
    pub departure_datetime: DateTime<Utc>,
    pub arrival_datetime_planned: DateTime<Utc>,

    pub cargo_category: CargoCategory,
    pub material_type: Option<String>,
    pub cargo_weight_kg: f64,
    pub cargo_volume_m3: Option<f64>,
    pub required_vehicle_category: Option<VehicleCategory>,

    // Ruta precalculada (si la ingesta ya llamó al motor de rutas)
    pub route_distance_km: Option<f64>,
    pub route_duration_min: Option<f64>,
    pub return_distance_km: Option<f64>,
    pub service_time_min: Option<i64>,

    pub status: TripStatus,

    // Campos escritos por el Plan Applier
    pub assigned_vehicle_id: Option<Uuid>,
    pub sequence_order: Option<i32>,
    pub is_last_in_chain: Option<bool>,
    pub optimization_batch_id: Option<Uuid>,
    pub optimization_status: OptimizationStatus,
    pub estimated_arrival_datetime: Option<DateTime<Utc>>,
}

impl Trip {
    pub fn origin(&self) -> Option<(f64, f64)> {
        match (self.departure_lat, self.departure_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<(f64, f64)> {
        match (self.arrival_lat, self.arrival_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn has_coords(&self) -> bool {
        self.origin().is_some() && self.destination().is_some()
    }
}
