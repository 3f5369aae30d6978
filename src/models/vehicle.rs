//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle, su estado operativo y las
//! categorías de vehículo que gobiernan la compatibilidad de carga.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado operativo del vehículo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InMission,
    Maintenance,
    Inactive,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InMission => "in_mission",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Inactive => "inactive",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "available" => Some(VehicleStatus::Available),
            "in_mission" => Some(VehicleStatus::InMission),
            "maintenance" => Some(VehicleStatus::Maintenance),
            "inactive" => Some(VehicleStatus::Inactive),
            _ => None,
        }
    }
}

/// Categoría de vehículo. Los grupos de optimización particionan la flota
/// por categoría; los valores serializados siguen los códigos del sector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleCategory {
    #[serde(rename = "ag1_camion_frigorifique")]
    Ag1CamionFrigorifique,
    #[serde(rename = "ag2_camion_refrigere")]
    Ag2CamionRefrigere,
    #[serde(rename = "ag3_camion_isotherme")]
    Ag3CamionIsotherme,
    #[serde(rename = "ag4_camion_citerne_alimentaire")]
    Ag4CamionCiterneAlimentaire,
    #[serde(rename = "bt1_camion_benne")]
    Bt1CamionBenne,
    #[serde(rename = "bt3_camion_malaxeur")]
    Bt3CamionMalaxeur,
    #[serde(rename = "bt4_camion_plateau_ridelles")]
    Bt4CamionPlateauRidelles,
    #[serde(rename = "in2_fourgon_ferme")]
    In2FourgonFerme,
    #[serde(rename = "in6_camion_fourgon_hayon")]
    In6CamionFourgonHayon,
    #[serde(rename = "ch2_camion_citerne_chimique")]
    Ch2CamionCiterneChimique,
    #[serde(rename = "ch4_camion_adr")]
    Ch4CamionAdr,
}

impl VehicleCategory {
    /// Código corto usado en reportes y razones de no-asignación
    pub fn code(&self) -> &'static str {
        match self {
            VehicleCategory::Ag1CamionFrigorifique => "AG1",
            VehicleCategory::Ag2CamionRefrigere => "AG2",
            VehicleCategory::Ag3CamionIsotherme => "AG3",
            VehicleCategory::Ag4CamionCiterneAlimentaire => "AG4",
            VehicleCategory::Bt1CamionBenne => "BT1",
            VehicleCategory::Bt3CamionMalaxeur => "BT3",
            VehicleCategory::Bt4CamionPlateauRidelles => "BT4",
            VehicleCategory::In2FourgonFerme => "IN2",
            VehicleCategory::In6CamionFourgonHayon => "IN6",
            VehicleCategory::Ch2CamionCiterneChimique => "CH2",
            VehicleCategory::Ch4CamionAdr => "CH4",
        }
    }

    /// Valor serializado completo (columna de base de datos)
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCategory::Ag1CamionFrigorifique => "ag1_camion_frigorifique",
            VehicleCategory::Ag2CamionRefrigere => "ag2_camion_refrigere",
            VehicleCategory::Ag3CamionIsotherme => "ag3_camion_isotherme",
            VehicleCategory::Ag4CamionCiterneAlimentaire => "ag4_camion_citerne_alimentaire",
            VehicleCategory::Bt1CamionBenne => "bt1_camion_benne",
            VehicleCategory::Bt3CamionMalaxeur => "bt3_camion_malaxeur",
            VehicleCategory::Bt4CamionPlateauRidelles => "bt4_camion_plateau_ridelles",
            VehicleCategory::In2FourgonFerme => "in2_fourgon_ferme",
            VehicleCategory::In6CamionFourgonHayon => "in6_camion_fourgon_hayon",
            VehicleCategory::Ch2CamionCiterneChimique => "ch2_camion_citerne_chimique",
            VehicleCategory::Ch4CamionAdr => "ch4_camion_adr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ag1_camion_frigorifique" => Some(VehicleCategory::Ag1CamionFrigorifique),
            "ag2_camion_refrigere" => Some(VehicleCategory::Ag2CamionRefrigere),
            "ag3_camion_isotherme" => Some(VehicleCategory::Ag3CamionIsotherme),
            "ag4_camion_citerne_alimentaire" => Some(VehicleCategory::Ag4CamionCiterneAlimentaire),
            "bt1_camion_benne" => Some(VehicleCategory::Bt1CamionBenne),
            "bt3_camion_malaxeur" => Some(VehicleCategory::Bt3CamionMalaxeur),
            "bt4_camion_plateau_ridelles" => Some(VehicleCategory::Bt4CamionPlateauRidelles),
            "in2_fourgon_ferme" => Some(VehicleCategory::In2FourgonFerme),
            "in6_camion_fourgon_hayon" => Some(VehicleCategory::In6CamionFourgonHayon),
            "ch2_camion_citerne_chimique" => Some(VehicleCategory::Ch2CamionCiterneChimique),
            "ch4_camion_adr" => Some(VehicleCategory::Ch4CamionAdr),
            _ => None,
        }
    }
}

/// Vehicle principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category: VehicleCategory,
    pub capacity_tons: f64,
    pub capacity_m3: Option<f64>,

    // Depósito propio; si falta se usa el de la empresa
    pub depot_lat: Option<f64>,
    pub depot_lng: Option<f64>,

    pub cost_per_km: Option<f64>,
    /// Consumo en L/100 km
    pub fuel_consumption_l_per_100km: Option<f64>,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn capacity_kg(&self) -> f64 {
        self.capacity_tons * 1000.0
    }

    pub fn own_depot(&self) -> Option<(f64, f64)> {
        match (self.depot_lat, self.depot_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}
