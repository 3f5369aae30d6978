//! Reporte JSON del batch
//!
//! Forma estable del reporte que consume la CLI (y cualquier API por
//! encima); agnóstica al transporte.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::batch::OptimizationType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub optimization_type: OptimizationType,
    pub trips_optimized: usize,
    pub vehicles_used: usize,
    pub participating_companies: Vec<Uuid>,
    pub totals: ReportTotals,
    pub assignments: Vec<ReportAssignment>,
    pub unassigned: Vec<UnassignedTrip>,
    pub company_results: BTreeMap<Uuid, CompanyKpis>,
    /// Diagnóstico del motor de rutas por categoría de vehículo
    pub valhalla: BTreeMap<String, GroupDiagnostics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub km_saved: f64,
    #[serde(rename = "fuel_saved_L")]
    pub fuel_saved_liters: f64,
    pub co2_saved_kg: f64,
    pub cost_saved: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAssignment {
    pub trip_id: Uuid,
    pub assigned_vehicle_id: Uuid,
    pub original_company_id: Uuid,
    pub assigned_company_id: Uuid,
    pub sequence_order: i32,
    pub is_last_in_chain: bool,
    pub start_time_iso: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignedTrip {
    pub trip_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyKpis {
    pub trips_contributed: usize,
    pub trips_assigned: usize,
    pub vehicles_used: usize,
    pub vehicles_borrowed: usize,
    pub vehicles_shared_out: usize,
    pub km_saved: f64,
    #[serde(rename = "fuel_saved_L")]
    pub fuel_saved_liters: f64,
    pub co2_saved_kg: f64,
    pub cost_saved: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

/// Estado de la matriz y del solver para un grupo de categoría
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDiagnostics {
    pub matrix_ok: bool,
    pub fallback_used: bool,
    pub locations: usize,
    /// true cuando el grupo cayó al reparto round-robin
    pub solver_fallback: bool,
}
