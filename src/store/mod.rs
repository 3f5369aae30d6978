//! Arena de entidades detrás de un trait
//!
//! El núcleo del optimizador no conoce el esquema de persistencia: lee
//! viajes, vehículos y empresas por IDs opacos y escribe asignaciones y
//! resultados de batch a través de `EntityStore`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{Company, CompanyOptimizationResult, OptimizationBatch, Trip, Vehicle};
use crate::utils::errors::AppResult;

/// Escritura de asignación para un viaje resuelto
#[derive(Debug, Clone, PartialEq)]
pub struct TripAssignmentUpdate {
    pub trip_id: Uuid,
    pub optimization_batch_id: Uuid,
    pub assigned_vehicle_id: Uuid,
    pub sequence_order: i32,
    pub is_last_in_chain: bool,
    pub estimated_arrival_datetime: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn companies(&self) -> AppResult<Vec<Company>>;

    /// Viajes planificados y pendientes de optimizar para un día
    async fn trips_for_date(
        &self,
        date: NaiveDate,
        company_id: Option<Uuid>,
    ) -> AppResult<Vec<Trip>>;

    /// Vehículos disponibles (opcionalmente de una sola empresa)
    async fn available_vehicles(&self, company_id: Option<Uuid>) -> AppResult<Vec<Vehicle>>;

    async fn insert_batch(&self, batch: &OptimizationBatch) -> AppResult<()>;

    async fn update_batch(&self, batch: &OptimizationBatch) -> AppResult<()>;

    /// Aplica asignaciones; devuelve cuántos viajes cambiaron realmente.
    /// Reaplicar la misma salida del solver no produce escrituras nuevas.
    async fn apply_assignments(&self, updates: &[TripAssignmentUpdate]) -> AppResult<usize>;

    async fn save_company_results(&self, results: &[CompanyOptimizationResult]) -> AppResult<()>;
}
