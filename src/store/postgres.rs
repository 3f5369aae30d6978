//! Store Postgres
//!
//! Implementación de `EntityStore` sobre sqlx. Las columnas de estado y
//! categoría se guardan como texto y se convierten a los enums del dominio
//! al leer; las consultas son runtime (`query_as`) como en el resto del
//! backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    CargoCategory, Company, CompanyOptimizationResult, OptimizationBatch, OptimizationBatchStatus,
    OptimizationStatus, Trip, TripStatus, Vehicle, VehicleCategory, VehicleStatus,
};
use crate::utils::errors::{AppError, AppResult};

use super::{EntityStore, TripAssignmentUpdate};

pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    company_name: String,
    depot_lat: Option<f64>,
    depot_lng: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    company_id: Uuid,
    category: String,
    capacity_tons: f64,
    capacity_m3: Option<f64>,
    depot_lat: Option<f64>,
    depot_lng: Option<f64>,
    cost_per_km: Option<f64>,
    fuel_consumption_l_per_100km: Option<f64>,
    status: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    company_id: Uuid,
    departure_point: String,
    arrival_point: String,
    departure_lat: Option<f64>,
    departure_lng: Option<f64>,
    arrival_lat: Option<f64>,
    arrival_lng: Option<f64>,
    trip_date: NaiveDate,
    departure_datetime: DateTime<Utc>,
    arrival_datetime_planned: DateTime<Utc>,
    cargo_category: String,
    material_type: Option<String>,
    cargo_weight_kg: f64,
    cargo_volume_m3: Option<f64>,
    required_vehicle_category: Option<String>,
    route_distance_km: Option<f64>,
    route_duration_min: Option<f64>,
    return_distance_km: Option<f64>,
    service_time_min: Option<i64>,
    status: String,
    assigned_vehicle_id: Option<Uuid>,
    sequence_order: Option<i32>,
    is_last_in_chain: Option<bool>,
    optimization_batch_id: Option<Uuid>,
    optimization_status: String,
    estimated_arrival_datetime: Option<DateTime<Utc>>,
}

fn bad_enum(column: &str, value: &str) -> AppError {
    AppError::Database(format!("unexpected {} value '{}'", column, value))
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = AppError;

    fn try_from(row: VehicleRow) -> AppResult<Self> {
        Ok(Vehicle {
            id: row.id,
            company_id: row.company_id,
            category: VehicleCategory::from_code(&row.category)
                .ok_or_else(|| bad_enum("vehicle.category", &row.category))?,
            capacity_tons: row.capacity_tons,
            capacity_m3: row.capacity_m3,
            depot_lat: row.depot_lat,
            depot_lng: row.depot_lng,
            cost_per_km: row.cost_per_km,
            fuel_consumption_l_per_100km: row.fuel_consumption_l_per_100km,
            status: VehicleStatus::from_code(&row.status)
                .ok_or_else(|| bad_enum("vehicle.status", &row.status))?,
        })
    }
}

impl TryFrom<TripRow> for Trip {
    type Error = AppError;

    fn try_from(row: TripRow) -> AppResult<Self> {
        let required_vehicle_category = match &row.required_vehicle_category {
            Some(code) => Some(
                VehicleCategory::from_code(code)
                    .ok_or_else(|| bad_enum("trip.required_vehicle_category", code))?,
            ),
            None => None,
        };

        Ok(Trip {
            id: row.id,
            company_id: row.company_id,
            departure_point: row.departure_point,
            arrival_point: row.arrival_point,
            departure_lat: row.departure_lat,
            departure_lng: row.departure_lng,
            arrival_lat: row.arrival_lat,
            arrival_lng: row.arrival_lng,
            trip_date: row.trip_date,
            departure_datetime: row.departure_datetime,
            arrival_datetime_planned: row.arrival_datetime_planned,
            cargo_category: CargoCategory::from_code(&row.cargo_category)
                .ok_or_else(|| bad_enum("trip.cargo_category", &row.cargo_category))?,
            material_type: row.material_type,
            cargo_weight_kg: row.cargo_weight_kg,
            cargo_volume_m3: row.cargo_volume_m3,
            required_vehicle_category,
            route_distance_km: row.route_distance_km,
            route_duration_min: row.route_duration_min,
            return_distance_km: row.return_distance_km,
            service_time_min: row.service_time_min,
            status: TripStatus::from_code(&row.status)
                .ok_or_else(|| bad_enum("trip.status", &row.status))?,
            assigned_vehicle_id: row.assigned_vehicle_id,
            sequence_order: row.sequence_order,
            is_last_in_chain: row.is_last_in_chain,
            optimization_batch_id: row.optimization_batch_id,
            optimization_status: OptimizationStatus::from_code(&row.optimization_status)
                .ok_or_else(|| bad_enum("trip.optimization_status", &row.optimization_status))?,
            estimated_arrival_datetime: row.estimated_arrival_datetime,
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Error connecting to database: {}", e)))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn companies(&self) -> AppResult<Vec<Company>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, company_name, depot_lat, depot_lng FROM companies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Error listing companies: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Company {
                id: row.id,
                company_name: row.company_name,
                depot_lat: row.depot_lat,
                depot_lng: row.depot_lng,
            })
            .collect())
    }

    async fn trips_for_date(
        &self,
        date: NaiveDate,
        company_id: Option<Uuid>,
    ) -> AppResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT * FROM trips
            WHERE trip_date = $1
              AND status = 'planned'
              AND optimization_status = 'pending'
              AND assigned_vehicle_id IS NULL
              AND ($2::uuid IS NULL OR company_id = $2)
            ORDER BY id
            "#,
        )
        .bind(date)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Error listing trips: {}", e)))?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn available_vehicles(&self, company_id: Option<Uuid>) -> AppResult<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT * FROM vehicles
            WHERE status = 'available'
              AND ($1::uuid IS NULL OR company_id = $1)
            ORDER BY id
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Error listing vehicles: {}", e)))?;

        rows.into_iter().map(Vehicle::try_from).collect()
    }

    async fn insert_batch(&self, batch: &OptimizationBatch) -> AppResult<()> {
        let participating = serde_json::to_value(&batch.participating_companies)?;
        sqlx::query(
            r#"
            INSERT INTO optimization_batches
                (id, batch_date, optimization_type, status, total_trips, vehicles_used,
                 km_saved, fuel_saved_liters, participating_companies, created_at,
                 completed_at, solver_time_s, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(batch.id)
        .bind(batch.batch_date)
        .bind(batch.optimization_type.as_str())
        .bind(batch.status.as_str())
        .bind(batch.total_trips)
        .bind(batch.vehicles_used)
        .bind(batch.km_saved)
        .bind(batch.fuel_saved_liters)
        .bind(participating)
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .bind(batch.solver_time_s)
        .bind(&batch.error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Error creating batch: {}", e)))?;

        Ok(())
    }

    async fn update_batch(&self, batch: &OptimizationBatch) -> AppResult<()> {
        let participating = serde_json::to_value(&batch.participating_companies)?;
        let result = sqlx::query(
            r#"
            UPDATE optimization_batches SET
                status = $2,
                total_trips = $3,
                vehicles_used = $4,
                km_saved = $5,
                fuel_saved_liters = $6,
                participating_companies = $7,
                completed_at = $8,
                solver_time_s = $9,
                error = $10
            WHERE id = $1
              AND (status NOT IN ('COMPLETED', 'FAILED') OR status = $2)
            "#,
        )
        .bind(batch.id)
        .bind(batch.status.as_str())
        .bind(batch.total_trips)
        .bind(batch.vehicles_used)
        .bind(batch.km_saved)
        .bind(batch.fuel_saved_liters)
        .bind(participating)
        .bind(batch.completed_at)
        .bind(batch.solver_time_s)
        .bind(&batch.error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Error updating batch: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Database(format!(
                "batch {} not updated (missing or terminal)",
                batch.id
            )));
        }

        if batch.status == OptimizationBatchStatus::Completed
            || batch.status == OptimizationBatchStatus::Failed
        {
            tracing::debug!("batch {} finalized as {}", batch.id, batch.status.as_str());
        }

        Ok(())
    }

    async fn apply_assignments(&self, updates: &[TripAssignmentUpdate]) -> AppResult<usize> {
        let mut changed = 0usize;

        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE trips SET
                    optimization_batch_id = $2,
                    assigned_vehicle_id = $3,
                    sequence_order = $4,
                    is_last_in_chain = $5,
                    optimization_status = 'assigned',
                    estimated_arrival_datetime = $6
                WHERE id = $1
                  AND (optimization_batch_id IS DISTINCT FROM $2
                       OR assigned_vehicle_id IS DISTINCT FROM $3
                       OR sequence_order IS DISTINCT FROM $4
                       OR is_last_in_chain IS DISTINCT FROM $5
                       OR optimization_status IS DISTINCT FROM 'assigned')
                "#,
            )
            .bind(update.trip_id)
            .bind(update.optimization_batch_id)
            .bind(update.assigned_vehicle_id)
            .bind(update.sequence_order)
            .bind(update.is_last_in_chain)
            .bind(update.estimated_arrival_datetime)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Error applying assignment: {}", e)))?;

            changed += result.rows_affected() as usize;
        }

        Ok(changed)
    }

    async fn save_company_results(&self, results: &[CompanyOptimizationResult]) -> AppResult<()> {
        for result in results {
            sqlx::query(
                r#"
                INSERT INTO company_optimization_results
                    (optimization_batch_id, company_id, trips_contributed, trips_assigned,
                     vehicles_used, vehicles_borrowed, vehicles_shared_out,
                     km_saved, fuel_saved_liters, co2_saved_kg, cost_saved)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(result.optimization_batch_id)
            .bind(result.company_id)
            .bind(result.trips_contributed)
            .bind(result.trips_assigned)
            .bind(result.vehicles_used)
            .bind(result.vehicles_borrowed)
            .bind(result.vehicles_shared_out)
            .bind(result.km_saved)
            .bind(result.fuel_saved_liters)
            .bind(result.co2_saved_kg)
            .bind(result.cost_saved)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Error saving company result: {}", e)))?;
        }

        Ok(())
    }
}
