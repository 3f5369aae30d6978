//! Store en memoria
//!
//! Implementación de `EntityStore` sobre mapas protegidos por RwLock.
//! Carga datasets JSON validados; es el backend de la CLI sin base de
//! datos y de la suite de tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CargoCategory, Company, CompanyOptimizationResult, OptimizationBatch, OptimizationStatus,
    Trip, TripStatus, Vehicle, VehicleCategory, VehicleStatus,
};
use crate::utils::errors::{not_found_error, AppError, AppResult};

use super::{EntityStore, TripAssignmentUpdate};

// --- Registros de importación del dataset JSON ---

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CompanyRecord {
    pub id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub depot_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub depot_lng: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct VehicleRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category: VehicleCategory,
    #[validate(range(min = 0.1, max = 60.0))]
    pub capacity_tons: f64,
    #[validate(range(min = 0.1, max = 200.0))]
    pub capacity_m3: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub depot_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub depot_lng: Option<f64>,
    pub cost_per_km: Option<f64>,
    pub fuel_consumption_l_per_100km: Option<f64>,
    #[serde(default = "default_vehicle_status")]
    pub status: VehicleStatus,
}

fn default_vehicle_status() -> VehicleStatus {
    VehicleStatus::Available
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TripRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    #[validate(length(min = 1, max = 300))]
    pub departure_point: String,
    #[validate(length(min = 1, max = 300))]
    pub arrival_point: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub departure_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub departure_lng: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub arrival_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub arrival_lng: Option<f64>,
    pub departure_datetime: DateTime<Utc>,
    pub arrival_datetime_planned: DateTime<Utc>,
    pub cargo_category: CargoCategory,
    pub material_type: Option<String>,
    #[validate(range(min = 1.0, max = 60000.0))]
    pub cargo_weight_kg: f64,
    pub cargo_volume_m3: Option<f64>,
    pub required_vehicle_category: Option<VehicleCategory>,
    pub route_distance_km: Option<f64>,
    pub route_duration_min: Option<f64>,
    pub return_distance_km: Option<f64>,
    pub service_time_min: Option<i64>,
    #[serde(default = "default_trip_status")]
    pub status: TripStatus,
}

fn default_trip_status() -> TripStatus {
    TripStatus::Planned
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Dataset {
    pub companies: Vec<CompanyRecord>,
    pub vehicles: Vec<VehicleRecord>,
    pub trips: Vec<TripRecord>,
}

/// Store en memoria con los mapas de entidades
#[derive(Default, Debug)]
pub struct InMemoryStore {
    companies: RwLock<HashMap<Uuid, Company>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
    trips: RwLock<HashMap<Uuid, Trip>>,
    batches: RwLock<HashMap<Uuid, OptimizationBatch>>,
    company_results: RwLock<Vec<CompanyOptimizationResult>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carga un dataset JSON validando cada registro
    pub async fn load_dataset_file(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Validation(format!("cannot read dataset {:?}: {}", path, e)))?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        Self::from_dataset(dataset)
    }

    pub fn from_dataset(dataset: Dataset) -> AppResult<Self> {
        let mut errors: Vec<String> = Vec::new();

        let mut companies = HashMap::new();
        for record in &dataset.companies {
            if let Err(e) = record.validate() {
                errors.push(format!("company {}: {}", record.id, e));
                continue;
            }
            if companies
                .insert(
                    record.id,
                    Company {
                        id: record.id,
                        company_name: record.company_name.clone(),
                        depot_lat: record.depot_lat,
                        depot_lng: record.depot_lng,
                    },
                )
                .is_some()
            {
                errors.push(format!("duplicate company ID: {}", record.id));
            }
        }

        let mut vehicles = HashMap::new();
        for record in &dataset.vehicles {
            if let Err(e) = record.validate() {
                errors.push(format!("vehicle {}: {}", record.id, e));
                continue;
            }
            if !companies.contains_key(&record.company_id) {
                errors.push(format!(
                    "vehicle {}: unknown company {}",
                    record.id, record.company_id
                ));
                continue;
            }
            if vehicles
                .insert(
                    record.id,
                    Vehicle {
                        id: record.id,
                        company_id: record.company_id,
                        category: record.category,
                        capacity_tons: record.capacity_tons,
                        capacity_m3: record.capacity_m3,
                        depot_lat: record.depot_lat,
                        depot_lng: record.depot_lng,
                        cost_per_km: record.cost_per_km,
                        fuel_consumption_l_per_100km: record.fuel_consumption_l_per_100km,
                        status: record.status,
                    },
                )
                .is_some()
            {
                errors.push(format!("duplicate vehicle ID: {}", record.id));
            }
        }

        let mut trips = HashMap::new();
        for record in &dataset.trips {
            if let Err(e) = record.validate() {
                errors.push(format!("trip {}: {}", record.id, e));
                continue;
            }
            if record.departure_datetime >= record.arrival_datetime_planned {
                errors.push(format!(
                    "trip {}: departure must precede planned arrival",
                    record.id
                ));
                continue;
            }
            if !companies.contains_key(&record.company_id) {
                errors.push(format!(
                    "trip {}: unknown company {}",
                    record.id, record.company_id
                ));
                continue;
            }
            if trips
                .insert(
                    record.id,
                    Trip {
                        id: record.id,
                        company_id: record.company_id,
                        departure_point: record.departure_point.clone(),
                        arrival_point: record.arrival_point.clone(),
                        departure_lat: record.departure_lat,
                        departure_lng: record.departure_lng,
                        arrival_lat: record.arrival_lat,
                        arrival_lng: record.arrival_lng,
                        trip_date: record.departure_datetime.date_naive(),
                        departure_datetime: record.departure_datetime,
                        arrival_datetime_planned: record.arrival_datetime_planned,
                        cargo_category: record.cargo_category,
                        material_type: record.material_type.clone(),
                        cargo_weight_kg: record.cargo_weight_kg,
                        cargo_volume_m3: record.cargo_volume_m3,
                        required_vehicle_category: record.required_vehicle_category,
                        route_distance_km: record.route_distance_km,
                        route_duration_min: record.route_duration_min,
                        return_distance_km: record.return_distance_km,
                        service_time_min: record.service_time_min,
                        status: record.status,
                        assigned_vehicle_id: None,
                        sequence_order: None,
                        is_last_in_chain: None,
                        optimization_batch_id: None,
                        optimization_status: OptimizationStatus::Pending,
                        estimated_arrival_datetime: None,
                    },
                )
                .is_some()
            {
                errors.push(format!("duplicate trip ID: {}", record.id));
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join("; ")));
        }

        Ok(Self {
            companies: RwLock::new(companies),
            vehicles: RwLock::new(vehicles),
            trips: RwLock::new(trips),
            batches: RwLock::new(HashMap::new()),
            company_results: RwLock::new(Vec::new()),
        })
    }

    /// Lectura directa de un viaje (inspección en tests y reportes)
    pub async fn trip(&self, id: Uuid) -> Option<Trip> {
        self.trips.read().await.get(&id).cloned()
    }

    pub async fn batch(&self, id: Uuid) -> Option<OptimizationBatch> {
        self.batches.read().await.get(&id).cloned()
    }

    pub async fn saved_company_results(&self) -> Vec<CompanyOptimizationResult> {
        self.company_results.read().await.clone()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn companies(&self) -> AppResult<Vec<Company>> {
        let mut companies: Vec<Company> = self.companies.read().await.values().cloned().collect();
        companies.sort_by_key(|c| c.id);
        Ok(companies)
    }

    async fn trips_for_date(
        &self,
        date: NaiveDate,
        company_id: Option<Uuid>,
    ) -> AppResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| t.trip_date == date)
            .filter(|t| t.status == TripStatus::Planned)
            .filter(|t| t.optimization_status == OptimizationStatus::Pending)
            .filter(|t| t.assigned_vehicle_id.is_none())
            .filter(|t| company_id.map(|c| t.company_id == c).unwrap_or(true))
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.id);
        Ok(trips)
    }

    async fn available_vehicles(&self, company_id: Option<Uuid>) -> AppResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.status == VehicleStatus::Available)
            .filter(|v| company_id.map(|c| v.company_id == c).unwrap_or(true))
            .cloned()
            .collect();
        vehicles.sort_by_key(|v| v.id);
        Ok(vehicles)
    }

    async fn insert_batch(&self, batch: &OptimizationBatch) -> AppResult<()> {
        self.batches.write().await.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn update_batch(&self, batch: &OptimizationBatch) -> AppResult<()> {
        let mut batches = self.batches.write().await;
        if let Some(existing) = batches.get(&batch.id) {
            // Los estados terminales no resucitan
            if existing.status.is_terminal() && existing.status != batch.status {
                return Err(AppError::Internal(format!(
                    "batch {} is terminal ({}), refusing transition to {}",
                    batch.id,
                    existing.status.as_str(),
                    batch.status.as_str()
                )));
            }
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn apply_assignments(&self, updates: &[TripAssignmentUpdate]) -> AppResult<usize> {
        let mut trips = self.trips.write().await;
        let mut changed = 0;

        for update in updates {
            let trip = trips
                .get_mut(&update.trip_id)
                .ok_or_else(|| not_found_error("trip", &update.trip_id.to_string()))?;

            let already_applied = trip.optimization_batch_id == Some(update.optimization_batch_id)
                && trip.assigned_vehicle_id == Some(update.assigned_vehicle_id)
                && trip.sequence_order == Some(update.sequence_order)
                && trip.is_last_in_chain == Some(update.is_last_in_chain)
                && trip.optimization_status == OptimizationStatus::Assigned;
            if already_applied {
                continue;
            }

            trip.optimization_batch_id = Some(update.optimization_batch_id);
            trip.assigned_vehicle_id = Some(update.assigned_vehicle_id);
            trip.sequence_order = Some(update.sequence_order);
            trip.is_last_in_chain = Some(update.is_last_in_chain);
            trip.optimization_status = OptimizationStatus::Assigned;
            trip.estimated_arrival_datetime = update.estimated_arrival_datetime;
            changed += 1;
        }

        Ok(changed)
    }

    async fn save_company_results(&self, results: &[CompanyOptimizationResult]) -> AppResult<()> {
        let mut stored = self.company_results.write().await;
        stored.extend(results.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minimal_dataset() -> Dataset {
        let company_id = Uuid::new_v4();
        Dataset {
            companies: vec![CompanyRecord {
                id: company_id,
                company_name: "Transport Atlas".to_string(),
                depot_lat: Some(36.75),
                depot_lng: Some(3.04),
            }],
            vehicles: vec![VehicleRecord {
                id: Uuid::new_v4(),
                company_id,
                category: VehicleCategory::Ag1CamionFrigorifique,
                capacity_tons: 6.0,
                capacity_m3: None,
                depot_lat: None,
                depot_lng: None,
                cost_per_km: None,
                fuel_consumption_l_per_100km: None,
                status: VehicleStatus::Available,
            }],
            trips: vec![TripRecord {
                id: Uuid::new_v4(),
                company_id,
                departure_point: "Alger".to_string(),
                arrival_point: "Blida".to_string(),
                departure_lat: Some(36.7531),
                departure_lng: Some(2.9958),
                arrival_lat: Some(36.47),
                arrival_lng: Some(2.83),
                departure_datetime: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
                arrival_datetime_planned: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
                cargo_category: CargoCategory::A01ProduitsFrais,
                material_type: None,
                cargo_weight_kg: 4000.0,
                cargo_volume_m3: None,
                required_vehicle_category: None,
                route_distance_km: Some(45.0),
                route_duration_min: Some(50.0),
                return_distance_km: Some(45.0),
                service_time_min: None,
                status: TripStatus::Planned,
            }],
        }
    }

    #[tokio::test]
    async fn test_load_valid_dataset() {
        let store = InMemoryStore::from_dataset(minimal_dataset()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(store.trips_for_date(date, None).await.unwrap().len(), 1);
        assert_eq!(store.available_vehicles(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inverted_time_window_rejected() {
        let mut dataset = minimal_dataset();
        dataset.trips[0].arrival_datetime_planned = dataset.trips[0].departure_datetime;
        let err = InMemoryStore::from_dataset(dataset).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_company_rejected() {
        let mut dataset = minimal_dataset();
        dataset.vehicles[0].company_id = Uuid::new_v4();
        let err = InMemoryStore::from_dataset(dataset).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_terminal_batch_does_not_resurrect() {
        let store = InMemoryStore::from_dataset(minimal_dataset()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut batch = OptimizationBatch::open(
            Uuid::new_v4(),
            date,
            crate::models::OptimizationType::CrossCompany,
            Utc::now(),
        );
        store.insert_batch(&batch).await.unwrap();

        batch.status = crate::models::OptimizationBatchStatus::Completed;
        store.update_batch(&batch).await.unwrap();

        batch.status = crate::models::OptimizationBatchStatus::Processing;
        assert!(store.update_batch(&batch).await.is_err());
    }
}
