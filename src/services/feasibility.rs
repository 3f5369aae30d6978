//! Constructor de factibilidad
//!
//! Prepara los datos que ve el solver de un grupo de categoría: viajes
//! planificados con ventanas en minutos, vehículos con depósito resuelto,
//! el snapshot inmutable de la matriz de rutas y el conjunto de arcos
//! compatibles en precedencia.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Company, Trip, UnassignedTrip, Vehicle, VehicleCategory};
use crate::services::compatibility::is_vehicle_compatible;
use crate::services::valhalla_service::MatrixResult;
use crate::utils::geo::coord_key;

/// Duración por defecto cuando el viaje no trae ruta precalculada (minutos)
const DEFAULT_TRIP_DURATION_MIN: i64 = 60;

/// Viaje en la forma que consume el solver; tiempos en minutos desde la
/// medianoche del día del batch
#[derive(Debug, Clone)]
pub struct PlanningTrip {
    pub id: Uuid,
    pub company_id: Uuid,
    pub origin: (f64, f64),
    pub dest: (f64, f64),
    pub earliest_min: i64,
    pub latest_start_min: i64,
    pub duration_min: i64,
    pub service_min: i64,
    pub weight_kg: f64,
    pub volume_m3: Option<f64>,
    pub route_distance_km: f64,
    /// Distancia de retorno al depósito propio (estimación r_i0)
    pub return_distance_km: f64,
    pub departure_datetime: DateTime<Utc>,
}

/// Vehículo con depósito efectivo resuelto
#[derive(Debug, Clone)]
pub struct PlanningVehicle {
    pub id: Uuid,
    pub company_id: Uuid,
    pub depot: (f64, f64),
    pub capacity_kg: f64,
    pub capacity_m3: Option<f64>,
}

/// Arco de precedencia factible i → j
#[derive(Debug, Clone, Copy)]
pub struct FeasibleArc {
    pub from: usize,
    pub to: usize,
    pub travel_min: i64,
    pub deadhead_km: f64,
}

/// Snapshot inmutable de la matriz de un grupo; se reutiliza en todas las
/// pasadas del solver
#[derive(Debug, Clone)]
pub struct MatrixSnapshot {
    locations: Vec<(f64, f64)>,
    index: HashMap<(i64, i64), usize>,
    durations_s: Vec<Vec<f64>>,
    distances_m: Vec<Vec<f64>>,
    pub ok: bool,
    pub fallback_used: bool,
}

impl MatrixSnapshot {
    pub fn new(locations: Vec<(f64, f64)>, matrix: MatrixResult) -> Self {
        let mut index = HashMap::new();
        for (i, &(lat, lng)) in locations.iter().enumerate() {
            index.entry(coord_key(lat, lng)).or_insert(i);
        }
        Self {
            locations,
            index,
            durations_s: matrix.durations_s,
            distances_m: matrix.distances_m,
            ok: matrix.ok,
            fallback_used: matrix.fallback_used,
        }
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    fn lookup(&self, point: (f64, f64)) -> Option<usize> {
        self.index.get(&coord_key(point.0, point.1)).copied()
    }

    /// Minutos de viaje entre dos puntos, redondeados hacia arriba
    pub fn travel_min(&self, from: (f64, f64), to: (f64, f64)) -> i64 {
        match (self.lookup(from), self.lookup(to)) {
            (Some(i), Some(j)) => (self.durations_s[i][j] / 60.0).ceil() as i64,
            _ => 0,
        }
    }

    pub fn distance_km(&self, from: (f64, f64), to: (f64, f64)) -> f64 {
        match (self.lookup(from), self.lookup(to)) {
            (Some(i), Some(j)) => self.distances_m[i][j] / 1000.0,
            _ => 0.0,
        }
    }
}

/// Junta las ubicaciones únicas de un grupo: depósitos de vehículos y de
/// empresas más orígenes y destinos de los viajes. El orden es estable.
pub fn collect_group_locations(
    trips: &[Trip],
    vehicles: &[PlanningVehicle],
    companies: &HashMap<Uuid, Company>,
) -> Vec<(f64, f64)> {
    let mut seen = HashMap::new();
    let mut locations = Vec::new();

    let mut push = |point: (f64, f64)| {
        let key = coord_key(point.0, point.1);
        if !seen.contains_key(&key) {
            seen.insert(key, locations.len());
            locations.push(point);
        }
    };

    for vehicle in vehicles {
        push(vehicle.depot);
    }
    for company in companies.values() {
        if let Some(depot) = company.depot() {
            push(depot);
        }
    }
    for trip in trips {
        if let (Some(origin), Some(dest)) = (trip.origin(), trip.destination()) {
            push(origin);
            push(dest);
        }
    }

    locations
}

/// Resuelve el depósito efectivo de cada vehículo: el propio, si no el de
/// su empresa, si no el origen del primer viaje con coordenadas. El
/// resultado conserva la posición de cada vehículo de entrada.
pub fn resolve_vehicles(
    vehicles: &[Vehicle],
    companies: &HashMap<Uuid, Company>,
    trips: &[Trip],
) -> Vec<PlanningVehicle> {
    let first_origin = trips.iter().find_map(|t| t.origin());

    vehicles
        .iter()
        .map(|v| {
            let depot = v
                .own_depot()
                .or_else(|| companies.get(&v.company_id).and_then(|c| c.depot()))
                .or(first_origin)
                .unwrap_or((0.0, 0.0));
            PlanningVehicle {
                id: v.id,
                company_id: v.company_id,
                depot,
                capacity_kg: v.capacity_kg(),
                capacity_m3: v.capacity_m3,
            }
        })
        .collect()
}

/// Datos de un grupo listos para el solver
#[derive(Debug, Clone)]
pub struct FeasibilityGroup {
    pub category: VehicleCategory,
    pub trips: Vec<PlanningTrip>,
    pub vehicles: Vec<PlanningVehicle>,
    pub arcs: Vec<FeasibleArc>,
    /// Índices de vehículos compatibles por posición de viaje
    pub compatible_vehicles: Vec<Vec<usize>>,
    pub infeasible: Vec<UnassignedTrip>,
}

pub struct FeasibilityBuilder {
    default_service_min: i64,
}

impl FeasibilityBuilder {
    pub fn new(default_service_min: i64) -> Self {
        Self {
            default_service_min,
        }
    }

    /// Construye el grupo: filtra viajes degenerados, deriva ventanas y
    /// arma el grafo de arcos factibles.
    pub fn build_group(
        &self,
        category: VehicleCategory,
        date: NaiveDate,
        trips: &[Trip],
        vehicles: &[Vehicle],
        planning_vehicles: &[PlanningVehicle],
        companies: &HashMap<Uuid, Company>,
        matrix: &MatrixSnapshot,
    ) -> FeasibilityGroup {
        let day_start = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();

        let mut feasible: Vec<PlanningTrip> = Vec::new();
        let mut compatible_vehicles: Vec<Vec<usize>> = Vec::new();
        let mut infeasible: Vec<UnassignedTrip> = Vec::new();

        for trip in trips {
            let (origin, dest) = match (trip.origin(), trip.destination()) {
                (Some(origin), Some(dest)) => (origin, dest),
                _ => {
                    infeasible.push(UnassignedTrip {
                        trip_id: trip.id,
                        reason: "missing_coordinates".to_string(),
                    });
                    continue;
                }
            };

            let compatible: Vec<usize> = vehicles
                .iter()
                .enumerate()
                .filter(|(_, v)| is_vehicle_compatible(v, trip, category))
                .map(|(idx, _)| idx)
                .collect();

            if compatible.is_empty() {
                infeasible.push(UnassignedTrip {
                    trip_id: trip.id,
                    reason: "no_compatible_vehicle".to_string(),
                });
                continue;
            }

            let earliest_min = (trip.departure_datetime - day_start).num_minutes();
            let duration_min = trip
                .route_duration_min
                .map(|m| m.round() as i64)
                .unwrap_or_else(|| {
                    let from_matrix = matrix.travel_min(origin, dest);
                    if from_matrix > 0 {
                        from_matrix
                    } else {
                        DEFAULT_TRIP_DURATION_MIN
                    }
                });
            let arrival_min = (trip.arrival_datetime_planned - day_start).num_minutes();
            let latest_start_min = earliest_min.max(arrival_min - duration_min);
            let service_min = trip.service_time_min.unwrap_or(self.default_service_min);

            let route_distance_km = trip
                .route_distance_km
                .unwrap_or_else(|| matrix.distance_km(origin, dest));

            let own_depot = companies.get(&trip.company_id).and_then(|c| c.depot());
            let return_distance_km = trip.return_distance_km.unwrap_or_else(|| {
                own_depot
                    .map(|depot| matrix.distance_km(dest, depot))
                    .unwrap_or(0.0)
            });

            feasible.push(PlanningTrip {
                id: trip.id,
                company_id: trip.company_id,
                origin,
                dest,
                earliest_min,
                latest_start_min,
                duration_min,
                service_min,
                weight_kg: trip.cargo_weight_kg,
                volume_m3: trip.cargo_volume_m3,
                route_distance_km,
                return_distance_km,
                departure_datetime: trip.departure_datetime,
            });
            compatible_vehicles.push(compatible);
        }

        let arcs = self.build_arcs(&feasible, &compatible_vehicles, matrix);

        FeasibilityGroup {
            category,
            trips: feasible,
            vehicles: planning_vehicles.to_vec(),
            arcs,
            compatible_vehicles,
            infeasible,
        }
    }

    /// Arco (i, j) factible: el viaje j puede arrancar después de terminar
    /// i y viajar en vacío hasta su origen, y algún vehículo puede hacer
    /// ambos envíos.
    fn build_arcs(
        &self,
        trips: &[PlanningTrip],
        compatible_vehicles: &[Vec<usize>],
        matrix: &MatrixSnapshot,
    ) -> Vec<FeasibleArc> {
        let mut arcs = Vec::new();

        for (i, trip_i) in trips.iter().enumerate() {
            for (j, trip_j) in trips.iter().enumerate() {
                if i == j {
                    continue;
                }

                let shared_vehicle = compatible_vehicles[i]
                    .iter()
                    .any(|v| compatible_vehicles[j].contains(v));
                if !shared_vehicle {
                    continue;
                }

                let travel_min = matrix.travel_min(trip_i.dest, trip_j.origin);
                let finish_i = trip_i.earliest_min + trip_i.duration_min + trip_i.service_min;
                if finish_i + travel_min <= trip_j.latest_start_min {
                    arcs.push(FeasibleArc {
                        from: i,
                        to: j,
                        travel_min,
                        deadhead_km: matrix.distance_km(trip_i.dest, trip_j.origin),
                    });
                }
            }
        }

        arcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CargoCategory, OptimizationStatus, TripStatus, VehicleStatus};
    use crate::services::valhalla_service::{HaversineRouter, RoutingProvider};
    use chrono::TimeZone;

    fn company(depot: (f64, f64)) -> Company {
        Company {
            id: Uuid::new_v4(),
            company_name: "Transport Atlas".to_string(),
            depot_lat: Some(depot.0),
            depot_lng: Some(depot.1),
        }
    }

    fn trip(
        company_id: Uuid,
        origin: (f64, f64),
        dest: (f64, f64),
        dep_h: u32,
        arr_h: u32,
        duration_min: f64,
    ) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            company_id,
            departure_point: "origin".to_string(),
            arrival_point: "dest".to_string(),
            departure_lat: Some(origin.0),
            departure_lng: Some(origin.1),
            arrival_lat: Some(dest.0),
            arrival_lng: Some(dest.1),
            trip_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            departure_datetime: Utc.with_ymd_and_hms(2025, 6, 2, dep_h, 0, 0).unwrap(),
            arrival_datetime_planned: Utc.with_ymd_and_hms(2025, 6, 2, arr_h, 0, 0).unwrap(),
            cargo_category: CargoCategory::A01ProduitsFrais,
            material_type: None,
            cargo_weight_kg: 1000.0,
            cargo_volume_m3: None,
            required_vehicle_category: None,
            route_distance_km: Some(5.0),
            route_duration_min: Some(duration_min),
            return_distance_km: None,
            service_time_min: Some(5),
            status: TripStatus::Planned,
            assigned_vehicle_id: None,
            sequence_order: None,
            is_last_in_chain: None,
            optimization_batch_id: None,
            optimization_status: OptimizationStatus::Pending,
            estimated_arrival_datetime: None,
        }
    }

    fn vehicle(company_id: Uuid, capacity_tons: f64) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            company_id,
            category: crate::models::VehicleCategory::Ag1CamionFrigorifique,
            capacity_tons,
            capacity_m3: None,
            depot_lat: None,
            depot_lng: None,
            cost_per_km: None,
            fuel_consumption_l_per_100km: None,
            status: VehicleStatus::Available,
        }
    }

    async fn snapshot_for(
        trips: &[Trip],
        vehicles: &[PlanningVehicle],
        companies: &HashMap<Uuid, Company>,
    ) -> MatrixSnapshot {
        let locations = collect_group_locations(trips, vehicles, companies);
        let matrix = HaversineRouter.matrix(&locations).await;
        MatrixSnapshot::new(locations, matrix)
    }

    #[tokio::test]
    async fn test_chainable_trips_produce_arc() {
        let c = company((36.7531, 2.9958));
        let companies: HashMap<Uuid, Company> = [(c.id, c.clone())].into();
        let v = vehicle(c.id, 6.0);

        // B arranca donde termina A, con holgura de sobra
        let a = trip(c.id, (36.7531, 2.9958), (36.7606, 3.0586), 8, 10, 30.0);
        let b = trip(c.id, (36.7606, 3.0586), (36.7890, 3.0412), 10, 13, 30.0);
        let trips = vec![a, b];

        let planning = resolve_vehicles(&[v.clone()], &companies, &trips);
        let matrix = snapshot_for(&trips, &planning, &companies).await;

        let builder = FeasibilityBuilder::new(30);
        let group = builder.build_group(
            crate::models::VehicleCategory::Ag1CamionFrigorifique,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            &trips,
            &[v],
            &planning,
            &companies,
            &matrix,
        );

        assert_eq!(group.trips.len(), 2);
        assert!(group.infeasible.is_empty());
        assert!(group.arcs.iter().any(|a| a.from == 0 && a.to == 1));
        // La vuelta B -> A no cabe en la ventana de A
        assert!(!group.arcs.iter().any(|a| a.from == 1 && a.to == 0));
    }

    #[tokio::test]
    async fn test_missing_coords_reported_infeasible() {
        let c = company((36.7531, 2.9958));
        let companies: HashMap<Uuid, Company> = [(c.id, c.clone())].into();
        let v = vehicle(c.id, 6.0);

        let mut bad = trip(c.id, (36.75, 3.0), (36.76, 3.05), 8, 10, 30.0);
        bad.arrival_lat = None;
        let trips = vec![bad];

        let planning = resolve_vehicles(&[v.clone()], &companies, &trips);
        let matrix = snapshot_for(&trips, &planning, &companies).await;

        let builder = FeasibilityBuilder::new(30);
        let group = builder.build_group(
            crate::models::VehicleCategory::Ag1CamionFrigorifique,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            &trips,
            &[v],
            &planning,
            &companies,
            &matrix,
        );

        assert!(group.trips.is_empty());
        assert_eq!(group.infeasible.len(), 1);
        assert_eq!(group.infeasible[0].reason, "missing_coordinates");
    }

    #[tokio::test]
    async fn test_overweight_trip_has_no_compatible_vehicle() {
        let c = company((36.7531, 2.9958));
        let companies: HashMap<Uuid, Company> = [(c.id, c.clone())].into();
        let v = vehicle(c.id, 3.0);

        let mut heavy = trip(c.id, (36.75, 3.0), (36.76, 3.05), 8, 10, 30.0);
        heavy.cargo_weight_kg = 5000.0;
        let trips = vec![heavy];

        let planning = resolve_vehicles(&[v.clone()], &companies, &trips);
        let matrix = snapshot_for(&trips, &planning, &companies).await;

        let builder = FeasibilityBuilder::new(30);
        let group = builder.build_group(
            crate::models::VehicleCategory::Ag1CamionFrigorifique,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            &trips,
            &[v],
            &planning,
            &companies,
            &matrix,
        );

        assert!(group.trips.is_empty());
        assert_eq!(group.infeasible[0].reason, "no_compatible_vehicle");
    }

    #[tokio::test]
    async fn test_latest_start_clamped_to_earliest() {
        let c = company((36.7531, 2.9958));
        let companies: HashMap<Uuid, Company> = [(c.id, c.clone())].into();
        let v = vehicle(c.id, 6.0);

        // Ventana más corta que la duración: latest_start cae en earliest
        let tight = trip(c.id, (36.75, 3.0), (36.76, 3.05), 8, 9, 90.0);
        let trips = vec![tight];

        let planning = resolve_vehicles(&[v.clone()], &companies, &trips);
        let matrix = snapshot_for(&trips, &planning, &companies).await;

        let builder = FeasibilityBuilder::new(30);
        let group = builder.build_group(
            crate::models::VehicleCategory::Ag1CamionFrigorifique,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            &trips,
            &[v],
            &planning,
            &companies,
            &matrix,
        );

        assert_eq!(group.trips[0].earliest_min, 8 * 60);
        assert_eq!(group.trips[0].latest_start_min, 8 * 60);
    }
}
