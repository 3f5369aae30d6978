//! Solver single-company
//!
//! Formulación de ruteo dentro de una sola flota: cada vehículo parte y
//! vuelve a su depósito, el costo de arco es el viaje en vacío hasta el
//! próximo origen más la duración del viaje entrante, y los viajes que no
//! caben se descartan con penalización en lugar de volver infactible el
//! grupo. Construcción por arco más barato y una mejora local acotada de
//! reubicación, dentro del presupuesto del grupo.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::models::UnassignedTrip;
use crate::services::feasibility::{FeasibilityGroup, MatrixSnapshot};
use crate::services::solver::{GroupSolution, SolvedAssignment};

pub struct SingleCompanySolver {
    time_budget: Duration,
}

/// Pasadas máximas de mejora local; la reubicación converge rápido en
/// rutas de tamaño diario
const MAX_IMPROVEMENT_PASSES: usize = 3;

impl SingleCompanySolver {
    pub fn new(time_budget: Duration) -> Self {
        Self { time_budget }
    }

    pub fn solve(&self, group: &FeasibilityGroup, matrix: &MatrixSnapshot) -> GroupSolution {
        let n = group.trips.len();
        if n == 0 || group.vehicles.is_empty() {
            return GroupSolution {
                dropped: group
                    .trips
                    .iter()
                    .map(|t| UnassignedTrip {
                        trip_id: t.id,
                        reason: "no_compatible_vehicle".to_string(),
                    })
                    .collect(),
                ..GroupSolution::default()
            };
        }

        let deadline = Instant::now() + self.time_budget;

        // Construcción: arco global más barato primero
        let mut routes: Vec<Vec<usize>> = vec![Vec::new(); group.vehicles.len()];
        let mut assigned = vec![false; n];

        loop {
            let mut best: Option<(i64, usize, usize)> = None; // (costo, viaje, vehículo)

            for trip_idx in 0..n {
                if assigned[trip_idx] {
                    continue;
                }
                for &vehicle_idx in &group.compatible_vehicles[trip_idx] {
                    let mut candidate = routes[vehicle_idx].clone();
                    candidate.push(trip_idx);
                    if self.schedule(group, matrix, vehicle_idx, &candidate).is_none() {
                        continue;
                    }

                    let (position, _clock) = self.route_tail(group, matrix, vehicle_idx, &routes[vehicle_idx]);
                    let trip = &group.trips[trip_idx];
                    let cost = matrix.travel_min(position, trip.origin) + trip.duration_min;

                    let better = match best {
                        None => true,
                        Some((best_cost, best_trip, best_vehicle)) => {
                            (cost, group.trips[trip_idx].id, group.vehicles[vehicle_idx].id)
                                < (best_cost, group.trips[best_trip].id, group.vehicles[best_vehicle].id)
                        }
                    };
                    if better {
                        best = Some((cost, trip_idx, vehicle_idx));
                    }
                }
            }

            match best {
                Some((_, trip_idx, vehicle_idx)) => {
                    routes[vehicle_idx].push(trip_idx);
                    assigned[trip_idx] = true;
                }
                None => break,
            }

            if Instant::now() > deadline {
                break;
            }
        }

        self.improve(group, matrix, &mut routes, deadline);

        // Extracción
        let mut solution = GroupSolution::default();
        for (vehicle_idx, route) in routes.iter().enumerate() {
            if route.is_empty() {
                continue;
            }
            let vehicle = &group.vehicles[vehicle_idx];
            let starts = self
                .schedule(group, matrix, vehicle_idx, route)
                .expect("constructed routes stay feasible");

            solution.vehicles_used += 1;
            let last = *route.last().expect("route is non-empty");
            solution.return_deadhead_km += matrix.distance_km(group.trips[last].dest, vehicle.depot);

            for (position, (&trip_idx, &start)) in route.iter().zip(starts.iter()).enumerate() {
                solution.assignments.push(SolvedAssignment {
                    trip_id: group.trips[trip_idx].id,
                    vehicle_id: vehicle.id,
                    vehicle_company_id: vehicle.company_id,
                    sequence_order: position as i32 + 1,
                    is_last_in_chain: position == route.len() - 1,
                    start_min: start,
                });
            }
        }

        for (trip_idx, trip) in group.trips.iter().enumerate() {
            if !assigned[trip_idx] {
                solution.dropped.push(UnassignedTrip {
                    trip_id: trip.id,
                    reason: "dropped_or_infeasible".to_string(),
                });
            }
        }

        solution
            .assignments
            .sort_by(|a, b| a.trip_id.cmp(&b.trip_id));

        info!(
            "group {} (single-company): {} assigned, {} dropped, {} vehicles",
            group.category.code(),
            solution.assignments.len(),
            solution.dropped.len(),
            solution.vehicles_used
        );
        solution
    }

    /// Posición y reloj del vehículo al final de su ruta actual
    fn route_tail(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
        vehicle_idx: usize,
        route: &[usize],
    ) -> ((f64, f64), i64) {
        let vehicle = &group.vehicles[vehicle_idx];
        match route.last() {
            None => (vehicle.depot, 0),
            Some(&last) => {
                let starts = self
                    .schedule(group, matrix, vehicle_idx, route)
                    .expect("existing route is feasible");
                let trip = &group.trips[last];
                (
                    trip.dest,
                    starts[route.len() - 1] + trip.duration_min + trip.service_min,
                )
            }
        }
    }

    /// Horario de una ruta; None si alguna ventana no alcanza
    fn schedule(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
        vehicle_idx: usize,
        route: &[usize],
    ) -> Option<Vec<i64>> {
        let vehicle = &group.vehicles[vehicle_idx];
        let mut position = vehicle.depot;
        let mut clock = 0i64;
        let mut starts = Vec::with_capacity(route.len());

        for &trip_idx in route {
            let trip = &group.trips[trip_idx];
            let arrival = clock + matrix.travel_min(position, trip.origin);
            let start = arrival.max(trip.earliest_min);
            if start > trip.latest_start_min {
                return None;
            }
            starts.push(start);
            clock = start + trip.duration_min + trip.service_min;
            position = trip.dest;
        }

        Some(starts)
    }

    /// Deadhead total de una ruta en km: salida del depósito, vacíos
    /// intermedios y retorno final
    fn route_deadhead_km(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
        vehicle_idx: usize,
        route: &[usize],
    ) -> f64 {
        if route.is_empty() {
            return 0.0;
        }
        let vehicle = &group.vehicles[vehicle_idx];
        let mut total = matrix.distance_km(vehicle.depot, group.trips[route[0]].origin);
        for window in route.windows(2) {
            total += matrix.distance_km(group.trips[window[0]].dest, group.trips[window[1]].origin);
        }
        total += matrix.distance_km(
            group.trips[*route.last().expect("non-empty")].dest,
            vehicle.depot,
        );
        total
    }

    /// Mejora local: reubicar un viaje a otra posición si reduce el
    /// deadhead total y el horario sigue siendo factible.
    fn improve(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
        routes: &mut [Vec<usize>],
        deadline: Instant,
    ) {
        for pass in 0..MAX_IMPROVEMENT_PASSES {
            let mut improved = false;

            for from_vehicle in 0..routes.len() {
                for slot in 0..routes[from_vehicle].len() {
                    if Instant::now() > deadline {
                        return;
                    }
                    let trip_idx = routes[from_vehicle][slot];

                    let base_from = self.route_deadhead_km(group, matrix, from_vehicle, &routes[from_vehicle]);
                    let mut reduced = routes[from_vehicle].clone();
                    reduced.remove(slot);
                    if self.schedule(group, matrix, from_vehicle, &reduced).is_none() {
                        continue;
                    }
                    let reduced_cost = self.route_deadhead_km(group, matrix, from_vehicle, &reduced);

                    let mut best_move: Option<(f64, usize, usize)> = None; // (ganancia, vehículo, posición)
                    for to_vehicle in 0..routes.len() {
                        if to_vehicle == from_vehicle {
                            continue;
                        }
                        if !group.compatible_vehicles[trip_idx].contains(&to_vehicle) {
                            continue;
                        }
                        let base_to = self.route_deadhead_km(group, matrix, to_vehicle, &routes[to_vehicle]);

                        for insert_at in 0..=routes[to_vehicle].len() {
                            let mut extended = routes[to_vehicle].clone();
                            extended.insert(insert_at, trip_idx);
                            if self.schedule(group, matrix, to_vehicle, &extended).is_none() {
                                continue;
                            }
                            let extended_cost =
                                self.route_deadhead_km(group, matrix, to_vehicle, &extended);
                            let gain =
                                (base_from + base_to) - (reduced_cost + extended_cost);
                            if gain > 1e-9 {
                                let better = match best_move {
                                    None => true,
                                    Some((best_gain, _, _)) => gain > best_gain + 1e-9,
                                };
                                if better {
                                    best_move = Some((gain, to_vehicle, insert_at));
                                }
                            }
                        }
                    }

                    if let Some((gain, to_vehicle, insert_at)) = best_move {
                        debug!(
                            "relocating trip {} saves {:.2} km of deadhead",
                            group.trips[trip_idx].id, gain
                        );
                        routes[from_vehicle].remove(slot);
                        routes[to_vehicle].insert(insert_at, trip_idx);
                        improved = true;
                        break; // los índices de la ruta origen cambiaron
                    }
                }
            }

            if !improved {
                debug!("local search converged after {} passes", pass + 1);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::feasibility::{PlanningTrip, PlanningVehicle};
    use crate::services::valhalla_service::{HaversineRouter, RoutingProvider};
    use uuid::Uuid;

    fn planning_trip(
        id_byte: u8,
        origin: (f64, f64),
        dest: (f64, f64),
        earliest: i64,
        latest_start: i64,
    ) -> PlanningTrip {
        PlanningTrip {
            id: Uuid::from_bytes([id_byte; 16]),
            company_id: Uuid::from_bytes([0xAA; 16]),
            origin,
            dest,
            earliest_min: earliest,
            latest_start_min: latest_start,
            duration_min: 30,
            service_min: 5,
            weight_kg: 1000.0,
            volume_m3: None,
            route_distance_km: 5.0,
            return_distance_km: 8.0,
            departure_datetime: chrono::Utc::now(),
        }
    }

    fn vehicle(id_byte: u8, depot: (f64, f64)) -> PlanningVehicle {
        PlanningVehicle {
            id: Uuid::from_bytes([id_byte; 16]),
            company_id: Uuid::from_bytes([0xBB; 16]),
            depot,
            capacity_kg: 6000.0,
            capacity_m3: None,
        }
    }

    fn group_with(
        trips: Vec<PlanningTrip>,
        vehicles: Vec<PlanningVehicle>,
    ) -> FeasibilityGroup {
        let all: Vec<usize> = (0..vehicles.len()).collect();
        let compatible = trips.iter().map(|_| all.clone()).collect();
        FeasibilityGroup {
            category: crate::models::VehicleCategory::Ag1CamionFrigorifique,
            trips,
            vehicles,
            arcs: Vec::new(),
            compatible_vehicles: compatible,
            infeasible: Vec::new(),
        }
    }

    async fn snapshot(points: Vec<(f64, f64)>) -> MatrixSnapshot {
        let matrix = HaversineRouter.matrix(&points).await;
        MatrixSnapshot::new(points, matrix)
    }

    #[tokio::test]
    async fn test_sequential_trips_share_vehicle() {
        let depot = (36.7531, 2.9958);
        let mid = (36.7606, 3.0586);
        let end = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, mid, end]).await;

        let trips = vec![
            planning_trip(1, depot, mid, 480, 570),
            planning_trip(2, mid, end, 630, 720),
        ];
        let group = group_with(trips, vec![vehicle(9, depot)]);

        let solver = SingleCompanySolver::new(Duration::from_secs(10));
        let solution = solver.solve(&group, &matrix);

        assert_eq!(solution.assignments.len(), 2);
        assert_eq!(solution.vehicles_used, 1);
        assert!(solution.dropped.is_empty());
        let orders: Vec<i32> = solution
            .assignments
            .iter()
            .map(|a| a.sequence_order)
            .collect();
        assert!(orders.contains(&1) && orders.contains(&2));
    }

    #[tokio::test]
    async fn test_overlapping_trips_use_two_vehicles() {
        let depot = (36.7531, 2.9958);
        let p1 = (36.7606, 3.0586);
        let p2 = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, p1, p2]).await;

        // Misma ventana estrecha: imposible encadenar
        let trips = vec![
            planning_trip(1, depot, p1, 480, 485),
            planning_trip(2, depot, p2, 480, 485),
        ];
        let group = group_with(trips, vec![vehicle(8, depot), vehicle(9, depot)]);

        let solver = SingleCompanySolver::new(Duration::from_secs(10));
        let solution = solver.solve(&group, &matrix);

        assert_eq!(solution.assignments.len(), 2);
        assert_eq!(solution.vehicles_used, 2);
    }

    #[tokio::test]
    async fn test_unreachable_window_dropped() {
        let depot = (36.7531, 2.9958);
        let far = (35.0, 1.0); // a cientos de km
        let dest = (35.1, 1.1);
        let matrix = snapshot(vec![depot, far, dest]).await;

        // Ventana que termina antes de poder llegar desde el depósito
        let trips = vec![planning_trip(1, far, dest, 10, 20)];
        let group = group_with(trips, vec![vehicle(9, depot)]);

        let solver = SingleCompanySolver::new(Duration::from_secs(10));
        let solution = solver.solve(&group, &matrix);

        assert!(solution.assignments.is_empty());
        assert_eq!(solution.dropped.len(), 1);
        assert_eq!(solution.dropped[0].reason, "dropped_or_infeasible");
    }
}
