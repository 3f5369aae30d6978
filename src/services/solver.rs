//! Solver cross-company
//!
//! Resuelve un grupo de categoría con objetivos lexicográficos: primero
//! minimizar la flota usada, después el deadhead de retorno. El modelo de
//! asignación/encadenamiento (X, Y, Start, IsLast, L) se resuelve como
//! cobertura mínima de caminos sobre el grafo de arcos factibles: un
//! matching máximo entre predecesores y sucesores deja exactamente
//! `n - |matching|` cadenas, el mínimo de vehículos que puede cubrir todos
//! los viajes. Entre los matchings máximos se prefiere el que deja como
//! "últimos" a los viajes con menor retorno estimado, y cada cadena recibe
//! después el vehículo compatible de menor deadhead real. Un arco solo
//! garantiza un vehículo común a sus dos extremos; la extracción mantiene
//! la intersección de vehículos a lo largo de la cadena y la parte donde
//! esa intersección (o la ventana acumulada) se agota.
//!
//! Si el grupo no admite cobertura con la flota disponible se cae al
//! reparto round-robin entre pares compatibles, marcando el grupo como
//! fallback.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::UnassignedTrip;
use crate::services::feasibility::{FeasibilityGroup, MatrixSnapshot, PlanningTrip};

/// Asignación resuelta de un viaje dentro de un grupo
#[derive(Debug, Clone)]
pub struct SolvedAssignment {
    pub trip_id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_company_id: Uuid,
    pub sequence_order: i32,
    pub is_last_in_chain: bool,
    pub start_min: i64,
}

/// Resultado de resolver un grupo
#[derive(Debug, Clone, Default)]
pub struct GroupSolution {
    pub assignments: Vec<SolvedAssignment>,
    pub dropped: Vec<UnassignedTrip>,
    pub vehicles_used: usize,
    /// Deadhead de retorno planificado (km)
    pub return_deadhead_km: f64,
    pub fallback: bool,
}

/// Cadena de viajes con horarios ya calculados
#[derive(Debug, Clone)]
struct Chain {
    indices: Vec<usize>,
    starts: Vec<i64>,
}

pub struct CrossCompanySolver {
    time_budget: Duration,
}

impl CrossCompanySolver {
    pub fn new(time_budget: Duration) -> Self {
        Self { time_budget }
    }

    pub fn solve(&self, group: &FeasibilityGroup, matrix: &MatrixSnapshot) -> GroupSolution {
        let n = group.trips.len();
        if n == 0 {
            return GroupSolution::default();
        }
        if group.vehicles.is_empty() {
            // El runner filtra este caso antes; por simetría devolvemos todo sin asignar
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

        // Pasada 1 + 2: matching máximo que además maximiza el retorno
        // estimado de los viajes que quedan con sucesor.
        let next_map = self.lexicographic_matching(group, deadline);

        let chains = self.extract_chains(group, &next_map);
        debug!(
            "group {}: {} trips -> {} chains",
            group.category.code(),
            n,
            chains.len()
        );

        if chains.len() > group.vehicles.len() {
            warn!(
                "group {}: needs {} vehicles but only {} available, using round-robin fallback",
                group.category.code(),
                chains.len(),
                group.vehicles.len()
            );
            return self.round_robin_fallback(group, matrix);
        }

        match self.assign_vehicles(group, matrix, &chains) {
            Some(solution) => solution,
            None => {
                warn!(
                    "group {}: no vehicle fits some chain, using round-robin fallback",
                    group.category.code()
                );
                self.round_robin_fallback(group, matrix)
            }
        }
    }

    /// Matching máximo predecesor → sucesor (algoritmo húngaro de caminos
    /// de aumento). Procesar los predecesores por retorno estimado
    /// descendente hace que, entre los matchings máximos, queden con
    /// sucesor los viajes cuyo retorno en solitario sería más caro.
    fn lexicographic_matching(
        &self,
        group: &FeasibilityGroup,
        deadline: Instant,
    ) -> Vec<Option<usize>> {
        let n = group.trips.len();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for arc in &group.arcs {
            adjacency[arc.from].push(arc.to);
        }
        for successors in adjacency.iter_mut() {
            successors.sort_unstable();
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            group.trips[b]
                .return_distance_km
                .total_cmp(&group.trips[a].return_distance_km)
                .then(a.cmp(&b))
        });

        let mut match_from: Vec<Option<usize>> = vec![None; n];
        let mut match_to: Vec<Option<usize>> = vec![None; n];

        for &left in &order {
            if Instant::now() > deadline {
                // Presupuesto agotado: el matching parcial es el incumbente
                warn!("matching budget exhausted, keeping incumbent");
                break;
            }
            let mut visited = vec![false; n];
            augment(
                left,
                &adjacency,
                &mut visited,
                &mut match_from,
                &mut match_to,
            );
        }

        match_from
    }

    /// Reconstruye las cadenas: fuentes sin predecesor, caminos únicos por
    /// `next_map`; cada viaje se visita exactamente una vez. Una cadena se
    /// parte si el horario acumulado viola la ventana de algún eslabón, o
    /// si ya ningún vehículo es compatible con todos sus viajes. Cada
    /// cadena emitida conserva una intersección no vacía de vehículos
    /// compatibles (un arco solo exige un vehículo común a su par de
    /// viajes, no a la cadena completa).
    fn extract_chains(&self, group: &FeasibilityGroup, next_map: &[Option<usize>]) -> Vec<Chain> {
        let n = group.trips.len();
        let mut has_pred = vec![false; n];
        for next in next_map.iter().flatten() {
            has_pred[*next] = true;
        }

        let travel = |from: usize, to: usize| -> i64 {
            group
                .arcs
                .iter()
                .find(|a| a.from == from && a.to == to)
                .map(|a| a.travel_min)
                .unwrap_or(0)
        };

        let mut chains = Vec::new();
        let mut visited = vec![false; n];

        for source in 0..n {
            if has_pred[source] || visited[source] {
                continue;
            }

            let mut current = Chain {
                indices: Vec::new(),
                starts: Vec::new(),
            };
            // Vehículos compatibles con todos los viajes de `current`
            let mut shared_vehicles: Vec<usize> = Vec::new();
            let mut cursor = Some(source);

            while let Some(i) = cursor {
                debug_assert!(!visited[i], "trip visited twice during extraction");
                visited[i] = true;
                let trip = &group.trips[i];

                let start = match (current.indices.last(), current.starts.last()) {
                    (Some(&prev), Some(&prev_start)) => {
                        let prev_trip = &group.trips[prev];
                        let arrival = prev_start
                            + prev_trip.duration_min
                            + prev_trip.service_min
                            + travel(prev, i);
                        arrival.max(trip.earliest_min)
                    }
                    _ => trip.earliest_min,
                };

                let narrowed: Vec<usize> = if current.indices.is_empty() {
                    group.compatible_vehicles[i].clone()
                } else {
                    shared_vehicles
                        .iter()
                        .copied()
                        .filter(|v| group.compatible_vehicles[i].contains(v))
                        .collect()
                };

                let window_broken = start > trip.latest_start_min;
                if !current.indices.is_empty() && (window_broken || narrowed.is_empty()) {
                    // La ventana ya no alcanza o ningún vehículo cubre
                    // toda la cadena: el eslabón abre cadena nueva
                    chains.push(current);
                    current = Chain {
                        indices: vec![i],
                        starts: vec![trip.earliest_min],
                    };
                    shared_vehicles = group.compatible_vehicles[i].clone();
                } else {
                    current.indices.push(i);
                    current.starts.push(start.min(trip.latest_start_min));
                    shared_vehicles = narrowed;
                }

                cursor = next_map[i];
            }

            chains.push(current);
        }

        chains
    }

    /// Asigna cada cadena al vehículo compatible de menor retorno real.
    /// Devuelve None si alguna cadena no cabe en ningún vehículo libre.
    fn assign_vehicles(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
        chains: &[Chain],
    ) -> Option<GroupSolution> {
        let mut chain_order: Vec<usize> = (0..chains.len()).collect();
        // Las cadenas más exigentes eligen primero
        chain_order.sort_by(|&a, &b| {
            let wa = max_weight(group, &chains[a]);
            let wb = max_weight(group, &chains[b]);
            wb.total_cmp(&wa)
                .then(chains[a].indices[0].cmp(&chains[b].indices[0]))
        });

        let mut used = vec![false; group.vehicles.len()];
        let mut solution = GroupSolution::default();

        for &chain_idx in &chain_order {
            let chain = &chains[chain_idx];
            let last = *chain.indices.last().expect("chains are never empty");
            let last_dest = group.trips[last].dest;
            // Tope conservador: el retorno planificado de la cadena no debe
            // superar la suma de retornos en solitario de sus viajes
            let solo_return_sum: f64 = chain
                .indices
                .iter()
                .map(|&t| group.trips[t].return_distance_km)
                .sum();

            let mut candidates: Vec<usize> = (0..group.vehicles.len())
                .filter(|&v| !used[v])
                .filter(|&v| {
                    chain
                        .indices
                        .iter()
                        .all(|&t| group.compatible_vehicles[t].contains(&v))
                })
                .collect();

            let clamped: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&v| {
                    matrix.distance_km(last_dest, group.vehicles[v].depot) <= solo_return_sum
                })
                .collect();
            if !clamped.is_empty() {
                candidates = clamped;
            }

            candidates.sort_by(|&a, &b| {
                let ra = matrix.distance_km(last_dest, group.vehicles[a].depot);
                let rb = matrix.distance_km(last_dest, group.vehicles[b].depot);
                ra.total_cmp(&rb)
                    .then(group.vehicles[a].capacity_kg.total_cmp(&group.vehicles[b].capacity_kg))
                    .then(group.vehicles[a].id.cmp(&group.vehicles[b].id))
            });

            let vehicle_idx = *candidates.first()?;
            used[vehicle_idx] = true;
            let vehicle = &group.vehicles[vehicle_idx];

            solution.return_deadhead_km += matrix.distance_km(last_dest, vehicle.depot);
            for (position, (&trip_idx, &start)) in
                chain.indices.iter().zip(chain.starts.iter()).enumerate()
            {
                solution.assignments.push(SolvedAssignment {
                    trip_id: group.trips[trip_idx].id,
                    vehicle_id: vehicle.id,
                    vehicle_company_id: vehicle.company_id,
                    sequence_order: position as i32 + 1,
                    is_last_in_chain: position == chain.indices.len() - 1,
                    start_min: start,
                });
            }
        }

        solution.vehicles_used = used.iter().filter(|u| **u).count();
        solution
            .assignments
            .sort_by(|a, b| a.trip_id.cmp(&b.trip_id));

        info!(
            "group {}: {} assignments on {} vehicles, return deadhead {:.1} km",
            group.category.code(),
            solution.assignments.len(),
            solution.vehicles_used,
            solution.return_deadhead_km
        );
        Some(solution)
    }

    /// Reparto round-robin entre pares compatibles; cada vehículo ordena
    /// sus viajes por salida y los ejecuta en secuencia.
    fn round_robin_fallback(
        &self,
        group: &FeasibilityGroup,
        matrix: &MatrixSnapshot,
    ) -> GroupSolution {
        let m = group.vehicles.len();
        let mut per_vehicle: Vec<Vec<usize>> = vec![Vec::new(); m];
        let mut dropped = Vec::new();

        for (i, _trip) in group.trips.iter().enumerate() {
            let candidate = (0..m)
                .map(|k| (i + k) % m)
                .find(|v| group.compatible_vehicles[i].contains(v));
            match candidate {
                Some(v) => per_vehicle[v].push(i),
                None => dropped.push(UnassignedTrip {
                    trip_id: group.trips[i].id,
                    reason: "no_compatible_vehicle".to_string(),
                }),
            }
        }

        let mut solution = GroupSolution {
            dropped,
            fallback: true,
            ..GroupSolution::default()
        };

        for (v, trip_indices) in per_vehicle.iter_mut().enumerate() {
            if trip_indices.is_empty() {
                continue;
            }
            trip_indices.sort_by_key(|&i| (group.trips[i].earliest_min, group.trips[i].id));
            solution.vehicles_used += 1;

            let vehicle = &group.vehicles[v];
            let mut clock = 0i64;
            let mut prev: Option<usize> = None;
            let count = trip_indices.len();

            for (position, &i) in trip_indices.iter().enumerate() {
                let trip = &group.trips[i];
                let start = match prev {
                    Some(p) => {
                        let prev_trip = &group.trips[p];
                        let travel =
                            matrix.travel_min(prev_trip.dest, trip.origin);
                        (clock + travel).max(trip.earliest_min)
                    }
                    None => trip.earliest_min,
                };
                clock = start + trip.duration_min + trip.service_min;
                prev = Some(i);

                let is_last = position == count - 1;
                if is_last {
                    solution.return_deadhead_km +=
                        matrix.distance_km(trip.dest, vehicle.depot);
                }
                solution.assignments.push(SolvedAssignment {
                    trip_id: trip.id,
                    vehicle_id: vehicle.id,
                    vehicle_company_id: vehicle.company_id,
                    sequence_order: position as i32 + 1,
                    is_last_in_chain: is_last,
                    start_min: start,
                });
            }
        }

        solution
            .assignments
            .sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
        solution
    }
}

fn max_weight(group: &FeasibilityGroup, chain: &Chain) -> f64 {
    chain
        .indices
        .iter()
        .map(|&i| group.trips[i].weight_kg)
        .fold(0.0, f64::max)
}

fn augment(
    left: usize,
    adjacency: &[Vec<usize>],
    visited: &mut [bool],
    match_from: &mut [Option<usize>],
    match_to: &mut [Option<usize>],
) -> bool {
    for &right in &adjacency[left] {
        if visited[right] {
            continue;
        }
        visited[right] = true;

        let free = match match_to[right] {
            None => true,
            Some(owner) => augment(owner, adjacency, visited, match_from, match_to),
        };
        if free {
            match_from[left] = Some(right);
            match_to[right] = Some(left);
            return true;
        }
    }
    false
}

/// Horario de un viaje dentro de una solución (consulta para tests)
pub fn assignment_for(solution: &GroupSolution, trip: &PlanningTrip) -> Option<SolvedAssignment> {
    solution
        .assignments
        .iter()
        .find(|a| a.trip_id == trip.id)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::feasibility::{FeasibleArc, PlanningVehicle};
    use crate::services::valhalla_service::{HaversineRouter, RoutingProvider};

    fn planning_trip(
        id_byte: u8,
        origin: (f64, f64),
        dest: (f64, f64),
        earliest: i64,
        latest_start: i64,
        duration: i64,
        service: i64,
        weight: f64,
        return_km: f64,
    ) -> PlanningTrip {
        PlanningTrip {
            id: Uuid::from_bytes([id_byte; 16]),
            company_id: Uuid::from_bytes([0xAA; 16]),
            origin,
            dest,
            earliest_min: earliest,
            latest_start_min: latest_start,
            duration_min: duration,
            service_min: service,
            weight_kg: weight,
            volume_m3: None,
            route_distance_km: 5.0,
            return_distance_km: return_km,
            departure_datetime: chrono::Utc::now(),
        }
    }

    fn planning_vehicle(id_byte: u8, depot: (f64, f64), capacity_kg: f64) -> PlanningVehicle {
        PlanningVehicle {
            id: Uuid::from_bytes([id_byte; 16]),
            company_id: Uuid::from_bytes([0xBB; 16]),
            depot,
            capacity_kg,
            capacity_m3: None,
        }
    }

    async fn snapshot(points: Vec<(f64, f64)>) -> MatrixSnapshot {
        let matrix = HaversineRouter.matrix(&points).await;
        MatrixSnapshot::new(points, matrix)
    }

    fn group_with(
        trips: Vec<PlanningTrip>,
        vehicles: Vec<PlanningVehicle>,
        arcs: Vec<FeasibleArc>,
    ) -> FeasibilityGroup {
        let all: Vec<usize> = (0..vehicles.len()).collect();
        let compatible = trips
            .iter()
            .map(|t| {
                all.iter()
                    .copied()
                    .filter(|&v| t.weight_kg <= vehicles[v].capacity_kg)
                    .collect()
            })
            .collect();
        FeasibilityGroup {
            category: crate::models::VehicleCategory::Ag1CamionFrigorifique,
            trips,
            vehicles,
            arcs,
            compatible_vehicles: compatible,
            infeasible: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_two_chainable_trips_share_one_vehicle() {
        let depot = (36.7531, 2.9958);
        let a_dest = (36.7606, 3.0586);
        let b_dest = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, a_dest, b_dest]).await;

        // A: 08:00-10:00, dur 30, svc 5. B: 10:30-12:30 desde el destino de A.
        let a = planning_trip(1, depot, a_dest, 480, 570, 30, 5, 1000.0, 10.0);
        let b = planning_trip(2, a_dest, b_dest, 630, 720, 30, 5, 1000.0, 12.0);
        let arcs = vec![FeasibleArc {
            from: 0,
            to: 1,
            travel_min: 0,
            deadhead_km: 0.0,
        }];
        let group = group_with(vec![a, b], vec![planning_vehicle(9, depot, 6000.0)], arcs);

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        assert!(!solution.fallback);
        assert_eq!(solution.vehicles_used, 1);
        assert_eq!(solution.assignments.len(), 2);

        let first = assignment_for(&solution, &group.trips[0]).unwrap();
        let second = assignment_for(&solution, &group.trips[1]).unwrap();
        assert_eq!(first.sequence_order, 1);
        assert!(!first.is_last_in_chain);
        assert_eq!(first.start_min, 480);
        assert_eq!(second.sequence_order, 2);
        assert!(second.is_last_in_chain);
        // B no puede salir antes de 08:35 + viaje en vacío; su ventana manda
        assert!(second.start_min >= 630);
    }

    #[tokio::test]
    async fn test_sequencing_respects_travel_and_service() {
        let depot = (36.7531, 2.9958);
        let a_dest = (36.7606, 3.0586);
        let b_origin = (36.7700, 3.0500);
        let b_dest = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, a_dest, b_origin, b_dest]).await;

        let travel = matrix.travel_min(a_dest, b_origin);
        assert!(travel > 0);

        // Ventana de B lo bastante ancha para encadenar justo detrás de A
        let a = planning_trip(1, depot, a_dest, 480, 480, 60, 30, 1000.0, 10.0);
        let b = planning_trip(2, b_origin, b_dest, 480, 720, 30, 5, 1000.0, 12.0);
        let arcs = vec![FeasibleArc {
            from: 0,
            to: 1,
            travel_min: travel,
            deadhead_km: matrix.distance_km(a_dest, b_origin),
        }];
        let group = group_with(vec![a, b], vec![planning_vehicle(9, depot, 6000.0)], arcs);

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        let first = assignment_for(&solution, &group.trips[0]).unwrap();
        let second = assignment_for(&solution, &group.trips[1]).unwrap();
        assert!(second.start_min >= first.start_min + 60 + 30 + travel);
    }

    #[tokio::test]
    async fn test_heavy_trips_chain_but_never_aggregate() {
        // Dos viajes de 5 t sobre un vehículo de 6 t: encadenables en el
        // tiempo, jamás sumados en carga.
        let depot = (36.7531, 2.9958);
        let mid = (36.7606, 3.0586);
        let end = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, mid, end]).await;

        let a = planning_trip(1, depot, mid, 480, 540, 30, 5, 5000.0, 8.0);
        let b = planning_trip(2, mid, end, 630, 720, 30, 5, 5000.0, 9.0);
        let arcs = vec![FeasibleArc {
            from: 0,
            to: 1,
            travel_min: 0,
            deadhead_km: 0.0,
        }];
        let group = group_with(vec![a, b], vec![planning_vehicle(9, depot, 6000.0)], arcs);

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        assert!(!solution.fallback);
        assert_eq!(solution.vehicles_used, 1);
        assert_eq!(solution.assignments.len(), 2);
    }

    #[tokio::test]
    async fn test_chain_splits_when_no_single_vehicle_covers_it() {
        let depot_a = (36.7531, 2.9958);
        let depot_b = (36.8000, 3.1000);
        let p1 = (36.7606, 3.0586);
        let p2 = (36.7890, 3.0412);
        let p3 = (36.8100, 3.0900);
        let matrix = snapshot(vec![depot_a, depot_b, p1, p2, p3]).await;

        let trips = vec![
            planning_trip(1, depot_a, p1, 480, 900, 30, 5, 1000.0, 10.0),
            planning_trip(2, p1, p2, 600, 900, 30, 5, 1000.0, 9.0),
            planning_trip(3, p2, p3, 720, 900, 30, 5, 1000.0, 8.0),
        ];
        let vehicles = vec![
            planning_vehicle(8, depot_a, 6000.0),
            planning_vehicle(9, depot_b, 6000.0),
        ];
        let arcs = vec![
            FeasibleArc {
                from: 0,
                to: 1,
                travel_min: 0,
                deadhead_km: 0.0,
            },
            FeasibleArc {
                from: 1,
                to: 2,
                travel_min: 0,
                deadhead_km: 0.0,
            },
        ];
        // A solo cabe en el vehículo 0, C solo en el 1, B en ambos: los
        // arcos A→B y B→C existen de a pares pero ningún vehículo cubre
        // la cadena A→B→C completa
        let group = FeasibilityGroup {
            category: crate::models::VehicleCategory::Ag1CamionFrigorifique,
            trips,
            vehicles,
            arcs,
            compatible_vehicles: vec![vec![0], vec![0, 1], vec![1]],
            infeasible: Vec::new(),
        };

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        // La cadena se parte en C en lugar de degradar el grupo entero
        assert!(!solution.fallback);
        assert_eq!(solution.assignments.len(), 3);
        assert_eq!(solution.vehicles_used, 2);

        let a = assignment_for(&solution, &group.trips[0]).unwrap();
        let b = assignment_for(&solution, &group.trips[1]).unwrap();
        let c = assignment_for(&solution, &group.trips[2]).unwrap();
        assert_eq!(a.vehicle_id, Uuid::from_bytes([8; 16]));
        assert_eq!(b.vehicle_id, Uuid::from_bytes([8; 16]));
        assert_eq!(c.vehicle_id, Uuid::from_bytes([9; 16]));
        assert!(!a.is_last_in_chain);
        assert!(b.is_last_in_chain);
        assert!(c.is_last_in_chain);
        assert_eq!(c.sequence_order, 1);
    }

    #[tokio::test]
    async fn test_no_arcs_and_insufficient_fleet_falls_back() {
        let depot = (36.7531, 2.9958);
        let p1 = (36.7606, 3.0586);
        let p2 = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, p1, p2]).await;

        // Tres viajes solapados, un solo vehículo, sin arcos: 3 cadenas > 1
        let trips = vec![
            planning_trip(1, depot, p1, 480, 500, 30, 5, 1000.0, 5.0),
            planning_trip(2, depot, p2, 480, 500, 30, 5, 1000.0, 5.0),
            planning_trip(3, p1, p2, 480, 500, 30, 5, 1000.0, 5.0),
        ];
        let group = group_with(trips, vec![planning_vehicle(9, depot, 6000.0)], vec![]);

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        assert!(solution.fallback);
        // Todos los viajes quedan asignados al único vehículo compatible
        assert_eq!(solution.assignments.len(), 3);
        assert_eq!(solution.vehicles_used, 1);
        let lasts = solution
            .assignments
            .iter()
            .filter(|a| a.is_last_in_chain)
            .count();
        assert_eq!(lasts, 1);
    }

    #[tokio::test]
    async fn test_deterministic_resolution() {
        let depot = (36.7531, 2.9958);
        let p1 = (36.7606, 3.0586);
        let p2 = (36.7890, 3.0412);
        let matrix = snapshot(vec![depot, p1, p2]).await;

        let make_group = || {
            let trips = vec![
                planning_trip(1, depot, p1, 480, 570, 30, 5, 1000.0, 10.0),
                planning_trip(2, p1, p2, 630, 720, 30, 5, 1000.0, 12.0),
            ];
            let arcs = vec![FeasibleArc {
                from: 0,
                to: 1,
                travel_min: 0,
                deadhead_km: 0.0,
            }];
            group_with(
                trips,
                vec![
                    planning_vehicle(8, depot, 6000.0),
                    planning_vehicle(9, p2, 6000.0),
                ],
                arcs,
            )
        };

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let one = solver.solve(&make_group(), &matrix);
        let two = solver.solve(&make_group(), &matrix);

        let key = |s: &GroupSolution| -> Vec<(Uuid, Uuid, i32, bool, i64)> {
            s.assignments
                .iter()
                .map(|a| {
                    (
                        a.trip_id,
                        a.vehicle_id,
                        a.sequence_order,
                        a.is_last_in_chain,
                        a.start_min,
                    )
                })
                .collect()
        };
        assert_eq!(key(&one), key(&two));
    }

    #[tokio::test]
    async fn test_pass_two_prefers_cheap_return_vehicle() {
        let far_depot = (36.9000, 3.4000);
        let near_depot = (36.7900, 3.0420);
        let origin = (36.7531, 2.9958);
        let dest = (36.7890, 3.0412);
        let matrix = snapshot(vec![far_depot, near_depot, origin, dest]).await;

        let trips = vec![planning_trip(1, origin, dest, 480, 570, 30, 5, 1000.0, 10.0)];
        let group = group_with(
            trips,
            vec![
                planning_vehicle(1, far_depot, 6000.0),
                planning_vehicle(2, near_depot, 6000.0),
            ],
            vec![],
        );

        let solver = CrossCompanySolver::new(Duration::from_secs(300));
        let solution = solver.solve(&group, &matrix);

        // Gana el vehículo cuyo depósito está al lado del destino
        assert_eq!(
            solution.assignments[0].vehicle_id,
            Uuid::from_bytes([2; 16])
        );
    }
}
