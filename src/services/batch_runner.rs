//! Orquestador del batch nocturno
//!
//! Abre el batch en PROCESSING, arma los grupos de categoría, dispara la
//! factibilidad y el solver por grupo (en paralelo acotado), aplica el
//! plan, atribuye KPIs y cierra el batch en COMPLETED o FAILED. Ningún
//! error escapa como panic: las fallas quedan en el estado del batch.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EnvironmentConfig;
use crate::models::{
    BatchReport, Company, GroupDiagnostics, OptimizationBatch, OptimizationBatchStatus,
    OptimizationType, ReportAssignment, Trip, UnassignedTrip, Vehicle, VehicleCategory,
};
use crate::services::applier::PlanApplier;
use crate::services::compatibility::required_vehicle_category;
use crate::services::feasibility::{
    collect_group_locations, resolve_vehicles, FeasibilityBuilder, MatrixSnapshot, PlanningTrip,
};
use crate::services::kpi::{KpiAttributor, SavingsFactors};
use crate::services::optimization::SingleCompanySolver;
use crate::services::solver::{CrossCompanySolver, GroupSolution, SolvedAssignment};
use crate::services::valhalla_service::RoutingProvider;
use crate::store::EntityStore;
use crate::utils::clock::Clock;
use crate::utils::errors::{AppError, AppResult};

/// Petición de una corrida
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub date: NaiveDate,
    pub optimization_type: OptimizationType,
    pub company_id: Option<Uuid>,
}

struct GroupOutcome {
    category: VehicleCategory,
    solution: GroupSolution,
    planning_trips: Vec<PlanningTrip>,
    infeasible: Vec<UnassignedTrip>,
    diagnostics: GroupDiagnostics,
}

pub struct BatchRunner {
    store: Arc<dyn EntityStore>,
    routing: Arc<dyn RoutingProvider>,
    clock: Arc<dyn Clock>,
    config: EnvironmentConfig,
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn EntityStore>,
        routing: Arc<dyn RoutingProvider>,
        clock: Arc<dyn Clock>,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            store,
            routing,
            clock,
            config,
        }
    }

    pub async fn run(&self, request: BatchRequest) -> AppResult<BatchReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_cancel(request, rx).await
    }

    pub async fn run_with_cancel(
        &self,
        request: BatchRequest,
        cancel: watch::Receiver<bool>,
    ) -> AppResult<BatchReport> {
        if request.optimization_type == OptimizationType::SingleCompany
            && request.company_id.is_none()
        {
            return Err(AppError::Config(
                "company_id is required for single_company optimization".to_string(),
            ));
        }

        let mut batch = OptimizationBatch::open(
            Uuid::new_v4(),
            request.date,
            request.optimization_type,
            self.clock.now(),
        );
        self.store.insert_batch(&batch).await?;
        info!(
            "🚚 Starting {} optimization batch {} for {}",
            request.optimization_type.as_str(),
            batch.id,
            request.date
        );

        let started = Instant::now();
        match self.execute(&mut batch, &request, &cancel, started).await {
            Ok(report) => {
                info!(
                    "✅ Batch {} completed: {} trips on {} vehicles, {:.1} km saved",
                    batch.id,
                    report.trips_optimized,
                    report.vehicles_used,
                    report.totals.km_saved
                );
                Ok(report)
            }
            Err(e) => {
                let reason = match &e {
                    AppError::Cancelled => "cancelled".to_string(),
                    other => other.to_string(),
                };
                error!("❌ Batch {} failed: {}", batch.id, reason);

                batch.status = OptimizationBatchStatus::Failed;
                batch.error = Some(reason);
                batch.completed_at = Some(self.clock.now());
                batch.solver_time_s = Some(started.elapsed().as_secs_f64());
                if let Err(update_err) = self.store.update_batch(&batch).await {
                    error!("could not record batch failure: {}", update_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        batch: &mut OptimizationBatch,
        request: &BatchRequest,
        cancel: &watch::Receiver<bool>,
        started: Instant,
    ) -> AppResult<BatchReport> {
        let company_filter = match request.optimization_type {
            OptimizationType::SingleCompany => request.company_id,
            OptimizationType::CrossCompany => None,
        };

        let trips = self
            .store
            .trips_for_date(request.date, company_filter)
            .await?;
        let vehicles = self.store.available_vehicles(company_filter).await?;
        let companies: HashMap<Uuid, Company> = self
            .store
            .companies()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        info!(
            "Found {} trips and {} available vehicles for {}",
            trips.len(),
            vehicles.len(),
            request.date
        );

        ensure_not_cancelled(cancel)?;

        // Los grupos de categoría particionan viajes y vehículos
        let mut trips_by_category: BTreeMap<VehicleCategory, Vec<Trip>> = BTreeMap::new();
        for trip in trips {
            trips_by_category
                .entry(required_vehicle_category(&trip))
                .or_default()
                .push(trip);
        }
        let mut vehicles_by_category: BTreeMap<VehicleCategory, Vec<Vehicle>> = BTreeMap::new();
        for vehicle in vehicles {
            vehicles_by_category
                .entry(vehicle.category)
                .or_default()
                .push(vehicle);
        }

        let mut unassigned: Vec<UnassignedTrip> = Vec::new();
        let mut group_inputs: Vec<(VehicleCategory, Vec<Trip>, Vec<Vehicle>)> = Vec::new();

        for (category, category_trips) in trips_by_category {
            match vehicles_by_category.get(&category) {
                Some(category_vehicles) => {
                    group_inputs.push((category, category_trips, category_vehicles.clone()));
                }
                None => {
                    warn!(
                        "no vehicles for category {}, {} trips unassigned",
                        category.code(),
                        category_trips.len()
                    );
                    unassigned.extend(category_trips.iter().map(|t| UnassignedTrip {
                        trip_id: t.id,
                        reason: format!("no_vehicles_for_category:{}", category.code()),
                    }));
                }
            }
        }

        let workers = self.config.group_workers(group_inputs.len().max(1));
        let outcomes: Vec<AppResult<GroupOutcome>> = stream::iter(
            group_inputs
                .into_iter()
                .map(|(category, category_trips, category_vehicles)| {
                    solve_group(
                        category,
                        request.date,
                        request.optimization_type,
                        category_trips,
                        category_vehicles,
                        companies.clone(),
                        Arc::clone(&self.routing),
                        self.config.clone(),
                    )
                }),
        )
        .buffered(workers)
        .collect()
        .await;

        ensure_not_cancelled(cancel)?;

        let mut all_assignments: Vec<SolvedAssignment> = Vec::new();
        let mut planning_trips: HashMap<Uuid, PlanningTrip> = HashMap::new();
        let mut valhalla: BTreeMap<String, GroupDiagnostics> = BTreeMap::new();

        for outcome in outcomes {
            let outcome = outcome?;
            unassigned.extend(outcome.infeasible);
            unassigned.extend(outcome.solution.dropped.iter().cloned());
            all_assignments.extend(outcome.solution.assignments.iter().cloned());
            for trip in outcome.planning_trips {
                planning_trips.insert(trip.id, trip);
            }
            valhalla.insert(outcome.category.code().to_string(), outcome.diagnostics);
        }

        all_assignments.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
        unassigned.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));

        // Aplicar el plan
        let applier = PlanApplier::new(Arc::clone(&self.store));
        applier
            .apply(batch.id, request.date, &all_assignments, &planning_trips)
            .await?;

        ensure_not_cancelled(cancel)?;

        // KPIs por empresa
        let mut feasible: Vec<PlanningTrip> = planning_trips.values().cloned().collect();
        feasible.sort_by(|a, b| a.id.cmp(&b.id));

        let attributor = KpiAttributor::new(SavingsFactors {
            fuel_liters_per_km: self.config.fuel_liters_per_km,
            co2_kg_per_liter: self.config.co2_kg_per_liter,
            price_per_liter: self.config.diesel_price_per_liter,
        });
        let (company_results, result_records, totals) =
            attributor.attribute(batch.id, &feasible, &all_assignments);
        self.store.save_company_results(&result_records).await?;

        // Cierre del batch
        let vehicles_used = all_assignments
            .iter()
            .map(|a| a.vehicle_id)
            .collect::<HashSet<_>>()
            .len();
        let participating: Vec<Uuid> = company_results.keys().copied().collect();

        batch.status = OptimizationBatchStatus::Completed;
        batch.total_trips = all_assignments.len() as i32;
        batch.vehicles_used = vehicles_used as i32;
        batch.km_saved = totals.km_saved;
        batch.fuel_saved_liters = totals.fuel_saved_liters;
        batch.participating_companies = participating.clone();
        batch.completed_at = Some(self.clock.now());
        batch.solver_time_s = Some(started.elapsed().as_secs_f64());
        self.store.update_batch(batch).await?;

        let mut warnings = Vec::new();
        if valhalla.values().any(|d| d.fallback_used) {
            warnings.push(
                "routing engine unavailable for some groups; haversine fallback distances were used"
                    .to_string(),
            );
        }
        if valhalla.values().any(|d| d.solver_fallback) {
            warnings.push("round-robin fallback assignment used for some groups".to_string());
        }

        let day_start = request
            .date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let assignments = all_assignments
            .iter()
            .map(|a| {
                let trip = &planning_trips[&a.trip_id];
                ReportAssignment {
                    trip_id: a.trip_id,
                    assigned_vehicle_id: a.vehicle_id,
                    original_company_id: trip.company_id,
                    assigned_company_id: a.vehicle_company_id,
                    sequence_order: a.sequence_order,
                    is_last_in_chain: a.is_last_in_chain,
                    start_time_iso: day_start + chrono::Duration::minutes(a.start_min),
                }
            })
            .collect();

        Ok(BatchReport {
            batch_id: batch.id,
            date: request.date,
            optimization_type: request.optimization_type,
            trips_optimized: all_assignments.len(),
            vehicles_used,
            participating_companies: participating,
            totals,
            assignments,
            unassigned,
            company_results,
            valhalla,
            warnings,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn solve_group(
    category: VehicleCategory,
    date: NaiveDate,
    optimization_type: OptimizationType,
    trips: Vec<Trip>,
    vehicles: Vec<Vehicle>,
    companies: HashMap<Uuid, Company>,
    routing: Arc<dyn RoutingProvider>,
    config: EnvironmentConfig,
) -> AppResult<GroupOutcome> {
    info!(
        "optimizing group {} with {} trips and {} vehicles",
        category.code(),
        trips.len(),
        vehicles.len()
    );

    let planning_vehicles = resolve_vehicles(&vehicles, &companies, &trips);
    let locations = collect_group_locations(&trips, &planning_vehicles, &companies);
    let matrix = routing.matrix(&locations).await;
    let snapshot = MatrixSnapshot::new(locations, matrix);

    let builder = FeasibilityBuilder::new(config.default_service_time_min);
    let group = builder.build_group(
        category,
        date,
        &trips,
        &vehicles,
        &planning_vehicles,
        &companies,
        &snapshot,
    );
    let infeasible = group.infeasible.clone();

    let matrix_ok = snapshot.ok;
    let fallback_used = snapshot.fallback_used;
    let location_count = snapshot.location_count();

    // El solver corre en un worker dedicado: la cancelación solo se
    // observa entre etapas, nunca dentro de la propagación de restricciones
    let budget_s = match optimization_type {
        OptimizationType::CrossCompany => config.solver_time_budget_s,
        OptimizationType::SingleCompany => config.single_company_time_budget_s,
    };
    let (solution, planning_trips) = tokio::task::spawn_blocking(move || {
        let budget = Duration::from_secs(budget_s);
        let solution = match optimization_type {
            OptimizationType::CrossCompany => {
                CrossCompanySolver::new(budget).solve(&group, &snapshot)
            }
            OptimizationType::SingleCompany => {
                SingleCompanySolver::new(budget).solve(&group, &snapshot)
            }
        };
        (solution, group.trips)
    })
    .await
    .map_err(|e| AppError::Internal(format!("solver worker failed: {}", e)))?;

    let diagnostics = GroupDiagnostics {
        matrix_ok,
        fallback_used,
        locations: location_count,
        solver_fallback: solution.fallback,
    };

    Ok(GroupOutcome {
        category,
        solution,
        planning_trips,
        infeasible,
        diagnostics,
    })
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> AppResult<()> {
    if *cancel.borrow() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}
