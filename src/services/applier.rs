//! Plan Applier
//!
//! Escribe el plan resuelto a través del EntityStore: vehículo asignado,
//! orden en la cadena, marca de último eslabón y llegada estimada. Solo
//! toca viajes del conjunto factible resuelto y es idempotente por batch.

use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::services::feasibility::PlanningTrip;
use crate::services::solver::SolvedAssignment;
use crate::store::{EntityStore, TripAssignmentUpdate};
use crate::utils::errors::{internal_error, AppResult};

pub struct PlanApplier {
    store: Arc<dyn EntityStore>,
}

impl PlanApplier {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Aplica las asignaciones del batch; devuelve cuántos viajes
    /// cambiaron. Reaplicar la misma salida no escribe nada.
    pub async fn apply(
        &self,
        batch_id: Uuid,
        date: NaiveDate,
        assignments: &[SolvedAssignment],
        trips: &HashMap<Uuid, PlanningTrip>,
    ) -> AppResult<usize> {
        let day_start = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();

        let mut updates = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let trip = trips.get(&assignment.trip_id).ok_or_else(|| {
                internal_error(&format!(
                    "assignment references trip {} outside the solved set",
                    assignment.trip_id
                ))
            })?;

            let start = day_start + ChronoDuration::minutes(assignment.start_min);
            updates.push(TripAssignmentUpdate {
                trip_id: assignment.trip_id,
                optimization_batch_id: batch_id,
                assigned_vehicle_id: assignment.vehicle_id,
                sequence_order: assignment.sequence_order,
                is_last_in_chain: assignment.is_last_in_chain,
                estimated_arrival_datetime: Some(
                    start + ChronoDuration::minutes(trip.duration_min),
                ),
            });
        }

        let changed = self.store.apply_assignments(&updates).await?;
        info!(
            "applied {} assignments for batch {} ({} modified)",
            updates.len(),
            batch_id,
            changed
        );
        Ok(changed)
    }
}
