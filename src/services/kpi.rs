//! Atribución de KPIs por empresa
//!
//! Compara el plan resuelto contra el baseline "cada empresa sirve sus
//! viajes y vuelve al depósito tras cada uno" y reparte el ahorro en km,
//! combustible, CO₂ y costo. El ahorro se recorta en cero: un baseline
//! simulado puede quedar por debajo del plan y eso se registra como cero.

use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::models::{CompanyKpis, CompanyOptimizationResult, ReportTotals};
use crate::services::feasibility::PlanningTrip;
use crate::services::solver::SolvedAssignment;

/// Factores de conversión del ahorro
#[derive(Debug, Clone, Copy)]
pub struct SavingsFactors {
    /// Litros de diésel por km de camión
    pub fuel_liters_per_km: f64,
    /// kg de CO₂ por litro de diésel
    pub co2_kg_per_liter: f64,
    /// Precio del litro
    pub price_per_liter: f64,
}

impl Default for SavingsFactors {
    fn default() -> Self {
        Self {
            fuel_liters_per_km: 0.30,
            co2_kg_per_liter: 2.68,
            price_per_liter: 1.50,
        }
    }
}

pub struct KpiAttributor {
    factors: SavingsFactors,
}

impl KpiAttributor {
    pub fn new(factors: SavingsFactors) -> Self {
        Self { factors }
    }

    /// Calcula KPIs por empresa y los totales del batch.
    ///
    /// `trips` son los viajes factibles que entraron al solver (de todos
    /// los grupos); `assignments` la salida consolidada.
    pub fn attribute(
        &self,
        batch_id: Uuid,
        trips: &[PlanningTrip],
        assignments: &[SolvedAssignment],
    ) -> (BTreeMap<Uuid, CompanyKpis>, Vec<CompanyOptimizationResult>, ReportTotals) {
        let trips_by_id: HashMap<Uuid, &PlanningTrip> =
            trips.iter().map(|t| (t.id, t)).collect();
        let assignment_by_trip: HashMap<Uuid, &SolvedAssignment> =
            assignments.iter().map(|a| (a.trip_id, a)).collect();

        // Empresas participantes: las que aportan viajes y las que prestan flota
        let mut company_ids: Vec<Uuid> = trips
            .iter()
            .map(|t| t.company_id)
            .chain(assignments.iter().map(|a| a.vehicle_company_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        company_ids.sort();

        let mut kpis = BTreeMap::new();
        let mut records = Vec::new();
        let mut totals = ReportTotals::default();

        for company_id in company_ids {
            let contributed: Vec<&PlanningTrip> = trips
                .iter()
                .filter(|t| t.company_id == company_id)
                .collect();
            let assigned: Vec<(&PlanningTrip, &SolvedAssignment)> = contributed
                .iter()
                .filter_map(|t| assignment_by_trip.get(&t.id).map(|a| (*t, *a)))
                .collect();

            // Baseline: cada viaje asignado se habría servido solo, con
            // retorno al depósito propio
            let baseline_km: f64 = assigned
                .iter()
                .map(|(t, _)| t.route_distance_km + t.return_distance_km)
                .sum();

            // Optimizado: las distancias en carga más el retorno de los
            // cierres de cadena que vuelven al depósito de esta empresa
            let mut optimized_km: f64 = assigned.iter().map(|(t, _)| t.route_distance_km).sum();
            for (t, a) in &assigned {
                if a.is_last_in_chain && a.vehicle_company_id == company_id {
                    optimized_km += t.return_distance_km;
                }
            }

            let km_saved = (baseline_km - optimized_km).max(0.0);
            let fuel_saved_liters = km_saved * self.factors.fuel_liters_per_km;
            let co2_saved_kg = fuel_saved_liters * self.factors.co2_kg_per_liter;
            let cost_saved = fuel_saved_liters * self.factors.price_per_liter;

            let vehicles_used = assigned
                .iter()
                .map(|(_, a)| a.vehicle_id)
                .collect::<HashSet<_>>()
                .len();
            let vehicles_borrowed = assigned
                .iter()
                .filter(|(_, a)| a.vehicle_company_id != company_id)
                .count();
            let vehicles_shared_out = assignments
                .iter()
                .filter(|a| a.vehicle_company_id == company_id)
                .filter(|a| {
                    trips_by_id
                        .get(&a.trip_id)
                        .map(|t| t.company_id != company_id)
                        .unwrap_or(false)
                })
                .count();

            let company_kpis = CompanyKpis {
                trips_contributed: contributed.len(),
                trips_assigned: assigned.len(),
                vehicles_used,
                vehicles_borrowed,
                vehicles_shared_out,
                km_saved,
                fuel_saved_liters,
                co2_saved_kg,
                cost_saved,
                recommendations: self.recommendations(
                    km_saved,
                    fuel_saved_liters,
                    co2_saved_kg,
                    vehicles_borrowed,
                    vehicles_shared_out,
                ),
            };

            totals.km_saved += km_saved;
            totals.fuel_saved_liters += fuel_saved_liters;
            totals.co2_saved_kg += co2_saved_kg;
            totals.cost_saved += cost_saved;

            records.push(CompanyOptimizationResult {
                optimization_batch_id: batch_id,
                company_id,
                trips_contributed: contributed.len() as i32,
                trips_assigned: assigned.len() as i32,
                vehicles_used: vehicles_used as i32,
                vehicles_borrowed: vehicles_borrowed as i32,
                vehicles_shared_out: vehicles_shared_out as i32,
                km_saved,
                fuel_saved_liters,
                co2_saved_kg,
                cost_saved,
            });
            kpis.insert(company_id, company_kpis);
        }

        (kpis, records, totals)
    }

    fn recommendations(
        &self,
        km_saved: f64,
        fuel_saved_liters: f64,
        co2_saved_kg: f64,
        vehicles_borrowed: usize,
        vehicles_shared_out: usize,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if km_saved > 100.0 {
            recommendations.push(
                "Great optimization! You saved significant distance. \
                 Consider scheduling more trips during peak sharing hours."
                    .to_string(),
            );
        }
        if vehicles_borrowed > 0 {
            recommendations.push(format!(
                "You successfully borrowed {} vehicles from other companies. \
                 This reduces your need for additional fleet investment.",
                vehicles_borrowed
            ));
        }
        if vehicles_shared_out > 0 {
            recommendations.push(format!(
                "You shared {} of your vehicles with other companies. \
                 This increases your asset utilization.",
                vehicles_shared_out
            ));
        }
        if fuel_saved_liters > 50.0 {
            recommendations.push(format!(
                "Fuel savings of {:.1} liters reduces CO2 emissions by {:.1} kg.",
                fuel_saved_liters, co2_saved_kg
            ));
        }
        if recommendations.is_empty() {
            recommendations.push(
                "Good start! As more companies join the platform, \
                 you'll see increased optimization opportunities."
                    .to_string(),
            );
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(id_byte: u8, company: u8, route_km: f64, return_km: f64) -> PlanningTrip {
        PlanningTrip {
            id: Uuid::from_bytes([id_byte; 16]),
            company_id: Uuid::from_bytes([company; 16]),
            origin: (36.75, 3.0),
            dest: (36.76, 3.05),
            earliest_min: 480,
            latest_start_min: 540,
            duration_min: 30,
            service_min: 5,
            weight_kg: 1000.0,
            volume_m3: None,
            route_distance_km: route_km,
            return_distance_km: return_km,
            departure_datetime: chrono::Utc::now(),
        }
    }

    fn assignment(
        trip_byte: u8,
        vehicle_byte: u8,
        vehicle_company: u8,
        sequence: i32,
        is_last: bool,
    ) -> SolvedAssignment {
        SolvedAssignment {
            trip_id: Uuid::from_bytes([trip_byte; 16]),
            vehicle_id: Uuid::from_bytes([vehicle_byte; 16]),
            vehicle_company_id: Uuid::from_bytes([vehicle_company; 16]),
            sequence_order: sequence,
            is_last_in_chain: is_last,
            start_min: 480,
        }
    }

    #[test]
    fn test_chaining_on_own_vehicle_saves_intermediate_return() {
        // Dos viajes de la empresa 1 encadenados en su propio vehículo:
        // el baseline paga dos retornos, el plan solo el último.
        let trips = vec![trip(1, 1, 10.0, 20.0), trip(2, 1, 10.0, 5.0)];
        let assignments = vec![
            assignment(1, 9, 1, 1, false),
            assignment(2, 9, 1, 2, true),
        ];

        let attributor = KpiAttributor::new(SavingsFactors::default());
        let (kpis, records, totals) =
            attributor.attribute(Uuid::from_bytes([7; 16]), &trips, &assignments);

        let company = Uuid::from_bytes([1; 16]);
        let k = &kpis[&company];
        // baseline 45, optimizado 25: se ahorró el retorno intermedio
        assert!((k.km_saved - 20.0).abs() < 1e-9);
        assert!((k.fuel_saved_liters - 6.0).abs() < 1e-9);
        assert!((k.co2_saved_kg - 6.0 * 2.68).abs() < 1e-9);
        assert!((k.cost_saved - 6.0 * 1.5).abs() < 1e-9);
        assert_eq!(k.vehicles_borrowed, 0);
        assert_eq!(records.len(), 1);
        assert!((totals.km_saved - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_company_borrow_and_share_out() {
        // El viaje de la empresa 2 va en el vehículo de la empresa 1
        let trips = vec![trip(1, 1, 10.0, 20.0), trip(2, 2, 10.0, 15.0)];
        let assignments = vec![
            assignment(1, 9, 1, 1, false),
            assignment(2, 9, 1, 2, true),
        ];

        let attributor = KpiAttributor::new(SavingsFactors::default());
        let (kpis, _, _) =
            attributor.attribute(Uuid::from_bytes([7; 16]), &trips, &assignments);

        let c1 = Uuid::from_bytes([1; 16]);
        let c2 = Uuid::from_bytes([2; 16]);
        assert_eq!(kpis[&c2].vehicles_borrowed, 1);
        assert_eq!(kpis[&c1].vehicles_shared_out, 1);
        // C2 no paga ningún retorno en el plan: ahorra todo su retorno solo
        assert!(kpis[&c2].km_saved > 0.0);
    }

    #[test]
    fn test_savings_clipped_at_zero() {
        // Retorno propio más barato que el del plan: el recorte deja cero
        let trips = vec![trip(1, 1, 10.0, 0.0)];
        let assignments = vec![assignment(1, 9, 1, 1, true)];

        let attributor = KpiAttributor::new(SavingsFactors::default());
        let (kpis, _, totals) =
            attributor.attribute(Uuid::from_bytes([7; 16]), &trips, &assignments);

        let c1 = Uuid::from_bytes([1; 16]);
        assert_eq!(kpis[&c1].km_saved, 0.0);
        assert_eq!(totals.km_saved, 0.0);
        assert!(!kpis[&c1].recommendations.is_empty());
    }
}
