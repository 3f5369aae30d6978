//! Generador de datasets de demo
//!
//! Produce un día plausible de operación multi-empresa en la región de
//! Argel para probar la CLI sin datos reales. Determinista con semilla.

use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::models::{CargoCategory, TripStatus, VehicleStatus};
use crate::services::compatibility::vehicle_category_for_cargo;
use crate::store::memory::{CompanyRecord, Dataset, TripRecord, VehicleRecord};
use crate::utils::geo::haversine_km;

/// Centro aproximado de Argel
const CENTER: (f64, f64) = (36.7538, 3.0588);

const CARGO_MIX: &[CargoCategory] = &[
    CargoCategory::A01ProduitsFrais,
    CargoCategory::A02ProduitsSurgeles,
    CargoCategory::A03ProduitsSecs,
    CargoCategory::B01MateriauxVrac,
    CargoCategory::I01ProduitsFinis,
    CargoCategory::I02PiecesDetachees,
];

const COMPANY_NAMES: &[&str] = &[
    "Transport Atlas",
    "Logistique Numidia",
    "Fret Tassili",
    "Cargo Zibans",
    "Messagerie Hoggar",
    "Transit Ouarsenis",
];

pub struct DemoOptions {
    pub companies: usize,
    pub trips: usize,
    pub date: NaiveDate,
    pub seed: u64,
}

pub fn generate_demo_dataset(options: &DemoOptions) -> Dataset {
    let mut rng = StdRng::seed_from_u64(options.seed);

    let mut companies = Vec::new();
    for i in 0..options.companies.max(1) {
        let depot = jitter(&mut rng, CENTER, 0.15);
        companies.push(CompanyRecord {
            id: deterministic_id(&mut rng),
            company_name: COMPANY_NAMES[i % COMPANY_NAMES.len()].to_string(),
            depot_lat: Some(depot.0),
            depot_lng: Some(depot.1),
        });
    }

    // Cada empresa recibe un vehículo por categoría del mix, para que
    // siempre exista un candidato compatible
    let mut vehicles = Vec::new();
    for company in &companies {
        for cargo in CARGO_MIX {
            vehicles.push(VehicleRecord {
                id: deterministic_id(&mut rng),
                company_id: company.id,
                category: vehicle_category_for_cargo(*cargo),
                capacity_tons: rng.gen_range(4..=12) as f64,
                capacity_m3: None,
                depot_lat: company.depot_lat,
                depot_lng: company.depot_lng,
                cost_per_km: Some(0.5),
                fuel_consumption_l_per_100km: Some(30.0),
                status: VehicleStatus::Available,
            });
        }
    }

    let day_start = Utc
        .from_utc_datetime(&options.date.and_hms_opt(0, 0, 0).expect("valid midnight"));

    let mut trips = Vec::new();
    for i in 0..options.trips {
        let company = &companies[i % companies.len()];
        let origin = jitter(&mut rng, CENTER, 0.25);
        let dest = jitter(&mut rng, CENTER, 0.25);

        let distance_km = haversine_km(origin.0, origin.1, dest.0, dest.1).max(2.0);
        let duration_min = (distance_km / 40.0 * 60.0).ceil();

        let departure =
            day_start + ChronoDuration::minutes(rng.gen_range(6 * 60..14 * 60));
        let slack_min = rng.gen_range(45..180);
        let arrival = departure + ChronoDuration::minutes(duration_min as i64 + slack_min);

        let depot = (
            company.depot_lat.expect("demo depots always set"),
            company.depot_lng.expect("demo depots always set"),
        );

        trips.push(TripRecord {
            id: deterministic_id(&mut rng),
            company_id: company.id,
            departure_point: format!("Zone {}", i + 1),
            arrival_point: format!("Zone {}", i + 101),
            departure_lat: Some(origin.0),
            departure_lng: Some(origin.1),
            arrival_lat: Some(dest.0),
            arrival_lng: Some(dest.1),
            departure_datetime: departure,
            arrival_datetime_planned: arrival,
            cargo_category: CARGO_MIX[rng.gen_range(0..CARGO_MIX.len())],
            material_type: None,
            cargo_weight_kg: rng.gen_range(500..4000) as f64,
            cargo_volume_m3: None,
            required_vehicle_category: None,
            route_distance_km: Some(distance_km),
            route_duration_min: Some(duration_min),
            return_distance_km: Some(haversine_km(dest.0, dest.1, depot.0, depot.1)),
            service_time_min: None,
            status: TripStatus::Planned,
        });
    }

    Dataset {
        companies,
        vehicles,
        trips,
    }
}

fn jitter(rng: &mut StdRng, center: (f64, f64), radius_deg: f64) -> (f64, f64) {
    (
        center.0 + rng.gen_range(-radius_deg..radius_deg),
        center.1 + rng.gen_range(-radius_deg..radius_deg),
    )
}

fn deterministic_id(rng: &mut StdRng) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    #[test]
    fn test_demo_dataset_is_valid_and_deterministic() {
        let options = DemoOptions {
            companies: 3,
            trips: 10,
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            seed: 42,
        };

        let one = generate_demo_dataset(&options);
        let two = generate_demo_dataset(&options);

        assert_eq!(one.trips.len(), 10);
        assert_eq!(one.companies.len(), 3);
        assert_eq!(
            serde_json::to_string(&one).unwrap(),
            serde_json::to_string(&two).unwrap()
        );

        // El dataset generado pasa la validación de carga
        assert!(InMemoryStore::from_dataset(one).is_ok());
    }
}
