//! Clasificador de compatibilidad carga → vehículo
//!
//! El prefijo del código de carga determina la categoría de vehículo
//! requerida. La derivación es una función pura; la tabla replica el
//! referencial del sector.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::models::{CargoCategory, Trip, Vehicle, VehicleCategory};

lazy_static! {
    /// Tabla C: categoría de carga → categoría de vehículo requerida
    static ref COMPATIBILITY_MAP: HashMap<CargoCategory, VehicleCategory> = {
        let mut m = HashMap::new();
        m.insert(CargoCategory::A01ProduitsFrais, VehicleCategory::Ag1CamionFrigorifique);
        m.insert(CargoCategory::A02ProduitsSurgeles, VehicleCategory::Ag2CamionRefrigere);
        m.insert(CargoCategory::A03ProduitsSecs, VehicleCategory::Ag3CamionIsotherme);
        m.insert(CargoCategory::A04BoissonsLiquides, VehicleCategory::Ag4CamionCiterneAlimentaire);
        m.insert(CargoCategory::B01MateriauxVrac, VehicleCategory::Bt1CamionBenne);
        m.insert(CargoCategory::B02MateriauxSolides, VehicleCategory::Bt4CamionPlateauRidelles);
        m.insert(CargoCategory::B03BetonPret, VehicleCategory::Bt3CamionMalaxeur);
        m.insert(CargoCategory::I01ProduitsFinis, VehicleCategory::In2FourgonFerme);
        m.insert(CargoCategory::I02PiecesDetachees, VehicleCategory::In6CamionFourgonHayon);
        m.insert(CargoCategory::C01ChimiquesLiquides, VehicleCategory::Ch2CamionCiterneChimique);
        m.insert(CargoCategory::C02ChimiquesSolides, VehicleCategory::Ch4CamionAdr);
        m
    };
}

/// Categoría de vehículo requerida para una categoría de carga
pub fn vehicle_category_for_cargo(cargo: CargoCategory) -> VehicleCategory {
    COMPATIBILITY_MAP
        .get(&cargo)
        .copied()
        // Cargas fuera del referencial van al frigorífico genérico
        .unwrap_or(VehicleCategory::Ag1CamionFrigorifique)
}

/// Categoría requerida de un viaje: la explícita si viene, si no derivada
pub fn required_vehicle_category(trip: &Trip) -> VehicleCategory {
    trip.required_vehicle_category
        .unwrap_or_else(|| vehicle_category_for_cargo(trip.cargo_category))
}

/// Un vehículo es compatible con un viaje si coincide la categoría y la
/// carga cabe. La capacidad se evalúa por viaje: los envíos son
/// independientes, la cadena es temporal y nunca concurrente.
pub fn is_vehicle_compatible(vehicle: &Vehicle, trip: &Trip, required: VehicleCategory) -> bool {
    if vehicle.category != required {
        return false;
    }
    if trip.cargo_weight_kg > vehicle.capacity_kg() {
        return false;
    }
    if let (Some(volume), Some(capacity_m3)) = (trip.cargo_volume_m3, vehicle.capacity_m3) {
        if volume > capacity_m3 {
            return false;
        }
    }
    true
}
