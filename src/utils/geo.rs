//! Utilidades geográficas
//!
//! Distancia haversine, codificación de polylines y claves de coordenadas
//! redondeadas para indexar matrices de distancia.

/// Radio de la Tierra en kilómetros
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Velocidad media asumida para camiones (km/h) en cálculos de fallback
pub const TRUCK_SPEED_KMH: f64 = 40.0;

/// Distancia de círculo máximo entre dos puntos en kilómetros
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Minutos de viaje estimados a velocidad nominal de camión
pub fn fallback_duration_min(distance_km: f64) -> f64 {
    distance_km / TRUCK_SPEED_KMH * 60.0
}

/// Clave de coordenada redondeada a 1e-6 grados.
///
/// Las matrices de Valhalla se indexan por ubicación; dos puntos que solo
/// difieren por ruido de precisión deben compartir celda.
pub fn coord_key(lat: f64, lng: f64) -> (i64, i64) {
    ((lat * 1e6).round() as i64, (lng * 1e6).round() as i64)
}

/// Codifica coordenadas al formato polyline (precisión 6, como Valhalla).
///
/// El upstream devuelve las shapes ya codificadas; esto solo se usa para
/// las rutas de fallback en línea recta.
pub fn encode_polyline(coordinates: &[(f64, f64)]) -> String {
    let mut encoded = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for &(lat, lng) in coordinates {
        let lat_e6 = (lat * 1e6).round() as i64;
        let lng_e6 = (lng * 1e6).round() as i64;
        encode_value(lat_e6 - prev_lat, &mut encoded);
        encode_value(lng_e6 - prev_lng, &mut encoded);
        prev_lat = lat_e6;
        prev_lng = lng_e6;
    }

    encoded
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = value << 1;
    if value < 0 {
        v = !v;
    }
    while v >= 0x20 {
        out.push((((0x20 | (v & 0x1f)) + 63) as u8) as char);
        v >>= 5;
    }
    out.push(((v + 63) as u8) as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Algiers centre -> Algiers port, unos pocos kilómetros
        let d = haversine_km(36.7531, 2.9958, 36.7606, 3.0586);
        assert!(d > 4.0 && d < 8.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_km(36.75, 3.06, 36.75, 3.06), 0.0);
    }

    #[test]
    fn test_coord_key_rounds_noise() {
        assert_eq!(coord_key(36.7531001, 3.0), coord_key(36.7531, 3.0000004));
    }

    #[test]
    fn test_encode_polyline_not_empty() {
        let encoded = encode_polyline(&[(36.7531, 2.9958), (36.7606, 3.0586)]);
        assert!(!encoded.is_empty());
        // Las deltas negativas y positivas deben producir ASCII imprimible
        assert!(encoded.bytes().all(|b| (63..=126).contains(&b)));
    }
}
