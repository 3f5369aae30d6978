//! Servicio de rutas (Valhalla)
//!
//! Cliente del motor de rutas con perfil de camión. Ante cualquier error de
//! transporte, HTTP o parseo devuelve un fallback determinista por
//! haversine marcado `ok = false`; el optimizador lo acepta como entrada
//! pero el flag llega hasta el reporte del batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{encode_polyline, fallback_duration_min, haversine_km};

/// Resumen de una ruta punto a punto
#[derive(Debug, Clone)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: f64,
    pub polyline: String,
    pub ok: bool,
    pub fallback_used: bool,
}

/// Matriz N×N de duraciones (s) y distancias (m); diagonal en cero
#[derive(Debug, Clone)]
pub struct MatrixResult {
    pub durations_s: Vec<Vec<f64>>,
    pub distances_m: Vec<Vec<f64>>,
    pub ok: bool,
    pub fallback_used: bool,
}

/// Abstracción del motor de rutas que ve el resto del sistema
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        depart_at: Option<DateTime<Utc>>,
    ) -> RouteSummary;

    async fn matrix(&self, points: &[(f64, f64)]) -> MatrixResult;
}

// --- DTOs del API de Valhalla ---

#[derive(Debug, Serialize)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct DirectionsOptions {
    units: &'static str,
}

#[derive(Debug, Serialize)]
struct DateTimeOption {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: &'static str,
    directions_options: DirectionsOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<DateTimeOption>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: ValhallaTrip,
}

#[derive(Debug, Deserialize)]
struct ValhallaTrip {
    legs: Vec<ValhallaLeg>,
}

#[derive(Debug, Deserialize)]
struct ValhallaLeg {
    summary: LegSummary,
    shape: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegSummary {
    /// Longitud en kilómetros (units: kilometers)
    length: f64,
    /// Tiempo en segundos
    time: f64,
}

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: &'static str,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Segundos desde source hasta target
    time: Option<f64>,
    /// Kilómetros desde source hasta target
    distance: Option<f64>,
}

/// Cliente HTTP de Valhalla
pub struct ValhallaService {
    base_url: String,
    client: reqwest::Client,
}

impl ValhallaService {
    pub fn new(base_url: String, timeout_s: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_s))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    async fn request_route(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        depart_at: Option<DateTime<Utc>>,
    ) -> AppResult<RouteSummary> {
        let request = RouteRequest {
            locations: vec![
                ValhallaLocation {
                    lat: start.0,
                    lon: start.1,
                },
                ValhallaLocation {
                    lat: end.0,
                    lon: end.1,
                },
            ],
            costing: "truck",
            directions_options: DirectionsOptions {
                units: "kilometers",
            },
            date_time: depart_at.map(|dt| DateTimeOption {
                kind: "departure",
                value: dt.to_rfc3339(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/route", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Routing(format!("route request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Routing(format!(
                "route returned status {}",
                response.status()
            )));
        }

        let parsed: RouteResponse = response
            .json()
            .await
            .map_err(|e| AppError::Routing(format!("route response parse failed: {}", e)))?;

        let leg = parsed
            .trip
            .legs
            .first()
            .ok_or_else(|| AppError::Routing("route response has no legs".to_string()))?;

        Ok(RouteSummary {
            distance_km: leg.summary.length.max(0.0),
            duration_min: (leg.summary.time / 60.0).max(0.0),
            polyline: leg.shape.clone().unwrap_or_default(),
            ok: true,
            fallback_used: false,
        })
    }

    async fn request_matrix(&self, points: &[(f64, f64)]) -> AppResult<MatrixResult> {
        let locations: Vec<ValhallaLocation> = points
            .iter()
            .map(|&(lat, lng)| ValhallaLocation { lat, lon: lng })
            .collect();

        let request = MatrixRequest {
            sources: locations
                .iter()
                .map(|l| ValhallaLocation {
                    lat: l.lat,
                    lon: l.lon,
                })
                .collect(),
            targets: locations,
            costing: "truck",
        };

        let response = self
            .client
            .post(format!("{}/sources_to_targets", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Routing(format!("matrix request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Routing(format!(
                "matrix returned status {}",
                response.status()
            )));
        }

        let parsed: MatrixResponse = response
            .json()
            .await
            .map_err(|e| AppError::Routing(format!("matrix response parse failed: {}", e)))?;

        let n = points.len();
        if parsed.sources_to_targets.len() != n {
            return Err(AppError::Routing(format!(
                "matrix shape mismatch: expected {} rows, got {}",
                n,
                parsed.sources_to_targets.len()
            )));
        }

        let mut durations_s = vec![vec![0.0; n]; n];
        let mut distances_m = vec![vec![0.0; n]; n];
        for (i, row) in parsed.sources_to_targets.iter().enumerate() {
            if row.len() != n {
                return Err(AppError::Routing(format!(
                    "matrix row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, cell) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                let time_s = cell.time.unwrap_or(0.0).max(0.0);
                durations_s[i][j] = time_s;
                // Valhalla entrega kilómetros; normalizamos a metros. Si el
                // upstream omite la distancia la derivamos de la duración a
                // velocidad nominal.
                distances_m[i][j] = match cell.distance {
                    Some(km) => (km * 1000.0).max(0.0),
                    None => time_s / 3600.0 * crate::utils::geo::TRUCK_SPEED_KMH * 1000.0,
                };
            }
        }

        Ok(MatrixResult {
            durations_s,
            distances_m,
            ok: true,
            fallback_used: false,
        })
    }

    fn fallback_route(start: (f64, f64), end: (f64, f64)) -> RouteSummary {
        let distance = haversine_km(start.0, start.1, end.0, end.1);
        RouteSummary {
            distance_km: distance,
            duration_min: fallback_duration_min(distance),
            polyline: encode_polyline(&[start, end]),
            ok: false,
            fallback_used: true,
        }
    }

    fn fallback_matrix(points: &[(f64, f64)]) -> MatrixResult {
        let n = points.len();
        let mut durations_s = vec![vec![0.0; n]; n];
        let mut distances_m = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let km = haversine_km(points[i].0, points[i].1, points[j].0, points[j].1);
                distances_m[i][j] = km * 1000.0;
                durations_s[i][j] = fallback_duration_min(km) * 60.0;
            }
        }

        MatrixResult {
            durations_s,
            distances_m,
            ok: false,
            fallback_used: true,
        }
    }
}

#[async_trait]
impl RoutingProvider for ValhallaService {
    async fn route(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        depart_at: Option<DateTime<Utc>>,
    ) -> RouteSummary {
        match self.request_route(start, end, depart_at).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Valhalla route unavailable, using haversine fallback: {}", e);
                Self::fallback_route(start, end)
            }
        }
    }

    async fn matrix(&self, points: &[(f64, f64)]) -> MatrixResult {
        if points.is_empty() {
            return MatrixResult {
                durations_s: vec![],
                distances_m: vec![],
                ok: true,
                fallback_used: false,
            };
        }

        match self.request_matrix(points).await {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!(
                    "Valhalla matrix unavailable for {} locations, using haversine fallback: {}",
                    points.len(),
                    e
                );
                Self::fallback_matrix(points)
            }
        }
    }
}

/// Proveedor offline: siempre responde con el cálculo haversine.
///
/// Útil para corridas sin motor de rutas y para tests deterministas; sus
/// respuestas llevan los mismos flags que el fallback del cliente real.
#[derive(Debug, Default, Clone)]
pub struct HaversineRouter;

#[async_trait]
impl RoutingProvider for HaversineRouter {
    async fn route(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        _depart_at: Option<DateTime<Utc>>,
    ) -> RouteSummary {
        ValhallaService::fallback_route(start, end)
    }

    async fn matrix(&self, points: &[(f64, f64)]) -> MatrixResult {
        ValhallaService::fallback_matrix(points)
    }
}
