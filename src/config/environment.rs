//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y los parámetros del
//! optimizador. Todo valor tiene un default razonable para poder correr la
//! CLI sin entorno preparado; `DATABASE_URL` activa el store Postgres.

use std::env;

use crate::utils::errors::{AppError, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Base URL del motor de rutas (Valhalla)
    pub routing_base_url: String,
    /// Timeout de las llamadas al motor de rutas, en segundos
    pub routing_timeout_s: u64,
    /// Precio del diésel por litro, configurable
    pub diesel_price_per_liter: f64,
    /// Consumo asumido para el cálculo de ahorro (L/km)
    pub fuel_liters_per_km: f64,
    /// kg de CO₂ por litro de diésel
    pub co2_kg_per_liter: f64,
    /// Tiempo de servicio por viaje cuando el viaje no lo trae (minutos)
    pub default_service_time_min: i64,
    /// Distancia de retorno conservadora cuando falta el dato (km)
    pub default_return_distance_km: f64,
    /// Presupuesto de pared por grupo para el solver cross-company (s)
    pub solver_time_budget_s: u64,
    /// Presupuesto por grupo para el modo single-company (s)
    pub single_company_time_budget_s: u64,
    /// Máximo de grupos resueltos en paralelo; None = min(grupos, cores)
    pub max_parallel_groups: Option<usize>,
    /// Conexión Postgres opcional; sin ella se usa el dataset JSON
    pub database_url: Option<String>,
    /// Ruta del dataset JSON cuando no hay base de datos
    pub dataset_path: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            routing_base_url: env::var("ROUTING_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            routing_timeout_s: parse_env("ROUTING_TIMEOUT_S", 30),
            diesel_price_per_liter: parse_env("DIESEL_PRICE_PER_LITER", 1.50),
            fuel_liters_per_km: parse_env("FUEL_LITERS_PER_KM", 0.30),
            co2_kg_per_liter: parse_env("CO2_KG_PER_LITER", 2.68),
            default_service_time_min: parse_env("DEFAULT_SERVICE_TIME_MIN", 30),
            default_return_distance_km: parse_env("DEFAULT_RETURN_DISTANCE_KM", 20.0),
            solver_time_budget_s: parse_env("SOLVER_TIME_BUDGET_S", 300),
            single_company_time_budget_s: parse_env("SINGLE_COMPANY_TIME_BUDGET_S", 10),
            max_parallel_groups: env::var("MAX_PARALLEL_GROUPS")
                .ok()
                .and_then(|v| v.parse().ok()),
            database_url: env::var("DATABASE_URL").ok(),
            dataset_path: env::var("DATASET_PATH").unwrap_or_else(|_| "dataset.json".to_string()),
        }
    }
}

impl EnvironmentConfig {
    /// Número de workers para resolver grupos en paralelo
    pub fn group_workers(&self, group_count: usize) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let cap = self.max_parallel_groups.unwrap_or(cores);
        group_count.clamp(1, cap.max(1))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.diesel_price_per_liter < 0.0 {
            return Err(AppError::Config(
                "DIESEL_PRICE_PER_LITER must be non-negative".to_string(),
            ));
        }
        if self.routing_timeout_s == 0 {
            return Err(AppError::Config(
                "ROUTING_TIMEOUT_S must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EnvironmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_service_time_min, 30);
    }

    #[test]
    fn test_group_workers_bounded() {
        let config = EnvironmentConfig {
            max_parallel_groups: Some(2),
            ..EnvironmentConfig::default()
        };
        assert_eq!(config.group_workers(8), 2);
        assert_eq!(config.group_workers(1), 1);
    }
}
