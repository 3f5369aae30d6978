//! Modelo de OptimizationBatch
//!
//! Una corrida nocturna del optimizador. El estado avanza de forma monótona
//! y nunca sale de un estado terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptimizationBatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OptimizationBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationBatchStatus::Pending => "PENDING",
            OptimizationBatchStatus::Processing => "PROCESSING",
            OptimizationBatchStatus::Completed => "COMPLETED",
            OptimizationBatchStatus::Failed => "FAILED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PENDING" => Some(OptimizationBatchStatus::Pending),
            "PROCESSING" => Some(OptimizationBatchStatus::Processing),
            "COMPLETED" => Some(OptimizationBatchStatus::Completed),
            "FAILED" => Some(OptimizationBatchStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OptimizationBatchStatus::Completed | OptimizationBatchStatus::Failed
        )
    }
}

/// Modo de optimización del batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationType {
    SingleCompany,
    CrossCompany,
}

impl OptimizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationType::SingleCompany => "single_company",
            OptimizationType::CrossCompany => "cross_company",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "single_company" => Some(OptimizationType::SingleCompany),
            "cross_company" => Some(OptimizationType::CrossCompany),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationBatch {
    pub id: Uuid,
    pub batch_date: NaiveDate,
    pub optimization_type: OptimizationType,
    pub status: OptimizationBatchStatus,

    pub total_trips: i32,
    pub vehicles_used: i32,
    pub km_saved: f64,
    pub fuel_saved_liters: f64,
    pub participating_companies: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub solver_time_s: Option<f64>,
    pub error: Option<String>,
}

impl OptimizationBatch {
    pub fn open(
        id: Uuid,
        batch_date: NaiveDate,
        optimization_type: OptimizationType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            batch_date,
            optimization_type,
            status: OptimizationBatchStatus::Processing,
            total_trips: 0,
            vehicles_used: 0,
            km_saved: 0.0,
            fuel_saved_liters: 0.0,
            participating_companies: Vec::new(),
            created_at,
            completed_at: None,
            solver_time_s: None,
            error: None,
        }
    }
}

/// Resultado de optimización por empresa, creado una vez al cierre del batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyOptimizationResult {
    pub optimization_batch_id: Uuid,
    pub company_id: Uuid,
    pub trips_contributed: i32,
    pub trips_assigned: i32,
    pub vehicles_used: i32,
    pub vehicles_borrowed: i32,
    pub vehicles_shared_out: i32,
    pub km_saved: f64,
    pub fuel_saved_liters: f64,
    pub co2_saved_kg: f64,
    pub cost_saved: f64,
}
