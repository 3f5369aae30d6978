//! Motor de optimización nocturna de viajes para flotas mutualizadas
//!
//! Asigna cada viaje factible a un vehículo, encadena viajes a través de
//! fronteras de empresa para minimizar el deadhead, y atribuye el ahorro
//! por empresa contra el baseline de flotas separadas.

pub mod config;
pub mod fixtures;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;
