// jx-terraform library
// Re-applies the terraform plan of an existing GKE cluster

pub mod commands;
pub mod config;
pub mod logging;
pub mod services;
pub mod utils;
