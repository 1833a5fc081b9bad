pub mod cluster;
pub mod gke;
pub mod terraform;
