pub mod activation;
pub mod deployments;
pub mod health;
pub mod heartbeat;
pub mod instances;
pub mod license;
pub mod releases;
