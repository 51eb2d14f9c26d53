//! Python Panel agent.
//!
//! Authenticated access to the API gateway plus the kill-switch heartbeat
//! that lets the gateway shut the dashboard down remotely.

pub mod config;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod lifecycle;

pub use config::{Config, GatewayConfig, HeartbeatConfig};
pub use error::{DisableReason, Error, Result};
pub use gateway::GatewayClient;
pub use heartbeat::{BeaconTarget, Heartbeat, HealthSnapshot, KillSwitch, ReporterState};
pub use lifecycle::{run_host, HostExit};
