//! Panel Common Types
//!
//! Wire types shared by everything that talks to the API gateway.

pub mod health;
pub mod protocol;

pub use health::{Health, ParseHealthError};
pub use protocol::{
    Details, HardwareHeartbeat, LoginRequest, LoginResponse, SoftwareHeartbeat,
};
