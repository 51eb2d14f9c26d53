//! Authenticated HTTP access to the API gateway.
//!
//! The gateway sits in front of every third-party API the dashboard uses
//! and also hosts the software/hardware registry the heartbeat reports to.
//! All calls carry a bearer token obtained from `/auth/login`; the client
//! caches it and logs in again only once it has expired.

mod client;
mod credential;

pub use client::GatewayClient;
pub use credential::Credential;
