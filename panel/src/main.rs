//! Python Panel - terminal dashboard host with a gateway kill-switch.

use std::env;
use std::sync::Arc;

use panel::heartbeat::Heartbeat;
use panel::{run_host, Config, GatewayClient, HostExit, KillSwitch};
use panel_common::{Details, Health};
use serde_json::json;
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("panel {}", VERSION);
}

/// Fetch fresh dashboard data in the background and mirror the result
/// into the heartbeat health.
fn refresh_dashboard(client: Arc<GatewayClient>, heartbeat: Option<Arc<Heartbeat>>) {
    tokio::spawn(async move {
        match client.location_from_ip(None).await {
            Ok(location) => {
                let city = location
                    .pointer("/location/city")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown");
                tracing::info!("Dashboard refreshed, location: {}", city);
                if let Some(heartbeat) = heartbeat {
                    let mut details = Details::new();
                    details.insert("status".to_string(), json!("running"));
                    heartbeat.set_health(Health::Ok, Some(details));
                }
            }
            Err(e) => {
                tracing::warn!("Dashboard refresh failed: {}", e);
                if let Some(heartbeat) = heartbeat {
                    let mut details = Details::new();
                    details.insert("status".to_string(), json!("running"));
                    details.insert("refresh_error".to_string(), json!(e.to_string()));
                    heartbeat.set_health(Health::Warning, Some(details));
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure config.toml exists or set PANEL__GATEWAY__URL, \
             PANEL__GATEWAY__USERNAME and PANEL__GATEWAY__PASSWORD environment variables.",
            e
        )
    })?;
    tracing::info!("Starting panel against gateway {}", config.gateway.url);

    let client = Arc::new(GatewayClient::new(&config.gateway)?);

    // Kill-switch heartbeat. Disable the entry on the gateway to shut
    // the dashboard down remotely.
    let heartbeat = if config.heartbeat.enabled {
        let heartbeat = Heartbeat::new(client.clone(), config.heartbeat.target()?)
            .with_interval(config.heartbeat.interval())
            .with_grace_period(config.heartbeat.grace_period());
        heartbeat.start().await?;
        Some(Arc::new(heartbeat))
    } else {
        tracing::info!("Heartbeat disabled, the gateway cannot shut this dashboard down");
        None
    };
    let kill_switch = heartbeat
        .as_ref()
        .map(|h| h.kill_switch())
        .unwrap_or_else(KillSwitch::new);

    let refresh_interval = config.dashboard.refresh_interval();
    let mut last_refresh: Option<Instant> = None;

    let exit = run_host(&kill_switch, config.host.poll_interval(), || {
        let due = last_refresh.map_or(true, |at| at.elapsed() >= refresh_interval);
        if due {
            last_refresh = Some(Instant::now());
            refresh_dashboard(client.clone(), heartbeat.clone());
        }
    })
    .await;

    if let Some(heartbeat) = &heartbeat {
        heartbeat.stop();
    }

    match exit {
        HostExit::Killed => println!("[HEARTBEAT] Dashboard shut down, disabled on gateway."),
        HostExit::Interrupted => println!("Dashboard stopped."),
    }
    std::process::exit(exit.code());
}
