//! REST API server for the operations dashboard.
//!
//! Usage:
//!   OPS_VIEWER_PASSWORD=... OPS_ADMIN_PASSWORD=... ./target/release/api_server [--port PORT]
//!
//! Every endpoint except the health check requires HTTP Basic credentials.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use logistics_ops::api::{create_router, AppState, DashboardService};
use logistics_ops::auth::Role;
use logistics_ops::config::{AuthSettings, SessionSettings, StoreSettings};
use logistics_ops::telemetry;

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the operations dashboard reports over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "OPS_PORT", default_value_t = 8080)]
    port: u16,

    #[command(flatten)]
    store: StoreSettings,

    #[command(flatten)]
    auth: AuthSettings,

    #[command(flatten)]
    sessions: SessionSettings,
}

fn print_banner(port: u16, admin_enabled: bool) {
    println!("============================================================");
    println!("         LOGISTICS OPERATIONS DASHBOARD API");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  REST:     http://localhost:{}/api/v1/", port);
    println!();
    println!("Endpoints:");
    println!("  GET  /api/v1/health                 Health check");
    println!("  GET  /api/v1/stats                  Headline counts");
    println!("  GET  /api/v1/reports/summary        Operations summary");
    println!("  GET  /api/v1/reports/capacity       Capacity per handler/type");
    println!("  GET  /api/v1/reports/workload       Workload balance");
    println!("  GET  /api/v1/reports/flow           Flow index");
    println!("  GET  /api/v1/reports/assignment     Assignment ranking");
    println!("  GET  /api/v1/reports/cycle-times    Cycle time analysis");
    println!("  GET  /api/v1/reports/bottlenecks    Bottlenecks");
    println!("  GET  /api/v1/reports/forecast       Volume forecast");
    println!("  GET  /api/v1/loads/latest           Latest load");
    println!("  POST /api/v1/logout                 Close usage session");
    if admin_enabled {
        println!("  POST /api/v1/uploads/analyze        Preview an upload (admin)");
        println!("  POST /api/v1/uploads                Load an upload (admin)");
        println!("  GET  /api/v1/admin/usage            Usage metrics (admin)");
        println!("  GET  /api/v1/admin/sessions         Recent sessions (admin)");
    } else {
        println!();
        println!("  Admin endpoints disabled: OPS_ADMIN_PASSWORD is not set");
    }
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let args = Args::parse();

    let credentials = args.auth.credentials()?;
    let admin_enabled = credentials.iter().any(|c| c.role == Role::Admin);

    print_banner(args.port, admin_enabled);

    tracing::info!("Connecting to SurrealDB at {}", args.store.db_path);
    let store = args.store.connect().await?;
    let service = DashboardService::new(Arc::new(store), args.sessions.session_log.clone());
    let app = create_router(AppState::new(service, credentials));

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
