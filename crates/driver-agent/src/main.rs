//! Remote automation driver: entry point.
//!
//! Runs next to a device under test and exposes it to one remote client at a
//! time: text commands over HTTP (one `POST /<route>` endpoint per route) and
//! live screen frames over UDP.
//!
//! # Usage
//!
//! ```text
//! driver-agent [OPTIONS]
//!
//! Options:
//!   --config       <PATH>  Config file [default: platform config dir]
//!   --bind         <IP>    Address both servers bind to
//!   --command-port <PORT>  Fixed HTTP command port
//!   --stream-port  <PORT>  Fixed UDP stream port
//!   --log-level    <LEVEL> Log filter used when RUST_LOG is unset
//! ```
//!
//! Without a fixed port the first free port of the configured range is used.
//! The chosen ports are logged at startup; the stream port is also announced
//! to the client in the `driver start` response.
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag             |
//! |-----------------------|------------------|
//! | `DRIVER_CONFIG`       | `--config`       |
//! | `DRIVER_BIND`         | `--bind`         |
//! | `DRIVER_COMMAND_PORT` | `--command-port` |
//! | `DRIVER_STREAM_PORT`  | `--stream-port`  |
//! | `DRIVER_LOG_LEVEL`    | `--log-level`    |
//!
//! Flags win over the config file.  `RUST_LOG` wins over both for logging.
//!
//! # Architecture overview
//!
//! ```text
//! Remote client
//!   │ HTTP text commands            ▲ UDP frames (pull)
//!   ▼                               │
//! command_server ──▶ executor ──▶ "automation" thread
//!                                   CommandRouter
//!                                     SessionManager
//!                                     AutomationTarget
//! stream_server ◀── StreamControl (reset on driver stop)
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use driver_core::DeviceCapabilities;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use driver_agent::application::command_router::CommandRouter;
use driver_agent::application::executor::AutomationExecutor;
use driver_agent::infrastructure::automation::simulated::SimulatedDevice;
use driver_agent::infrastructure::automation::AutomationTarget;
use driver_agent::infrastructure::network::command_server;
use driver_agent::infrastructure::network::port_allocator::{PortAllocator, Protocol};
use driver_agent::infrastructure::network::stream_server::{
    bind_stream_socket, StreamControl, StreamServer,
};
use driver_agent::infrastructure::screen_capture::simulated::SimulatedScreen;
use driver_agent::infrastructure::screen_capture::FrameEncoder;
use driver_agent::infrastructure::storage::config::{load_config, AgentConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote automation driver.
///
/// Serves text commands over HTTP and pull-based screen frames over UDP.
#[derive(Debug, Parser)]
#[command(
    name = "driver-agent",
    about = "Remote automation driver: HTTP commands and UDP screen stream",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// When omitted the platform config directory is used; a missing file
    /// means built-in defaults.
    #[arg(long, env = "DRIVER_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind both servers to.
    #[arg(long, env = "DRIVER_BIND")]
    bind: Option<String>,

    /// Fixed TCP port for the HTTP command server.
    #[arg(long, env = "DRIVER_COMMAND_PORT")]
    command_port: Option<u16>,

    /// Fixed UDP port for the screen stream.
    #[arg(long, env = "DRIVER_STREAM_PORT")]
    stream_port: Option<u16>,

    /// Log filter (e.g. `info`, `driver_agent=debug`) used when `RUST_LOG`
    /// is not set.
    #[arg(long, env = "DRIVER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Overlays the flags that were given onto `config`.
    fn apply_to(&self, config: &mut AgentConfig) {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if self.command_port.is_some() {
            config.network.command_port = self.command_port;
        }
        if self.stream_port.is_some() {
            config.network.stream_port = self.stream_port;
        }
        if let Some(level) = &self.log_level {
            config.agent.log_level = level.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and the config file is loaded and overlaid.
/// 2. Logging is initialised (`RUST_LOG`, else the configured level).
/// 3. The command port is allocated and bound, then the stream port.
/// 4. Device capabilities are computed once from the automation target.
/// 5. The command router is moved onto the automation thread.
/// 6. The stream server is spawned and the HTTP server runs until Ctrl+C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_to(&mut config);

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.agent.log_level)),
        )
        .init();

    info!("remote driver {} starting", env!("CARGO_PKG_VERSION"));

    // ── Collaborators ─────────────────────────────────────────────────────────
    let device = SimulatedDevice::new(
        SimulatedDevice::default_info(),
        config.automation.applications.as_slice(),
    );
    let info = device
        .device_info()
        .context("failed to read device information")?;
    let screen = Arc::new(SimulatedScreen::new(info.native_width, info.native_height));

    // ── Ports ─────────────────────────────────────────────────────────────────
    let ip = config.network.bind_ip().context("invalid bind address")?;
    let allocator = PortAllocator::with_range(ip, config.network.port_range()?);

    let command_port = allocator
        .allocate(config.network.command_port)
        .context("failed to allocate command port")?;
    let listener = command_server::bind_command_listener(ip, command_port)
        .await
        .context("failed to start command server")?;

    let stream_port = allocator
        .with_protocol(Protocol::Udp)
        .allocate(config.network.stream_port)
        .context("failed to allocate stream port")?;
    let socket = bind_stream_socket(ip, stream_port)
        .await
        .context("failed to start stream server")?;

    info!("command port {command_port}, stream port {stream_port}");

    // ── Capabilities and router ───────────────────────────────────────────────
    let capabilities = Arc::new(
        DeviceCapabilities::compute(&info, stream_port)
            .context("failed to compute device capabilities")?,
    );
    info!(
        "device {} ({}x{} px, scale {}), stream channel {}x{}",
        capabilities.device_name,
        capabilities.device_width,
        capabilities.device_height,
        capabilities.screen_scale,
        capabilities.channel_width,
        capabilities.channel_height
    );

    let encoder = FrameEncoder::new(
        config.stream.jpeg_quality,
        capabilities.channel_width,
        capabilities.channel_height,
    );
    let stream_control = StreamControl::new();
    let router = CommandRouter::new(
        Arc::clone(&capabilities),
        Box::new(device),
        screen.clone(),
        encoder,
        config.automation.applications.clone(),
        stream_control.clone(),
    );
    let (executor, handle) = AutomationExecutor::spawn(router, config.automation.command_timeout())
        .context("failed to start automation executor")?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let shutdown = {
        let running = Arc::clone(&running);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl+C signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("received Ctrl+C, initiating graceful shutdown");
            running.store(false, Ordering::Relaxed);
        }
    };

    // ── Servers ───────────────────────────────────────────────────────────────
    let stream = StreamServer::new(socket, screen, encoder, &stream_control, Arc::clone(&running));
    let stream_task = tokio::spawn(stream.run());

    command_server::serve(listener, handle, shutdown).await?;

    running.store(false, Ordering::Relaxed);
    if let Err(e) = stream_task.await {
        error!("stream server task failed: {e}");
    }
    tokio::task::spawn_blocking(move || executor.join())
        .await
        .context("automation executor did not shut down")?;

    info!("remote driver stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
