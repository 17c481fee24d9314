use std::net::{Ipv4Addr, UdpSocket};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::builder::BoolishValueParser;
use onvif_bridge::{Bridge, BridgeConfig, RelayConfig};
use rand::RngExt;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "onvif-bridge",
    version,
    about = "Expose an RTSP camera as an ONVIF Profile S device"
)]
struct Args {
    /// Upstream camera URL, credentials included
    #[arg(long, env = "RTSP_URL")]
    rtsp_url: String,

    /// Name advertised over ONVIF and WS-Discovery
    #[arg(long, env = "CAMERA_NAME", default_value = "ONVIF Camera")]
    camera_name: String,

    #[arg(long, env = "CAMERA_MANUFACTURER", default_value = "Generic")]
    camera_manufacturer: String,

    #[arg(long, env = "CAMERA_MODEL", default_value = "RTSP-Bridge")]
    camera_model: String,

    /// Serial number [default: random]
    #[arg(long, env = "CAMERA_SERIAL")]
    camera_serial: Option<String>,

    #[arg(long, env = "CAMERA_FIRMWARE", default_value = "1.0.0")]
    camera_firmware: String,

    /// Device UUID, also the WS-Discovery endpoint id [default: random]
    #[arg(long, env = "HARDWARE_ID")]
    hardware_id: Option<String>,

    #[arg(long, env = "ONVIF_PORT", default_value_t = 8080)]
    onvif_port: u16,

    #[arg(long, env = "ONVIF_USERNAME", default_value = "admin")]
    onvif_username: String,

    #[arg(long, env = "ONVIF_PASSWORD", default_value = "admin123", hide_env_values = true)]
    onvif_password: String,

    /// Address advertised to clients [default: outbound interface address]
    #[arg(long, env = "SERVER_IP")]
    server_ip: Option<String>,

    /// Port the local relay-server listens on
    #[arg(long, env = "RTSP_PROXY_PORT", default_value_t = 8554)]
    rtsp_proxy_port: u16,

    #[arg(long, env = "STREAM_WIDTH", default_value_t = 1280)]
    stream_width: u32,

    #[arg(long, env = "STREAM_HEIGHT", default_value_t = 720)]
    stream_height: u32,

    #[arg(long, env = "STREAM_FPS", default_value_t = 15)]
    stream_fps: u32,

    /// Advertised bitrate in kbit/s
    #[arg(long, env = "STREAM_BITRATE", default_value_t = 2048)]
    stream_bitrate: u32,

    /// Answer WS-Discovery probes
    #[arg(
        long,
        env = "ENABLE_DISCOVERY",
        default_value_t = true,
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    enable_discovery: bool,

    /// relay-server executable
    #[arg(long, env = "MEDIAMTX_PATH", default_value = "mediamtx")]
    mediamtx: String,

    /// stream-forwarder executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: String,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> BridgeConfig {
        let server_ip = self
            .server_ip
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or_else(|| local_ip().to_string());

        BridgeConfig {
            camera_name: self.camera_name,
            camera_manufacturer: self.camera_manufacturer,
            camera_model: self.camera_model,
            camera_serial: self
                .camera_serial
                .unwrap_or_else(|| format!("{:08X}", rand::rng().random::<u32>())),
            camera_firmware: self.camera_firmware,
            hardware_id: self
                .hardware_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            rtsp_url: self.rtsp_url,
            onvif_port: self.onvif_port,
            onvif_username: self.onvif_username,
            onvif_password: self.onvif_password,
            server_ip,
            rtsp_proxy_port: self.rtsp_proxy_port,
            stream_width: self.stream_width,
            stream_height: self.stream_height,
            stream_fps: self.stream_fps,
            stream_bitrate: self.stream_bitrate,
            enable_discovery: self.enable_discovery,
            relay: RelayConfig {
                server_program: self.mediamtx,
                forwarder_program: self.ffmpeg,
                ..RelayConfig::default()
            },
            ..BridgeConfig::default()
        }
    }
}

/// Address of the interface that routes to the internet.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn local_ip() -> Ipv4Addr {
    let probe = || -> std::io::Result<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        match socket.local_addr()?.ip() {
            std::net::IpAddr::V4(ip) => Ok(ip),
            std::net::IpAddr::V6(_) => Ok(Ipv4Addr::LOCALHOST),
        }
    };
    probe().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not determine local IP, using 127.0.0.1");
        Ipv4Addr::LOCALHOST
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Registered before any relay process exists.
    let mut signals = match Signals::new([SIGTERM, SIGINT, SIGQUIT]) {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let config = Arc::new(args.into_config());
    let mut bridge = match Bridge::new(config) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = bridge.start() {
        tracing::error!(error = %e, "failed to start bridge");
        return ExitCode::FAILURE;
    }

    if let Some(signal) = signals.forever().next() {
        tracing::info!(signal, "shutdown signal received");
    }

    bridge.stop();
    ExitCode::SUCCESS
}
