use clap::{App, Arg};
use huffapp::link::{Downlink, GroundReply, GroundRequest, TelemetryFrame};
use huffapp::scheduler::WakeupScheduler;
use huffapp::{
    AppConfig, Clock, HuffApp, LocalBus, RunStatus, SystemClock, TracingEventSink, XorshiftBench,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{error, info, warn};

const TICK_MS: u64 = 100;
const DOWNLINK_BROADCAST_BUFFER_SIZE: usize = 256;
const UPLINK_QUEUE_SIZE: usize = 32;

struct Uplink {
    request: GroundRequest,
    reply: oneshot::Sender<GroundReply>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("huff-app")
        .version(huffapp::app::APP_VERSION)
        .about("HUFF benchmark application host")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listen")
                .short("l")
                .long("listen")
                .value_name("ADDR")
                .help("Ground link listen address")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("work-period")
                .long("work-period")
                .value_name("MS")
                .help("Scheduled work period in milliseconds")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("hk-period")
                .long("hk-period")
                .value_name("MS")
                .help("Housekeeping request period in milliseconds")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("rounds")
                .long("rounds")
                .value_name("N")
                .help("Rounds per benchmark run")
                .takes_value(true)
                .default_value("1024"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(addr) = matches.value_of("listen") {
        config.listen_addr = addr.to_string();
    }
    if let Some(period) = matches.value_of("work-period") {
        config.work_period_ms = period.parse()?;
    }
    if let Some(period) = matches.value_of("hk-period") {
        config.hk_period_ms = period.parse()?;
    }
    let rounds: u32 = matches.value_of("rounds").unwrap_or("1024").parse()?;

    let clock = SystemClock::new();
    let mut bus = LocalBus::new();
    let mut events = TracingEventSink;
    let mut bench = XorshiftBench::new(rounds);

    let mut app = match HuffApp::init(&config, &mut bus, &clock, &mut events) {
        Ok(app) => app,
        Err(err) => {
            error!("HUFF App terminating: {}", err);
            std::process::exit(1);
        }
    };
    let mut scheduler = WakeupScheduler::from_config(&config, clock.now_ms())?;

    let (downlink_tx, _) = broadcast::channel::<String>(DOWNLINK_BROADCAST_BUFFER_SIZE);
    let (uplink_tx, mut uplink_rx) = mpsc::channel::<Uplink>(UPLINK_QUEUE_SIZE);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Ground link listening on {}", config.listen_addr);
    let server_downlink = downlink_tx.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = serve_ground_link(listener, uplink_tx, server_downlink).await {
            error!("Ground link error: {}", e);
        }
    });

    let mut ticker = time::interval(Duration::from_millis(TICK_MS));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    while app.is_running() {
        tokio::select! {
            _ = ticker.tick() => {
                for envelope in scheduler.ready_messages(clock.now_ms()) {
                    bus.publish(&envelope);
                }
            }
            Some(uplink) = uplink_rx.recv() => {
                let reply = match uplink.request.to_envelope() {
                    Ok(envelope) => {
                        let delivered = bus.publish(&envelope);
                        GroundReply::accepted(envelope.msg_id(), delivered)
                    }
                    Err(e) => GroundReply::rejected(e),
                };
                let _ = uplink.reply.send(reply);
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                app.stop();
            }
        }

        app.run_until_idle(&mut bus, &mut bench, &clock, &mut events);

        while let Some(packet) = bus.pop_telemetry() {
            let frame = Downlink::Telemetry(TelemetryFrame::from_packet(&packet));
            match serde_json::to_string(&frame) {
                // No subscribers is not an error.
                Ok(line) => {
                    let _ = downlink_tx.send(line);
                }
                Err(e) => warn!("Failed to encode telemetry: {}", e),
            }
        }
    }

    server.abort();
    let stats = bus.stats();
    info!(
        published = stats.published,
        transmitted = stats.transmitted,
        dropped = stats.dropped_pipe_full,
        "HUFF App stopped"
    );

    if app.run_status() == RunStatus::AppError {
        std::process::exit(1);
    }
    Ok(())
}

async fn serve_ground_link(
    listener: TcpListener,
    uplink_tx: mpsc::Sender<Uplink>,
    downlink_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Ground client connected: {}", addr);
                let client_uplink = uplink_tx.clone();
                let client_downlink = downlink_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_uplink, client_downlink).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("Ground client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    uplink_tx: mpsc::Sender<Uplink>,
    mut downlink_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let reply = match serde_json::from_str::<GroundRequest>(trimmed) {
                    Ok(request) => forward(&uplink_tx, request).await,
                    Err(e) => GroundReply::rejected(format!("Invalid request format: {e}")),
                };
                let reply_json = serde_json::to_string(&Downlink::Reply(reply))?;
                writer.write_all(reply_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            telemetry = downlink_rx.recv() => {
                match telemetry {
                    Ok(line) => {
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client lagging, {} telemetry frames skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

async fn forward(uplink_tx: &mpsc::Sender<Uplink>, request: GroundRequest) -> GroundReply {
    let (reply_tx, reply_rx) = oneshot::channel();
    let uplink = Uplink {
        request,
        reply: reply_tx,
    };
    if uplink_tx.send(uplink).await.is_err() {
        return GroundReply::rejected("application stopped");
    }
    reply_rx
        .await
        .unwrap_or_else(|_| GroundReply::rejected("application stopped"))
}
