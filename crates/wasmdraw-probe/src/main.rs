//! Headless wasm-draw client.
//!
//! Joins a room, sends the given lines (and optionally a clear) once the
//! connection is open, and prints whatever peers draw until the time is up.

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use wasmdraw_sync::{
    DrawCommand, DrawStack, Environment, ShapeKind, Surface, SyncConfig, SyncEvent, SyncSession,
};

/// How often the session is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long to wait for the relay to acknowledge our close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A command-line peer for a wasm-draw room.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Room code to join
    #[arg(long)]
    room: String,

    /// Environment whose endpoint is used (default: WASMDRAW_ENV, else local)
    #[arg(long, value_enum)]
    env: Option<EnvArg>,

    /// Relay base address, e.g. ws://localhost:8080
    #[arg(long)]
    endpoint: Option<String>,

    /// Line to draw once connected, as x1,y1,x2,y2 (repeatable)
    #[arg(long = "line", value_parser = parse_line)]
    lines: Vec<[f64; 4]>,

    /// Shape kind for the drawn lines
    #[arg(long, value_enum, default_value_t = ShapeArg::Line)]
    shape: ShapeArg,

    /// Clear every peer's canvas once connected
    #[arg(long)]
    clear: bool,

    /// How long to stay in the room
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Flush interval in milliseconds
    #[arg(long)]
    flush_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvArg {
    Local,
    Production,
}

impl From<EnvArg> for Environment {
    fn from(env: EnvArg) -> Self {
        match env {
            EnvArg::Local => Environment::LocalDevelopment,
            EnvArg::Production => Environment::Production,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShapeArg {
    Line,
    Circle,
    Square,
}

impl From<ShapeArg> for ShapeKind {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Line => ShapeKind::Line,
            ShapeArg::Circle => ShapeKind::Circle,
            ShapeArg::Square => ShapeKind::Square,
        }
    }
}

fn parse_line(s: &str) -> Result<[f64; 4], String> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("{:?}: {}", part, e)))
        .collect::<Result<Vec<_>, _>>()?;
    let coords: [f64; 4] = parts
        .try_into()
        .map_err(|_| format!("expected x1,y1,x2,y2, got {:?}", s))?;
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(format!("coordinates must be finite, got {:?}", s));
    }
    Ok(coords)
}

/// Prints what peers draw.
struct TerminalSurface;

impl Surface for TerminalSurface {
    fn render(&mut self, command: &DrawCommand) {
        println!(
            "draw {:?} ({}, {}) -> ({}, {})",
            command.kind, command.start_x, command.start_y, command.end_x, command.end_y
        );
    }

    fn clear(&mut self) {
        println!("clear");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = SyncConfig::detect();
    if let Some(env) = cli.env {
        config = config.with_environment(env.into());
    }
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(ms) = cli.flush_ms {
        if ms == 0 {
            return Err("--flush-ms must be positive".into());
        }
        config = config.with_flush_interval(Duration::from_millis(ms));
    }

    let kind = ShapeKind::from(cli.shape);
    let mut pending: Vec<DrawCommand> = cli
        .lines
        .iter()
        .map(|&[x1, y1, x2, y2]| DrawCommand::new(x1, y1, x2, y2, kind))
        .collect();
    let mut clear = cli.clear;

    let mut session = SyncSession::platform(config);
    let mut stack = DrawStack::new();
    let mut surface = TerminalSurface;

    session.open(&cli.room)?;

    let deadline = Instant::now() + Duration::from_secs(cli.duration_secs);
    while Instant::now() < deadline {
        for event in session.poll(Instant::now(), &mut stack, &mut surface) {
            report(&event);
            if let SyncEvent::Connected { .. } = event {
                // Scripted actions run on the first connection only.
                if clear {
                    session.send_clear()?;
                    clear = false;
                }
                for command in pending.drain(..) {
                    stack.push(command);
                }
            }
        }
        if !session.state().is_active() && !session.reconnect_pending() {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    session.close();
    let grace = Instant::now() + CLOSE_GRACE;
    while session.state().is_active() && Instant::now() < grace {
        for event in session.poll(Instant::now(), &mut stack, &mut surface) {
            report(&event);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    log::info!("Sent {} commands", stack.cursor());
    Ok(())
}

fn report(event: &SyncEvent) {
    match event {
        SyncEvent::Connected { room } => println!("joined room {}", room),
        SyncEvent::Disconnected { code, reason } => {
            println!("disconnected (code {:?}, reason {:?})", code, reason)
        }
        SyncEvent::Applied { rendered, skipped } if *skipped > 0 => {
            println!("applied {} commands, skipped {}", rendered, skipped)
        }
        SyncEvent::Applied { .. } | SyncEvent::Cleared => {}
        SyncEvent::Ignored { reason } => println!("ignored message: {}", reason),
        SyncEvent::ReconnectScheduled { attempt, delay } => {
            println!("reconnect attempt {} in {:?}", attempt, delay)
        }
        SyncEvent::Error { message } => eprintln!("error: {}", message),
    }
}
