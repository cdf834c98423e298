// src/main.rs
// Entry point for Promobot. Runs the controller against the simulated robot
// until Ctrl+C, with a visitor simulator feeding the face source.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use promobot::gateway::{BackgroundAnnouncer, LogSpeech};
use promobot::sim::spawn_visitor_simulator;
use promobot::{
    ChannelFaceSource, NavigationController, PatternKind, PromoterConfig, PromoterError, Result,
    SimulatedRobot, TurnDirection,
};

const DEFAULT_CONFIG: &str = "promobot.yaml";

/// Command line: `promobot [config.yaml] [--pattern square|circle] [--direction left|right]`
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    pattern: Option<PatternKind>,
    direction: Option<TurnDirection>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--pattern" => {
                args.pattern = Some(match iter.next().as_deref() {
                    Some("square") => PatternKind::Square,
                    Some("circle") => PatternKind::Circle,
                    other => {
                        return Err(PromoterError::Config(format!(
                            "--pattern expects square or circle, got {:?}",
                            other
                        )));
                    }
                })
            }
            "--direction" => {
                args.direction = Some(match iter.next().as_deref() {
                    Some("left") => TurnDirection::Left,
                    Some("right") => TurnDirection::Right,
                    other => {
                        return Err(PromoterError::Config(format!(
                            "--direction expects left or right, got {:?}",
                            other
                        )));
                    }
                })
            }
            path if args.config.is_none() && !path.starts_with("--") => {
                args.config = Some(PathBuf::from(path));
            }
            unknown => {
                return Err(PromoterError::Config(format!("unknown argument {}", unknown)));
            }
        }
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<PromoterConfig> {
    let mut config = match &args.config {
        Some(path) => PromoterConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => PromoterConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => {
            info!("No configuration file, using defaults");
            PromoterConfig::default()
        }
    };
    if let Some(pattern) = args.pattern {
        config.pattern = pattern;
    }
    if let Some(direction) = args.direction {
        config.direction = direction;
    }
    Ok(config)
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = load_config(&args)?;
    info!(
        "Promobot starting: pattern={:?} direction={:?} interrupts={:?}",
        config.pattern, config.direction, config.interrupts
    );

    let robot = Arc::new(SimulatedRobot::new(&config.simulation));
    let announcer = Arc::new(BackgroundAnnouncer::new(
        LogSpeech::default(),
        config.speech.max_in_flight,
    ));
    let (visitors, faces) = ChannelFaceSource::channel(16);
    let visitor_interval = Duration::from_millis(config.simulation.visitor_interval_ms);

    let mut controller = NavigationController::new(
        config,
        robot.clone(),
        robot.clone(),
        announcer,
        Box::new(faces),
    );

    let shutdown = controller.shutdown_handle();
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping");
        on_signal.trigger();
    })?;

    let simulator = spawn_visitor_simulator(visitors, visitor_interval, shutdown.clone())?;

    let summary = controller.run();
    shutdown.trigger();
    if let Some(simulator) = simulator {
        if simulator.join().is_err() {
            warn!("Visitor simulator panicked");
        }
    }

    let summary = summary?;
    info!(
        "Promobot stopped: {} steps, {} legs, {} bypasses, {} greetings",
        summary.walk.steps, summary.legs_completed, summary.walk.bypasses, summary.greetings
    );
    let position = robot.position();
    info!(
        "Final pose: ({:.0}, {:.0}) mm, heading {:.0}°",
        position.x,
        position.y,
        robot.heading().to_degrees()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
