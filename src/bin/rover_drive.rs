use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use rover_link::drive;
use rover_link::link::open_serial_transport;
use rover_link::sim::EmulatedController;
use rover_link::transport::Transport;
use rover_link::{ActuatorLink, LinkConfig, LinkError, RangePolicy, TelemetryReply};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

type DynLink = ActuatorLink<Box<dyn Transport>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("rover-drive")
        .version("0.1.0")
        .about("Drive the rover's motor controller over its serial link")
        .arg(
            Arg::with_name("device")
                .short("d")
                .long("device")
                .value_name("PATH")
                .help("Serial device of the motor controller")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("baud")
                .short("b")
                .long("baud")
                .value_name("BAUD")
                .help("Baud rate")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u32>() {
                    Ok(b) if b > 0 => Ok(()),
                    _ => Err("Baud rate must be a positive integer".into()),
                }),
        )
        .arg(
            Arg::with_name("timeout-ms")
                .short("t")
                .long("timeout-ms")
                .value_name("MS")
                .help("Reply timeout in milliseconds")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(t) if t > 0 => Ok(()),
                    _ => Err("Timeout must be a positive number of milliseconds".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON link configuration; command line options override it")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("clamp")
                .long("clamp")
                .help("Clamp out-of-range commands instead of rejecting them")
                .global(true),
        )
        .arg(
            Arg::with_name("simulate")
                .long("simulate")
                .help("Talk to an emulated controller instead of a serial port")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log every wire line")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("send")
                .about("Send one command and print the controller's telemetry")
                .arg(
                    Arg::with_name("speed")
                        .help("Speed in percent, -100 to 100")
                        .required(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("steering")
                        .help("Steering angle in degrees, -15 to 15")
                        .required(true)
                        .allow_hyphen_values(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("drive")
                .about("Drive at a fixed speed while sweeping the steering until Ctrl+C")
                .arg(
                    Arg::with_name("speed")
                        .long("speed")
                        .value_name("SPEED")
                        .takes_value(true)
                        .default_value("15")
                        .allow_hyphen_values(true),
                )
                .arg(
                    Arg::with_name("period-ms")
                        .long("period-ms")
                        .value_name("MS")
                        .takes_value(true)
                        .default_value("200"),
                ),
        )
        .get_matches();

    init_tracing(matches.is_present("verbose"));

    let config = build_config(&matches)?;
    let link = Arc::new(open_link(&config, matches.is_present("simulate"))?);

    let result = match matches.subcommand() {
        ("send", Some(sub)) => handle_send(&link, sub),
        ("drive", Some(sub)) => handle_drive(Arc::clone(&link), sub).await,
        _ => {
            println!("{}", matches.usage());
            Ok(())
        }
    };

    link.close();
    result
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(matches: &ArgMatches) -> Result<LinkConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => LinkConfig::from_file(path)?,
        None => LinkConfig::default(),
    };

    if let Some(device) = matches.value_of("device") {
        config.device_path = device.to_string();
    }
    if let Some(baud) = matches.value_of("baud") {
        config.baud_rate = baud.parse()?;
    }
    if let Some(timeout) = matches.value_of("timeout-ms") {
        config = config.with_read_timeout(Duration::from_millis(timeout.parse()?));
    }
    if matches.is_present("clamp") {
        config.range_policy = RangePolicy::Clamp;
    }

    config.validate()?;
    Ok(config)
}

fn open_link(config: &LinkConfig, simulate: bool) -> Result<DynLink, LinkError> {
    let transport: Box<dyn Transport> = if simulate {
        Box::new(EmulatedController::echo())
    } else {
        Box::new(open_serial_transport(config)?)
    };
    ActuatorLink::with_transport(transport, config)
}

fn handle_send(link: &DynLink, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let speed: i32 = matches.value_of("speed").unwrap_or("0").parse()?;
    let steering: i32 = matches.value_of("steering").unwrap_or("0").parse()?;

    match link.send_command(speed, steering) {
        Ok(reply) => {
            print_telemetry(&reply);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e.to_string().red());
            Err(e.into())
        }
    }
}

async fn handle_drive(
    link: Arc<DynLink>,
    matches: &ArgMatches<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let speed: i32 = matches.value_of("speed").unwrap_or("15").parse()?;
    let period_ms: u64 = matches.value_of("period-ms").unwrap_or("200").parse()?;

    info!(speed, period_ms, "press Ctrl+C to stop");
    let stats = drive::drive(
        link,
        speed,
        Duration::from_millis(period_ms),
        tokio::signal::ctrl_c(),
        print_telemetry,
    )
    .await?;

    println!(
        "{} sent {} | replies {} | timeouts {} | bad replies {}",
        "■".cyan(),
        stats.commands_sent,
        stats.replies.to_string().green(),
        stats.timeouts.to_string().yellow(),
        stats.protocol_errors.to_string().red()
    );
    Ok(())
}

fn print_telemetry(reply: &TelemetryReply) {
    println!(
        "{} speed {:>4}  steering {:>3}",
        "✓".green().bold(),
        reply.speed.to_string().bold(),
        reply.steering
    );
}
