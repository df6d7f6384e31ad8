use anyhow::Context;
use clap::Parser;
use sensorcap::capture::PnetEngine;
use sensorcap::config::Settings;
use sensorcap::naming::DEFAULT_DEVICE_TYPE;
use sensorcap::naming::DEFAULT_NAME;
use sensorcap::platform::SystemPlatform;
use sensorcap::report::ConsoleReporter;
use sensorcap::report::Reporter;
use sensorcap::session::Recorder;
use sensorcap::session::Session;
use sensorcap::session::record;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// Record sensor traffic from a live interface into timestamped pcap files.
///
/// Interface, directory, filter and rotation come from SENSORCAP_* environment
/// variables.
#[derive(Parser)]
#[command(name = "sensorcap", version)]
struct Cli {
    /// Sensor model tag embedded in the file name, `find_ip` records
    /// everything into a fixed discovery file
    #[arg(default_value = DEFAULT_DEVICE_TYPE)]
    device_type: String,
    /// Site tag the file name starts with
    #[arg(default_value = DEFAULT_NAME)]
    name: String,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.device_type, &cli.name).context("invalid configuration")?;
    tracing::debug!(?settings, "settings resolved");

    let engine = PnetEngine::open(&settings.iface, settings.promiscuous, settings.timeout_ms)
        .with_context(|| format!("unable to open the device {}", settings.iface))?;
    let mut session = Session::open(engine, &settings.session_config())?;

    let mut recorder = Recorder::create(
        settings.record_options(),
        settings.naming_policy(),
        SystemPlatform,
        ConsoleReporter::new(),
    )
    .context("fail to create pcap file")?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .context("unable to install the Ctrl+C handler")?;

    recorder.reporter_mut().on_listening(session.interface_name());
    let ret = record(&mut session, &mut recorder, &stop);

    recorder.reporter_mut().on_stop(&session.stats());
    // the file is closed on every path out of the loop
    let closed = recorder.finish();
    session.close()?;

    ret.context("capture stopped")?;
    closed.context("unable to close the pcap file")?;
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sensorcap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
