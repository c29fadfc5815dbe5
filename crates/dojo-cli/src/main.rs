//! `dojo-attendance` command line: simulator, demo and config inspection

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dojo_attendance::{
    AccessMode, AttendanceConfig, AttendanceStatus, AttendanceView, Collaborators, EnrollmentId,
    InMemoryBackend, RosterSnapshot, SessionRef,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod simulator;

use simulator::{run_simulator, SimulatorConfig};

fn cli() -> Command {
    Command::new("dojo-attendance")
        .version(dojo_attendance::VERSION)
        .about("Attendance reconciliation simulator and demo runner")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to an attendance TOML config"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the randomized attendance simulator")
                .arg(
                    Arg::new("operations")
                        .long("ops")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("students")
                        .long("students")
                        .default_value("12")
                        .value_parser(value_parser!(usize))
                        .help("Students enrolled at start"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.15")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a commit or reload fails"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Walk through a small roster: toggle, bulk, commit, justify"),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<AttendanceConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => AttendanceConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(AttendanceConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let sim = SimulatorConfig {
                seed: *args.get_one::<u64>("seed").context("missing seed")?,
                total_operations: *args.get_one::<u64>("operations").context("missing ops")?,
                students: *args.get_one::<usize>("students").context("missing students")?,
                failure_rate: args
                    .get_one::<f64>("failure-rate")
                    .copied()
                    .context("missing failure rate")?
                    .clamp(0.0, 1.0),
                stop_on_first_violation: args.get_flag("stop-on-violation"),
                attendance: config,
            };

            let report = run_simulator(sim).await;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("demo", _)) => demo(config).await,
        Some(("show-config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn print_snapshot(snapshot: &RosterSnapshot) {
    for row in &snapshot.records {
        println!(
            "  {:<14} {:<8}{}",
            row.record.student_name,
            row.effective_status,
            if row.has_pending_change { " *" } else { "" }
        );
    }
    println!(
        "  present {}/{} ({}), pending {}",
        snapshot.stats.present,
        snapshot.stats.total,
        snapshot.stats.rounded_percentage(),
        snapshot.pending
    );
}

async fn demo(config: AttendanceConfig) -> Result<()> {
    let session = SessionRef::new(
        "adult-judo-0314",
        chrono::NaiveDate::from_ymd_opt(2026, 3, 14).context("invalid session date")?,
    );
    let backend = Arc::new(InMemoryBackend::new());
    backend.schedule(&session);
    for (id, name, status) in [
        ("enr-1", "Ana Lima", AttendanceStatus::Absent),
        ("enr-2", "Bruno Costa", AttendanceStatus::Present),
        ("enr-3", "Carla Dias", AttendanceStatus::Absent),
    ] {
        backend.enroll(&session.id, id, name, status);
    }

    let view = AttendanceView::new(
        session,
        AccessMode::Manage,
        config,
        Collaborators::from_backend(backend.clone()),
    );
    view.load(view.default_query()).await?;
    println!("Loaded roster:");
    print_snapshot(&view.snapshot());

    view.toggle(&EnrollmentId::new("enr-1"))?;
    println!("\nAfter toggling Ana Lima:");
    print_snapshot(&view.snapshot());

    let bulk = view.apply_bulk(AttendanceStatus::Present)?;
    println!("\n{}", bulk.notice());
    print_snapshot(&view.snapshot());

    view.stage(&EnrollmentId::new("enr-3"), false)?;
    let outcome = view.commit().await?;
    println!("\n{}", outcome.notice());

    view.refresh().await?;
    println!("Reloaded roster:");
    print_snapshot(&view.snapshot());

    let form = view.open_justification(&EnrollmentId::new("enr-3"))?;
    let record = view
        .submit_justification(&form, "family", "family emergency at home")
        .await?;
    println!("\nJustified {}: {}", form.student_name, record.summary());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_defaults() {
        let matches = cli().get_matches_from(["dojo-attendance", "simulate", "--seed", "9"]);
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "simulate");
        assert_eq!(*args.get_one::<u64>("seed").unwrap(), 9);
        assert_eq!(*args.get_one::<u64>("operations").unwrap(), 1000);
        assert!(!args.get_flag("json"));
    }

    #[test]
    fn missing_config_defaults() {
        let matches = cli().get_matches_from(["dojo-attendance", "show-config"]);
        assert_eq!(load_config(&matches).unwrap(), AttendanceConfig::default());
    }

    #[tokio::test]
    async fn demo_runs() {
        demo(AttendanceConfig::default()).await.unwrap();
    }
}
