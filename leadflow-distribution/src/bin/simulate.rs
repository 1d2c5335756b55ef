/// Distribution simulator - runs a TOML scenario and prints the resulting
/// per-source and per-operator statistics as JSON.
///
/// Usage: leadflow-simulate <scenario.toml> [--contacts N]
use leadflow_distribution::{init_tracing, Scenario, TelemetryConfig};
use std::path::PathBuf;

fn usage() -> ! {
    eprintln!("Usage: leadflow-simulate <scenario.toml> [--contacts N]");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  leadflow-simulate leadflow-distribution/scenarios/basic.toml --contacts 1000");
    std::process::exit(2);
}

fn parse_args(args: &[String]) -> Option<(PathBuf, Option<usize>)> {
    let mut path = None;
    let mut contacts = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--contacts" | "-n" => contacts = Some(iter.next()?.parse().ok()?),
            "--help" | "-h" => return None,
            other if path.is_none() => path = Some(PathBuf::from(other)),
            _ => return None,
        }
    }
    path.map(|p| (p, contacts))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((path, contacts)) = parse_args(&args) else {
        usage();
    };

    if let Err(e) = init_tracing(&TelemetryConfig::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let scenario = match Scenario::load(&path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    let report = match scenario.run(contacts).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Simulation failed");
            eprintln!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize report: {}", e);
            std::process::exit(1);
        }
    }
}
