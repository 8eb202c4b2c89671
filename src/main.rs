use std::process;

use cache_refresher::{
    config::{self, Command, ReplayArgs, RoutesArgs},
    error::AppError,
    infra::telemetry,
    refresher::{EXEMPT_SIGNATURES, HandlerRegistry, bindings},
    replay,
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    let command = cli_args.command.unwrap_or_default();

    telemetry::init(&settings.logging)?;

    match command {
        Command::Routes(args) => run_routes(args),
        Command::Replay(args) => run_replay(settings, args),
    }
}

#[derive(Serialize)]
struct RoutesDocument {
    routes: Vec<RouteRow>,
    exempt: Vec<String>,
}

#[derive(Serialize)]
struct RouteRow {
    signature: String,
    route: &'static str,
}

fn run_routes(args: RoutesArgs) -> Result<(), AppError> {
    let table = HandlerRegistry::global().table();
    let bound = bindings().count();
    if table.len() != bound {
        return Err(AppError::unexpected(format!(
            "routing table covers {} signatures but {bound} are bound",
            table.len()
        )));
    }

    let document = RoutesDocument {
        routes: table
            .into_iter()
            .map(|(signature, route)| RouteRow {
                signature: signature.to_string(),
                route: route.name(),
            })
            .collect(),
        exempt: EXEMPT_SIGNATURES.iter().map(ToString::to_string).collect(),
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&document)
            .map_err(|err| AppError::unexpected(err.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    let width = document
        .routes
        .iter()
        .map(|row| row.signature.len())
        .max()
        .unwrap_or(0);
    for row in &document.routes {
        println!("{:<width$}  {}", row.signature, row.route);
    }
    println!();
    for signature in &document.exempt {
        println!("{signature:<width$}  (exempt)");
    }
    Ok(())
}

fn run_replay(settings: config::Settings, args: ReplayArgs) -> Result<(), AppError> {
    let events = replay::load_events(&args.file)?;
    info!(file = %args.file.display(), events = events.len(), "Replaying events");

    let report = replay::replay(&settings.refresher, events)?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}
