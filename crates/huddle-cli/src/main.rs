//! `huddle` command-line tool
//!
//! - `simulate`: sign a user in against an in-memory store and drive edits
//! - `migrate`: upgrade a persisted slice value to its current shape
//! - `resolve`: effective permissions for a set of roles
//! - `slots`: list wristband slot conflicts in a layout

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use huddle_access::{default_role_matrices, normalize_role_matrices, resolve};
use huddle_core::{keys, HuddleConfig, SliceCatalog, SyncEngine};
use huddle_scope::{find_conflicts, WristbandSettings};
use huddle_store::{InMemoryRemote, MemoryCache, SliceKey, UserId};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("huddle")
        .version(huddle_core::VERSION)
        .about("Team dashboard slice sync tools")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run one in-memory session and report what reached the remote store")
                .arg(
                    Arg::new("user")
                        .long("user")
                        .default_value("coach-1")
                        .help("User to sign in"),
                )
                .arg(
                    Arg::new("mutations")
                        .long("mutations")
                        .default_value("20")
                        .value_parser(value_parser!(u64))
                        .help("Roster edits to make after sign-in"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .default_value("100")
                        .value_parser(value_parser!(u64))
                        .help("Delay between edits"),
                )
                .arg(
                    Arg::new("latency-ms")
                        .long("latency-ms")
                        .default_value("50")
                        .value_parser(value_parser!(u64))
                        .help("Simulated remote latency"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Upgrade a persisted slice value and fill defaults")
                .arg(Arg::new("slice").required(true).help("Slice key, e.g. staff"))
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file; stdin when absent"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the effective permission matrix for a set of roles")
                .arg(
                    Arg::new("role")
                        .long("role")
                        .action(ArgAction::Append)
                        .help("Role held; repeatable"),
                )
                .arg(
                    Arg::new("super-admin")
                        .long("super-admin")
                        .action(ArgAction::SetTrue)
                        .help("Resolve as a super administrator"),
                )
                .arg(
                    Arg::new("matrices")
                        .long("matrices")
                        .value_parser(value_parser!(PathBuf))
                        .help("rolePermissions JSON; compiled defaults when absent"),
                ),
        )
        .subcommand(
            Command::new("slots")
                .about("List wristband slots held by more than one play")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .value_parser(value_parser!(PathBuf))
                        .help("wristbandSettings JSON; stdin when absent"),
                ),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<HuddleConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => HuddleConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let mut config = HuddleConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn read_json_input(path: Option<&PathBuf>) -> Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

fn arg_u64(args: &ArgMatches, name: &str) -> u64 {
    args.get_one::<u64>(name).copied().unwrap_or_default()
}

async fn simulate(config: HuddleConfig, args: &ArgMatches) -> Result<()> {
    let user = UserId::new(args.get_one::<String>("user").map_or("coach-1", String::as_str));
    let mutations = arg_u64(args, "mutations");
    let interval = Duration::from_millis(arg_u64(args, "interval-ms"));
    let latency = Duration::from_millis(arg_u64(args, "latency-ms"));

    let remote = InMemoryRemote::new();
    remote.set_latency(Some(latency));
    remote.seed(&user, &SliceKey::new(keys::ROSTER), json!([]));

    let catalog = SliceCatalog::builtin();
    let settle = catalog
        .iter()
        .map(|spec| config.debounce_for(&spec.key, spec.debounce))
        .max()
        .unwrap_or_default()
        + latency * 2;

    let engine = SyncEngine::builder(Arc::new(MemoryCache::new()), Arc::new(remote.clone()))
        .with_config(config)
        .with_catalog(catalog)
        .build();

    let report = engine
        .set_user(Some(user.clone()))
        .await?
        .ok_or_else(|| anyhow!("bootstrap did not run"))?;
    tracing::info!(%user, loaded = report.loaded.len(), "signed in");

    for i in 1..=mutations {
        engine.set(keys::ROSTER, json!([{"name": format!("Player {i}"), "number": i}]))?;
        tokio::time::sleep(interval).await;
    }
    tokio::time::sleep(settle).await;
    engine.set_user(None).await?;

    let stats = engine.stats();
    let writes = remote.writes_for(&SliceKey::new(keys::ROSTER)).len();
    if args.get_flag("json") {
        let out = json!({
            "user": user.as_str(),
            "wiped": report.wiped,
            "loaded": report.loaded.len(),
            "missing": report.missing.len(),
            "mutations": mutations,
            "roster_writes": writes,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Session for {user}");
        println!("  Loaded: {}", report.loaded.len());
        println!("  Missing: {}", report.missing.len());
        println!("  Wiped: {}", report.wiped);
        println!("  Mutations: {mutations}");
        println!("  Roster writes: {writes}");
        println!("  Scheduled: {}", stats.scheduled);
        println!("  Superseded: {}", stats.superseded);
        println!("  Written: {}", stats.written);
        println!("  Failed: {}", stats.failed);
    }
    Ok(())
}

fn migrate(args: &ArgMatches) -> Result<()> {
    let slice = args
        .get_one::<String>("slice")
        .ok_or_else(|| anyhow!("slice key required"))?;
    let catalog = SliceCatalog::builtin();
    let spec = catalog
        .get(&SliceKey::new(slice.as_str()))
        .ok_or_else(|| anyhow!("unknown slice '{slice}'"))?;
    let persisted = read_json_input(args.get_one::<PathBuf>("input"))?;
    let value = spec.normalize(Some(persisted), &[]);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn resolve_roles(args: &ArgMatches) -> Result<()> {
    let roles: Vec<String> = args
        .get_many::<String>("role")
        .map(|r| r.cloned().collect())
        .unwrap_or_default();
    let matrices = match args.get_one::<PathBuf>("matrices") {
        Some(path) => normalize_role_matrices(Some(&read_json_input(Some(path))?)),
        None => default_role_matrices(),
    };
    let matrix = resolve(&roles, &matrices, args.get_flag("super-admin"));
    println!("{}", serde_json::to_string_pretty(&matrix)?);
    Ok(())
}

fn slots(args: &ArgMatches) -> Result<bool> {
    let value = read_json_input(args.get_one::<PathBuf>("input"))?;
    let settings = WristbandSettings::from_value(&value).context("not a wristband layout")?;
    let conflicts = find_conflicts(&settings);
    for conflict in &conflicts {
        println!("{conflict}");
    }
    println!("{} conflict(s)", conflicts.len());
    Ok(conflicts.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(config, args).await?,
        Some(("migrate", args)) => migrate(args)?,
        Some(("resolve", args)) => resolve_roles(args)?,
        Some(("slots", args)) => {
            if !slots(args)? {
                std::process::exit(1);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn roles_are_repeatable() {
        let matches = cli()
            .try_get_matches_from(["huddle", "resolve", "--role", "Coordinator", "--role", "Assistant"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let roles: Vec<&String> = args.get_many::<String>("role").unwrap().collect();
        assert_eq!(roles, ["Coordinator", "Assistant"]);
    }
}
