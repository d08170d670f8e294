use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use decode_core::init_tracing;

use decode_cli::{run, DecodeRequest};

fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("sketch-decode")
        .version(decode_core::VERSION)
        .about("Decode a solver trace into a concrete Observer-pattern program")
        .arg(
            Arg::new("program")
                .long("program")
                .value_name("JSON")
                .help("Skeleton program (template and registries) as JSON")
                .required(true),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .value_name("FILE")
                .help("Solver output trace")
                .required(true),
        )
        .arg(
            Arg::new("events")
                .long("events")
                .value_name("JSON")
                .help("Per-event handle/attach/detach counts"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("JSON")
                .help("Decoder naming conventions"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("FILE")
                .help("Write the decoded program here instead of stdout"),
        )
        .arg(
            Arg::new("emit-source")
                .long("emit-source")
                .help("Emit rendered source instead of JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logging
    init_tracing(matches.get_flag("debug"));

    let request = request_from(&matches)?;
    let (report, rendered) = run(&request)?;

    if let Some(rendered) = rendered {
        println!("{rendered}");
    }
    eprintln!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn request_from(matches: &ArgMatches) -> Result<DecodeRequest> {
    let path = |name: &str| matches.get_one::<String>(name).map(PathBuf::from);
    Ok(DecodeRequest {
        program: path("program").context("--program is required")?,
        trace: path("trace").context("--trace is required")?,
        events: path("events"),
        config: path("config"),
        output: path("output"),
        emit_source: matches.get_flag("emit-source"),
    })
}
