//! har-recorder CLI

use std::path::{Path, PathBuf};
use std::process;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use har_recorder::capture::parse_capture_log;
use har_recorder::{CaptureEvent, Config, Har, HarError, HarRecorder, RecorderService, Result};

struct Options {
    config: Option<PathBuf>,
    recorded: bool,
    compact: bool,
    input: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!("har-recorder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: har-recorder <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  replay <capture.jsonl>   Replay a capture log and print the HAR");
    eprintln!("  record                   Read capture events from stdin until EOF or Ctrl-C");
    eprintln!("  check-config <file>      Validate a configuration file");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>          TOML configuration");
    eprintln!("  --recorded               Export the recorded buffer instead of the live window");
    eprintln!("  --compact                Single-line JSON output");
    eprintln!();
    eprintln!("Logging goes to stderr; set RUST_LOG to adjust (default: info).");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
    }

    let command = args[1].as_str();
    let options = parse_options(&args[2..]);

    let result = match command {
        "replay" => match options.input.as_deref() {
            Some(input) => run_replay(input, &options),
            None => {
                eprintln!("Usage: har-recorder replay <capture.jsonl> [options]");
                process::exit(1);
            }
        },
        "record" => run_record(&options),
        "check-config" => match options.input.as_deref() {
            Some(path) => check_config(path),
            None => {
                eprintln!("Usage: har-recorder check-config <file>");
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'har-recorder' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options {
        config: None,
        recorded: false,
        compact: false,
        input: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => options.config = Some(PathBuf::from(path)),
                None => {
                    eprintln!("--config requires a file");
                    process::exit(1);
                }
            },
            "--recorded" => options.recorded = true,
            "--compact" => options.compact = true,
            other if other.starts_with("--") => {
                eprintln!("Unknown option: {other}");
                process::exit(1);
            }
            other => options.input = Some(PathBuf::from(other)),
        }
    }

    options
}

fn load_config(options: &Options) -> Result<Config> {
    match options.config.as_deref() {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn print_har(har: &Har, options: &Options) -> Result<()> {
    let json = if options.compact {
        har.to_json()?
    } else {
        har.to_json_pretty()?
    };
    println!("{json}");
    Ok(())
}

fn run_replay(input: &Path, options: &Options) -> Result<()> {
    let config = load_config(options)?;
    let text = std::fs::read_to_string(input)?;
    let events = parse_capture_log(&text)?;

    info!("Replaying {} events from {}", events.len(), input.display());

    let mut recorder = HarRecorder::new(&config);
    for event in events {
        recorder.apply(event);
    }

    let stats = recorder.stats();
    info!(
        "Live: {} resources / {} pages, recorded: {} resources / {} pages, pending: {}",
        stats.live_resources,
        stats.live_pages,
        stats.recorded_resources,
        stats.recorded_pages,
        stats.pending_halves
    );

    let har = if options.recorded {
        recorder.export_recorded()
    } else {
        recorder.export_live()
    };
    print_har(&har, options)
}

fn run_record(options: &Options) -> Result<()> {
    let config = load_config(options)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (service, handle) = RecorderService::from_config(&config);
        let task = tokio::spawn(service.run());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_number = 0;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("End of input");
                        break;
                    };
                    line_number += 1;
                    match CaptureEvent::from_line(&line, line_number) {
                        Ok(Some(event)) => handle.send(event).await?,
                        Ok(None) => {}
                        Err(e) => warn!("Skipping: {}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, exporting");
                    break;
                }
            }
        }

        let har = if options.recorded {
            handle.export_recorded().await?
        } else {
            handle.export_live().await?
        };

        handle.shutdown();
        task.await
            .map_err(|e| HarError::Io(std::io::Error::other(e.to_string())))?;

        print_har(&har, options)
    })
}

fn check_config(path: &Path) -> Result<()> {
    let config = Config::from_file(path)?;
    println!("Configuration OK: {}", path.display());
    println!("  resource_life_limit_ms: {}", config.resource_life_limit_ms);
    println!("  max_resource_count:     {}", config.max_resource_count);
    match config.pending_ttl_ms {
        Some(ttl) => println!("  pending_ttl_ms:         {ttl}"),
        None => println!("  pending_ttl_ms:         never"),
    }
    println!("  observers:              {:?}", config.observers);
    println!(
        "  creator:                {} {}",
        config.creator.name, config.creator.version
    );
    Ok(())
}
