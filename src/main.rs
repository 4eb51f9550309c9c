use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;
use hoptrace::export::{export_csv, export_json, format_hop, generate_report};
use hoptrace::{Config, TraceEvent, Tracer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = Config::from(&args);
    let tracer = Tracer::new(config);

    // Ctrl+C stops the trace at the next hop boundary
    let cancel_tracer = tracer.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_tracer.cancel();
    });

    if args.is_batch_mode() {
        run_batch_mode(&args, &tracer).await
    } else {
        run_streaming_mode(&tracer).await
    }
}

/// Run the trace to completion, then print it as JSON, CSV or a text report
async fn run_batch_mode(args: &Args, tracer: &Tracer) -> Result<()> {
    let result = tracer
        .trace()
        .await
        .with_context(|| format!("Failed to trace {}", args.target))?;

    if args.json {
        export_json(&result, std::io::stdout())?;
    } else if args.csv {
        export_csv(&result, std::io::stdout())?;
    } else {
        generate_report(&result, std::io::stdout())?;
    }
    Ok(())
}

/// Print hops from the live channel as they arrive
async fn run_streaming_mode(tracer: &Tracer) -> Result<()> {
    // Subscribe before spawning so no event is missed
    let mut events = tracer.subscribe();
    let handle = tracer.spawn();

    let config = tracer.config();
    println!(
        "traceroute to {}, {} hops max, port {}",
        config.target, config.max_ttl, config.port
    );

    loop {
        match events.recv().await {
            Ok(TraceEvent::Hop(hop)) => println!("{}", format_hop(&hop)),
            Ok(TraceEvent::Finished { termination }) => {
                println!("({})", termination);
                break;
            }
            Ok(TraceEvent::Aborted { .. }) => break,
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("Warning: {} hop(s) dropped from live output", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    handle
        .await
        .context("Trace task failed")?
        .with_context(|| format!("Failed to trace {}", config.target))?;
    Ok(())
}
