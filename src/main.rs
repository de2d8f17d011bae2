//! OctoRAG CLI binary entry point.

use std::io::Write;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use octorag::cli::{is_quit, Cli, Commands, QueryArgs, SessionArgs};
use octorag::config::OctoragConfig;
use octorag::error::OctoragError;
use octorag::runner::Orchestrator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("octorag=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query(args) => handle_query(args).await,
        Commands::Repl(args) => handle_repl(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        eprintln!("Hint: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

async fn build_orchestrator(session: &SessionArgs) -> Result<Orchestrator, OctoragError> {
    let mut config = OctoragConfig::load()?;
    session.apply(&mut config);
    Orchestrator::connect(config).await
}

async fn handle_query(args: QueryArgs) -> Result<(), OctoragError> {
    let orchestrator = build_orchestrator(&args.session).await?;

    if args.stream {
        let mut stream = orchestrator.query_stream(args.text);
        while let Some(item) = stream.next().await {
            println!("{}", item?);
            println!();
        }
    } else {
        println!("{}", orchestrator.query(args.text).await?);
    }
    Ok(())
}

async fn handle_repl(args: SessionArgs) -> Result<(), OctoragError> {
    let orchestrator = build_orchestrator(&args).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("Enter query. Enter \"quit\" to quit.");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_quit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        // A failed query is reported but does not end the session.
        match orchestrator.query(line).await {
            Ok(answer) => println!("{answer}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}
