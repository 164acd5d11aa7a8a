//! Interactive table browser over the loopback table service

mod cli;
mod commands;
mod render;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rv_core::{ClientConfig, FindOptions, Session, ViewSubscriber};
use rv_data::{CsvSource, LoopbackTransport, SourceConfig, TableService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{Command, HELP};
use render::TextRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = cli::Cli::parse();
    run(cli).await
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init() {
        Ok(()) => Ok(()),
        Err(err)
            if err
                .to_string()
                .contains("attempted to set a global default subscriber more than once") =>
        {
            Ok(())
        }
        Err(err) => Err(anyhow!(err)),
    }
}

async fn run(cli: cli::Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("reading client settings {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(rows) = cli.rows {
        config.rows_per_page = rows.max(1);
    }

    let mut source = SourceConfig::new(&cli.csv);
    source.delimiter = cli.delimiter;
    source.has_header = !cli.no_header;
    source.partitions = cli.partitions;
    let partitions = source.partitions;

    info!(file = %cli.csv.display(), "opening table");
    let table = CsvSource::new(source)
        .load()
        .await
        .with_context(|| format!("loading {}", cli.csv.display()))?;
    let service = TableService::with_partitions(partitions);
    let table_id = service.register(table);

    let transport = Arc::new(LoopbackTransport::new(Arc::new(service)));
    let session = Session::new(transport, config.clone());
    let channel = session.channel.clone();
    let dispatcher = tokio::spawn(async move { channel.run().await });

    let renderer: Arc<dyn ViewSubscriber> = Arc::new(TextRenderer);
    let view = session.open_table_with(table_id, vec![renderer.clone()])?;
    let options = FindOptions::from(&config);

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };
        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            command => {
                if let Err(err) = command.apply(&view, options) {
                    // Guard refusals already reach the renderer as the status line
                    if !err.is_guard() {
                        error!(error = %err, "request failed");
                    }
                }
            }
        }
    }

    session.close_view(view.view_id());
    dispatcher.abort();
    Ok(())
}
