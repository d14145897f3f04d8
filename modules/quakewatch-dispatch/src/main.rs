use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use quakewatch_common::file_config::load_config;
use quakewatch_common::{Config, FileConfig};
use quakewatch_dispatch::feed::BmkgFeed;
use quakewatch_dispatch::http::build_client;
use quakewatch_dispatch::news::TavilySearcher;
use quakewatch_dispatch::notify::{DeliveryChannel, LogChannel, SmtpChannel};
use quakewatch_dispatch::reference::ReferenceLibrary;
use quakewatch_dispatch::{Coordinator, Deps, Dispatcher, Poller};
use quakewatch_store::PgStore;

#[derive(Parser)]
#[command(name = "quakewatch", about = "Earthquake alert orchestration")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, Debug)]
enum Mode {
    /// Poll the feed and notify on every new earthquake
    Poll,
    /// Answer requests typed on stdin
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("quakewatch=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_redacted();

    let file_config = match &config.file_config_path {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mode = match cli.mode {
        Some(mode) => mode,
        None => prompt_mode(&mut input).await?,
    };
    info!(?mode, "QuakeWatch starting");

    let deps = build_deps(&config, file_config).await?;
    let dispatcher = Arc::new(Dispatcher::standard(&deps));

    match mode {
        Mode::Poll => {
            let interval = deps.file_config.dispatch.poll_interval();
            Poller::new(dispatcher, interval).run().await;
        }
        Mode::Chat => chat(Coordinator::new(deps.generator.clone(), dispatcher), input).await?,
    }

    Ok(())
}

async fn build_deps(config: &Config, file_config: FileConfig) -> Result<Deps> {
    let call_timeout = file_config.dispatch.call_timeout();

    let store = PgStore::connect(&config.database_url, file_config.store.max_connections)
        .await
        .context("failed to connect to database")?
        .with_statement_timeout(file_config.store.statement_timeout_ms);
    store.migrate().await?;
    info!("Connected to database");

    let http = build_client(call_timeout)?;

    let generator = OpenAi::new(&config.llm_api_key, &config.llm_model)
        .with_base_url(&config.llm_base_url)
        .with_sampling(file_config.llm.temperature, file_config.llm.top_p)
        .with_max_tokens(file_config.llm.max_tokens)
        .with_timeout(call_timeout)?;

    let channel: Arc<dyn DeliveryChannel> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "SMTP delivery enabled");
            Arc::new(SmtpChannel::new(smtp)?)
        }
        None => {
            warn!("No SMTP_HOST set, deliveries will only be logged");
            Arc::new(LogChannel)
        }
    };

    let reference = match &file_config.reference.guide_path {
        Some(path) => {
            let library = ReferenceLibrary::load(path)?;
            info!(path = %path.display(), paragraphs = library.len(), "Loaded reference guide");
            library
        }
        None => {
            warn!("No reference guide configured, reports will not cite one");
            ReferenceLibrary::empty()
        }
    };

    Ok(Deps::new(
        Arc::new(BmkgFeed::new(file_config.feed.url.clone(), http.clone())),
        Arc::new(TavilySearcher::new(config.tavily_api_key.clone(), http)),
        Arc::new(store),
        Arc::new(generator),
        channel,
        Arc::new(reference),
        Arc::new(file_config),
    ))
}

/// Reads from the same buffered stdin that chat mode continues with.
async fn prompt_mode<R: AsyncBufRead + Unpin>(input: &mut Lines<R>) -> Result<Mode> {
    loop {
        print!("Select mode (1 = poll, 2 = chat): ");
        std::io::stdout().flush()?;

        let Some(line) = input.next_line().await? else {
            anyhow::bail!("no mode selected");
        };
        match line.trim() {
            "1" => return Ok(Mode::Poll),
            "2" => return Ok(Mode::Chat),
            other => println!("Unknown choice {other:?}, enter 1 or 2."),
        }
    }
}

async fn chat<R: AsyncBufRead + Unpin>(coordinator: Coordinator, mut lines: Lines<R>) -> Result<()> {
    println!("Type a request, or \"exit\" to quit.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let reply = coordinator.handle(text).await;
        println!("{reply}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mode_prompt_leaves_later_lines_for_chat() {
        let mut input = BufReader::new(&b"3\n2\nkirim peringatan gempa\n"[..]).lines();

        let mode = prompt_mode(&mut input).await.unwrap();

        assert!(matches!(mode, Mode::Chat));
        assert_eq!(
            input.next_line().await.unwrap().as_deref(),
            Some("kirim peringatan gempa")
        );
    }

    #[tokio::test]
    async fn closed_input_selects_no_mode() {
        let mut input = BufReader::new(&b""[..]).lines();
        assert!(prompt_mode(&mut input).await.is_err());
    }
}
