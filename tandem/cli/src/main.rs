//! Tandem CLI
//!
//! Command-line client for the dual-track answer service. Asks a question,
//! renders the fast answer and the streamed detailed answer as they arrive,
//! and can rate a completed exchange or probe the backend.
//!
//! # Usage
//!
//! ```bash
//! # Ask with live streaming (Ctrl-C stops the stream, keeps partial output)
//! tandem ask "What is the retention policy for invoices?"
//!
//! # One-shot mode, no knowledge base
//! tandem ask --no-stream --no-kb "Summarize chapter 3"
//!
//! # Ask, then credit the track that helped
//! tandem ask --rate both "What changed in the 2024 contract?"
//!
//! # Probe the backend
//! tandem health
//!
//! # Backend-side view of a session
//! tandem status 550e8400-e29b-41d4-a716-446655440000
//!
//! # Print the resolved configuration and where it came from
//! tandem show-config
//! ```
//!
//! # Environment Variables
//!
//! - `TANDEM_BASE_URL`: Backend origin (default: http://127.0.0.1:8080)
//! - `TANDEM_USER_ID`: Stable user id sent with every question
//! - `TANDEM_STREAMING`: Default answer mode, `1`/`0`
//! - `TANDEM_USE_KNOWLEDGE_BASE`: Knowledge-base toggle, `1`/`0`
//! - `TANDEM_CONNECT_TIMEOUT_MS` / `TANDEM_REQUEST_TIMEOUT_MS`: HTTP timeouts
//! - `TANDEM_STALL_TIMEOUT_SECS`: Abort silent streams (0 = wait forever)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Files
//!
//! - Config: `~/.config/tandem/tandem.toml` (or the platform equivalent)

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;

use tandem_core::{
    default_config_path, load_config_from_path, AnswerSnapshot, ConfigOverrides, Exchange,
    FeedbackChoice, HttpBackend, Tandem, TandemConfig, TerminalReason,
};

/// Command-line client for the tandem answer service
#[derive(Debug, Parser)]
#[command(name = "tandem", version, about)]
struct Cli {
    /// Backend base URL (overrides config file and environment)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// User id sent with every question and feedback submission
    #[arg(long, global = true)]
    user: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask a question and render the answer as it arrives
    Ask {
        /// The question text
        question: String,

        /// Use the one-shot request path instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Answer without consulting the knowledge base
        #[arg(long)]
        no_kb: bool,

        /// Abort the stream after this many seconds of silence (0 = never)
        #[arg(long)]
        stall_timeout: Option<u64>,

        /// Rate the answer once it completes
        #[arg(long, value_enum)]
        rate: Option<RateChoice>,

        /// Free-text remark to attach to the rating
        #[arg(long, requires = "rate")]
        comment: Option<String>,
    },

    /// Probe backend health
    Health,

    /// Show the backend-side status of a streaming session
    Status {
        /// Session id to inspect
        session_id: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration and where it came from
    ShowConfig,
}

/// Which answer track to credit when rating
#[derive(Clone, Copy, Debug, ValueEnum)]
enum RateChoice {
    /// The fast answer served best
    Hope,
    /// The detailed streamed answer served best
    Llm,
    /// Both tracks were useful
    Both,
    /// Neither track was useful
    Neither,
}

impl From<RateChoice> for FeedbackChoice {
    fn from(choice: RateChoice) -> Self {
        match choice {
            RateChoice::Hope => FeedbackChoice::Hope,
            RateChoice::Llm => FeedbackChoice::Llm,
            RateChoice::Both => FeedbackChoice::Both,
            RateChoice::Neither => FeedbackChoice::Neither,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the streamed answer on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tandem=warn".parse()?)
                .add_directive("tandem_core=warn".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Ask {
            question,
            no_stream,
            no_kb,
            stall_timeout,
            rate,
            comment,
        } => {
            let mut config = config;
            let mut overrides = ConfigOverrides::new();
            if no_stream {
                overrides = overrides.with_streaming(false);
            }
            if no_kb {
                overrides = overrides.with_use_knowledge_base(false);
            }
            if let Some(secs) = stall_timeout {
                overrides = overrides.with_stall_timeout_secs(secs);
            }
            overrides.apply(&mut config);
            run_ask(config, &question, rate, comment).await
        }
        Command::Health => run_health(&config).await,
        Command::Status { session_id, json } => run_status(&config, &session_id, json).await,
        Command::ShowConfig => {
            print_config(&config);
            Ok(())
        }
    }
}

/// Load configuration, then layer the global CLI flags on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<TandemConfig> {
    let path = cli.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path)?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = &cli.base_url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(user) = &cli.user {
        overrides = overrides.with_user_id(user.clone());
    }
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run_ask(
    config: TandemConfig,
    question: &str,
    rate: Option<RateChoice>,
    comment: Option<String>,
) -> anyhow::Result<()> {
    let backend = HttpBackend::from_config(&config);
    let tandem = Tandem::new(backend, &config);

    let mut exchange = tandem.ask(question).await?;

    // First Ctrl-C stops the stream; whatever already arrived is kept.
    let cancel = exchange.cancel_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let last = render_answer(&mut exchange).await?;
    exchange.finished().await;

    match last.terminal_reason {
        TerminalReason::Completed => {
            if !last.sources.is_empty() {
                println!();
                println!("Sources: {}", last.sources.join(", "));
            }
        }
        TerminalReason::Stopped => {
            eprintln!("Stream stopped; partial answer kept.");
        }
        TerminalReason::Errored => {
            anyhow::bail!("{}", last.merged);
        }
        TerminalReason::None => {}
    }

    if let Some(rate) = rate {
        match (&last.session_id, last.terminal_reason) {
            (Some(session_id), TerminalReason::Completed) => {
                tandem
                    .rate_exchange(session_id, rate.into(), comment)
                    .await;
                println!("Feedback sent: {}", FeedbackChoice::from(rate));
            }
            _ => {
                eprintln!("Nothing to rate: the exchange did not complete.");
            }
        }
    }

    Ok(())
}

/// Print the combined answer incrementally as snapshots arrive.
///
/// The combined view only ever grows at the end, except when a late fast
/// answer replaces the leading section; on that prefix change the whole
/// revised answer is reprinted as a fresh paragraph.
async fn render_answer(exchange: &mut Exchange) -> anyhow::Result<AnswerSnapshot> {
    let mut feed = exchange.subscribe();
    let mut printed = String::new();

    loop {
        let snapshot = feed.borrow_and_update().clone();

        // Error text goes to stderr via the caller, never to stdout.
        if snapshot.terminal_reason == TerminalReason::Errored {
            if !printed.is_empty() {
                println!();
            }
            return Ok(snapshot);
        }

        if snapshot.merged != printed {
            if snapshot.merged.starts_with(&printed) {
                print!("{}", &snapshot.merged[printed.len()..]);
            } else {
                if !printed.is_empty() {
                    println!();
                    println!();
                }
                print!("{}", snapshot.merged);
            }
            std::io::stdout().flush()?;
            printed = snapshot.merged.clone();
        }

        if snapshot.terminal_reason.is_terminal() {
            if !printed.is_empty() {
                println!();
            }
            return Ok(snapshot);
        }

        if feed.changed().await.is_err() {
            // Sender gone; the last observed snapshot is as final as it gets.
            if !printed.is_empty() {
                println!();
            }
            return Ok(snapshot);
        }
    }
}

async fn run_health(config: &TandemConfig) -> anyhow::Result<()> {
    let backend = HttpBackend::from_config(config);
    let tandem = Tandem::new(backend, config);
    if tandem.health_check().await {
        println!("ok: {}", config.base_url);
        Ok(())
    } else {
        anyhow::bail!("backend at {} is unhealthy or unreachable", config.base_url)
    }
}

async fn run_status(config: &TandemConfig, session_id: &str, json: bool) -> anyhow::Result<()> {
    let backend = HttpBackend::from_config(config);
    let tandem = Tandem::new(backend, config);
    let status = tandem.session_status(session_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("session:  {}", status.session_id);
    println!("status:   {}", status.status);
    if let Some(progress) = status.progress {
        println!("progress: {:.0}%", progress * 100.0);
    }
    if let Some(secs) = status.duration_seconds {
        println!("duration: {secs}s");
    }
    if let Some(chars) = status.answer_length {
        println!("answer:   {chars} chars so far");
    }
    Ok(())
}

fn print_config(config: &TandemConfig) {
    println!("base_url:           {}", config.base_url);
    println!(
        "connect_timeout:    {}ms",
        config.connect_timeout.as_millis()
    );
    println!(
        "request_timeout:    {}ms",
        config.request_timeout.as_millis()
    );
    println!(
        "user_id:            {}",
        config.user_id.as_deref().unwrap_or("(generated per run)")
    );
    println!("streaming:          {}", config.streaming);
    println!("use_knowledge_base: {}", config.use_knowledge_base);
    match config.stall_timeout() {
        Some(window) => println!("stall_timeout:      {}s", window.as_secs()),
        None => println!("stall_timeout:      disabled"),
    }
    match &config.config_file_path {
        Some(path) => println!("config_file:        {}", path.display()),
        None => println!("config_file:        (none found)"),
    }
    println!("source:             {}", config.source());
}
