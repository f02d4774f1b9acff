mod cli;
mod config;
mod docs;
mod llm;
mod session;
mod tools;
mod tui;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write as _;

use cli::{Cli, Commands, ConfigAction, DocsAction, SessionsAction};
use config::{Config, ConfigPaths};
use docs::DocumentStore;
use session::SessionStore;
use llm::{
    stable_prefix_len, ChatBackend, Message, OpenAiClient, StreamEvent, StreamSegmenter,
    ToolConversationEngine,
};
use tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant running in a terminal. \
Keep answers concise and format them as plain text. When tools are available, \
use them to inspect and modify files instead of guessing.";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        None => tui::run().await,
        Some(Commands::Ask { message, tools }) => run_ask(message, tools).await,
        Some(Commands::Config { action }) => run_config(action).await,
        Some(Commands::Docs { action }) => run_docs(action),
        Some(Commands::Sessions { action }) => run_sessions(action),
    }
}

fn backend_from(config: &Config) -> Result<OpenAiClient> {
    let conn = config.connection()?;
    Ok(OpenAiClient::new(conn.base_url, conn.api_key, conn.model)
        .with_max_tokens(conn.max_tokens))
}

async fn run_ask(message: Vec<String>, use_tools: bool) -> Result<()> {
    let prompt = message.join(" ");
    if prompt.trim().is_empty() {
        bail!("No message given. Usage: parley ask <message>");
    }

    let paths = ConfigPaths::resolve()?;
    let config = Config::load_or_create(&paths)?;
    let client = backend_from(&config)?;
    let conversation = vec![Message::user(prompt)];

    if use_tools {
        let registry = ToolRegistry::with_default_tools();
        let engine = ToolConversationEngine::new(&client);
        let output = engine.run(&conversation, &registry, Some(SYSTEM_PROMPT)).await?;

        for invocation in &output.invocations {
            eprintln!("{}[tool] {}({}){}", DIM, invocation.tool, invocation.args, RESET);
        }
        println!("{}", output.final_text);
        return Ok(());
    }

    let (mut rx, handle) = client.stream(&conversation, Some(SYSTEM_PROMPT)).await?;
    let mut segmenter = StreamSegmenter::new();
    let mut printed = 0usize;
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Delta(chunk) => {
                let segments = segmenter.feed(&chunk);
                let stable = stable_prefix_len(&segments.visible);
                if stable > printed {
                    write!(stdout, "{}", &segments.visible[printed..stable])?;
                    stdout.flush()?;
                    printed = stable;
                }
            }
            StreamEvent::Done => break,
            StreamEvent::Error(e) => bail!("Stream failed: {}", e),
        }
    }
    handle.await.context("Stream task panicked")??;

    let segments = segmenter.snapshot();
    if segments.visible.len() > printed {
        write!(stdout, "{}", &segments.visible[printed..])?;
    }
    println!();

    if config.settings.debug_mode && !segmenter.reasoning().is_empty() {
        eprintln!("{}--- thinking ---{}", DIM, RESET);
        eprintln!("{}{}{}", DIM, segmenter.reasoning().trim(), RESET);
    }
    Ok(())
}

async fn run_config(action: ConfigAction) -> Result<()> {
    let paths = ConfigPaths::resolve()?;

    match action {
        ConfigAction::Init => {
            if paths.config_file().exists() {
                println!(
                    "{}Already initialized at {}{}",
                    YELLOW,
                    paths.home().display(),
                    RESET
                );
            } else {
                Config::load_or_create(&paths)?;
                println!(
                    "{}Initialized configuration at {}{}",
                    GREEN,
                    paths.home().display(),
                    RESET
                );
            }
        }
        ConfigAction::Show => {
            let config = Config::load(&paths)
                .context("No configuration found. Run 'parley config init' first")?;
            println!("Version:  {}", config.version);
            match config.current_endpoint() {
                Some(endpoint) => {
                    println!("Endpoint: {} ({})", endpoint.name, endpoint.base_url);
                    println!(
                        "API key:  {}",
                        if endpoint.api_key.is_some() { "set" } else { "none" }
                    );
                }
                None => println!(
                    "{}Endpoint: '{}' (missing from config){}",
                    YELLOW, config.current_endpoint, RESET
                ),
            }
            println!("Model:    {}", config.current_model);
            println!(
                "Settings: stream={} auto_save={} debug={}",
                config.settings.stream_response,
                config.settings.auto_save,
                config.settings.debug_mode
            );
        }
        ConfigAction::Reset => {
            Config::reset(&paths)?;
            println!("{}Configuration reset to defaults{}", GREEN, RESET);
        }
        ConfigAction::Test => {
            let config = Config::load_or_create(&paths)?;
            let client = backend_from(&config)?;
            print!("Testing {} ... ", client.model());
            std::io::stdout().flush()?;
            client.test_connection().await?;
            println!("{}ok{}", GREEN, RESET);
        }
    }
    Ok(())
}

fn run_sessions(action: SessionsAction) -> Result<()> {
    let paths = ConfigPaths::resolve()?;
    let store = SessionStore::new(paths);

    match action {
        SessionsAction::List => {
            let sessions = store.list()?;
            if sessions.is_empty() {
                println!("No sessions saved.");
            }
            for session in sessions {
                println!(
                    "{}  {}  ({} messages)",
                    session.id,
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                    session.messages.len()
                );
                println!("  {}{}{}", DIM, session.title(), RESET);
            }
        }
        SessionsAction::Show { id } => {
            let session = store.load(&id)?;
            for msg in &session.messages {
                println!("{}{}:{} {}", GREEN, msg.role, RESET, msg.content);
            }
        }
        SessionsAction::Remove { id } => {
            store.remove(&id)?;
            println!("{}Removed session {}{}", GREEN, id, RESET);
        }
    }
    Ok(())
}

fn run_docs(action: DocsAction) -> Result<()> {
    let paths = ConfigPaths::resolve()?;
    let store = DocumentStore::new(paths);

    match action {
        DocsAction::Add { title, file, tags } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read '{}'", path))?,
                None => {
                    let mut buf = String::new();
                    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
                        .context("Failed to read content from stdin")?;
                    buf
                }
            };
            let tags = tags
                .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            let meta = store.add(&title, &content, tags)?;
            println!("{}Stored document {}{}", GREEN, meta.id, RESET);
        }
        DocsAction::List => {
            let listings = store.list()?;
            if listings.is_empty() {
                println!("No documents stored.");
            }
            for listing in listings {
                println!(
                    "{}  {}  ({} bytes)",
                    listing.meta.id, listing.meta.title, listing.meta.content_length
                );
                println!("  {}{}{}", DIM, listing.preview.replace('\n', " "), RESET);
            }
        }
        DocsAction::Show { id } => {
            let doc = store.get(&id)?;
            println!("{}", doc.content);
        }
        DocsAction::Remove { id } => {
            store.remove(&id)?;
            println!("{}Removed document {}{}", GREEN, id, RESET);
        }
        DocsAction::Search { query } => {
            let hits = store.search(&query)?;
            if hits.is_empty() {
                println!("No documents matching '{}'.", query);
            }
            for meta in hits {
                println!("{}  {}", meta.id, meta.title);
            }
        }
    }
    Ok(())
}
