//! reader — command-line front end for the playback engine and queue.
//!
//! ```text
//! reader queue add-url <url> [--title TITLE]
//! reader queue add-file <path>
//! reader queue list
//! reader queue remove <id>
//! reader queue clear
//! reader play <id> | reader play   (resumes/starts the current item)
//! reader pause / resume / stop
//! reader skip / skip-back
//! reader skip-sentence [--back]
//! reader seek <seconds>
//! reader next / previous
//! reader status
//! reader settings get
//! reader settings set-rate <rate>
//! reader serve [--port 4417]
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reader_core::types::{Article, Lang};
use reader_engine::queue::QueueNotification;
use reader_engine::{Reader, ReaderConfig};

/// reader — text-to-speech playback engine and queue
#[derive(Parser)]
#[command(name = "reader", version, about)]
struct Cli {
    /// Base URL of the remote content/audio proxy.
    #[arg(long, env = "READER_PROXY_URL", default_value = "http://localhost:8787")]
    proxy_url: String,

    /// Shared secret for the proxy, if it requires one.
    #[arg(long, env = "READER_PROXY_KEY")]
    proxy_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start or resume playback of the current queue item
    Play {
        /// Queue item id to switch to before playing
        id: Option<String>,
    },
    Pause,
    Resume,
    Stop,
    /// Skip to the next paragraph
    Skip,
    /// Skip to the previous paragraph
    SkipBack,
    /// Skip to the next or previous sentence
    SkipSentence {
        #[arg(long)]
        back: bool,
    },
    /// Seek to an absolute time in seconds
    Seek { seconds: f32 },
    /// Set the playback rate (0.5 - 3.0)
    Rate { value: f32 },
    /// Move to the next queue item and play it
    Next,
    /// Move to the previous queue item and play it
    Previous,
    /// Print the current engine status as JSON
    Status,
    /// Queue management
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run the local control-plane HTTP API
    Serve {
        #[arg(long, default_value_t = reader_engine::server::DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Queue a remote article by URL; content is fetched lazily on play
    AddUrl {
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Queue a local file (plain text, Markdown, HTML, PDF, or EPUB)
    AddFile { path: PathBuf },
    List,
    Remove { id: String },
    Clear,
}

#[derive(Subcommand)]
enum SettingsAction {
    Get,
    SetRate { value: f32 },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reader_cli=info,reader_engine=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ReaderConfig::new(cli.proxy_url, cli.proxy_key);
    let (notify_tx, mut notify_rx) = tokio::sync::mpsc::unbounded_channel::<QueueNotification>();
    let reader = Reader::new(config, tokio::runtime::Handle::current(), notify_tx);

    tokio::spawn(async move {
        while let Some(QueueNotification::UpNext(title)) = notify_rx.recv().await {
            eprintln!("up next: {title}");
        }
    });

    if let Err(e) = run(&reader, cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(reader: &Reader, command: Command) -> Result<(), reader_core::error::ReaderError> {
    match command {
        Command::Play { id } => {
            if let Some(id) = id {
                reader.queue.play_item(&id).await?;
            }
            reader.engine.play();
        }
        Command::Pause => reader.engine.pause(),
        Command::Resume => reader.engine.resume(),
        Command::Stop => reader.engine.stop(),
        Command::Skip => reader.engine.skip_forward(),
        Command::SkipBack => reader.engine.skip_backward(),
        Command::SkipSentence { back } => {
            if back {
                reader.engine.skip_sentence_backward();
            } else {
                reader.engine.skip_sentence_forward();
            }
        }
        Command::Seek { seconds } => reader.engine.seek_to_time(seconds),
        Command::Rate { value } => reader.engine.set_rate(value),
        Command::Next => reader.queue.play_next().await?,
        Command::Previous => reader.queue.play_previous().await?,
        Command::Status => {
            let status = reader.engine.status();
            println!("{}", serde_json::to_string_pretty(&status).unwrap_or_default());
        }
        Command::Queue { action } => run_queue(reader, action)?,
        Command::Settings { action } => run_settings(reader, action),
        Command::Serve { port } => serve(reader, port).await,
    }
    Ok(())
}

async fn serve(reader: &Reader, port: u16) {
    let state = reader_engine::server::ApiState { engine: reader.engine.clone(), queue: reader.queue.clone() };
    let app = reader_engine::server::router(state);

    let addr = format!("127.0.0.1:{port}");
    tracing::info!("reader control-plane listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("error: server error: {e}");
    }
}

fn run_queue(reader: &Reader, action: QueueAction) -> Result<(), reader_core::error::ReaderError> {
    match action {
        QueueAction::AddUrl { url, title } => {
            let article = Article {
                title: title.unwrap_or_else(|| url.clone()),
                paragraphs: Vec::new(),
                markdown: String::new(),
                lang: Lang::En,
                html_lang: None,
                site_name: None,
                excerpt: None,
                word_count: 0,
                estimated_minutes: 0.0,
                resolved_url: url,
            };
            let item = reader.queue.add_article(&article);
            println!("queued {}", item.id);
        }
        QueueAction::AddFile { path } => {
            let article = load_local_article(&path)?;
            let item = reader.queue.add_article(&article);
            println!("queued {}", item.id);
        }
        QueueAction::List => {
            for item in reader.queue.items() {
                println!("{}\t{}", item.id, item.title);
            }
        }
        QueueAction::Remove { id } => reader.queue.remove_item(&id),
        QueueAction::Clear => reader.queue.clear_all(),
    }
    Ok(())
}

fn run_settings(reader: &Reader, action: SettingsAction) {
    match action {
        SettingsAction::Get => {
            let settings = reader.load_settings();
            println!("{}", serde_json::to_string_pretty(&settings).unwrap_or_default());
        }
        SettingsAction::SetRate { value } => {
            let mut settings = reader.load_settings();
            settings.rate = value;
            let settings = settings.validated();
            reader.save_settings(&settings);
        }
    }
}

fn load_local_article(path: &PathBuf) -> Result<Article, reader_core::error::ReaderError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
    let bytes = std::fs::read(path).map_err(|_| reader_core::error::ReaderError::UnsupportedFile)?;

    let paragraphs = match ext.as_str() {
        "pdf" => reader_core::extract::from_pdf(&bytes)?,
        "epub" => reader_core::extract::from_epub(&bytes)?,
        "html" | "htm" => {
            reader_core::extract::from_html(&String::from_utf8_lossy(&bytes))?
        }
        "md" | "markdown" => reader_core::extract::from_markdown(&String::from_utf8_lossy(&bytes))?,
        _ => reader_core::extract::from_plain_text(&String::from_utf8_lossy(&bytes))?,
    };

    let word_count = paragraphs.iter().map(|p| p.split_whitespace().count()).sum();
    let title = path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled").to_string();

    Ok(Article {
        title,
        paragraphs,
        markdown: String::new(),
        lang: Lang::En,
        html_lang: None,
        site_name: None,
        excerpt: None,
        word_count,
        estimated_minutes: word_count as f32 / 200.0,
        resolved_url: String::new(),
    })
}
