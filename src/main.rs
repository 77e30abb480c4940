use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use stewie_console::session::{Driver, DriverParts, UserAction};
use stewie_console::speech::{
    AudioPlayer, CommandSynth, LocalSynth, SpeechOutput, detect_recognizer,
};
use stewie_console::status::StatusPoller;
use stewie_console::terminal::{self, TerminalView};
use stewie_console::{Config, HttpBackend, PhraseMatcher};

/// Stewie - voice and text console for the cluster assistant
#[derive(Parser)]
#[command(name = "stewie", version, about)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "STEWIE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Path to a config file (defaults to ~/.config/stewie/console.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features
    #[arg(long, env = "STEWIE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and print the answer
    Ask {
        /// Question text
        question: String,
    },
    /// Print the ambient status snapshot
    Status,
    /// Test speech output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech output path.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,stewie_console=info",
        1 => "info,stewie_console=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }

    let backend = Arc::new(HttpBackend::new(&config.backend_url));

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { question } => cmd_ask(&backend, &question).await,
            Command::Status => cmd_status(backend).await,
            Command::TestTts { text } => cmd_test_tts(backend, &config, &text).await,
        };
    }

    run_console(backend, config).await
}

async fn run_console(backend: Arc<HttpBackend>, config: Config) -> anyhow::Result<()> {
    let matcher = PhraseMatcher::new(
        config.voice.wake_phrases.clone(),
        config.voice.sleep_phrases.clone(),
    )?;

    // Speech output: premium playback needs an output device, the
    // fallback needs a local engine; either may be absent.
    let player = match AudioPlayer::new() {
        Ok(player) => Some(player),
        Err(e) => {
            tracing::warn!(error = %e, "audio output unavailable");
            None
        }
    };
    let synth = CommandSynth::detect(config.synth.clone())
        .map(|s| Arc::new(s) as Arc<dyn LocalSynth>);

    let (playback_tx, playback_rx) = mpsc::unbounded_channel();
    let output = Arc::new(SpeechOutput::new(
        backend.clone() as Arc<dyn stewie_console::Backend>,
        player,
        synth,
        &config.synth,
        playback_tx,
    ));

    // Speech input: absence degrades permanently to text-only.
    let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();
    let recognizer = if config.voice.enabled {
        detect_recognizer(&config.voice.locale, recognition_tx)
    } else {
        None
    };

    let poller = Arc::new(StatusPoller::new(
        backend.clone() as Arc<dyn stewie_console::Backend>,
    ));
    let (poke_tx, poke_rx) = mpsc::channel(1);
    tokio::spawn(Arc::clone(&poller).run(
        Duration::from_secs(config.status_interval_secs),
        poke_rx,
    ));

    let mut view = TerminalView::new(std::io::stdout());
    let wake = matcher.wake_phrases().first().cloned().unwrap_or_default();
    let sleep = matcher.sleep_phrases().join("/");
    terminal::banner(&mut view, &wake, &sleep);

    let (actions_tx, actions_rx) = mpsc::channel(16);
    tokio::spawn(read_actions(actions_tx));

    let driver = Driver::new(DriverParts {
        backend: backend as Arc<dyn stewie_console::Backend>,
        recognizer,
        recognition_events: recognition_rx,
        output,
        playback_events: playback_rx,
        view,
        poller,
        status_poke: poke_tx,
        matcher,
    });

    driver.run(actions_rx).await;
    Ok(())
}

/// Read stdin lines and translate them into user actions
async fn read_actions(actions: mpsc::Sender<UserAction>) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                let _ = actions.send(UserAction::Quit).await;
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };

        let action = match line.trim() {
            "" => continue,
            "/voice" => UserAction::ToggleVoice,
            "/stop" => UserAction::StopSpeaking,
            "/mode" => UserAction::CyclePersonality,
            "/analyze" => UserAction::AnalyzeCluster,
            "/quit" | "/exit" => UserAction::Quit,
            text => UserAction::Submit(text.to_string()),
        };

        let quit = action == UserAction::Quit;
        if actions.send(action).await.is_err() || quit {
            break;
        }
    }
}

async fn cmd_ask(backend: &HttpBackend, question: &str) -> anyhow::Result<()> {
    use stewie_console::Backend as _;

    let answer = backend.ask(question).await?;
    println!("{}", answer.answer);
    if let Some(personality) = answer.personality {
        tracing::debug!(personality, "answered with personality");
    }
    Ok(())
}

async fn cmd_status(backend: Arc<HttpBackend>) -> anyhow::Result<()> {
    let poller = StatusPoller::new(backend as Arc<dyn stewie_console::Backend>);
    poller.refresh().await;
    println!("{}", poller.snapshot().await);
    Ok(())
}

async fn cmd_test_tts(
    backend: Arc<HttpBackend>,
    config: &Config,
    text: &str,
) -> anyhow::Result<()> {
    use stewie_console::speech::PlaybackEvent;

    let player = AudioPlayer::new().ok();
    let synth = CommandSynth::detect(config.synth.clone())
        .map(|s| Arc::new(s) as Arc<dyn LocalSynth>);

    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
    let output = Arc::new(SpeechOutput::new(
        backend as Arc<dyn stewie_console::Backend>,
        player,
        synth,
        &config.synth,
        playback_tx,
    ));

    output.speak(text.to_string());
    while let Some(event) = playback_rx.recv().await {
        if event == PlaybackEvent::Finished {
            break;
        }
    }

    println!("done");
    std::io::stdout().flush()?;
    Ok(())
}
