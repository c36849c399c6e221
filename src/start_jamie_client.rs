//! Startup helpers for the `jamie` terminal client.
//!
//! Restores the saved sign-in (or signs in), mounts the chat screen, then
//! reads one command or message per line from stdin until `/quit` or end of
//! input. `/signout` forgets the saved sign-in and returns to the username
//! prompt. Logs go to stderr so the conversation on stdout stays readable.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use crate::auth::{AuthClient, Credentials};
use crate::chat::{ChatScreen, ClearOutcome, IgnoreReason, SendOutcome};
use crate::config::ClientConfig;
use crate::credential_store::CredentialStore;
use crate::error::{ChatError, ChatResult, ConfigError, NetworkError};
use crate::ids::SessionId;
use crate::message::{Message, Role};

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "jamie", about = "Terminal chat client for the Jamie agent", version)]
pub struct Cli {
    /// Backend base URL (defaults to $JAMIE_API_URL).
    #[arg(long)]
    pub api_url: Option<String>,
    /// Username to sign in with; skips the saved sign-in. Prompted for when
    /// omitted and nothing is saved.
    #[arg(long, short)]
    pub username: Option<String>,
    /// Request timeout in seconds (defaults to $JAMIE_TIMEOUT_SECS or 60).
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Where the sign-in is saved (defaults to $JAMIE_CREDENTIALS_FILE or the
    /// user config directory).
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,
}

const HELP: &str = "\
Commands:
  /sessions     list past sessions
  /open <id>    open a past session
  /history      show the current transcript
  /new          start a new chat
  /clear        delete the current session
  /clear-all    delete all sessions
  /signout      forget the saved sign-in and sign in again
  /help         show this help
  /quit         exit
Anything else is sent as a message.";

/// One parsed input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// List sessions.
    Sessions,
    /// Open a session.
    Open(SessionId),
    /// Print the transcript.
    History,
    /// Start a new chat.
    New,
    /// Delete the active session.
    Clear,
    /// Delete all sessions.
    ClearAll,
    /// Drop the chat screen and the saved sign-in.
    SignOut,
    /// Print help.
    Help,
    /// Exit.
    Quit,
    /// Send a chat message.
    Say(String),
}

/// How a signed-in chat loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    Quit,
    SignOut,
}

/// Parse an input line; blank lines yield `Ok(None)`.
///
/// # Errors
/// Returns a user-facing message for unknown commands or missing arguments.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Say(line.to_string())));
    }

    let (name, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(n, a)| (n, a.trim()));

    let command = match name {
        "/sessions" => Command::Sessions,
        "/open" => {
            let id = SessionId::new(arg).map_err(|_| "usage: /open <session id>".to_string())?;
            Command::Open(id)
        }
        "/history" => Command::History,
        "/new" => Command::New,
        "/clear" => Command::Clear,
        "/clear-all" => Command::ClearAll,
        "/signout" | "/logout" => Command::SignOut,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("unknown command {other}; try /help")),
    };
    Ok(Some(command))
}

/// Format one transcript message for the terminal.
#[must_use]
pub fn render_message(message: &Message) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "jamie",
    };
    format!("{who}> {}", message.content)
}

/// Build the client config from CLI flags, falling back to the environment.
///
/// # Errors
/// Returns [`ConfigError::MissingBaseUrl`] when neither `--api-url` nor
/// `JAMIE_API_URL` is set.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = match &cli.api_url {
        Some(url) => ClientConfig::new(url)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config.validate()?;
    Ok(config)
}

/// Pick the credentials file; `None` disables saving the sign-in.
#[must_use]
pub fn resolve_credential_store(cli: &Cli) -> Option<CredentialStore> {
    cli.credentials_file
        .clone()
        .or_else(CredentialStore::default_path)
        .map(CredentialStore::new)
}

/// Saved sign-in to resume, unless a username was asked for explicitly.
///
/// # Errors
/// Returns [`ChatError::Io`] if the credentials file cannot be read.
pub async fn restore_credentials(
    store: Option<&CredentialStore>,
    requested_username: Option<&str>,
) -> ChatResult<Option<Credentials>> {
    match (store, requested_username) {
        (Some(store), None) => store.load().await,
        _ => Ok(None),
    }
}

/// End the signed-in session: tear the screen down and forget the saved
/// sign-in.
///
/// # Errors
/// Returns [`ChatError::Io`] if the credentials file cannot be removed.
pub async fn sign_out(screen: ChatScreen, store: Option<&CredentialStore>) -> ChatResult<()> {
    tracing::info!(user_id = %screen.username(), "signing out");
    screen.shutdown();
    drop(screen);
    match store {
        Some(store) => store.clear().await,
        None => Ok(()),
    }
}

/// Run the terminal client.
///
/// # Returns
/// `ExitCode::SUCCESS` on a clean exit, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_client(cli)) {
        tracing::error!("jamie: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Sign in and drive the chat loop until the user quits.
///
/// # Errors
/// Returns configuration and terminal errors. Failed sign-ins re-prompt;
/// failures of individual chat operations are reported inline and do not
/// end the loop.
pub async fn run_client(cli: Cli) -> ChatResult<()> {
    let config = resolve_config(&cli)?;
    let store = resolve_credential_store(&cli);
    tracing::info!("Backend endpoint: {}", config.base_url);

    let mut console = Console::new();
    let auth = AuthClient::new(config.clone())?;
    if !auth.health().await.unwrap_or(false) {
        tracing::warn!("backend health check did not report healthy");
    }

    let mut requested = cli.username;
    loop {
        let signed_in = authenticate(&auth, store.as_ref(), requested.take(), &mut console).await?;
        let Some(credentials) = signed_in else {
            return Ok(());
        };

        let screen = ChatScreen::connect(config.clone(), Arc::new(credentials))?;
        match chat_loop(&screen, &mut console).await? {
            Exit::Quit => {
                screen.shutdown();
                return Ok(());
            }
            Exit::SignOut => {
                sign_out(screen, store.as_ref()).await?;
                console.say("Signed out.").await?;
            }
        }
    }
}

/// Resume the saved sign-in or ask for a username until sign-in succeeds.
///
/// Returns `None` when input ends at the prompt.
async fn authenticate(
    auth: &AuthClient,
    store: Option<&CredentialStore>,
    mut requested: Option<String>,
    console: &mut Console,
) -> ChatResult<Option<Credentials>> {
    if let Some(saved) = restore_credentials(store, requested.as_deref()).await? {
        tracing::info!(user_id = %saved.user_id(), "resuming saved sign-in");
        return Ok(Some(saved));
    }

    loop {
        let username = match requested.take() {
            Some(name) => name,
            None => match console.prompt("Username: ").await? {
                Some(name) => name,
                None => return Ok(None),
            },
        };

        match auth.sign_in(&username).await {
            Ok(credentials) => {
                remember(store, &credentials).await;
                return Ok(Some(credentials));
            }
            Err(e @ (ChatError::InvalidInput(_) | ChatError::Network(_))) => {
                console.say(&format!("Sign in failed: {e}")).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Save the sign-in; a failure only costs the next run a prompt.
async fn remember(store: Option<&CredentialStore>, credentials: &Credentials) {
    let Some(store) = store else {
        return;
    };
    if let Err(e) = store.save(credentials).await {
        tracing::warn!(path = %store.path().display(), "could not save sign-in: {e}");
    }
}

async fn chat_loop(screen: &ChatScreen, console: &mut Console) -> ChatResult<Exit> {
    console
        .say(&format!("Signed in as {}. Type /help for commands.", screen.username()))
        .await?;

    match screen.mount().await {
        Ok(Some(opened)) => {
            console.say(&format!("Opened session {opened}.")).await?;
            print_transcript(screen, console).await?;
        }
        Ok(None) => console.say("Start a conversation with Jamie!").await?,
        Err(ChatError::Network(NetworkError::Status { status: 401, .. })) => {
            console
                .say("The backend rejected this sign-in. Use /signout to sign in again.")
                .await?;
        }
        Err(e) => console.say(&format!("Could not load sessions: {e}")).await?,
    }

    while let Some(line) = console.read_line().await? {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => return Ok(Exit::Quit),
            Ok(Some(Command::SignOut)) => return Ok(Exit::SignOut),
            Ok(Some(command)) => dispatch(screen, console, command).await?,
            Err(message) => console.say(&message).await?,
        }
    }
    Ok(Exit::Quit)
}

async fn dispatch(screen: &ChatScreen, console: &mut Console, command: Command) -> ChatResult<()> {
    match command {
        Command::Sessions => {
            if let Err(e) = screen.refresh_sessions().await {
                console.say(&format!("Could not load sessions: {e}")).await?;
            }
            print_sessions(screen, console).await?;
        }
        Command::Open(id) => match screen.select_session(id).await {
            Ok(_) => print_transcript(screen, console).await?,
            Err(e) => console.say(&format!("Could not open session: {e}")).await?,
        },
        Command::History => print_transcript(screen, console).await?,
        Command::New => {
            screen.start_new().await;
            console.say("Started a new chat.").await?;
        }
        Command::Clear => match screen.clear_active().await {
            Ok(ClearOutcome::NothingActive) => console.say("No active session.").await?,
            Ok(ClearOutcome::Deleted(id)) => console.say(&format!("Cleared session {id}.")).await?,
            Err(e) => console.say(&format!("Could not clear session: {e}")).await?,
        },
        Command::ClearAll => match screen.clear_all().await {
            Ok(()) => console.say("Cleared all sessions.").await?,
            Err(e) => console.say(&format!("Could not clear sessions: {e}")).await?,
        },
        Command::Help => console.say(HELP).await?,
        Command::Say(text) => send(screen, console, &text).await?,
        Command::SignOut | Command::Quit => {}
    }
    Ok(())
}

/// Status line shown for a send that produced no reply to print.
///
/// Only a send that actually reached the backend gets output, and that
/// output is the reply itself.
#[must_use]
pub const fn send_notice(outcome: &SendOutcome) -> Option<&'static str> {
    match outcome {
        SendOutcome::Ignored(IgnoreReason::InFlight) => Some("Still waiting for the previous reply."),
        SendOutcome::Ignored(IgnoreReason::Empty)
        | SendOutcome::Replied { .. }
        | SendOutcome::Detached { .. } => None,
    }
}

async fn send(screen: &ChatScreen, console: &mut Console, text: &str) -> ChatResult<()> {
    let before = screen.transcript().len().await;

    match screen.send(text).await {
        Ok(SendOutcome::Replied { .. }) | Err(ChatError::Network(_)) => {}
        Ok(outcome) => {
            if let Some(notice) = send_notice(&outcome) {
                console.say(notice).await?;
            }
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    let messages = screen.transcript().messages().await;
    for message in messages.iter().skip(before).filter(|m| !m.is_user()) {
        console.say(&render_message(message)).await?;
    }
    Ok(())
}

async fn print_sessions(screen: &ChatScreen, console: &mut Console) -> ChatResult<()> {
    let sessions = screen.sessions().sessions().await;
    if sessions.is_empty() {
        return console.say("No past sessions.").await;
    }
    let active = screen.transcript().session_id().await;
    for id in sessions {
        let marker = if active.as_ref() == Some(&id) { "*" } else { " " };
        console.say(&format!("{marker} {id}")).await?;
    }
    Ok(())
}

async fn print_transcript(screen: &ChatScreen, console: &mut Console) -> ChatResult<()> {
    let messages = screen.transcript().messages().await;
    if messages.is_empty() {
        return console.say("(empty conversation)").await;
    }
    for message in &messages {
        console.say(&render_message(message)).await?;
    }
    Ok(())
}

/// Line-oriented stdin/stdout.
struct Console {
    input: Lines<BufReader<Stdin>>,
    output: Stdout,
}

impl Console {
    fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            output: tokio::io::stdout(),
        }
    }

    async fn say(&mut self, text: &str) -> ChatResult<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn prompt(&mut self, text: &str) -> ChatResult<Option<String>> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        self.read_line().await
    }

    async fn read_line(&mut self) -> ChatResult<Option<String>> {
        Ok(self.input.next_line().await?)
    }
}
