mod render;

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reportlens_contracts::chat::{parse_intent, Intent, CHAT_GREETING, CHAT_HELP_COMMANDS};
use reportlens_contracts::errors::ViewError;
use reportlens_contracts::identity::IdentityGateway;
use reportlens_contracts::prefs::JsonPreferenceStore;
use reportlens_engine::{
    AnalysisOutcome, AnalysisSession, AppShell, HttpAnalysisClient, HttpChatClient,
    LocalIdentityGateway, Settings,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::{render_principal, render_report, render_turn, render_warnings};

const LOG_ENV: &str = "REPORTLENS_LOG";

#[derive(Debug, Parser)]
#[command(name = "reportlens", version, about = "Medical report analysis client")]
struct Cli {
    /// Dotenv file layered under the process environment.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session: sign in, analyze documents, ask follow-up questions.
    Chat(ChatArgs),
    /// Analyze one document and print the report.
    Analyze(AnalyzeArgs),
    /// Check that the analysis service is reachable.
    Status,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, conflicts_with = "events")]
    no_events: bool,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    file: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Print the normalized report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("reportlens error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.env_file.as_deref())?;
    if let Some(api_url) = cli.api_url.as_deref() {
        settings.override_api_url(api_url);
    }
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }
    debug!(
        api_base = %settings.client.api_base,
        data_dir = %settings.data_dir.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Chat(args) => run_chat(&settings, args),
        Command::Analyze(args) => run_analyze(&settings, args),
        Command::Status => run_status(&settings),
    }
}

fn build_session(settings: &Settings, events: Option<PathBuf>) -> AnalysisSession {
    AnalysisSession::new(
        Box::new(HttpAnalysisClient::new(settings.client.clone())),
        Box::new(HttpChatClient::new(settings.client.clone())),
        events,
    )
}

fn build_shell(settings: &Settings) -> AppShell {
    let gateway = LocalIdentityGateway::connect(
        settings.identity_api_key.as_deref(),
        settings.profile_path(),
    )
    .map(|gateway| Box::new(gateway) as Box<dyn IdentityGateway>);
    AppShell::start(
        gateway,
        Box::new(JsonPreferenceStore::new(settings.preferences_path())),
    )
}

fn run_status(settings: &Settings) -> Result<i32> {
    let health = HttpAnalysisClient::new(settings.client.clone()).probe()?;
    println!(
        "{} ({}): {}",
        settings.client.api_base, health.status, health.message
    );
    Ok(0)
}

fn run_analyze(settings: &Settings, args: AnalyzeArgs) -> Result<i32> {
    if !args.file.is_file() {
        bail!("file not found: {}", args.file.display());
    }
    let mut shell = build_shell(settings);
    let refusal = dashboard_refusal(&shell);
    shell.shutdown();
    if let Some((code, message)) = refusal {
        eprintln!("{message}");
        return Ok(code);
    }

    let mut session = build_session(settings, args.events);
    session.pick(&args.file)?;
    match session.run_analysis()? {
        AnalysisOutcome::Completed { warnings } => {
            let Some(report) = session.report() else {
                bail!("analysis completed without a report");
            };
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(report).context("report serialization failed")?
                );
            } else {
                println!("{}", render_report(report));
            }
            if let Some(text) = render_warnings(&warnings) {
                eprintln!("{text}");
            }
            Ok(0)
        }
        AnalysisOutcome::Failed(err) => {
            eprintln!("{}", err.user_message());
            Ok(1)
        }
    }
}

fn run_chat(settings: &Settings, args: ChatArgs) -> Result<i32> {
    let mut shell = build_shell(settings);
    if let Some(err) = shell.blocking_error() {
        eprintln!("{err}");
        return Ok(2);
    }

    let events = if args.no_events {
        None
    } else {
        Some(args.events.unwrap_or_else(|| settings.session_log_path()))
    };
    let mut session = build_session(settings, events);
    let probe = HttpAnalysisClient::new(settings.client.clone());

    println!("ReportLens chat started. Type /help for commands.");
    print_identity(&mut shell);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        if let Some(err) = shell.blocking_error() {
            eprintln!("{err}");
            shell.shutdown();
            return Ok(2);
        }

        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }
        if needs_dashboard(&intent.action) && shell.principal().is_none() {
            println!("Sign in first with /signin <email> [name]");
            continue;
        }

        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "quit" => break,
            "pick_file" => handle_pick(&mut session, &intent),
            "run_analysis" => handle_analyze(&mut session),
            "show_report" => match session.report() {
                Some(report) => {
                    println!("{}", render_report(report));
                    if session.can_ask() && session.turns().is_empty() {
                        println!("{CHAT_GREETING}");
                    }
                    for turn in session.turns() {
                        println!("{}", render_turn(turn));
                    }
                }
                None => println!("No report yet. Use /pick <path> then /analyze."),
            },
            "reset" => {
                session.reset();
                println!("View cleared.");
            }
            "ask" => {
                let question = intent.question.as_deref().unwrap_or_default();
                match session.ask_question(question) {
                    Ok(turn) => println!("{}", render_turn(&turn)),
                    Err(ViewError::NoReport) => {
                        println!("Analyze a report before asking questions.")
                    }
                    Err(ViewError::ChatUnavailable) => {
                        println!("Follow-up questions are unavailable for this report.")
                    }
                    Err(err) => println!("Cannot ask: {err}"),
                }
            }
            "whoami" => print_identity(&mut shell),
            "sign_in" => {
                let Some(email) = intent.arg("email") else {
                    println!("/signin requires an email");
                    continue;
                };
                match shell.sign_in(email, intent.arg("display_name")) {
                    Ok(principal) => println!("Signed in as {}", principal.label()),
                    Err(err) => println!("Sign-in failed: {err:#}"),
                }
            }
            "sign_out" => match shell.sign_out() {
                Ok(()) => {
                    session.reset();
                    println!("Signed out.");
                }
                Err(err) => println!("Sign-out failed: {err:#}"),
            },
            "set_display_name" => {
                let Some(name) = intent.arg("name") else {
                    println!("/name requires a display name");
                    continue;
                };
                match shell.update_display_name(name) {
                    Ok(principal) => println!("Display name set to {}", principal.label()),
                    Err(message) => println!("{message}"),
                }
            }
            "set_avatar" => {
                let Some(path) = intent.arg("path") else {
                    println!("/avatar requires an image path");
                    continue;
                };
                match shell.set_avatar(Path::new(path)) {
                    Ok(_) => println!("Avatar updated."),
                    Err(err) => println!("Avatar update failed: {err:#}"),
                }
            }
            "status" => match probe.probe() {
                Ok(health) => println!("{}: {}", health.status, health.message),
                Err(err) => println!("Backend unreachable: {err:#}"),
            },
            "unknown" => {
                println!(
                    "Unknown command: /{}. Type /help for commands.",
                    intent.arg("command").unwrap_or_default()
                );
            }
            _ => println!("Type /help for commands."),
        }
    }

    shell.shutdown();
    Ok(0)
}

/// Exit code and message when the shell cannot show the dashboard.
fn dashboard_refusal(shell: &AppShell) -> Option<(i32, String)> {
    if let Some(err) = shell.blocking_error() {
        return Some((2, err.to_string()));
    }
    if shell.principal().is_none() {
        return Some((
            1,
            "Not signed in. Run `reportlens chat` and /signin <email> [name] first.".to_string(),
        ));
    }
    None
}

/// Report and chat actions live on the dashboard, which requires a signed-in user.
fn needs_dashboard(action: &str) -> bool {
    matches!(
        action,
        "pick_file" | "run_analysis" | "show_report" | "reset" | "ask"
    )
}

fn handle_pick(session: &mut AnalysisSession, intent: &Intent) {
    let Some(path) = intent.arg("path") else {
        println!("/pick requires a path");
        return;
    };
    if !Path::new(path).is_file() {
        println!("File not found: {path}");
        return;
    }
    match session.pick(path) {
        Ok(upload) => println!("Staged {}. Run /analyze to submit.", upload.file_name),
        Err(err) => println!("Cannot stage file: {err}"),
    }
}

fn handle_analyze(session: &mut AnalysisSession) {
    let Some(file_name) = session.pending().map(|upload| upload.file_name.clone()) else {
        println!("Pick a file first with /pick <path>");
        return;
    };
    println!("Analyzing {file_name}. This can take a few minutes...");
    match session.run_analysis() {
        Ok(AnalysisOutcome::Completed { warnings }) => {
            if let Some(report) = session.report() {
                println!("{}", render_report(report));
            }
            if let Some(text) = render_warnings(&warnings) {
                println!("{text}");
            }
            if session.can_ask() {
                println!("{CHAT_GREETING}");
            }
        }
        Ok(AnalysisOutcome::Failed(err)) => println!("{}", err.user_message()),
        Err(err) => println!("Cannot analyze: {err}"),
    }
}

fn print_identity(shell: &mut AppShell) {
    match shell.principal() {
        Some(principal) => {
            let avatar = shell.avatar();
            println!("{}", render_principal(&principal, avatar.as_deref()));
        }
        None => println!("Not signed in. Use /signin <email> [name]."),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use clap::Parser;
    use reportlens_engine::Settings;

    use super::{build_shell, dashboard_refusal, needs_dashboard, Cli, Command};

    fn settings(dir: &std::path::Path, identity_key: Option<&str>) -> anyhow::Result<Settings> {
        let mut vars = BTreeMap::new();
        vars.insert("REPORTLENS_DATA_DIR".to_string(), dir.display().to_string());
        if let Some(key) = identity_key {
            vars.insert("REPORTLENS_IDENTITY_API_KEY".to_string(), key.to_string());
        }
        Settings::from_vars(&vars)
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommand() {
        let cli = Cli::parse_from([
            "reportlens",
            "--api-url",
            "http://10.0.0.5:8000",
            "analyze",
            "labs.pdf",
            "--json",
            "--data-dir",
            "/tmp/rl",
        ]);
        assert_eq!(cli.api_url.as_deref(), Some("http://10.0.0.5:8000"));
        assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/tmp/rl")));
        match cli.command {
            Command::Analyze(args) => {
                assert!(args.json);
                assert_eq!(args.file, std::path::PathBuf::from("labs.pdf"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_events_flags_conflict() {
        let parsed =
            Cli::try_parse_from(["reportlens", "chat", "--events", "a.jsonl", "--no-events"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn analyze_stops_on_configuration_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let shell = build_shell(&settings(temp.path(), None)?);
        let (code, message) = dashboard_refusal(&shell).expect("configuration error");
        assert_eq!(code, 2);
        assert!(message.starts_with("Configuration Error:"), "{message}");
        Ok(())
    }

    #[test]
    fn analyze_requires_signed_in_user() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let settings = settings(temp.path(), Some("key"))?;
        let mut shell = build_shell(&settings);
        assert_eq!(dashboard_refusal(&shell).map(|(code, _)| code), Some(1));

        shell.sign_in("ada@example.com", None)?;
        assert_eq!(dashboard_refusal(&shell), None);

        let reopened = build_shell(&settings);
        assert_eq!(dashboard_refusal(&reopened), None);
        Ok(())
    }

    #[test]
    fn report_actions_require_sign_in() {
        assert!(needs_dashboard("ask"));
        assert!(needs_dashboard("run_analysis"));
        assert!(!needs_dashboard("sign_in"));
        assert!(!needs_dashboard("status"));
    }
}
