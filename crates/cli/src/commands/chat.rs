//! `docforge chat`: an interactive local session.
//!
//! Plain lines are commands. `?question` asks a query, `/edit name text`
//! overwrites a representation, `/ingest path` folds a local file into the
//! knowledge representation and `/show` prints every representation.

use async_trait::async_trait;
use docforge_config::AppConfig;
use docforge_core::event::{ProgressEvent, ProgressSink};
use docforge_core::message::ChatTurn;
use docforge_engine::{Action, ActionOutcome, BotEngine, FileRef, Session};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line of chat input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput {
    Action(Action),
    Show,
    Help,
    Exit,
}

fn parse_line(line: &str, history: &[ChatTurn]) -> Result<Option<ChatInput>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let input = match line {
        "exit" | "quit" | "/exit" | "/quit" => ChatInput::Exit,
        "/show" => ChatInput::Show,
        "/help" => ChatInput::Help,
        _ => {
            if let Some(question) = line.strip_prefix('?') {
                let question = question.trim();
                if question.is_empty() {
                    return Err("usage: ?question".into());
                }
                ChatInput::Action(Action::Query {
                    utterance: question.to_string(),
                    history: history.to_vec(),
                })
            } else if let Some(rest) = line.strip_prefix("/edit") {
                let (name, text) = rest
                    .trim_start()
                    .split_once(char::is_whitespace)
                    .ok_or("usage: /edit <name> <text>")?;
                ChatInput::Action(Action::Edit {
                    name: name.to_string(),
                    text: text.trim().to_string(),
                })
            } else if let Some(path) = line.strip_prefix("/ingest") {
                let path = path.trim();
                if path.is_empty() {
                    return Err("usage: /ingest <path>".into());
                }
                ChatInput::Action(Action::Ingest {
                    files: vec![FileRef::path(path)],
                })
            } else if line.starts_with('/') {
                return Err(format!("unknown command '{line}', try /help"));
            } else {
                ChatInput::Action(Action::Command {
                    utterance: line.to_string(),
                    history: history.to_vec(),
                })
            }
        }
    };
    Ok(Some(input))
}

/// Prints every notification the engine emits.
struct PrintSink;

#[async_trait]
impl ProgressSink for PrintSink {
    async fn notify(&self, event: ProgressEvent) {
        println!();
        for line in event.message.lines() {
            println!("  Bot > {line}");
        }
        println!();
    }
}

/// Conversation turns an action adds to the history.
fn turns(action: &Action, outcome: &ActionOutcome) -> Option<[ChatTurn; 2]> {
    match (action, outcome) {
        (Action::Command { utterance, .. }, ActionOutcome::Command(done)) => {
            Some([ChatTurn::user(utterance.as_str()), ChatTurn::bot(done.summary.as_str())])
        }
        (Action::Query { utterance, .. }, ActionOutcome::Query(answer)) => {
            Some([ChatTurn::user(utterance.as_str()), ChatTurn::bot(answer.response.as_str())])
        }
        _ => None,
    }
}

async fn show(session: &Session) {
    for representation in session.snapshot().await {
        println!("  ── {} ──", representation.name);
        if representation.text.is_empty() {
            println!("  (empty)");
        }
        for line in representation.text.lines() {
            println!("  {line}");
        }
        println!();
    }
}

fn print_help() {
    println!("  <text>               Instruct the bot to change its documents");
    println!("  ?<question>          Ask a question");
    println!("  /edit <name> <text>  Overwrite a representation");
    println!("  /ingest <path>       Fold a local file into the knowledge base");
    println!("  /show                Print every representation");
    println!("  exit                 Quit");
}

pub async fn run(bot: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let bot = bot.unwrap_or_else(|| config.bot.clone());

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Export OPENAI_API_KEY (or DOCFORGE_API_KEY), or add it to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let engine: BotEngine = docforge_gateway::build_engines(&config)?
        .into_iter()
        .find(|e| e.variant().name == bot)
        .ok_or_else(|| format!("Unknown bot '{bot}'"))?;
    let session = Session::new("cli", engine.variant());

    println!();
    println!("  docforge chat: {}", engine.variant().name);
    println!("  {}", engine.variant().description);
    println!();
    println!("  Model:            {}", config.default_model);
    println!(
        "  Representations:  {}",
        engine.variant().schema.names().collect::<Vec<_>>().join(", ")
    );
    println!();
    println!("  Type /help for commands, 'exit' or Ctrl+C to quit.");
    println!();

    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line, &history) {
            Ok(None) => {}
            Ok(Some(ChatInput::Exit)) => break,
            Ok(Some(ChatInput::Show)) => show(&session).await,
            Ok(Some(ChatInput::Help)) => print_help(),
            Ok(Some(ChatInput::Action(action))) => {
                debug!(action = action.kind(), history = history.len(), "Chat input");
                // Failures were already reported through the sink.
                if let Ok(outcome) = engine.handle(&session, action.clone(), &PrintSink).await
                    && let Some(new_turns) = turns(&action, &outcome)
                {
                    history.extend(new_turns);
                }
            }
            Err(usage) => eprintln!("  [Error] {usage}"),
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
