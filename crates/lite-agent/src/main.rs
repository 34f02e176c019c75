//! A terminal chat demonstrating how to use `lite-agent` as a library.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lite_agent::core::{RunEvent, ToolCallingStyle};
use lite_agent::{SessionBuilder, Settings};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const INSTRUCTIONS: &str = "You are a helpful assistant running in a \
    terminal. Use the tools when they help, and answer concisely.";

/// Chat with an agent in the terminal.
///
/// Every option falls back to an environment variable, and a `.env` file in
/// the working directory is loaded first.
#[derive(Parser, Debug)]
#[command(name = "chat")]
struct Cli {
    /// API key of the chat completions service.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: String,
    /// Base URL of the chat completions service.
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,
    /// Model identifier.
    #[arg(long, env = "MODEL")]
    model: Option<String>,
    /// Sampling temperature.
    #[arg(long, env = "TEMPERATURE")]
    temperature: Option<f32>,
    /// Maximum number of tokens per completion.
    #[arg(long, env = "MAX_TOKENS")]
    max_tokens: Option<u32>,
    /// Maximum number of model calls per message.
    #[arg(long, env = "MAX_TURNS")]
    max_turns: Option<usize>,
    /// `native` or `tag_grammar`.
    #[arg(long, env = "TOOL_CALLING_STYLE")]
    tool_calling_style: Option<ToolCallingStyle>,
    /// Instructions given to the agent.
    #[arg(long, env = "INSTRUCTIONS")]
    instructions: Option<String>,
}

impl Cli {
    fn settings(&self) -> Settings {
        let defaults = Settings::with_api_key(self.api_key.as_str());
        Settings {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            model: self.model.clone().unwrap_or(defaults.model),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_turns: self.max_turns.unwrap_or(defaults.max_turns),
            tool_calling_style: self
                .tool_calling_style
                .unwrap_or(defaults.tool_calling_style),
            ..defaults
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Line {
    Clear,
    Content,
    Thinking,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("failed to load .env: {err}");
        }
    }
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = cli.settings();
    debug!("resolved settings: {settings:?}");
    let mut session = SessionBuilder::with_settings(&settings)
        .with_instructions(cli.instructions.as_deref().unwrap_or(INSTRUCTIONS))
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!(
        "{} {} ({}), type `quit` to leave.",
        "lite-agent".bright_cyan().bold(),
        settings.model,
        settings.tool_calling_style
    );

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit" | "q") {
            break;
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let run = session.send_message_with_events(line, move |event| {
            event_tx.send(event).ok();
        });
        let (outcome, ()) =
            tokio::join!(run, render(&mut event_rx, &progress_style));

        if let Err(err) = outcome {
            println!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_red());
        }
        let usage = session.usage();
        println!(
            "{}",
            format!(
                "tokens: {} in, {} out, {} total",
                usage.input_tokens, usage.output_tokens, usage.total_tokens
            )
            .dimmed()
        );
        println!();
    }
}

/// Prints run events until the run finishes.
async fn render(
    events: &mut UnboundedReceiver<RunEvent>,
    progress_style: &ProgressStyle,
) {
    let mut progress_bar: Option<ProgressBar> = None;
    let mut line = Line::Clear;

    loop {
        // Only spin between lines, a streaming line is progress enough.
        if line == Line::Clear {
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message("🤔 Thinking...");
                    progress_bar
                })
                .inc(1);
        }

        let sleep = sleep(Duration::from_millis(100));
        let event = select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                event
            },
            _ = sleep => {
                continue;
            }
        };

        // Finish the progress bar before printing anything else.
        if let Some(progress_bar) = progress_bar.take() {
            progress_bar.finish_and_clear();
        }

        match event {
            RunEvent::ContentDelta(text) => {
                if line != Line::Content {
                    end_line(&mut line);
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    line = Line::Content;
                }
                print!("{}", text.bright_white());
                std::io::stdout().flush().ok();
            }
            RunEvent::ThinkingDelta(text) => {
                if line != Line::Thinking {
                    end_line(&mut line);
                    print!("{}💭 ", BAR_CHAR.bright_black());
                    line = Line::Thinking;
                }
                print!("{}", text.dimmed());
                std::io::stdout().flush().ok();
            }
            RunEvent::ToolCall { name, arguments } => {
                end_line(&mut line);
                println!(
                    "{}🔧 {}({})",
                    BAR_CHAR.bright_yellow(),
                    name.bold(),
                    arguments
                );
            }
            RunEvent::ToolResult {
                success, output, ..
            } => {
                end_line(&mut line);
                let bar = BAR_CHAR.bright_yellow();
                if success {
                    println!("{bar}✅ {output}");
                } else {
                    println!("{bar}⚠️  {}", output.yellow());
                }
            }
            RunEvent::Thinking(_) | RunEvent::Answer(_) => {
                end_line(&mut line);
            }
            RunEvent::Question(_) | RunEvent::Error(_) => {}
        }
    }

    if let Some(progress_bar) = progress_bar {
        progress_bar.finish_and_clear();
    }
    end_line(&mut line);
}

fn end_line(line: &mut Line) {
    if *line != Line::Clear {
        println!();
        *line = Line::Clear;
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
