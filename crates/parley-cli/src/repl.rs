use chrono::Local;
use parley_agent::{MessageDispatcher, StreamEvent, TurnOutcome};
use parley_core::ParleyResult;
use parley_ingest::{read_file, UploadedFile};
use parley_session::{export_file_name, render_markdown, ChatSession, ChatSettings};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Commands:
  /new            start a new chat
  /file PATH      attach a PDF, text, markdown or JSON file
  /export [PATH]  save the conversation as markdown
  /quit           leave
Anything else is sent to Claude.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    File(PathBuf),
    Export(Option<PathBuf>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "new" => Command::New,
        "file" if !arg.is_empty() => Command::File(PathBuf::from(arg)),
        "export" if arg.is_empty() => Command::Export(None),
        "export" => Command::Export(Some(PathBuf::from(arg))),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Interactive terminal chat over a single session.
pub struct Repl {
    dispatcher: MessageDispatcher,
    session: ChatSession,
}

impl Repl {
    pub fn new(dispatcher: MessageDispatcher, settings: ChatSettings) -> Self {
        Self {
            dispatcher,
            session: ChatSession::with_settings(settings),
        }
    }

    /// Reads the file at `path` into the upload buffer. Returns whether any
    /// text was buffered.
    pub fn attach(&mut self, path: &Path) -> ParleyResult<bool> {
        let file = UploadedFile::from_path(path)?;
        let text = read_file(&file)?;
        Ok(self.session.buffer_file_text(text))
    }

    /// Writes the visible transcript and returns the path used.
    pub fn export(&self, path: Option<PathBuf>) -> ParleyResult<PathBuf> {
        let path = path.unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().date_naive())));
        std::fs::write(&path, render_markdown(self.session.visible()))?;
        Ok(path)
    }

    pub async fn run(mut self, files: Vec<PathBuf>) -> anyhow::Result<()> {
        println!(
            "Parley ({}, {} style). Type /help for commands.",
            self.session.settings.model,
            self.session.settings.style.name()
        );
        for path in &files {
            self.report_attach(path);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_line(&line) {
                Command::Empty => {}
                Command::Help => println!("{HELP}"),
                Command::Quit => break,
                Command::Unknown(cmd) => println!("Unknown command: {cmd}. Type /help."),
                Command::New => {
                    self.session.reset();
                    println!("Started a new chat.");
                }
                Command::File(path) => self.report_attach(&path),
                Command::Export(path) => match self.export(path) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => println!("Export failed: {e}"),
                },
                Command::Send(text) => self.send(&text).await?,
            }
        }
        debug!(session_id = %self.session.id, "REPL finished");
        Ok(())
    }

    async fn send(&mut self, text: &str) -> anyhow::Result<()> {
        let mut thinking = false;
        let outcome = self
            .dispatcher
            .send_message(&mut self.session, text, |event| match event {
                StreamEvent::ThinkingDelta { text } => {
                    thinking = true;
                    eprint!("{text}");
                }
                StreamEvent::TextDelta { text } => {
                    if thinking {
                        eprintln!();
                        thinking = false;
                    }
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                _ => {}
            })
            .await;

        match outcome {
            TurnOutcome::Completed { .. } => println!(),
            TurnOutcome::Failed { notice } => {
                println!();
                eprintln!("{notice}");
            }
        }
        Ok(())
    }

    fn report_attach(&mut self, path: &Path) {
        match self.attach(path) {
            Ok(true) => println!(
                "Attached {} ({} file(s) waiting)",
                path.display(),
                self.session.file_context().len()
            ),
            Ok(false) => println!("Ignored {}: unsupported or empty", path.display()),
            Err(e) => println!("Could not read {}: {e}", path.display()),
        }
    }
}
