use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dataset_analyzer::config::Config;
use dataset_analyzer::display::render_table;
use dataset_analyzer::session::{help_text, Outcome, Session};
use dataset_analyzer::store::StoreState;
use dataset_analyzer::utils::app_paths::AppPaths;
use dataset_analyzer::utils::logging::{init_tracing, log_file_path};
use reedline::{
    default_emacs_keybindings, ColumnarMenu, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Signal,
};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

mod completer;

use completer::SessionCompleter;

struct SessionPrompt {
    label: String,
}

impl SessionPrompt {
    fn for_state(state: StoreState) -> Self {
        let label = match state {
            StoreState::Ephemeral => "memory".to_string(),
            StoreState::ExternalConnected(kind) => kind.to_string().to_lowercase(),
        };
        Self { label }
    }
}

impl Prompt for SessionPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{} ", self.label))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<'_, str> {
        match edit_mode {
            PromptEditMode::Default | PromptEditMode::Emacs => "> ".into(),
            PromptEditMode::Vi(vi_mode) => match vi_mode {
                reedline::PromptViMode::Normal => "N> ".into(),
                reedline::PromptViMode::Insert => "I> ".into(),
            },
            PromptEditMode::Custom(str) => format!("{str}> ").into(),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse search: {})",
            prefix, history_search.term
        ))
    }
}

struct Args {
    file: Option<PathBuf>,
    query: Option<String>,
    generate_config: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args {
        file: None,
        query: None,
        generate_config: false,
        help: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--query" | "-q" => {
                let query = iter
                    .next()
                    .context("--query needs a SQL statement")?;
                parsed.query = Some(query.clone());
            }
            "--generate-config" => parsed.generate_config = true,
            "--help" | "-h" => parsed.help = true,
            other if other.starts_with('-') => anyhow::bail!("Unknown option '{}'", other),
            other => {
                if parsed.file.is_some() {
                    anyhow::bail!("Only one data file can be given");
                }
                parsed.file = Some(PathBuf::from(other));
            }
        }
    }

    if parsed.query.is_some() && parsed.file.is_none() {
        anyhow::bail!("--query needs a data file to run against");
    }
    Ok(parsed)
}

fn print_usage() {
    println!(
        "{}",
        "Dataset Analyzer - query CSV, Excel and JSON files with SQL"
            .blue()
            .bold()
    );
    println!();
    println!("{}", "Usage:".yellow());
    println!("  dataset-analyzer [FILE] [--query SQL]");
    println!();
    println!("{}", "Options:".yellow());
    println!(
        "  {}       - Run one query against FILE and exit",
        "--query SQL".green()
    );
    println!(
        "  {} - Generate config file with defaults",
        "--generate-config".green()
    );
    println!("  {}            - Show this help", "--help".green());
    println!();
    println!("{}", "Keys:".yellow());
    println!("  {}    - Complete commands and table names", "Tab".green());
    println!("  {} - Search history", "Ctrl+R".green());
    println!("  {} - Exit", "Ctrl+D".green());
    println!();
}

fn report_error(error: &anyhow::Error, colors: bool) {
    let message = format!("Error: {:#}", error);
    if colors {
        eprintln!("{}", message.red());
    } else {
        eprintln!("{}", message);
    }
}

fn report_message(message: &str, colors: bool) {
    if message.is_empty() {
        return;
    }
    if colors {
        println!("{}", message.cyan());
    } else {
        println!("{}", message);
    }
}

fn run_once(session: &mut Session, file: &Path, query: &str) -> Result<()> {
    session.load_file(file)?;
    let result = session.execute(query)?;
    println!("{}", render_table(&result, &session.config().display));
    Ok(())
}

fn run_repl(mut session: Session, file: Option<PathBuf>) -> Result<()> {
    let colors = session.config().display.use_colors;

    println!(
        "{}",
        "Dataset Analyzer - type \\help for commands".blue().bold()
    );
    if let Some(path) = log_file_path() {
        println!("Logs: {}", path.display());
    }

    if let Some(file) = file {
        match session.load_file(&file) {
            Ok(message) => report_message(&message, colors),
            Err(e) => report_error(&e, colors),
        }
    }

    let tables = Arc::new(Mutex::new(session.table_names()));
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name("session_completion")
            .with_columns(1)
            .with_column_width(None)
            .with_column_padding(2),
    );

    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Menu("session_completion".to_string()),
    );

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(SessionCompleter::new(Arc::clone(&tables))))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let behavior = &session.config().behavior;
    if behavior.enable_history {
        match AppPaths::history_file() {
            Ok(path) => match FileBackedHistory::with_file(behavior.max_history_entries, path) {
                Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
                Err(e) => eprintln!("History disabled: {}", e),
            },
            Err(e) => eprintln!("History disabled: {}", e),
        }
    }

    loop {
        let prompt = SessionPrompt::for_state(session.store().state());
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                if buffer.trim().is_empty() {
                    continue;
                }

                match session.handle_line(&buffer) {
                    Ok(Outcome::Message(message)) => report_message(&message, colors),
                    Ok(Outcome::Table(table)) => {
                        println!("{}", render_table(&table, &session.config().display));
                    }
                    Ok(Outcome::Clear) => {
                        print!("{esc}[2J{esc}[1;1H", esc = 27 as char);
                    }
                    Ok(Outcome::Quit) => break,
                    Err(e) => report_error(&e, colors),
                }

                if let Ok(mut names) = tables.lock() {
                    *names = session.table_names();
                }
            }
            Signal::CtrlD | Signal::CtrlC => break,
        }
    }

    println!("\nGoodbye!");
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            report_error(&e, true);
            print_usage();
            std::process::exit(2);
        }
    };

    if args.help {
        print_usage();
        println!("{}", help_text());
        return Ok(());
    }

    if args.generate_config {
        let path = Config::write_default_file()?;
        println!("Configuration file created at: {}", path.display());
        println!("Edit this file to customize Dataset Analyzer.");
        return Ok(());
    }

    let logs = init_tracing();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, true);
            eprintln!("Using default settings");
            Config::default()
        }
    };

    let mut session = Session::new(config)?.with_log_buffer(logs);

    if let (Some(file), Some(query)) = (&args.file, &args.query) {
        if let Err(e) = run_once(&mut session, file, query) {
            report_error(&e, session.config().display.use_colors);
            std::process::exit(1);
        }
        return Ok(());
    }

    run_repl(session, args.file)
}
