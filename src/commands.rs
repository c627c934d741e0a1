use crate::cli::{Cli, Command, ExtractArgs, HistoryCommand, ReadArgs};
use crate::metadata;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rsvp_reader::reader::check_document_size;
use rsvp_reader::tokenizer::{normalize, tokenize};
use rsvp_reader::{
    DocumentKind, ExtractionProgress, FileStore, HistoryLedger, KeyValueStore, MonotonicClock,
    ReaderConfig, ReaderSession, TickOutcome, TimerQueue,
};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::Instant;

type TerminalSession = ReaderSession<TimerQueue, MonotonicClock>;

pub fn run(cli: &Cli) -> Result<()> {
    let config = ReaderConfig::load_or_default(cli.config.as_deref())?;
    log::debug!("configuration: {config:?}");

    match &cli.command {
        Command::Read(args) => read(cli, &config, args),
        Command::Extract(args) => extract(&config, args),
        Command::History(command) => history(cli, &config, command),
    }
}

fn open_store(state_dir: &Path) -> Result<Rc<dyn KeyValueStore>> {
    let store = FileStore::open(state_dir)?;
    log::debug!("state directory: {}", store.dir().display());
    Ok(Rc::new(store))
}

fn document_name(input: &Path) -> Result<String> {
    Ok(input
        .file_name()
        .context("Input file has no name")?
        .to_string_lossy()
        .into_owned())
}

fn read_document(input: &Path) -> Result<(DocumentKind, Vec<u8>)> {
    let kind = DocumentKind::from_path(input)?;
    let bytes = fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    Ok((kind, bytes))
}

fn read(cli: &Cli, config: &ReaderConfig, args: &ReadArgs) -> Result<()> {
    let (kind, bytes) = read_document(&args.input)?;
    let name = document_name(&args.input)?;

    let store = open_store(&cli.state_dir)?;
    let mut session = TerminalSession::new(store, TimerQueue::new(), MonotonicClock::new(), config);

    let progress = LoadProgress::new();
    let report = session
        .load_document(&name, bytes, kind, |p| progress.update(p))
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    progress.finish();

    eprint!("{}", metadata::format_banner(&report));
    if report.is_empty() {
        eprintln!("No readable text found in {name}");
        return Ok(());
    }

    if let Some(wpm) = args.wpm {
        session.set_pace(wpm);
    }
    if args.restart {
        session.reset();
    } else if let Some(index) = args.from_token {
        session.seek_token(index);
    } else if let Some(unit) = args.from_unit {
        session.seek_unit(unit);
    }

    present(&mut session, args.count)?;

    let state = session.state();
    eprintln!(
        "stopped at word {} of {} ({} wpm)",
        state.current_index + 1,
        session.position().len(),
        state.pace
    );
    Ok(())
}

/// Drive the pace engine from a sleeping timer loop until the document ends
/// or `limit` tokens have been shown.
fn present(session: &mut TerminalSession, limit: Option<usize>) -> Result<()> {
    let limit = limit.unwrap_or(usize::MAX).max(1);
    let mut stdout = io::stdout().lock();

    render(&mut stdout, session)?;
    let mut shown = 1;
    if shown >= limit {
        session.pause();
    } else {
        session.play();
    }

    while let Some((handle, due)) = session.scheduler_mut().pop_next() {
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }

        match session.on_tick(handle) {
            TickOutcome::Advanced(_) => {
                render(&mut stdout, session)?;
                shown += 1;
                if shown >= limit {
                    session.pause();
                }
            }
            TickOutcome::Finished => break,
            TickOutcome::Stale => {}
        }
    }

    writeln!(stdout)?;
    Ok(())
}

fn render(out: &mut impl Write, session: &TerminalSession) -> Result<()> {
    let token = session.current_token().unwrap_or_default();
    let total_units = session.total_units();
    if total_units > 0 {
        write!(
            out,
            "\r\x1b[2K{token:<24} {}/{total_units}",
            session.current_unit()
        )?;
    } else {
        write!(out, "\r\x1b[2K{token}")?;
    }
    out.flush()?;
    Ok(())
}

fn extract(config: &ReaderConfig, args: &ExtractArgs) -> Result<()> {
    let (kind, bytes) = read_document(&args.input)?;
    check_document_size(bytes.len() as u64, config.extraction.max_document_bytes)?;

    let progress = LoadProgress::new();
    let mut units = rsvp_reader::extract(bytes, kind, config.extraction.options())
        .with_context(|| format!("Failed to open {}", args.input.display()))?
        .on_progress(|p| progress.update(p));

    let mut stdout = io::stdout().lock();
    let mut written = 0;
    let mut token_count = 0;
    for unit in units.by_ref() {
        let unit = unit?;
        let text = normalize(&unit.text);
        let tokens = tokenize(&text);
        if tokens.is_empty() {
            continue;
        }
        token_count += tokens.len();

        if args.tokens {
            for token in tokens {
                writeln!(stdout, "{token}")?;
            }
        } else {
            if written > 0 {
                writeln!(stdout)?;
            }
            writeln!(stdout, "{text}")?;
        }
        written += 1;
    }
    progress.finish();

    let summary = units.summary();
    eprintln!(
        "Extracted {} words from {} of {} units of {}{}",
        token_count,
        written,
        summary.total_units,
        args.input.display(),
        if summary.is_degraded() {
            format!(" ({} unreadable)", summary.units_skipped)
        } else {
            String::new()
        }
    );
    Ok(())
}

fn history(cli: &Cli, config: &ReaderConfig, command: &HistoryCommand) -> Result<()> {
    let store = open_store(&cli.state_dir)?;
    let mut ledger = HistoryLedger::load(store, config.history.capacity);

    match command {
        HistoryCommand::List => {
            if ledger.list().is_empty() {
                println!("No reading history");
                return Ok(());
            }
            for record in ledger.list() {
                println!(
                    "{:>3}%  {:>7} words  {:>4} wpm  {}  {}",
                    record.percent(),
                    record.token_count,
                    record.pace_tokens_per_minute,
                    record.last_access_time.format("%Y-%m-%d %H:%M"),
                    record.document_name
                );
            }
        }
        HistoryCommand::Delete { name } => {
            let known = ledger.find(name).is_some();
            ledger.delete(name);
            if known {
                println!("Removed {name} from history");
            } else {
                println!("{name} is not in the history");
            }
        }
    }
    Ok(())
}

/// Progress bar shown on stderr while a document is decoded.
struct LoadProgress {
    bar: ProgressBar,
}

impl LoadProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} units {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_style(style);
        Self { bar }
    }

    fn update(&self, progress: ExtractionProgress) {
        self.bar.set_length(progress.total_units as u64);
        self.bar.set_position(progress.units_processed as u64);
        self.bar.set_message(format!("{}%", progress.percent));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
