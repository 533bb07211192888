use mediashelf::catalog::{CatalogSource, LocatorResolver};
use mediashelf::config::{self, Settings};
use mediashelf::history::{HistoryKind, HistoryStore};
use mediashelf::indexer::MediaIndexer;
use mediashelf::kv::{JsonFileStore, KeyValueStore};
use mediashelf::library::DirectoryCatalog;
use mediashelf::model::{KindFilter, MediaKind, MediaRecord};
use mediashelf::player_log::PlayerLog;
use mediashelf::session::BrowseSession;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
enum Command {
    Scan,
    Folders,
    Folder(i64),
    Search(String),
    Play(i64),
    Stream(String),
    History(HistoryAction),
    Logs(LogAction),
    Settings(SettingsAction),
}

#[derive(Debug)]
enum SettingsAction {
    Show,
    Save,
}

#[derive(Debug)]
enum HistoryAction {
    List(HistoryKind),
    Remove(HistoryKind, String),
    Clear(HistoryKind),
}

#[derive(Debug)]
enum LogAction {
    Show,
    Add(String),
    Clear,
}

#[derive(Debug, Default)]
struct CliArgs {
    command: Option<Command>,
    kind: Option<MediaKind>,
    filter: Option<KindFilter>,
    query: Option<String>,
    roots: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = parse_args(std::env::args().skip(1).collect())?;
    let Some(command) = args.command else {
        print_help();
        return Ok(());
    };

    let mut settings = config::load_settings()?;
    if !args.roots.is_empty() {
        settings.video_roots = args.roots.clone();
        settings.audio_roots = args.roots.clone();
    }
    let filter = args.filter.unwrap_or(settings.default_filter);
    settings.default_filter = filter;

    if let Command::Settings(action) = command {
        return run_settings(&settings, action);
    }

    config::ensure_config_dir()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(config::store_path()?)?);
    let histories = Arc::new(HistoryStore::open(store.clone(), settings.history_caps));
    let log = PlayerLog::open(store, settings.log_cap);

    match command {
        Command::History(action) => run_history(&histories, action),
        Command::Logs(action) => run_logs(&log, action),
        Command::Stream(url) => {
            let session = browse_session(&settings, histories, filter);
            let title = session.play_stream(&url)?;
            log.add(&format!("stream opened: {url}"))?;
            println!("{title}\t{url}");
            Ok(())
        }
        Command::Scan => {
            let mut session = browse_session(&settings, histories, filter);
            let kind = args.kind.unwrap_or(MediaKind::Video);
            let pending = session.refresh(kind);
            let complete = loop {
                if let Some(complete) = session.poll(&pending)? {
                    break complete;
                }
                debug!(%kind, "scan still running");
                thread::sleep(SCAN_POLL_INTERVAL);
            };
            if !complete {
                eprintln!("{}", session.last_error().unwrap_or("scan incomplete"));
            }
            for record in session.records() {
                print_record(record);
            }
            Ok(())
        }
        other => {
            let mut session = browse_session(&settings, histories, filter);
            if !session.scan_blocking()? {
                eprintln!("{}", session.last_error().unwrap_or("scan incomplete"));
            }
            run_browse(&mut session, &log, other)
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env("MEDIASHELF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn browse_session(
    settings: &Settings,
    histories: Arc<HistoryStore>,
    filter: KindFilter,
) -> BrowseSession {
    let catalog = Arc::new(DirectoryCatalog::new(
        settings.video_roots.clone(),
        settings.audio_roots.clone(),
    ));
    let source: Arc<dyn CatalogSource> = catalog.clone();
    let resolver: Arc<dyn LocatorResolver> = catalog;
    BrowseSession::new(MediaIndexer::new(source, resolver), histories, filter)
}

fn run_browse(session: &mut BrowseSession, log: &PlayerLog, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Folders => {
            let filter = session.filter();
            let folders = session.folders();
            if folders.is_empty() {
                println!("{}", filter.empty_message());
            }
            for folder in folders {
                println!(
                    "{}\t{}\t{}\t{}",
                    folder.id,
                    folder.name,
                    folder.count_label(filter),
                    folder.path
                );
            }
        }
        Command::Folder(folder_id) => {
            for record in session.folder_items(folder_id) {
                print_record(record);
            }
        }
        Command::Search(query) => {
            session.set_query(Some(query));
            for record in session.search() {
                print_record(record);
            }
        }
        Command::Play(record_id) => {
            let Some(record) = session
                .records()
                .iter()
                .find(|record| record.id == record_id)
                .cloned()
            else {
                anyhow::bail!("no record with id {record_id}");
            };
            let kind = session.play(&record)?;
            log.add(&format!("{kind} playback: {}", record.title))?;
            info!(id = record.id, %kind, "playback recorded");
            println!("{}\t{}", kind, record.locator);
        }
        other => anyhow::bail!("{other:?} is not a browse command"),
    }
    Ok(())
}

fn run_history(histories: &HistoryStore, action: HistoryAction) -> anyhow::Result<()> {
    match action {
        HistoryAction::List(kind) => {
            for entry in histories.list(kind) {
                match entry.title {
                    Some(title) => println!("{}\t{}\t{title}", entry.timestamp, entry.key),
                    None => println!("{}\t{}", entry.timestamp, entry.key),
                }
            }
        }
        HistoryAction::Remove(kind, key) => {
            if !histories.remove(kind, &key)? {
                eprintln!("{key} is not in the {} history", kind.label());
            }
        }
        HistoryAction::Clear(kind) => {
            histories.clear(kind)?;
            info!(history = kind.label(), "history cleared");
        }
    }
    Ok(())
}

fn run_settings(settings: &Settings, action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => println!("{}", serde_json::to_string_pretty(settings)?),
        SettingsAction::Save => {
            config::save_settings(settings)?;
            info!(path = %config::settings_path()?.display(), "settings saved");
        }
    }
    Ok(())
}

fn run_logs(log: &PlayerLog, action: LogAction) -> anyhow::Result<()> {
    match action {
        LogAction::Show => println!("{}", log.formatted()),
        LogAction::Add(message) => log.add(&message)?,
        LogAction::Clear => log.clear()?,
    }
    Ok(())
}

fn print_record(record: &MediaRecord) {
    println!(
        "{}\t{}\t{}\t{}\t{}",
        record.id,
        record.title,
        record.formatted_duration(),
        record.formatted_size(),
        record.path
    );
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--kind" => {
                index += 1;
                let value = flag_value(&args, index, "--kind")?;
                out.kind = Some(value.parse().map_err(anyhow::Error::msg)?);
            }
            "--filter" => {
                index += 1;
                let value = flag_value(&args, index, "--filter")?;
                out.filter = Some(value.parse().map_err(anyhow::Error::msg)?);
            }
            "--query" => {
                index += 1;
                out.query = Some(flag_value(&args, index, "--query")?.to_string());
            }
            "--root" => {
                index += 1;
                out.roots.push(PathBuf::from(flag_value(&args, index, "--root")?));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with("--") => anyhow::bail!("unknown argument {other}"),
            other => positional.push(other.to_string()),
        }
        index += 1;
    }

    out.command = match parse_command(&positional)? {
        Some(Command::Search(words)) if words.is_empty() => match out.query.take() {
            Some(query) => Some(Command::Search(query)),
            None => anyhow::bail!("search needs text or --query"),
        },
        command => command,
    };
    reject_unused_flags(&out)?;
    Ok(out)
}

fn reject_unused_flags(args: &CliArgs) -> anyhow::Result<()> {
    let Some(command) = &args.command else {
        return Ok(());
    };
    let browses = matches!(
        command,
        Command::Scan | Command::Folders | Command::Folder(_) | Command::Search(_) | Command::Play(_)
    );
    let saves = matches!(command, Command::Settings(SettingsAction::Save));

    if args.kind.is_some() && !matches!(command, Command::Scan) {
        anyhow::bail!("--kind only applies to scan");
    }
    if args.query.is_some() {
        anyhow::bail!("--query only applies to search, without search text");
    }
    if args.filter.is_some()
        && !(saves || matches!(command, Command::Folders | Command::Folder(_) | Command::Search(_)))
    {
        anyhow::bail!("--filter only applies to folders, folder, search and settings save");
    }
    if !args.roots.is_empty() && !(browses || saves) {
        anyhow::bail!("--root does not apply to this command");
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> anyhow::Result<&'a str> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.trim())
}

fn parse_command(words: &[String]) -> anyhow::Result<Option<Command>> {
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["scan"] => Command::Scan,
        ["folders"] => Command::Folders,
        ["folder", id] => Command::Folder(id.parse()?),
        ["search", query @ ..] => Command::Search(query.join(" ")),
        ["play", id] => Command::Play(id.parse()?),
        ["stream", url] => Command::Stream(url.to_string()),
        ["history", kind] | ["history", "list", kind] => {
            Command::History(HistoryAction::List(parse_history_kind(kind)?))
        }
        ["history", "remove", kind, key] => Command::History(HistoryAction::Remove(
            parse_history_kind(kind)?,
            key.to_string(),
        )),
        ["history", "clear", kind] => {
            Command::History(HistoryAction::Clear(parse_history_kind(kind)?))
        }
        ["settings"] | ["settings", "show"] => Command::Settings(SettingsAction::Show),
        ["settings", "save"] => Command::Settings(SettingsAction::Save),
        ["logs"] | ["logs", "show"] => Command::Logs(LogAction::Show),
        ["logs", "clear"] => Command::Logs(LogAction::Clear),
        ["logs", "add", message @ ..] if !message.is_empty() => {
            Command::Logs(LogAction::Add(message.join(" ")))
        }
        other => anyhow::bail!("unknown command {}", other.join(" ")),
    };
    Ok(Some(command))
}

fn parse_history_kind(word: &str) -> anyhow::Result<HistoryKind> {
    word.parse().map_err(anyhow::Error::msg)
}

fn print_help() {
    println!("mediashelf");
    println!("  scan [--kind video|audio]       List indexed records, newest first");
    println!("  folders [--filter all|video|audio]");
    println!("  folder <id>                     Records of one folder");
    println!("  search <text> | --query <text>  Match title or folder label");
    println!("  play <id>                       Record a playback start");
    println!("  stream <url>                    Remember an http(s) stream");
    println!("  history [list|clear] <video|audio|stream>");
    println!("  history remove <kind> <key>");
    println!("  logs [show|clear|add <text>]");
    println!("  settings [show|save]            Save keeps --root and --filter");
    println!("  --root DIR                      Scan DIR instead of configured roots");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_command() {
        let parsed =
            parse_args(args(&["folders", "--filter", "audio", "--root", "/media"])).expect("parse");
        assert!(matches!(parsed.command, Some(Command::Folders)));
        assert_eq!(parsed.filter, Some(KindFilter::AudioOnly));
        assert_eq!(parsed.roots, vec![PathBuf::from("/media")]);
    }

    #[test]
    fn joins_search_words() {
        let parsed = parse_args(args(&["search", "road", "trip"])).expect("parse");
        assert!(matches!(parsed.command, Some(Command::Search(ref q)) if q == "road trip"));
    }

    #[test]
    fn search_falls_back_to_query_flag() {
        let parsed = parse_args(args(&["search", "--query", "beach"])).expect("parse");
        assert!(matches!(parsed.command, Some(Command::Search(ref q)) if q == "beach"));
        assert!(parse_args(args(&["search"])).is_err());
    }

    #[test]
    fn flags_a_command_does_not_use_are_rejected() {
        assert!(parse_args(args(&["folders", "--query", "beach"])).is_err());
        assert!(parse_args(args(&["search", "beach", "--query", "sand"])).is_err());
        assert!(parse_args(args(&["folders", "--kind", "audio"])).is_err());
        assert!(parse_args(args(&["play", "4", "--filter", "all"])).is_err());
        assert!(parse_args(args(&["history", "video", "--root", "/media"])).is_err());
        assert!(parse_args(args(&["logs", "--filter", "audio"])).is_err());

        assert!(parse_args(args(&["scan", "--kind", "audio", "--root", "/media"])).is_ok());
        assert!(parse_args(args(&["settings", "save", "--root", "/media", "--filter", "all"])).is_ok());
    }

    #[test]
    fn history_commands_take_a_kind() {
        let parsed = parse_args(args(&["history", "clear", "stream"])).expect("parse");
        assert!(matches!(
            parsed.command,
            Some(Command::History(HistoryAction::Clear(HistoryKind::Stream)))
        ));
        assert!(parse_args(args(&["history", "clear", "photos"])).is_err());
    }

    #[test]
    fn rejects_missing_flag_values_and_unknown_flags() {
        assert!(parse_args(args(&["scan", "--kind"])).is_err());
        assert!(parse_args(args(&["scan", "--verbose"])).is_err());
        assert!(parse_args(args(&["rescan"])).is_err());
    }
}
