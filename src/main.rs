use anyhow::Context;
use pocketune::browser::BrowserEntry;
use pocketune::core::{DeleteOutcome, DeletionHooks, PlayerCore};
use pocketune::queue;
use pocketune::storage::{LocalStorage, Storage};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Default)]
struct CliArgs {
    root: Option<PathBuf>,
    command: Command,
}

#[derive(Debug, Default, PartialEq, Eq)]
enum Command {
    Scan,
    #[default]
    List,
    Queue(String),
    Browse(String),
    Delete(usize),
    Next,
    Mode,
}

struct PrintHooks;

impl DeletionHooks for PrintHooks {
    fn reset_elapsed(&mut self) {
        println!("playing song removed, restarting playback");
    }

    fn file_deleted(&mut self, old_selected: usize, new_playing: usize) {
        println!("deleted #{old_selected}, now playing #{new_playing}");
    }

    fn library_emptied(&mut self) {
        println!("no more files available");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pocketune=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let storage = match args.root {
        Some(root) => LocalStorage::new(root),
        None => LocalStorage::from_env()
            .context("card root not given; pass --root or set POCKETUNE_ROOT")?,
    };
    let config = pocketune::config::load_config()?;
    let persisted = pocketune::config::load_state()?;

    let mut core = PlayerCore::from_persisted(storage, config, &persisted);
    if args.command != Command::Scan {
        core.open(persisted.queue_directory.as_deref())?;
    }

    run(&mut core, args.command)?;
    pocketune::config::save_state(&core.persisted_state())
}

fn run<S: Storage>(core: &mut PlayerCore<S>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Scan => {
            let count = core.rescan()?;
            println!("indexed {count} songs");
        }
        Command::List => print_queue(core)?,
        Command::Queue(dir) => {
            core.select_scope(&dir)?;
            print_queue(core)?;
        }
        Command::Browse(dir) => {
            core.browse(&dir)?;
            for entry in &core.state.browser.entries {
                match entry {
                    BrowserEntry::Directory { name, .. } => println!("[{name}]"),
                    BrowserEntry::Song { name, song, .. } => match song {
                        Some(song) => println!("{name}  (#{song})"),
                        None => println!("{name}  (not indexed)"),
                    },
                }
            }
        }
        Command::Delete(pos) => {
            core.state.queue.set_selected(pos)?;
            if core.delete_selected(&mut PrintHooks)? == DeleteOutcome::LibraryEmptied {
                return Ok(());
            }
            print_queue(core)?;
        }
        Command::Next => match core.next_track() {
            Some(_) => println!("{}", core.playing_path()?),
            None => println!("end of queue"),
        },
        Command::Mode => {
            core.cycle_mode();
            println!("{}", core.state.playback.mode.label());
        }
    }
    Ok(())
}

fn print_queue<S: Storage>(core: &mut PlayerCore<S>) -> anyhow::Result<()> {
    println!("{}", core.state.queue.directory());
    let playing = core.state.queue.playing();
    let selected = core.state.queue.selected();
    for pos in 0..core.state.queue.len() {
        let path = queue::path_at(&core.storage, &mut core.state, pos)?;
        let marker = match (pos == playing, pos == selected) {
            (true, _) => '>',
            (false, true) => '*',
            _ => ' ',
        };
        println!("{marker} {pos:>4}  {path}");
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut positional = Vec::new();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--root requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--root cannot be empty");
                }
                out.root = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => positional.push(other.to_string()),
        }
        index += 1;
    }

    let mut positional = positional.into_iter();
    out.command = match positional.next().as_deref() {
        None | Some("list") => Command::List,
        Some("scan") => Command::Scan,
        Some("next") => Command::Next,
        Some("mode") => Command::Mode,
        Some("queue") => Command::Queue(
            positional
                .next()
                .context("queue requires a directory")?,
        ),
        Some("browse") => Command::Browse(positional.next().unwrap_or_else(|| String::from("/"))),
        Some("delete") => {
            let raw = positional.next().context("delete requires a queue position")?;
            Command::Delete(
                raw.parse()
                    .with_context(|| format!("invalid queue position {raw}"))?,
            )
        }
        Some(other) => anyhow::bail!("unknown command {other}"),
    };
    if let Some(extra) = positional.next() {
        anyhow::bail!("unexpected argument {extra}");
    }
    Ok(out)
}

fn print_help() {
    println!("pocketune [--root DIR] [COMMAND]");
    println!("  --root DIR        Card root (default: $POCKETUNE_ROOT)");
    println!("  scan              Rebuild the library index");
    println!("  list              Show the playback queue");
    println!("  queue DIR         Scope the queue to DIR");
    println!("  browse [DIR]      List a directory");
    println!("  delete POS        Delete the song at queue position POS");
    println!("  next              Advance to the next track");
    println!("  mode              Cycle the playback mode");
}
