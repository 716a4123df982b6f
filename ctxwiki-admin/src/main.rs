use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ctxwiki_core::commands::init::default_root;
use ctxwiki_core::commands::{ensure_initialized, review_files, Commands, SessionNote, SessionUpdate, UpdateOutcome};
use ctxwiki_core::services::{ClassificationPrompt, FixedAnswer, ReviewPolicy};
use ctxwiki_core::WikiError;

#[derive(Parser)]
#[command(name = "ctxwiki", about = "Consolidate session summaries into per-project context wikis")]
struct Cli {
    /// State root (config.toml, state/, context/). Defaults to $CTXWIKI_ROOT or ~/.ctxwiki
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the state root and a default config.toml (idempotent)
    Init,
    /// Merge a proposed wiki into the project's persisted wiki
    Update {
        /// Working directory of the ended session
        #[arg(long, default_value = ".")]
        cwd: PathBuf,
        /// Proposed wiki markdown; `-` reads stdin
        #[arg(long)]
        wiki: PathBuf,
        /// Proposed architecture prose
        #[arg(long)]
        architecture: Option<PathBuf>,
        /// Architecture prose for the shared root of a monorepo pair
        #[arg(long)]
        root_architecture: Option<PathBuf>,
        /// One-line session summary added to Recent Work
        #[arg(long)]
        summary: Option<String>,
        /// Topic tag for the summary line (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Date of the summary line (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
        /// Answer the monorepo question up front instead of prompting
        #[arg(long)]
        monorepo: Option<bool>,
        #[arg(long)]
        json: bool,
    },
    /// Review a wiki revision against its predecessor without writing
    Review {
        #[arg(long)]
        new_wiki: PathBuf,
        #[arg(long)]
        old_wiki: Option<PathBuf>,
        #[arg(long)]
        new_architecture: Option<PathBuf>,
        #[arg(long)]
        old_architecture: Option<PathBuf>,
    },
    /// Show which wiki documents an update from a directory would touch
    Resolve {
        #[arg(long, default_value = ".")]
        cwd: PathBuf,
        #[arg(long)]
        monorepo: Option<bool>,
    },
}

/// One directive per crate target: this binary (`ctxwiki`) and the library.
const DEFAULT_LOG_FILTER: &str = "ctxwiki=info,ctxwiki_core=info";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let root = cli.root.clone().unwrap_or_else(default_root);
    tracing::debug!(root = %root.display(), "state root");
    match cli.cmd {
        Cmd::Init => init(&root),
        Cmd::Update {
            cwd,
            wiki,
            architecture,
            root_architecture,
            summary,
            topics,
            date,
            monorepo,
            json,
        } => {
            let note = summary
                .map(|summary| -> Result<SessionNote> {
                    let date = match date.as_deref() {
                        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                            .with_context(|| format!("invalid --date {d}"))?,
                        None => Local::now().date_naive(),
                    };
                    Ok(SessionNote { date, summary, topics })
                })
                .transpose()?;
            let req = SessionUpdate {
                cwd,
                proposed_wiki: read_input(&wiki)?,
                proposed_architecture: architecture.as_deref().map(read_input).transpose()?.unwrap_or_default(),
                root_architecture: root_architecture.as_deref().map(read_input).transpose()?,
                session_note: note,
            };
            update(&root, &req, monorepo, json)
        }
        Cmd::Review {
            new_wiki,
            old_wiki,
            new_architecture,
            old_architecture,
        } => review(
            &root,
            &new_wiki,
            old_wiki.as_deref(),
            new_architecture.as_deref(),
            old_architecture.as_deref(),
        ),
        Cmd::Resolve { cwd, monorepo } => resolve(&root, &cwd, monorepo),
    }
}

fn init(root: &Path) -> Result<()> {
    let report = ensure_initialized(root)?;
    println!("initialized {}", report.root.display());
    for c in &report.created {
        println!("  created {c}");
    }
    Ok(())
}

fn update(root: &Path, req: &SessionUpdate, monorepo: Option<bool>, json: bool) -> Result<()> {
    let cmds = Commands::open(root)?;
    let prompt = prompt_for(monorepo);
    let outcome = match cmds.update(req, prompt.as_ref()) {
        Ok(o) => o,
        Err(e) => {
            match e.downcast_ref::<WikiError>() {
                Some(WikiError::Busy { project }) => {
                    eprintln!("busy: another update for {project} is in flight; skipped");
                    return Ok(());
                }
                Some(WikiError::MustFixViolation { issues }) => {
                    eprintln!("reverted: review gate blocked commit");
                    for i in issues {
                        eprintln!("  must_fix: {i}");
                    }
                }
                _ => {}
            }
            return Err(e);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome {
        UpdateOutcome::Excluded { cwd } => println!("excluded: {}", cwd.display()),
        UpdateOutcome::Throttled {
            project,
            retry_after_secs,
        } => println!("throttled: {project} (retry in {retry_after_secs}s)"),
        UpdateOutcome::Committed { result, .. } => {
            println!("committed {} ({})", result.project, result.verdict().as_str());
            for f in &result.files {
                println!("  wrote {}", f.display());
            }
            for n in result.notes() {
                println!("  {n}");
            }
            if let Some(e) = result.sync_error() {
                eprintln!("warning: {e}");
            }
        }
    }
    Ok(())
}

fn review(
    root: &Path,
    new_wiki: &Path,
    old_wiki: Option<&Path>,
    new_arch: Option<&Path>,
    old_arch: Option<&Path>,
) -> Result<()> {
    let policy = match ctxwiki_core::config::CoreConfig::load(root) {
        Ok(cfg) => ReviewPolicy::from(&cfg.wiki),
        Err(_) => ReviewPolicy::default(),
    };
    let review = review_files(new_wiki, old_wiki, new_arch, old_arch, &policy)?;
    println!("{}", review.verdict.as_str());
    for n in review.notes() {
        println!("  {n}");
    }
    anyhow::ensure!(!review.blocks_commit(false), "review gate would block this revision");
    Ok(())
}

fn resolve(root: &Path, cwd: &Path, monorepo: Option<bool>) -> Result<()> {
    let cmds = Commands::open(root)?;
    let prompt = prompt_for(monorepo);
    let (resolution, targets) = cmds.resolve(cwd, prompt.as_ref())?;
    println!("root: {}", resolution.root.display());
    if let Some(ws) = &resolution.workspace {
        println!("workspace: {}", ws.display());
    }
    for t in targets {
        println!("{} {} -> {}", t.label, t.identity(), t.wiki_path.display());
    }
    Ok(())
}

// ---------- helpers ----------

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).context("reading stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn prompt_for(answer: Option<bool>) -> Box<dyn ClassificationPrompt> {
    match answer {
        Some(a) => Box::new(FixedAnswer::new(a)),
        None => Box::new(StdinPrompt),
    }
}

/// Asks on stderr, reads `y`/`n` from stdin. Without a terminal, or on EOF,
/// there is no answer and nothing gets persisted.
struct StdinPrompt;

impl ClassificationPrompt for StdinPrompt {
    fn is_monorepo(&self, root: &Path, workspace: &Path) -> Result<Option<bool>> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        let mut err = io::stderr();
        write!(
            err,
            "{} looks like a monorepo. Keep a separate wiki for {} next to the shared root wiki? [y/N] ",
            root.display(),
            workspace.display()
        )?;
        err.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_names_both_crates() {
        let targets: Vec<&str> = DEFAULT_LOG_FILTER
            .split(',')
            .filter_map(|d| d.split('=').next())
            .collect();
        assert!(targets.contains(&env!("CARGO_CRATE_NAME")));
        assert!(targets.contains(&"ctxwiki_core"));
        let _ = EnvFilter::new(DEFAULT_LOG_FILTER);
    }
}
