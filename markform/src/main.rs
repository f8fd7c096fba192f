//! Markdown form engine CLI.
//!
//! Reads a form document, reports on it, applies patches, or runs an agent
//! fill loop against it. JSON reports go to stdout; diagnostics go to stderr.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use markform::agents::CommandAgent;
use markform::config::load_config;
use markform::exit_codes;
use markform::harness::{CancelToken, FillStatus, HarnessConfig, run_fill};
use markform::inspect::{FillMode, InspectOptions, inspect};
use markform::io::write_atomic;
use markform::model::ParsedForm;
use markform::parse::parse;
use markform::patch::{ApplyStatus, Patch, apply};
use markform::serialize::{SerializeOptions, serialize};
use markform::validate::{Severity, validate};

#[derive(Parser)]
#[command(name = "markform", version, about = "Typed form documents in Markdown")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a form and report validation issues.
    Validate {
        form: PathBuf,
    },
    /// Report structure, progress, and open issues as JSON.
    Inspect {
        form: PathBuf,
        /// Roles in scope ("*" for all).
        #[arg(long, value_delimiter = ',', default_value = "*")]
        roles: Vec<String>,
        /// Also list already-filled fields for refill.
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        max_issues: Option<usize>,
    },
    /// Apply a JSON patch batch (from file or stdin) and write the form back.
    Apply {
        form: PathBuf,
        /// Patch JSON file; reads stdin when omitted.
        #[arg(long)]
        patches: Option<PathBuf>,
        /// Report without writing the form back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the canonical serialization of a form.
    Render {
        form: PathBuf,
        /// Regenerate from the schema instead of preserving prose.
        #[arg(long)]
        regenerate: bool,
    },
    /// Run the configured agent until the form completes or a budget runs out.
    Fill {
        form: PathBuf,
        /// Config file (defaults to markform.toml next to the form).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Turn budget for this invocation.
        #[arg(long)]
        max_turns: Option<u32>,
        /// Revisit already-filled fields.
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() {
    markform::logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Validate { form } => cmd_validate(&form),
        Command::Inspect {
            form,
            roles,
            overwrite,
            max_issues,
        } => cmd_inspect(&form, roles, overwrite, max_issues),
        Command::Apply {
            form,
            patches,
            dry_run,
        } => cmd_apply(&form, patches.as_deref(), dry_run),
        Command::Render { form, regenerate } => cmd_render(&form, regenerate),
        Command::Fill {
            form,
            config,
            max_turns,
            overwrite,
        } => cmd_fill(&form, config.as_deref(), max_turns, overwrite),
    }
}

fn load_form(path: &Path) -> Result<ParsedForm> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse(&text).with_context(|| format!("parse {}", path.display()))
}

fn save_form(path: &Path, form: &ParsedForm) -> Result<()> {
    let text = serialize(form, &SerializeOptions::default());
    write_atomic(path, &text).with_context(|| format!("write {}", path.display()))
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let form = load_form(path)?;
    let issues = validate(&form);
    for issue in &issues {
        let target = issue
            .field_id
            .as_deref()
            .or(issue.note_id.as_deref())
            .unwrap_or("form");
        let kind = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{kind}: {target}: {}", issue.message);
    }
    let has_errors = issues
        .iter()
        .any(|issue| issue.severity == Severity::Error);
    Ok(if has_errors {
        exit_codes::INVALID
    } else {
        exit_codes::OK
    })
}

fn cmd_inspect(
    path: &Path,
    roles: Vec<String>,
    overwrite: bool,
    max_issues: Option<usize>,
) -> Result<i32> {
    let form = load_form(path)?;
    let options = InspectOptions {
        roles,
        fill_mode: if overwrite {
            FillMode::Overwrite
        } else {
            FillMode::Continue
        },
        max_issues,
    };
    let report = inspect(&form, &options);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize report")?
    );
    Ok(exit_codes::OK)
}

fn cmd_apply(path: &Path, patches_path: Option<&Path>, dry_run: bool) -> Result<i32> {
    let form = load_form(path)?;
    let raw = match patches_path {
        Some(p) => fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read patches from stdin")?;
            buf
        }
    };
    let patches: Vec<Patch> = serde_json::from_str(&raw).context("parse patch JSON")?;
    let result = apply(&form, &patches);

    let report = serde_json::json!({
        "status": result.status,
        "applied": result.applied,
        "rejections": result.rejections,
        "warnings": result.warnings,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize report")?
    );
    if !dry_run {
        save_form(path, &result.form)?;
    }
    Ok(match result.status {
        ApplyStatus::Applied => exit_codes::OK,
        ApplyStatus::Rejected => exit_codes::INVALID,
    })
}

fn cmd_render(path: &Path, regenerate: bool) -> Result<i32> {
    let form = load_form(path)?;
    let options = SerializeOptions {
        preserve_content: !regenerate,
    };
    print!("{}", serialize(&form, &options));
    Ok(exit_codes::OK)
}

fn cmd_fill(
    path: &Path,
    config_path: Option<&Path>,
    max_turns: Option<u32>,
    overwrite: bool,
) -> Result<i32> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.with_file_name("markform.toml"));
    let config = load_config(&config_path)?;
    if config.agent.command.is_empty() {
        bail!(
            "no agent.command configured in {}",
            config_path.display()
        );
    }

    let form = load_form(path)?;
    let mut harness = HarnessConfig::from_form(&form);
    harness.max_turns = harness.max_turns.min(config.max_turns).max(1);
    harness.max_turns_this_call = max_turns;
    if overwrite {
        harness.fill_mode = FillMode::Overwrite;
    }
    harness.target_roles = vec![config.agent.role.clone()];

    let mut agent = CommandAgent::new(
        config.agent.command.clone(),
        Duration::from_secs(config.agent_timeout_secs),
        config.agent_output_limit_bytes,
    )?
    .with_role(config.agent.role.clone());

    let outcome = run_fill(form, &mut agent, &harness, &CancelToken::new());
    save_form(path, &outcome.form)?;

    eprintln!(
        "turns: {}, applied: {}, rejected: {}",
        outcome.turns_executed, outcome.patches_applied, outcome.patches_rejected
    );
    Ok(match outcome.status {
        FillStatus::Complete => exit_codes::OK,
        FillStatus::Partial(reason) => {
            eprintln!("partial: {reason:?}");
            exit_codes::PARTIAL
        }
        FillStatus::Cancelled => exit_codes::FAILED,
        FillStatus::Failed { error } => {
            eprintln!("agent failed: {error}");
            exit_codes::FAILED
        }
    })
}
