//! Bugtrail CLI - Bug report lifecycle tracking for humans and AI agents.

use bugtrail::action_log::{self, ActionLog, ActionLogSettings};
use bugtrail::cli::{
    AiCommands, Cli, Commands, ConfigCommands, DevCommands, ListSort, ManagerCommands,
    SystemCommands, TesterCommands,
};
use bugtrail::commands::{self, Context, Output, ReportArgs, ai, developer, manager, tester};
use bugtrail::config::{ConfigOverrides, OutputFormat, resolve_config};
use bugtrail::logging;
use bugtrail::storage::{BugSort, Storage, find_git_root, get_storage_dir};
use clap::{CommandFactory, Parser};
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, logging::json_requested());

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return;
    };

    let repo_path = resolve_repo_path(cli.repo_path, cli.human_readable);

    let mut overrides = ConfigOverrides::new();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    if let Some(actor) = cli.actor {
        overrides = overrides.with_actor(actor);
    }

    // The storage directory may not exist yet; its config file is optional
    let storage_root = get_storage_dir(&repo_path).ok();
    let config = match resolve_config(storage_root.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, cli.human_readable);
            process::exit(1);
        }
    };
    let human = config.output_format() == OutputFormat::Human;
    tracing::debug!(
        actor = config.actor(),
        actor_source = %config.actor.source,
        repo = %repo_path.display(),
        "resolved configuration"
    );

    let mut ctx = Context::new(&repo_path, config.actor());
    ctx.list_limit = config.list_limit();
    ctx.busy_timeout_ms = config.busy_timeout_ms();

    // Serialize command for logging
    let (cmd_name, args_json) = serialize_command(&command);

    let start = Instant::now();
    let result = run_command(command, &ctx, human);
    let duration_ms = start.elapsed().as_millis() as u64;

    let storage = Storage::open(&repo_path).ok();
    let settings = ActionLogSettings::load(storage.as_ref());
    action_log::log_action(
        &settings,
        ActionLog {
            timestamp: chrono::Utc::now(),
            repo_path: repo_path.display().to_string(),
            command: cmd_name,
            actor: ctx.actor_id.clone(),
            args: args_json,
            success: result.is_ok(),
            error_code: result.as_ref().err().map(|e| e.code().to_string()),
            error: result.as_ref().err().map(|e| e.to_string()),
            duration_ms,
        },
    );

    if let Err(e) = result {
        report_error(&e, human);
        process::exit(1);
    }
}

/// Resolve the repository path.
///
/// Priority: --repo flag > BT_REPO env var > git root detection > current working directory
///
/// An explicit path is used literally, so a subdirectory of a git repository
/// can have its own bug store.
fn resolve_repo_path(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                let err = bugtrail::Error::Validation(format!(
                    "Specified repo path does not exist: {}",
                    path.display()
                ));
                report_error(&err, human);
                process::exit(1);
            }
            path
        }
        None => {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_git_root(&cwd).unwrap_or(cwd)
        }
    }
}

/// Print an error to stderr: `{"error", "code", ...}` or `Error: ...`.
fn report_error(e: &bugtrail::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
        if matches!(e, bugtrail::Error::NotInitialized) {
            eprintln!("Run `bt system init` in the repository first.");
        }
        return;
    }

    let mut err = serde_json::json!({
        "error": e.to_string(),
        "code": e.code(),
    });
    match e {
        bugtrail::Error::InvalidTransition {
            id,
            from,
            to,
            role,
            expected,
        } => {
            err["bug_id"] = serde_json::json!(id);
            err["current_status"] = serde_json::json!(from);
            err["requested_status"] = serde_json::json!(to);
            err["role"] = serde_json::json!(role);
            err["expected"] = serde_json::json!(expected);
        }
        bugtrail::Error::NotInitialized => {
            err["hint"] = serde_json::json!("Run 'bt system init' in the repository first.");
        }
        _ => {}
    }
    eprintln!("{}", err);
}

fn run_command(command: Commands, ctx: &Context, human: bool) -> Result<(), bugtrail::Error> {
    match command {
        Commands::Report {
            title,
            description,
            reproduction_steps,
            system_info,
            log_context,
            screenshot,
            screenshot_name,
            session,
            display_name,
        } => {
            let result = commands::report(
                ctx,
                ReportArgs {
                    title,
                    description,
                    reproduction_steps,
                    system_info,
                    log_context,
                    screenshot,
                    screenshot_name,
                    session,
                    display_name,
                },
            )?;
            output(&result, human);
        }

        Commands::Show { id } => {
            let result = commands::show(ctx, &id)?;
            output(&result, human);
        }

        Commands::Manager { command } => match command {
            ManagerCommands::List {
                status,
                severity,
                all,
                sort,
                limit,
            } => {
                let sort = match sort {
                    ListSort::Reported => BugSort::Reported,
                    ListSort::Updated => BugSort::Updated,
                };
                let result = manager::list(
                    ctx,
                    manager::ListArgs {
                        status,
                        severity,
                        all,
                        sort,
                        limit,
                    },
                )?;
                output(&result, human);
            }
            ManagerCommands::Severity { id, severity } => {
                let result = manager::set_severity(ctx, &id, severity)?;
                output(&result, human);
            }
            ManagerCommands::Category { id, category } => {
                let result = manager::set_category(ctx, &id, &category)?;
                output(&result, human);
            }
            ManagerCommands::Status { id, status, reason } => {
                let result = manager::set_status(ctx, &id, status, reason.as_deref())?;
                output(&result, human);
            }
            ManagerCommands::Dismiss { id, reason } => {
                let result = manager::dismiss(ctx, &id, reason.as_deref())?;
                output(&result, human);
            }
            ManagerCommands::Triage {
                id,
                severity,
                category,
                note,
            } => {
                let result = manager::triage(ctx, &id, severity, &category, note.as_deref())?;
                output(&result, human);
            }
            ManagerCommands::Assign { ids, to } => {
                let result = manager::assign(ctx, &ids, to.as_deref())?;
                output(&result, human);
            }
            ManagerCommands::Workload => {
                let result = manager::workload(ctx)?;
                output(&result, human);
            }
            ManagerCommands::Apply { file } => {
                let result = manager::apply(ctx, &file)?;
                output(&result, human);
            }
        },

        Commands::Dev { command } => match command {
            DevCommands::Progress { id, status, note } => {
                let result = developer::progress(ctx, &id, status, note.as_deref())?;
                output(&result, human);
            }
            DevCommands::Mine { assignee } => {
                let result = developer::mine(ctx, assignee.as_deref())?;
                output(&result, human);
            }
        },

        Commands::Ai { command } => match command {
            AiCommands::List {
                status,
                severity,
                limit,
            } => {
                let result = ai::list(ctx, status, severity, limit)?;
                output(&result, human);
            }
            AiCommands::Show { id } => {
                let result = ai::show(ctx, &id)?;
                output(&result, human);
            }
            AiCommands::Fix { id, notes } => {
                let result = ai::fix(ctx, &id, &notes)?;
                output(&result, human);
            }
        },

        Commands::Tester { command } => match command {
            TesterCommands::Queue => {
                let result = tester::queue(ctx)?;
                output(&result, human);
            }
            TesterCommands::Resolve { id, note } => {
                let result = tester::resolve(ctx, &id, note.as_deref())?;
                output(&result, human);
            }
            TesterCommands::SendBack { id, notes } => {
                let result = tester::send_back(ctx, &id, &notes)?;
                output(&result, human);
            }
            TesterCommands::Audit { limit } => {
                let result = tester::audit(ctx, limit)?;
                output(&result, human);
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => {
                let result = commands::config_get(ctx, &key)?;
                output(&result, human);
            }
            ConfigCommands::Set { key, value } => {
                let result = commands::config_set(ctx, &key, &value)?;
                output(&result, human);
            }
            ConfigCommands::List => {
                let result = commands::config_list(ctx)?;
                output(&result, human);
            }
        },

        Commands::System { command } => match command {
            SystemCommands::Init => {
                let result = commands::init(ctx)?;
                output(&result, human);
            }
        },
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Report {
            title,
            description,
            reproduction_steps,
            system_info,
            log_context,
            screenshot,
            screenshot_name,
            session,
            display_name,
        } => (
            "report".to_string(),
            serde_json::json!({
                "title": title,
                "description": description,
                "reproduction_steps": reproduction_steps,
                "system_info": system_info,
                "log_context": log_context,
                "screenshot": screenshot,
                "screenshot_name": screenshot_name,
                "session": session,
                "display_name": display_name,
            }),
        ),

        Commands::Show { id } => ("show".to_string(), serde_json::json!({ "id": id })),

        Commands::Manager { command } => match command {
            ManagerCommands::List {
                status,
                severity,
                all,
                sort,
                limit,
            } => (
                "manager list".to_string(),
                serde_json::json!({
                    "status": status,
                    "severity": severity,
                    "all": all,
                    "sort": format!("{:?}", sort).to_lowercase(),
                    "limit": limit,
                }),
            ),
            ManagerCommands::Severity { id, severity } => (
                "manager severity".to_string(),
                serde_json::json!({ "id": id, "severity": severity }),
            ),
            ManagerCommands::Category { id, category } => (
                "manager category".to_string(),
                serde_json::json!({ "id": id, "category": category }),
            ),
            ManagerCommands::Status { id, status, reason } => (
                "manager status".to_string(),
                serde_json::json!({ "id": id, "status": status, "reason": reason }),
            ),
            ManagerCommands::Dismiss { id, reason } => (
                "manager dismiss".to_string(),
                serde_json::json!({ "id": id, "reason": reason }),
            ),
            ManagerCommands::Triage {
                id,
                severity,
                category,
                note,
            } => (
                "manager triage".to_string(),
                serde_json::json!({
                    "id": id,
                    "severity": severity,
                    "category": category,
                    "note": note,
                }),
            ),
            ManagerCommands::Assign { ids, to } => (
                "manager assign".to_string(),
                serde_json::json!({ "ids": ids, "to": to }),
            ),
            ManagerCommands::Workload => ("manager workload".to_string(), serde_json::json!({})),
            ManagerCommands::Apply { file } => (
                "manager apply".to_string(),
                serde_json::json!({ "file": file }),
            ),
        },

        Commands::Dev { command } => match command {
            DevCommands::Progress { id, status, note } => (
                "dev progress".to_string(),
                serde_json::json!({ "id": id, "status": status, "note": note }),
            ),
            DevCommands::Mine { assignee } => (
                "dev mine".to_string(),
                serde_json::json!({ "assignee": assignee }),
            ),
        },

        Commands::Ai { command } => match command {
            AiCommands::List {
                status,
                severity,
                limit,
            } => (
                "ai list".to_string(),
                serde_json::json!({ "status": status, "severity": severity, "limit": limit }),
            ),
            AiCommands::Show { id } => ("ai show".to_string(), serde_json::json!({ "id": id })),
            AiCommands::Fix { id, notes } => (
                "ai fix".to_string(),
                serde_json::json!({ "id": id, "notes": notes }),
            ),
        },

        Commands::Tester { command } => match command {
            TesterCommands::Queue => ("tester queue".to_string(), serde_json::json!({})),
            TesterCommands::Resolve { id, note } => (
                "tester resolve".to_string(),
                serde_json::json!({ "id": id, "note": note }),
            ),
            TesterCommands::SendBack { id, notes } => (
                "tester send-back".to_string(),
                serde_json::json!({ "id": id, "notes": notes }),
            ),
            TesterCommands::Audit { limit } => (
                "tester audit".to_string(),
                serde_json::json!({ "limit": limit }),
            ),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => {
                ("config get".to_string(), serde_json::json!({ "key": key }))
            }
            ConfigCommands::Set { key, value } => (
                "config set".to_string(),
                serde_json::json!({ "key": key, "value": value }),
            ),
            ConfigCommands::List => ("config list".to_string(), serde_json::json!({})),
        },

        Commands::System { command } => match command {
            SystemCommands::Init => ("system init".to_string(), serde_json::json!({})),
        },
    }
}
