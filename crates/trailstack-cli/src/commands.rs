use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use trailstack_provisioner::{require_confirmation, Change, DestroyOutcome, Manifest};

use crate::aws::Session;
use crate::cli::{ApplyArgs, ConfigCommand, DestroyArgs, InventoryArgs};
use crate::config::{self, CredentialSource, TrailstackConfig};
use crate::ui;

const DESTROY_TOKEN: &str = "DESTROY";
const DELETE_BUCKET_TOKEN: &str = "DELETE BUCKET";

/// Config file plus environment overrides.
pub fn effective_config(path: &Path) -> eyre::Result<TrailstackConfig> {
    Ok(config::load_config(path)?.with_env(|key| std::env::var(key).ok()))
}

/// First Ctrl-C cancels the current wait; a second one exits immediately.
///
/// Installed only once prompts are done, so Ctrl-C at a prompt still
/// terminates the process the usual way.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        ui::warn("interrupt received; stopping the wait (Ctrl-C again to exit now)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

/// Ask for `DESTROY`, then for `DELETE BUCKET` when `bucket` is given.
///
/// `None` means a token did not match and nothing may be changed;
/// otherwise the flag says whether the bucket goes too.
fn confirm_destroy(
    input: &mut impl BufRead,
    stack: &str,
    bucket: Option<&str>,
) -> std::io::Result<Option<bool>> {
    let answer = ui::ask(input, &format!("Type {DESTROY_TOKEN} to delete stack {stack}:"))?;
    if !require_confirmation(DESTROY_TOKEN, &answer) {
        return Ok(None);
    }

    let Some(bucket) = bucket else {
        return Ok(Some(false));
    };
    ui::warn(&format!(
        "{bucket} holds the audit log history; deleting it cannot be undone"
    ));
    let answer = ui::ask(input, &format!("Type {DELETE_BUCKET_TOKEN} to delete it too:"))?;
    Ok(require_confirmation(DELETE_BUCKET_TOKEN, &answer).then_some(true))
}

fn connected(config: &TrailstackConfig, session: &Session) {
    ui::kv("account", &session.settings.account_id);
    ui::kv("region", &config.region);
    ui::kv("caller", &session.identity.arn);
}

pub async fn apply(
    config: &TrailstackConfig,
    args: &ApplyArgs,
    cancel: CancellationToken,
) -> eyre::Result<ExitCode> {
    let session = Session::connect(config, cancel.clone()).await?;
    let spec = Manifest::audit_foundation(&session.settings);

    ui::header(&format!("Apply {}", spec.name));
    connected(config, &session);

    spawn_interrupt_handler(cancel);
    let report = session
        .orchestrator
        .deploy(&spec, args.auto_recover)
        .await?;

    ui::section("Prerequisites");
    for check in &report.prerequisites.checks {
        ui::check(check);
    }

    let state = &report.outcome.state;
    println!();
    match report.outcome.change {
        Change::Created => ui::success(&format!("stack {} created", spec.name)),
        Change::Recreated => {
            ui::success(&format!("failed stack {} deleted and recreated", spec.name))
        }
        Change::Updated => ui::success(&format!("stack {} updated", spec.name)),
        Change::Unchanged => ui::info(&format!("stack {} is up to date", spec.name)),
    }
    ui::kv("status", &ui::status(state.status).to_string());

    ui::outputs("Outputs", &state.outputs);
    ui::report(&report.reconciliation);

    if !report.published.is_empty() {
        println!();
        ui::success(&format!(
            "published {} outputs under {}",
            report.published.len(),
            session.orchestrator.parameter_prefix()
        ));
    }

    Ok(ExitCode::SUCCESS)
}

pub async fn destroy(
    config: &TrailstackConfig,
    args: &DestroyArgs,
    cancel: CancellationToken,
) -> eyre::Result<ExitCode> {
    let session = Session::connect(config, cancel.clone()).await?;
    let spec = Manifest::audit_foundation(&session.settings);
    let bucket = session.settings.names().bucket;

    ui::header(&format!("Destroy {}", spec.name));
    connected(config, &session);
    ui::kv("parameters", session.orchestrator.parameter_prefix());

    println!();
    let wanted_bucket = args.delete_bucket.then_some(bucket.as_str());
    let confirmed = confirm_destroy(&mut std::io::stdin().lock(), &spec.name, wanted_bucket)?;
    let Some(delete_bucket) = confirmed else {
        ui::info("cancelled; nothing was changed");
        return Ok(ExitCode::SUCCESS);
    };

    spawn_interrupt_handler(cancel);
    let report = session
        .orchestrator
        .teardown(&spec.name, &spec.retained_logical_ids())
        .await?;

    println!();
    match &report.outcome {
        DestroyOutcome::AlreadyAbsent => ui::info(&format!("stack {} was not deployed", spec.name)),
        DestroyOutcome::Deleted { .. } => ui::success(&format!("stack {} deleted", spec.name)),
    }
    if report.parameters_deleted > 0 {
        ui::success(&format!(
            "removed {} published parameters under {}",
            report.parameters_deleted,
            session.orchestrator.parameter_prefix()
        ));
    }

    if delete_bucket {
        let versions = session.bucket_remover.remove(&bucket).await?;
        ui::success(&format!(
            "bucket {bucket} deleted ({versions} object versions removed)"
        ));
    } else if matches!(report.outcome, DestroyOutcome::Deleted { .. }) {
        ui::dim(&format!(
            "{bucket} was kept; run destroy --delete-bucket to remove it"
        ));
    }

    Ok(ExitCode::SUCCESS)
}

pub async fn inventory(
    config: &TrailstackConfig,
    args: &InventoryArgs,
    cancel: CancellationToken,
) -> eyre::Result<ExitCode> {
    let session = Session::connect(config, cancel).await?;
    let spec = Manifest::audit_foundation(&session.settings);
    let inventory = session.orchestrator.inventory(&spec).await?;

    if args.json {
        let doc = json!({
            "state": inventory.state,
            "reconciliation": inventory.reconciliation,
            "published": inventory.published,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(ExitCode::SUCCESS);
    }

    ui::header(&format!("Inventory {}", spec.name));
    connected(config, &session);
    ui::kv("status", &ui::status(inventory.state.status).to_string());
    if let Some(reason) = &inventory.state.status_reason {
        ui::dim(reason);
    }

    if !inventory.is_deployed() {
        println!();
        ui::info("stack is not deployed; nothing to report");
        let leftovers = &inventory.reconciliation;
        if !leftovers.orphaned.is_empty() || !leftovers.retained.is_empty() {
            ui::report(leftovers);
        }
        return Ok(ExitCode::SUCCESS);
    }

    ui::outputs("Outputs", &inventory.state.outputs);
    ui::report(&inventory.reconciliation);
    ui::outputs(
        &format!("Published under {}", session.orchestrator.parameter_prefix()),
        &inventory.published,
    );

    Ok(ExitCode::SUCCESS)
}

pub async fn check(config: &TrailstackConfig, cancel: CancellationToken) -> eyre::Result<ExitCode> {
    let session = Session::connect(config, cancel).await?;

    ui::header("Prerequisites");
    let report = session.orchestrator.check().await;
    for check in &report.checks {
        ui::check(check);
    }

    println!();
    if report.passed() {
        ui::success("all prerequisites passed");
        Ok(ExitCode::SUCCESS)
    } else {
        ui::error(&format!(
            "{} prerequisite(s) failed",
            report.failures().count()
        ));
        Ok(ExitCode::FAILURE)
    }
}

pub fn config(path: &Path, command: &ConfigCommand) -> eyre::Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            let config = effective_config(path)?;
            ui::header("Configuration");
            ui::kv("file", &path.display().to_string());
            if !path.exists() {
                ui::dim("file does not exist; showing defaults and environment overrides");
            }
            println!("{}", serde_json::to_string_pretty(&config.info())?);
            if let Err(e) = config.validate() {
                ui::warn(&e.to_string());
            }
        }
        ConfigCommand::Init {
            region,
            environment,
            profile,
            account_id,
            force,
        } => {
            if path.exists() && !force {
                return Err(eyre::eyre!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ));
            }

            let config = TrailstackConfig {
                region: region.clone(),
                environment: environment.clone(),
                account_id: account_id.clone(),
                credentials: match profile {
                    Some(profile_name) => CredentialSource::Profile {
                        profile_name: profile_name.clone(),
                    },
                    None => CredentialSource::DefaultChain,
                },
                ..TrailstackConfig::default()
            };
            config.validate()?;
            config::save_config(path, &config)?;
            ui::success(&format!("wrote {}", path.display()));
        }
    }
    Ok(ExitCode::SUCCESS)
}
