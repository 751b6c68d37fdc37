mod manifest;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use settle_core::differ::create_plan;
use settle_core::effect::Effect;
use settle_core::plan::Plan;
use settle_core::provider::Provider;
use settle_core::resource::{Resource, ResourceId, State, Value};
use settle_core::schema::ResourceSchema;
use settle_provider_sagemaker::{SageMakerProvider, schema_for, schemas};
use settle_state::{LockOperation, StateBackend, StateFile, create_backend};

use crate::manifest::{Manifest, resolve, resolve_known};

#[derive(Parser)]
#[command(name = "settle")]
#[command(about = "Declarative SageMaker resources that wait until they settle", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// AWS region (overrides the manifest)
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest against the resource schemas
    Validate {
        #[arg(default_value = "settle.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = "settle.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = "settle.json")]
        file: PathBuf,
    },
    /// Destroy all resources declared in the manifest
    Destroy {
        #[arg(default_value = "settle.json")]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Update the state file from the remote resources
    Refresh {
        #[arg(default_value = "settle.json")]
        file: PathBuf,
    },
    /// Inspect the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Release a lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,

        #[arg(long, default_value = "settle.json")]
        file: PathBuf,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List {
        #[arg(default_value = "settle.json")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling in-flight waits...".yellow());
            on_interrupt.cancel();
        }
    });

    let region = cli.region;
    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, region, &cancel).await,
        Commands::Apply { file } => run_apply(&file, region, &cancel).await,
        Commands::Destroy { file, auto_approve } => {
            run_destroy(&file, region, auto_approve, &cancel).await
        }
        Commands::Refresh { file } => run_refresh(&file, region, &cancel).await,
        Commands::State {
            command: StateCommands::List { file },
        } => run_state_list(&file).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "settle", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    schemas::all_schemas()
        .into_iter()
        .map(|schema| (schema.resource_type.clone(), schema))
        .collect()
}

fn load(file: &Path) -> Result<(Manifest, Vec<Resource>), String> {
    let manifest = Manifest::load(file).map_err(|e| e.to_string())?;
    let resources = manifest.resources().map_err(|e| e.to_string())?;
    Ok((manifest, resources))
}

fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

fn open_backend(manifest: &Manifest) -> Result<Box<dyn StateBackend>, String> {
    create_backend(&manifest.backend_config()).map_err(|e| e.to_string())
}

async fn read_state_file(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn save(backend: &dyn StateBackend, state_file: &mut StateFile) -> Result<(), String> {
    state_file.increment_serial();
    backend
        .write_state(state_file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn get_provider(manifest: &Manifest, region: Option<String>) -> Result<Box<dyn Provider>, String> {
    let region = region
        .or_else(|| manifest.provider.region.clone())
        .ok_or("No region configured: pass --region, set AWS_REGION or add provider.region")?;
    debug!("using region {}", region);

    let mut provider = SageMakerProvider::new(&region)
        .await
        .with_default_tags(manifest.provider.default_tags.clone());
    if let Some(interval) = manifest.provider.poll_interval() {
        provider = provider.with_poll_interval(interval);
    }
    Ok(Box::new(provider))
}

/// Keep write-only values of the recorded state, which reads never return
fn carry_write_only(refreshed: &mut State, recorded: &State) {
    if let Some(schema) = schema_for(&refreshed.id.resource_type) {
        schema.carry_write_only(&recorded.attributes, &mut refreshed.attributes);
    }
}

/// Read the remote state of every declared or recorded resource
async fn refresh_states(
    provider: &dyn Provider,
    resources: &[Resource],
    state_file: &StateFile,
    cancel: &CancellationToken,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut ids: Vec<ResourceId> = resources.iter().map(|r| r.id.clone()).collect();
    for recorded in &state_file.resources {
        let id = recorded.id();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let mut current_states = HashMap::new();
    for id in ids {
        let recorded = state_file.find_resource(&id).map(|r| r.to_state());
        let identifier = recorded.as_ref().and_then(|r| r.identifier.as_deref());
        let mut state = provider
            .read(&id, identifier, cancel)
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if let Some(recorded) = &recorded {
            if state.exists {
                carry_write_only(&mut state, recorded);
            } else {
                warn!("{} no longer exists", id);
            }
        }
        current_states.insert(id, state);
    }
    Ok(current_states)
}

fn run_validate(file: &Path) -> Result<(), String> {
    let (_, resources) = load(file)?;

    println!("{}", "Validating...".cyan());
    validate_resources(&resources)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    for resource in &resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn plan_changes(
    provider: &dyn Provider,
    resources: &[Resource],
    state_file: &StateFile,
    cancel: &CancellationToken,
) -> Result<Plan, String> {
    let current_states = refresh_states(provider, resources, state_file, cancel).await?;
    let desired: Vec<Resource> = resources
        .iter()
        .map(|r| resolve_known(r, &current_states))
        .collect();
    Ok(create_plan(&desired, &current_states, &get_schemas()))
}

async fn run_plan(
    file: &Path,
    region: Option<String>,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let (manifest, resources) = load(file)?;
    validate_resources(&resources)?;

    let backend = open_backend(&manifest)?;
    let state_file = read_state_file(backend.as_ref()).await?;
    let provider = get_provider(&manifest, region).await?;

    let plan = plan_changes(provider.as_ref(), &resources, &state_file, cancel).await?;
    print_plan(&plan);
    Ok(())
}

/// Run `operation` while holding the state lock
async fn with_lock<F, T>(
    backend: &dyn StateBackend,
    operation: LockOperation,
    f: F,
) -> Result<T, String>
where
    F: AsyncFnOnce() -> Result<T, String>,
{
    let lock = backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())?;
    let result = f().await;
    if let Err(e) = backend.release_lock(&lock).await {
        eprintln!("{} failed to release lock {}: {}", "Warning:".yellow(), lock.id, e);
    }
    result
}

async fn run_apply(
    file: &Path,
    region: Option<String>,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let (manifest, resources) = load(file)?;
    validate_resources(&resources)?;

    let backend = open_backend(&manifest)?;
    let provider = get_provider(&manifest, region).await?;

    with_lock(backend.as_ref(), LockOperation::Apply, async || {
        let mut state_file = read_state_file(backend.as_ref()).await?;
        let plan = plan_changes(provider.as_ref(), &resources, &state_file, cancel).await?;

        if plan.is_empty() {
            println!("{}", "No changes needed.".green());
            return Ok(());
        }

        print_plan(&plan);
        println!();
        println!("{}", "Applying changes...".cyan().bold());
        println!();

        let mut applied: HashMap<ResourceId, State> = state_file
            .states()
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            if cancel.is_cancelled() {
                break;
            }
            match apply_effect(provider.as_ref(), effect, &applied, cancel).await {
                Ok(outcome) => {
                    println!("  {} {}", "✓".green(), format_effect(effect));
                    success_count += 1;
                    match outcome {
                        Some(state) => {
                            state_file.record(&state, provider.name());
                            applied.insert(state.id.clone(), state);
                        }
                        None => {
                            state_file.remove_resource(effect.resource_id());
                            applied.remove(effect.resource_id());
                        }
                    }
                    save(backend.as_ref(), &mut state_file).await?;
                }
                Err(e) => {
                    println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                    failure_count += 1;
                }
            }
        }

        println!();
        if failure_count == 0 && !cancel.is_cancelled() {
            println!(
                "{}",
                format!("Apply complete! {} changes applied.", success_count)
                    .green()
                    .bold()
            );
            Ok(())
        } else {
            Err(format!(
                "Apply failed. {} succeeded, {} failed.",
                success_count, failure_count
            ))
        }
    })
    .await
}

/// Apply one effect; `None` means the resource is gone
async fn apply_effect(
    provider: &dyn Provider,
    effect: &Effect,
    applied: &HashMap<ResourceId, State>,
    cancel: &CancellationToken,
) -> Result<Option<State>, String> {
    let resolved = |resource: &Resource| resolve(resource, applied).map_err(|e| e.to_string());
    match effect {
        Effect::Create(resource) => {
            let resource = resolved(resource)?;
            let state = provider
                .create(&resource, cancel)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Some(state))
        }
        Effect::Update { from, to, .. } => {
            let to = resolved(to)?;
            let state = provider
                .update(from, &to, cancel)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Some(state))
        }
        Effect::Replace { from, to, .. } => {
            let to = resolved(to)?;
            provider
                .delete(from, cancel)
                .await
                .map_err(|e| e.to_string())?;
            let state = provider
                .create(&to, cancel)
                .await
                .map_err(|e| e.to_string())?;
            Ok(Some(state))
        }
        Effect::Delete(state) => {
            provider
                .delete(state, cancel)
                .await
                .map_err(|e| e.to_string())?;
            Ok(None)
        }
        Effect::Read(id) => {
            let identifier = applied.get(id).and_then(|s| s.identifier.as_deref());
            let state = provider
                .read(id, identifier, cancel)
                .await
                .map_err(|e| e.to_string())?;
            Ok(state.exists.then_some(state))
        }
    }
}

async fn run_destroy(
    file: &Path,
    region: Option<String>,
    auto_approve: bool,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let (manifest, resources) = load(file)?;
    if resources.is_empty() {
        println!("{}", "No resources defined in manifest.".yellow());
        return Ok(());
    }

    let backend = open_backend(&manifest)?;
    let provider = get_provider(&manifest, region).await?;

    with_lock(backend.as_ref(), LockOperation::Destroy, async || {
        let mut state_file = read_state_file(backend.as_ref()).await?;

        // Dependents before the resources they reference
        let to_destroy: Vec<State> = resources
            .iter()
            .rev()
            .filter_map(|r| state_file.find_resource(&r.id))
            .map(|r| r.to_state())
            .collect();

        if to_destroy.is_empty() {
            println!("{}", "No resources to destroy.".green());
            return Ok(());
        }

        println!("{}", "Destroy Plan:".red().bold());
        println!();
        for state in &to_destroy {
            println!("  {} {}", "-".red().bold(), state.id);
        }
        println!();
        println!(
            "Plan: {} to destroy.",
            to_destroy.len().to_string().red()
        );
        println!();

        if !auto_approve && !confirm()? {
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }

        println!("{}", "Destroying resources...".red().bold());
        println!();

        let mut success_count = 0;
        let mut failure_count = 0;
        for state in to_destroy {
            if cancel.is_cancelled() {
                break;
            }
            match provider.delete(&state, cancel).await {
                Ok(()) => {
                    println!("  {} delete {}", "✓".green(), state.id);
                    success_count += 1;
                    state_file.remove_resource(&state.id);
                    save(backend.as_ref(), &mut state_file).await?;
                }
                Err(e) => {
                    println!("  {} delete {} - {}", "✗".red(), state.id, e);
                    failure_count += 1;
                }
            }
        }

        println!();
        if failure_count == 0 && !cancel.is_cancelled() {
            println!(
                "{}",
                format!("Destroy complete! {} resources destroyed.", success_count)
                    .green()
                    .bold()
            );
            Ok(())
        } else {
            Err(format!(
                "Destroy failed. {} succeeded, {} failed.",
                success_count, failure_count
            ))
        }
    })
    .await
}

fn confirm() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?".yellow().bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| format!("Failed to read input: {}", e))?;
    Ok(input.trim() == "yes")
}

async fn run_refresh(
    file: &Path,
    region: Option<String>,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let (manifest, _) = load(file)?;
    let backend = open_backend(&manifest)?;
    let provider = get_provider(&manifest, region).await?;

    with_lock(backend.as_ref(), LockOperation::Refresh, async || {
        let mut state_file = read_state_file(backend.as_ref()).await?;
        let current = refresh_states(provider.as_ref(), &[], &state_file, cancel).await?;

        let mut removed = 0;
        for state in current.values() {
            if !state.exists {
                removed += 1;
            }
            state_file.record(state, provider.name());
        }
        save(backend.as_ref(), &mut state_file).await?;

        println!(
            "{}",
            format!(
                "Refreshed {} resources ({} no longer exist).",
                current.len(),
                removed
            )
            .green()
            .bold()
        );
        Ok(())
    })
    .await
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let (manifest, _) = load(file)?;
    let backend = open_backend(&manifest)?;
    let state_file = read_state_file(backend.as_ref()).await?;

    if state_file.resources.is_empty() {
        println!("{}", "No resources in state.".yellow());
        return Ok(());
    }
    for resource in &state_file.resources {
        match &resource.identifier {
            Some(identifier) => println!("{} ({})", resource.id(), identifier.dimmed()),
            None => println!("{}", resource.id()),
        }
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let (manifest, _) = load(file)?;
    let backend = open_backend(&manifest)?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        match effect {
            Effect::Create(r) => {
                println!("  {} {}", "+".green().bold(), r.id.to_string().cyan().bold());
                let mut keys: Vec<_> = r.attributes.keys().collect();
                keys.sort();
                for key in keys {
                    println!(
                        "      {}: {}",
                        key,
                        format_value(&r.attributes[key]).green()
                    );
                }
            }
            Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
                print_changes(from, to, changed_attributes, false);
            }
            Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => {
                println!(
                    "  {} {} {}",
                    "-/+".red().bold(),
                    id.to_string().cyan().bold(),
                    "(must be replaced)".red()
                );
                print_changes(from, to, changed_attributes, true);
            }
            Effect::Delete(state) => {
                println!("  {} {}", "-".red().bold(), state.id.to_string().cyan().bold());
            }
            Effect::Read(id) => println!("  {} {}", "?".dimmed(), id),
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to create, {} to update, {} to replace, {} to delete.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().red(),
        summary.delete.to_string().red()
    );
}

fn print_changes(from: &State, to: &Resource, changed: &[String], replace: bool) {
    let schema = schema_for(&to.id.resource_type);
    for key in changed {
        let old = from
            .attributes
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let new = to
            .attributes
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let forces = replace && schema.as_ref().is_some_and(|s| s.forces_new(key));
        println!(
            "      {}: {} → {}{}",
            key.bold(),
            old.red(),
            new.green(),
            if forces { " (forces replacement)".red().to_string() } else { String::new() }
        );
    }
}

fn format_effect(effect: &Effect) -> String {
    format!("{} {}", effect.kind(), effect.resource_id())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", k, format_value(v)))
                .collect();
            entries.sort();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
