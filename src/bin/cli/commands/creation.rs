//! Provisioning command handlers for the signup CLI

use std::process::ExitCode;
use std::sync::Arc;

use tenant_provisioning::{
    rest_transport_from_config, ClientConfig, ClientError, ClientResult, CreationId,
    ProgressController, ProgressHandle, ProgressSnapshot, RotatingCredentials, SignupTransport,
    StepPlan, StepStatus, TrackerState,
};

use crate::{Commands, OutputFormat};

pub async fn handle_creation_command(
    cmd: Commands,
    config: &ClientConfig,
    format: OutputFormat,
) -> ClientResult<ExitCode> {
    let credentials = Arc::new(RotatingCredentials::new(config.signup.csrf_token.clone()));
    let transport = rest_transport_from_config(config, credentials)?;

    match cmd {
        Commands::Start => {
            let handle = spawn_controller(transport, config);
            println!("Starting tenant provisioning...");
            handle.start()?;
            watch(handle, format).await
        }
        Commands::Watch { creation_id } => {
            let handle = spawn_controller(transport, config);
            println!("Watching provisioning job {}", creation_id);
            handle.track(parse_creation_id(&creation_id)?)?;
            watch(handle, format).await
        }
        Commands::Status { creation_id } => {
            let creation_id = parse_creation_id(&creation_id)?;
            match transport.creation_status(&creation_id).await {
                Ok(status) => {
                    if format == OutputFormat::Json {
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    } else {
                        println!("✓ Provisioning job {}:", status.id);
                        println!("  Status: {}", status.status);
                        if let Some(step) = &status.current_step {
                            println!("  Current step: {}", step);
                        }
                        if let Some(message) = &status.message {
                            println!("  Message: {}", message);
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("✗ Failed to get creation status: {}", e);
                    Err(e)
                }
            }
        }
        Commands::FetchResult { creation_id } => {
            let creation_id = parse_creation_id(&creation_id)?;
            match transport.creation_result(&creation_id).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("✗ Failed to get creation result: {}", e);
                    Err(e)
                }
            }
        }
        Commands::Steps => {
            let plan = StepPlan::provisioning();
            for (index, step) in plan.describe(&plan.pending_statuses()).iter().enumerate() {
                println!("  {}. {:<20} {}", index + 1, step.id, step.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(_) => Err(ClientError::InvalidInput(
            "config commands are handled separately".to_string(),
        )),
    }
}

fn parse_creation_id(raw: &str) -> ClientResult<CreationId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidInput("creation id must not be empty".into()));
    }
    Ok(CreationId::new(trimmed))
}

fn spawn_controller(transport: Arc<dyn SignupTransport>, config: &ClientConfig) -> ProgressHandle {
    ProgressController::new(transport, config.polling)
        .with_recovery_base_url(config.signup.base_url.clone())
        .spawn()
}

async fn watch(handle: ProgressHandle, format: OutputFormat) -> ClientResult<ExitCode> {
    let mut updates = handle.subscribe();
    let plan = StepPlan::provisioning();

    let settled = loop {
        let snapshot = updates.borrow_and_update().clone();
        render(&snapshot, &plan, format)?;
        if snapshot.is_settled() {
            break snapshot;
        }
        if updates.changed().await.is_err() {
            break handle.snapshot();
        }
    };
    handle.dispose();

    Ok(report(&settled))
}

fn render(snapshot: &ProgressSnapshot, plan: &StepPlan, format: OutputFormat) -> ClientResult<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let statuses = snapshot
        .steps
        .iter()
        .map(|step| (step.id.clone(), step.status))
        .collect();
    let percent = plan.completion_ratio(&statuses) * 100.0;
    let current = snapshot
        .steps
        .iter()
        .find(|step| step.status == StepStatus::Processing)
        .map_or("-", |step| step.name.as_str());

    println!(
        "  [{:>5.1}%] {:<10} {}",
        percent,
        snapshot.state.to_string(),
        current
    );
    if let Some(warning) = &snapshot.step_warning {
        println!("  ! {}", warning);
    }
    Ok(())
}

fn report(snapshot: &ProgressSnapshot) -> ExitCode {
    match snapshot.state {
        TrackerState::Completed => {
            println!("✓ Tenant provisioning completed");
            match &snapshot.result {
                Some(result) => {
                    if let Some(url) = result.url() {
                        println!("  Tenant URL: {}", url);
                    }
                    if let Some(login_url) = result.login_url() {
                        println!("  Login URL: {}", login_url);
                    }
                }
                None => {
                    if let Some(message) = &snapshot.message {
                        println!("  {}", message);
                    }
                    if let Some(url) = &snapshot.recovery_url {
                        println!("  Continue at: {}", url);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        TrackerState::TimedOut => {
            eprintln!("⏱ Provisioning is still running after the wait limit");
            if let Some(hint) = snapshot.guidance() {
                eprintln!("  {}", hint);
            }
            if let Some(creation_id) = &snapshot.creation_id {
                eprintln!("  Resume with: signup-cli watch {}", creation_id);
            }
            ExitCode::from(2)
        }
        _ => {
            eprintln!(
                "✗ Tenant provisioning failed: {}",
                snapshot.message.as_deref().unwrap_or("unknown error")
            );
            if let Some(hint) = snapshot.guidance() {
                eprintln!("  {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}
