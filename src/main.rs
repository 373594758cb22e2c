mod cli;
mod config;
mod error;
mod naming;
mod notification;
mod orchestrator;
mod provider;
mod state_machine;
mod store;
mod ui;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cli::{Cli, Command};
use config::CloudferryConfig;
use notification::TransferNotification;
use orchestrator::JobOrchestrator;
use provider::{GcpClient, ProviderAdapter, UrlSigner};
use state_machine::{CredentialRef, JobRecord, JobStatus};
use store::{JobStore, JsonFileStore};
use ui::JobProgress;

type Orchestrator = JobOrchestrator<JsonFileStore, GcpClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CloudferryConfig::load(cli.config.as_deref())?;

    // Naming is pure; only the other commands open the store and the client.
    let orchestrator = || build_orchestrator(&config);

    match cli.command {
        Command::Create {
            name,
            job_type,
            source,
            source_name,
            access_key_id,
            secret_access_key,
            container,
            sas_token,
            files,
            owner,
            no_dispatch,
        } => {
            let credentials = CredentialRef {
                access_key_id,
                secret_access_key,
                container,
                sas_token,
            };
            let record = JobRecord {
                id: Uuid::new_v4().to_string(),
                name: Some(name),
                job_type: Some(job_type.as_str().to_string()),
                source: Some(source),
                source_name,
                credential_ref: (credentials != CredentialRef::default()).then_some(credentials),
                files: files.iter().map(|f| cli::parse_file_arg(f)).collect(),
                status: JobStatus::Created,
                created_at: Some(Utc::now()),
                owner_id: owner,
                ..Default::default()
            };
            let orch = orchestrator().await?;
            let record = orch.store().create(record).await?;
            println!("{}", record.id);
            if !no_dispatch {
                dispatch(&orch, &record.id).await?;
            }
        }
        Command::Dispatch { id } => dispatch(&orchestrator().await?, &id).await?,
        Command::Notify { file } => {
            let payload = match &file {
                Some(path) => tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            let notification = TransferNotification::parse(&payload)?;
            let orch = orchestrator().await?;
            let progress = JobProgress::start(&format!(
                "applying notification for {}",
                notification.transfer_job_name
            ));
            let outcome = orch.handle_notification(&notification).await;
            if !progress.notified(&outcome) {
                bail!("notification was not applied");
            }
        }
        Command::Resolve { id } => {
            let orch = orchestrator().await?;
            let progress = JobProgress::start(&format!("signing artifacts of {id}"));
            match orch.resolve_artifacts(&id).await {
                Ok(report) => progress.resolved(&id, &report),
                Err(e) => {
                    progress.error(&e.to_string());
                    return Err(e.into());
                }
            }
        }
        Command::Show { id, json } => {
            let record = orchestrator()
                .await?
                .store()
                .get(&id)
                .await?
                .with_context(|| format!("Job not found: {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                ui::print_job(&record);
            }
        }
        Command::List { owner, status } => {
            let orch = orchestrator().await?;
            let mut records = match &owner {
                Some(owner) => orch.store().list_by_owner(owner).await?,
                None => orch.store().list().await?,
            };
            if let Some(status) = status.map(JobStatus::from) {
                records.retain(|r| r.status == status);
            }
            ui::print_list(&records);
        }
        Command::Delete { id } => {
            if !orchestrator().await?.store().delete(&id).await? {
                bail!("Job not found: {id}");
            }
            println!("deleted {id}");
        }
        Command::BucketName { id } => println!("{}", naming::bucket_name(&config.project_id, &id)),
    }

    Ok(())
}

// RUST_LOG wins over --verbose when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn build_orchestrator(config: &CloudferryConfig) -> Result<Orchestrator> {
    let mut client = GcpClient::with_base_urls(
        config.project_id.clone(),
        config.access_token.clone(),
        config.storage_api_url.clone(),
        config.transfer_api_url.clone(),
    )?;
    if config.has_signing_key() {
        let signer = UrlSigner::new(
            &config.hmac_access_id,
            &config.hmac_secret,
            config.signed_url_ttl(),
        );
        debug!(ttl_secs = signer.ttl().as_secs(), "artifact links will be signed");
        client = client.with_signer(signer);
    } else {
        warn!("no HMAC key configured, artifact links cannot be signed");
    }
    if config.access_token.is_empty() {
        warn!("no access token configured, Cloud API calls will be unauthenticated");
    }

    let store = JsonFileStore::open(&config.store_dir)
        .await
        .with_context(|| format!("failed to open job store at {}", config.store_dir.display()))?;
    debug!(dir = %store.dir().display(), project = %config.project_id, "job store opened");
    Ok(JobOrchestrator::new(
        store,
        ProviderAdapter::new(client, config.destination_settings()),
    ))
}

async fn dispatch(orch: &Orchestrator, id: &str) -> Result<()> {
    let progress = JobProgress::start(&format!("dispatching {id}"));
    let outcome = orch.handle_job_created(id).await;
    if !progress.dispatched(id, &outcome) {
        bail!("job {id} was not dispatched");
    }
    Ok(())
}
