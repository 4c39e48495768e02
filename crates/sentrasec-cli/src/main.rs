use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sentrasec_core::app::{
    CredentialVault, EvidenceLocker, ExploitChain, IntegrationHub, PolicyBook, SessionLog,
    SimulatorConfig, TaskRegistry, crack_on_complete, demo_credentials, demo_evidence,
    demo_integrations, demo_policies,
};
use sentrasec_core::domain::{Protocol, SessionStatus, TaskKind};
use sentrasec_core::impls::{JsonFileStore, TokioClock, TracingNotifier};
use sentrasec_core::ports::{Clock, KeyValueStore, NotifyLevel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod console;

use cli::{Action, Cli};

const DEFAULT_LOG_FILTER: &str = "sentrasec_core=info,sentrasec=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SimulatorConfig::load_from(path),
        None => SimulatorConfig::load(),
    }
    .context("loading configuration")?;

    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&config.store_path)
            .with_context(|| format!("opening {}", config.store_path.display()))?,
    );

    let clock = TokioClock::current();
    let registry = TaskRegistry::builder(clock.clone())
        .notifier(TracingNotifier)
        .with_config(&config)
        .build();

    match cli.action {
        Action::Recon(recon) => {
            let handle = registry.start(
                recon.subnet,
                TaskKind::Scan,
                config.preset(TaskKind::Scan).task_config(),
            )?;
            let _progress = console::follow(&registry, &handle);
            console::wait_for(&registry, &handle).await?;
        }
        Action::Scan(scan) => {
            let handle = registry.start(
                scan.ip.to_string(),
                TaskKind::FocusedScan,
                config.preset(TaskKind::FocusedScan).task_config(),
            )?;
            let _progress = console::follow(&registry, &handle);
            console::wait_for(&registry, &handle).await?;
        }
        Action::Exploit(exploit) => {
            let handle = registry.start(
                exploit.id,
                TaskKind::Exploit,
                config.preset(TaskKind::Exploit).task_config(),
            )?;
            let _progress = console::follow(&registry, &handle);
            console::wait_for(&registry, &handle).await?;
        }
        Action::ExploitAll(all) => {
            let preset = &config.presets.chain;
            let chain = all
                .ids
                .into_iter()
                .fold(ExploitChain::new(), |chain, id| {
                    chain.link(id, TaskKind::Exploit, preset.task_config())
                })
                .start(&registry);
            let watched = chain.clone();
            console::wait_until(&registry, move || watched.is_finished() || watched.is_halted())
                .await?;
            info!(
                completed = chain.completed_links(),
                total = chain.total_links(),
                "chain done"
            );
        }
        Action::Crack(_) => {
            let vault = Arc::new(CredentialVault::load_or(Arc::clone(&store), demo_credentials())?);
            let handle = registry.start(
                "vault",
                TaskKind::Crack,
                config
                    .preset(TaskKind::Crack)
                    .task_config()
                    .with_label("GPU cracking")
                    .on_complete(crack_on_complete(Arc::clone(&vault))),
            )?;
            let _progress = console::follow(&registry, &handle);
            console::wait_for(&registry, &handle).await?;
        }
        Action::Session(session) => {
            let log = SessionLog::load(Arc::clone(&store))?;
            let record = match session.target {
                Some(target) => log.begin(target, "admin@corp.local", Protocol::Rdp, clock.now())?,
                None => log.begin_simulated(&mut rand::thread_rng(), clock.now())?,
            };
            let handle = registry.start(
                record.target.clone(),
                TaskKind::Session,
                config.preset(TaskKind::Session).task_config(),
            )?;
            let _progress = console::follow(&registry, &handle);
            console::wait_for(&registry, &handle).await?;
            log.update_status(&record.id, SessionStatus::Terminated, clock.now())?;
        }
        Action::Vault(vault) => {
            let credentials = CredentialVault::load_or(Arc::clone(&store), demo_credentials())?;
            let listed = match vault.search {
                Some(term) => credentials.search(&term),
                None => credentials.list(),
            };
            println!("{}", serde_json::to_string_pretty(&listed)?);
        }
        Action::Evidence(evidence) => {
            let locker = EvidenceLocker::load_or(Arc::clone(&store), demo_evidence())?;
            match evidence.export {
                Some(id) => match locker.get(id) {
                    Some(item) => println!("{}", item.export_text()),
                    None => warn!(id, "no such evidence"),
                },
                None => {
                    let listed = match evidence.tag {
                        Some(tag) => locker.with_tag(&tag),
                        None => locker.list(),
                    };
                    println!("{}", serde_json::to_string_pretty(&listed)?);
                }
            }
        }
        Action::Policies(policies) => {
            let book = PolicyBook::load_or(Arc::clone(&store), demo_policies())?;
            if let Some(id) = policies.run {
                match book.run_now(id, clock.now())? {
                    Some(policy) => registry.notify(
                        &format!("Policy run scheduled: {}", policy.name),
                        NotifyLevel::Info,
                    ),
                    None => warn!(id, "no such policy"),
                }
            }
            println!("{}", serde_json::to_string_pretty(&book.list())?);
        }
        Action::Integrations(integrations) => {
            let hub = IntegrationHub::load_or(Arc::clone(&store), demo_integrations())?;
            if let Some(id) = integrations.test {
                match hub.test(id, &mut rand::thread_rng(), clock.now())? {
                    Some(true) => registry.notify("Integration test succeeded", NotifyLevel::Success),
                    Some(false) => registry.notify("Integration test failed", NotifyLevel::Error),
                    None => warn!(id, "no such integration"),
                }
            }
            println!("{}", serde_json::to_string_pretty(&hub.list())?);
        }
    }

    let counts = registry.counts();
    info!(completed = counts.completed, cancelled = counts.cancelled, "done");
    Ok(())
}
