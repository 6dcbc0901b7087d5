use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use token_renewer::config::providers::ProviderTypes;
use token_renewer::identity::kinit::KinitIdentityLibrary;
use token_renewer::identity::IdentityLibrary;
use token_renewer::providers::http::HttpTokenProvider;
use token_renewer::providers::CredentialProvider;
use token_renewer::publishers::build_publishers;
use token_renewer::renewal::{ManagerConfig, ServiceCredentialsManager};
use token_renewer::server;
use token_renewer::utils::config_loader;
use token_renewer::utils::logging::{self, LogLevel};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-renewer.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Identity library, providers, publishers
    // -------------------------------

    let client = Client::new();
    let library: Arc<dyn IdentityLibrary> = Arc::new(KinitIdentityLibrary::new(&service_config.kerberos));

    let providers: Vec<Arc<dyn CredentialProvider>> = service_config
        .providers
        .iter()
        .map(|(service, provider_config)| match provider_config.provider_type {
            ProviderTypes::Http => Arc::new(HttpTokenProvider::new(
                service.as_str(),
                provider_config.clone(),
                client.clone(),
            )) as Arc<dyn CredentialProvider>,
        })
        .collect();

    let publishers = build_publishers(service_config.publishers.values().cloned(), &client)?;
    if publishers.is_empty() {
        warn!("no publishers configured, renewed tokens stay in process");
    }

    // -------------------------------
    // 3. Credentials manager: initial round, then renewal loop
    // -------------------------------

    let manager = Arc::new(ServiceCredentialsManager::new(
        ManagerConfig::from_service_config(&service_config),
        providers,
        library,
        Arc::new(publishers),
    )?);
    match manager.start().await {
        Some(initial) => info!("initial tokens obtained for {:?}", initial.bundle.services().collect::<Vec<_>>()),
        None => warn!("initial token acquisition failed, will retry"),
    }

    // -------------------------------
    // 4. Status / metrics server until shutdown
    // -------------------------------

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let http_server = tokio::spawn({
        let settings = service_config.settings.clone();
        let manager = manager.clone();
        async move {
            server::server::start(&settings, manager, async move { server_shutdown.cancelled().await }).await
        }
    });

    info!("Service starting...");
    wait_for_signal().await?;
    info!("shutdown requested");

    shutdown.cancel();
    manager.stop().await;
    http_server.await??;
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
