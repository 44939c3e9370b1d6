use crate::api::ApiServer;
use crate::chat::ChatSimulator;
use crate::config::Config;
use crate::driver::{ChromeDriverProcess, SessionDriver, WebDriverSessionDriver};
use crate::fleet::{LaunchQueue, MeetingStore};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run_service() -> Result<()> {
    info!("Starting meetbots service");

    let config = Config::load()?;

    let (webdriver_url, chromedriver) = match &config.driver.webdriver_url {
        Some(url) => (url.clone(), None),
        None => {
            let process = ChromeDriverProcess::spawn(config.driver.chromedriver_port).await?;
            (process.url().to_string(), Some(process))
        }
    };

    let driver: Arc<dyn SessionDriver> = Arc::new(WebDriverSessionDriver::new(
        &webdriver_url,
        &config.driver,
        config.launch.join_retries,
    )?);

    let store = build_store(driver, &config);

    let shutdown = CancellationToken::new();
    let api_server = ApiServer::new(store.clone(), &config);
    let server = tokio::spawn(api_server.start(shutdown.clone()));

    info!("meetbots is ready!");
    info!(
        "Try: curl -X POST {}/add-bots -H 'content-type: application/json' -d '{{\"meetingId\":\"<id>\",\"desiredVideoBots\":2,\"desiredNonVideoBots\":1,\"enableAudioForFirstBot\":true}}'",
        config.server.base_url()
    );

    let result = serve_until(server, shutdown, tokio::signal::ctrl_c()).await;

    store.shutdown().await;
    if let Some(process) = chromedriver {
        process.stop().await;
    }

    result
}

/// Waits for `signal` or for the server to stop on its own, whichever comes
/// first, and reports how the server ended.
async fn serve_until(
    mut server: JoinHandle<Result<()>>,
    shutdown: CancellationToken,
    signal: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    let exit = tokio::select! {
        received = signal => {
            if let Err(e) = received {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            shutdown.cancel();
            (&mut server).await
        }
        exit = &mut server => {
            error!("API server stopped unexpectedly; shutting down");
            exit
        }
    };

    match exit {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("API server failed: {}", e);
            Err(e)
        }
        Err(e) => {
            error!("API server task failed: {}", e);
            Err(e.into())
        }
    }
}

pub fn build_store(driver: Arc<dyn SessionDriver>, config: &Config) -> MeetingStore {
    let chat = config
        .chat
        .enabled
        .then(|| ChatSimulator::new(&config.chat));

    info!(
        "Launch concurrency {}, chat {}",
        config.launch.concurrency,
        if chat.is_some() { "on" } else { "off" }
    );

    MeetingStore::new(driver, LaunchQueue::new(config.launch.concurrency), chat)
}
