use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use musico::{
    audio::{engine::LoopbackEngine, registry::SessionRegistry},
    config::Config,
};

fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("musico=debug".parse()?)
                .add_directive("serenity=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Musico v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    info!("{}", config.summary());

    // Motor en memoria hasta que haya un nodo de audio real
    let engine = Arc::new(LoopbackEngine::new());
    let registry = Arc::new(SessionRegistry::from_config(engine, &config));

    let shutdown = CancellationToken::new();
    let sweeper = config.idle_timeout.map(|max_idle| {
        info!("🧹 Barrido de sesiones inactivas cada {:?}", config.sweep_interval);
        registry
            .clone()
            .spawn_sweeper(max_idle, config.sweep_interval, shutdown.clone())
    });

    info!("🚀 Servicio de sesiones iniciado");

    // Manejar shutdown graceful
    tokio::signal::ctrl_c().await?;
    info!("⚠️ Señal de shutdown recibida, cerrando...");
    shutdown.cancel();

    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!("❌ Error en la tarea de barrido: {:?}", e);
        }
    }

    let closed = registry.shutdown().await;
    info!("👋 {} sesiones cerradas", closed);
    info!("📊 {}", serde_json::to_string(&registry.stats())?);

    Ok(())
}
