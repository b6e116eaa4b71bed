//! Wayfarer application binary - composition root.
//!
//! 1. Resolve configuration (file, then env, then CLI flags)
//! 2. Build the completion clients and the booking form
//! 3. Open the geolocation cache and register the capabilities
//! 4. Start the axum API server

mod cli;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use wayfarer_api::{routes, AppState};
use wayfarer_capability::geo::{CacheStore, JsonFileStore, MemoryStore, SqliteStore};
use wayfarer_capability::{
    CapabilityError, CapabilityRegistry, ExchangeCapability, FlightCapability, FormCapability,
    GeoCache, GeoLocator, WeatherCapability,
};
use wayfarer_chat::TravelAgent;
use wayfarer_core::config::{expand_home, CacheBackend, FormConfig, GeoConfig, WayfarerConfig};
use wayfarer_form::{FormCollector, FormError, FormSchema};
use wayfarer_llm::{AnthropicCompletion, CompletionService};

use cli::CliArgs;

/// `RUST_LOG` wins; otherwise the configured level, bumped to debug when
/// the debug flag is set and the level was left at its default.
fn init_tracing(config: &WayfarerConfig) {
    let level = if config.server.debug && config.logging.level == "info" {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn load_schema(config: &FormConfig) -> Result<FormSchema, FormError> {
    let schema = match config.schema_path {
        Some(ref path) => FormSchema::load(&expand_home(path))?,
        None => {
            tracing::info!("No form schema configured, using built-in booking form");
            FormSchema::builtin()
        }
    };
    Ok(schema.with_special_fields(config.date_range_field.clone(), config.list_field.clone()))
}

fn open_cache_store(config: &GeoConfig) -> Result<Box<dyn CacheStore>, CapabilityError> {
    let path = expand_home(&config.cache_path);
    let store: Box<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Memory => Box::new(MemoryStore),
        CacheBackend::Json => Box::new(JsonFileStore::new(&path)),
        CacheBackend::Sqlite => Box::new(SqliteStore::open(&path)?),
    };
    tracing::info!(
        backend = ?config.cache_backend,
        path = %path.display(),
        ttl_secs = config.ttl_secs,
        "Geolocation cache opened"
    );
    Ok(store)
}

/// Capabilities in the order the router sees them.
fn build_registry(
    config: &WayfarerConfig,
    llm: Arc<dyn CompletionService>,
    geo: Arc<GeoLocator>,
    collector: FormCollector,
) -> Result<CapabilityRegistry, CapabilityError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(WeatherCapability::new(
        Arc::clone(&llm),
        config.weather.clone(),
    )?));
    registry.register(Arc::new(ExchangeCapability::new(
        Arc::clone(&llm),
        config.exchange.clone(),
        Some(Arc::clone(&geo)),
    )?));
    registry.register(Arc::new(FlightCapability::new(
        llm,
        config.flight.clone(),
        Some(geo),
    )?));
    registry.register(Arc::new(FormCapability::new(collector)));
    Ok(registry)
}

fn build_state(config: WayfarerConfig) -> Result<AppState, Box<dyn Error>> {
    let llm: Arc<dyn CompletionService> = Arc::new(AnthropicCompletion::from_config(
        &config.llm,
        config.llm.temperature,
    )?);
    let form_llm: Arc<dyn CompletionService> = Arc::new(AnthropicCompletion::from_config(
        &config.llm,
        config.llm.form_temperature,
    )?);
    tracing::info!(model = %config.llm.model, "Completion clients ready");

    let schema = Arc::new(load_schema(&config.form)?);
    tracing::info!(fields = ?schema.fields(), "Booking form ready");
    let collector = FormCollector::new(form_llm, schema);

    let cache = Arc::new(GeoCache::new(
        Duration::from_secs(config.geo.ttl_secs),
        open_cache_store(&config.geo)?,
    ));
    let geo = Arc::new(GeoLocator::new(&config.geo, cache)?);

    let registry = build_registry(&config, Arc::clone(&llm), geo, collector.clone())?;
    if !registry.contains(&config.orchestration.default_route) {
        tracing::warn!(
            route = %config.orchestration.default_route,
            "Default route names no registered capability"
        );
    }
    tracing::info!(capabilities = ?registry.names(), "Capabilities registered");

    let agent = TravelAgent::new(llm, Arc::new(registry), config.orchestration.clone());
    Ok(AppState::new(config, agent, collector))
}

fn load_config(args: &CliArgs, path: &Path) -> (WayfarerConfig, Option<String>) {
    let (mut config, load_error) = if !path.exists() {
        (WayfarerConfig::default(), None)
    } else {
        match WayfarerConfig::load(path) {
            Ok(config) => (config, None),
            Err(e) => (WayfarerConfig::default(), Some(e.to_string())),
        }
    };
    config.apply_env_overrides();
    args.apply_to(&mut config);
    (config, load_error)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let (config, load_error) = load_config(&args, &config_file);

    init_tracing(&config);
    tracing::info!("Starting Wayfarer v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None if config_file.exists() => {
            tracing::info!(path = %config_file.display(), "Configuration loaded")
        }
        None => tracing::info!(path = %config_file.display(), "No config file, using defaults"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }
    config.validate()?;

    let state = match build_state(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise services");
            return Err(e);
        }
    };

    routes::start_server(state).await?;
    Ok(())
}
