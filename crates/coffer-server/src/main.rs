use std::sync::Arc;

use clap::Parser;
use coffer_core::tuple::TenantId;
use coffer_server::cli::{Cli, Command};
use coffer_server::config::{AppConfig, LogFormat};
use coffer_server::service::AccessService;
use coffer_storage::postgres::PostgresStoreFactory;
use sqlx::postgres::PgPoolOptions;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Command::Migrate => run_migrate(&config).await,
        Command::ProvisionTenant { name } => run_provision_tenant(&config, &name).await,
        Command::VerifyHierarchy { tenant } => {
            run_verify_hierarchy(&config, TenantId::new(tenant)).await
        }
    }
}

async fn connect(config: &AppConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let pool = connect(config).await?;
    coffer_storage::postgres::migrations::run_shared_migrations(&pool).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn run_provision_tenant(
    config: &AppConfig,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect(config).await?;
    coffer_storage::postgres::migrations::run_shared_migrations(&pool).await?;

    let tenant_id = TenantId::new(uuid::Uuid::new_v4());
    let factory = PostgresStoreFactory::new(pool);
    factory.provision_tenant(&tenant_id, name).await?;

    println!("Tenant provisioned successfully");
    println!("  Name:      {name}");
    println!("  Tenant ID: {}", tenant_id.as_uuid());
    Ok(())
}

async fn run_verify_hierarchy(
    config: &AppConfig,
    tenant_id: TenantId,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect(config).await?;
    let factory = Arc::new(PostgresStoreFactory::new(pool));
    let service = AccessService::new(factory, config.to_resolver_config());

    let violations = service.verify_hierarchy(&tenant_id).await?;
    if violations.is_empty() {
        println!("Folder hierarchy of tenant {tenant_id} is consistent");
        return Ok(());
    }

    println!(
        "Found {} closure violation(s) in tenant {tenant_id}:",
        violations.len()
    );
    for violation in &violations {
        println!("  {violation}");
    }
    std::process::exit(1);
}
