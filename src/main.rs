use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nolivos::assistant::SessionManager;
use nolivos::channels::web::{GatewayState, RateLimiter, start_server};
use nolivos::config::Config;
use nolivos::db::Database;
use nolivos::db::libsql::LibSqlBackend;
use nolivos::db::seed::seed_sample_data;
use nolivos::portal::{Role, nav_links, nav_links_for};
use nolivos::settings::Settings;
use nolivos::upstream::Upstream;

#[derive(Debug, Parser)]
#[command(name = "nolivos", version, about = "Nolivos Law portal and legal assistant gateway")]
struct Cli {
    /// TOML settings file. Environment variables override its values.
    #[arg(long, env = "NOLIVOS_SETTINGS", default_value = "nolivos.toml", global = true)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway (default).
    Serve,
    /// Create the database schema.
    SetupDb {
        /// Also insert the sample firm (admin, lawyer, paralegal, two clients).
        #[arg(long)]
        seed: bool,
    },
    /// Print the navigation links for a role as JSON (`all` for every role).
    Nav {
        #[arg(long, default_value = "client")]
        role: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nolivos=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("loading {}", cli.settings.display()))?;
    let config = Config::resolve(&settings)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::SetupDb { seed } => setup_db(&config, seed).await,
        Command::Nav { role } => {
            let json = if role.trim().eq_ignore_ascii_case("all") {
                let table: BTreeMap<_, _> = Role::ALL
                    .into_iter()
                    .map(|r| (r.as_str(), nav_links(Some(r))))
                    .collect();
                serde_json::to_string_pretty(&table)?
            } else {
                serde_json::to_string_pretty(nav_links_for(&role))?
            };
            println!("{json}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = nolivos::db::connect_from_config(&config.database)
        .await
        .context("opening portal database")?;
    let upstream = Upstream::from_config(&config.upstream, &config.assistant.firm_name)?;
    let assistant = Arc::new(SessionManager::new(
        upstream.clone(),
        config.assistant.session_ttl,
    ));
    let reaper = assistant.spawn_reaper();

    let gateway = &config.gateway;
    let state = Arc::new(GatewayState::new(
        store,
        upstream,
        assistant,
        RateLimiter::new(gateway.chat_rate_limit, gateway.chat_rate_window_secs),
        gateway.demo_user_email.clone(),
    )
    .with_secure_cookies(gateway.secure_cookies));
    let addr = start_server(gateway.addr, state.clone()).await?;
    tracing::info!(
        %addr,
        database = %config.database.path.display(),
        documents = config.upstream.documents_url.is_some(),
        chat = config.upstream.chat_url.is_some(),
        news = config.upstream.news_url.is_some(),
        "Nolivos portal ready"
    );

    tokio::signal::ctrl_c().await?;
    state.shutdown().await;
    reaper.abort();
    Ok(())
}

async fn setup_db(config: &Config, seed: bool) -> anyhow::Result<()> {
    let backend = LibSqlBackend::new_local(&config.database.path).await?;
    backend.run_migrations().await?;
    tracing::info!(path = %config.database.path.display(), "schema applied");
    if seed {
        let report = seed_sample_data(&backend).await?;
        println!(
            "seeded {} users, {} clients, {} cases",
            report.users, report.clients, report.cases
        );
    }
    Ok(())
}
