use anyhow::{Context, Result};
use country_ledger::{
    status, Config, CountryQuery, PngRenderer, Refresher, ReportRenderer, SortKey,
    SqliteCountryStore, UpstreamClient,
};
use std::env;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    match args.get(1).map(String::as_str) {
        Some("refresh") => run_refresh(&config).await?,
        Some("status") => run_status(&config)?,
        Some("list") => run_list(&config, args.get(2).map(String::as_str))?,
        _ => print_usage(),
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<SqliteCountryStore> {
    SqliteCountryStore::open(&config.database_path)
        .with_context(|| format!("failed to open database {}", config.database_path.display()))
}

async fn run_refresh(config: &Config) -> Result<()> {
    println!("🔄 Refreshing countries and exchange rates");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = Arc::new(Mutex::new(open_store(config)?));
    let upstream = UpstreamClient::new(&config.registry_url, &config.rates_url, config.fetch_timeout)?;
    let renderer: Arc<dyn ReportRenderer> = Arc::new(PngRenderer::new(&config.font_path));
    let refresher = Refresher::new(upstream, store, renderer, &config.summary_image_path);

    let outcome = refresher.refresh().await.context("refresh failed")?;

    println!("✓ Inserted: {} countries", outcome.reconciliation.inserted);
    println!("✓ Updated:  {} countries", outcome.reconciliation.updated);
    println!("✓ Batch time: {}", outcome.refreshed_at.to_rfc3339());
    match outcome.summary {
        Ok(path) => println!("✓ Summary image: {}", path.display()),
        Err(e) => println!("⚠️  Summary image skipped: {e}"),
    }

    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let summary = status(&open_store(config)?)?;

    println!("📊 Countries: {}", summary.total_countries);
    if summary.is_empty() {
        println!("   Never refreshed");
    } else {
        println!("   Last refreshed: {}", summary.last_refreshed_at.to_rfc3339());
    }

    Ok(())
}

fn run_list(config: &Config, region: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let mut query = CountryQuery::from_params(region, None, None);
    query.sort = SortKey::GdpDesc;

    let result = query.run(&store)?;
    for country in &result.countries {
        println!(
            "{:<40} {:>6} {:>22.2}",
            country.name,
            country.currency_code.as_deref().unwrap_or("-"),
            country.estimated_gdp
        );
    }
    println!("\n{} countries, sorted by {}", result.total, query.sort.as_str());

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: country-ledger <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  refresh          fetch upstream data and reconcile the database");
    eprintln!("  status           print total countries and last refresh time");
    eprintln!("  list [region]    list countries by estimated GDP");
    eprintln!();
    eprintln!("Web server: cargo run --bin country-server");
}
