use clap::{Parser, Subcommand};
use dealscan::config::Config;
use dealscan::domain::Region;
use dealscan::logging::init_logging;
use dealscan::pipeline::{build_pipeline, SearchRequest};
use dealscan::server::{serve, AppState};
use dealscan::storage::InMemoryStorage;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "dealscan")]
#[command(about = "Cross-marketplace product search with trust scoring and true-cost ranking")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP search service
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one search from the command line and print the ranked deals
    Search {
        query: String,
        /// Region code: US, EU or ASIA
        #[arg(long, default_value = "US")]
        region: String,
        /// Minimum vendor trust score to keep a product
        #[arg(long)]
        min_trust: Option<f64>,
        /// How many deals to show
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = AppState {
                pipeline: Arc::new(build_pipeline(&config)),
                storage: Arc::new(InMemoryStorage::new()),
                default_top_n: config.search.top_n,
                default_min_trust: config.search.min_trust_score,
            };
            serve(&config, state).await?;
        }
        Commands::Search {
            query,
            region,
            min_trust,
            top,
        } => {
            let pipeline = build_pipeline(&config);
            let request = SearchRequest {
                query,
                region: Region::parse(&region),
                min_trust_score: min_trust.unwrap_or(config.search.min_trust_score),
                top_n: top.unwrap_or(config.search.top_n),
            };

            info!(query = %request.query, "running one-shot search");
            let report = pipeline.run(&request).await?;

            println!("\n📊 Search results for \"{}\":", request.query);
            println!("   Marketplaces covered: {:?}", report.covered);
            println!("   Listings found: {}", report.total_found);
            println!("   Passed trust filter: {}", report.trusted_count);
            println!("   Scan time: {:.2}s", report.scan_time.as_secs_f64());

            if report.products.is_empty() {
                println!("\n   No products found");
                return Ok(());
            }

            for (rank, product) in report.products.iter().enumerate() {
                let total = product
                    .true_cost
                    .as_ref()
                    .map(|c| c.total)
                    .unwrap_or(product.price.usd);
                println!(
                    "   {}. ${:<10.2} {} [{} | trust {:.3}]",
                    rank + 1,
                    total,
                    product.title,
                    product.metadata.marketplace,
                    product.vendor.trust_score,
                );
            }

            if let Some(deal) = pipeline.ranker().find_best_deal(report.products.clone()) {
                println!(
                    "\n💸 Best deal saves ${:.2} ({:.1}%) against the most expensive option",
                    deal.savings.amount, deal.savings.percent
                );
            }
        }
    }

    Ok(())
}
