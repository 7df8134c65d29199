use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use roster_search::{
    config::Config,
    search::{
        create_engine, student_mapping, student_projector, IndexSchemaManager, IndexWriteGateway,
    },
    seed::seed_store,
    state::InMemoryStore,
    sync::Reindexer,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "roster-search-cli")]
#[command(about = "Roster search admin CLI", long_about = None)]
struct Cli {
    /// Base URL of the roster-search server
    #[arg(short, long, default_value = "http://localhost:8080", env = "ROSTER_SEARCH_ENDPOINT")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the index with the current mapping
    Reprovision {
        /// Confirm that every indexed document will be discarded
        #[arg(long)]
        yes: bool,
    },

    /// Generate a demo roster and rebuild the index from it
    Seed {
        /// Number of students to generate
        #[arg(value_name = "COUNT", default_value = "100")]
        count: usize,

        /// Confirm that every indexed document will be discarded
        #[arg(long)]
        yes: bool,
    },

    /// Faceted search through the server
    Search {
        /// Facet selection, e.g. `year_in_school=FR,SO`; repeatable
        #[arg(short, long = "filter", value_name = "FIELD=VALUES")]
        filters: Vec<String>,
    },

    /// Name autocomplete through the server
    Suggest {
        #[arg(value_name = "PREFIX")]
        term: String,
    },

    /// Check server health
    Health,
}

fn require_confirmation(yes: bool) -> Result<()> {
    if !yes {
        bail!("this operation deletes the index; pass --yes to continue");
    }
    Ok(())
}

fn filter_query(filters: &[String]) -> Result<String> {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for filter in filters {
        let (field, values) = filter
            .split_once('=')
            .with_context(|| format!("filter '{}' is not FIELD=VALUES", filter))?;
        serializer.append_pair(field, values);
    }
    Ok(serializer.finish())
}

async fn get_json(client: &Client, url: String) -> Result<serde_json::Value> {
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;
    let body: serde_json::Value = response.json().await?;
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Reprovision { yes } => {
            require_confirmation(yes)?;
            let config = Config::load().context("failed to load configuration")?;
            let engine = create_engine(&config.search)?;

            IndexSchemaManager::new(engine, config.search.target(), student_mapping())
                .reprovision()
                .await?;
            println!(
                "Index '{}' reprovisioned with type '{}'",
                config.search.index_name, config.search.doc_type
            );
        }

        Commands::Seed { count, yes } => {
            require_confirmation(yes)?;
            let config = Config::load().context("failed to load configuration")?;
            let engine = create_engine(&config.search)?;

            let store = Arc::new(InMemoryStore::new());
            seed_store(&store, count)?;

            let target = config.search.target();
            let stats = Reindexer::new(
                IndexSchemaManager::new(engine.clone(), target.clone(), student_mapping()),
                Arc::new(student_projector()),
                IndexWriteGateway::new(engine, target),
                store,
            )
            .with_batch_size(config.search.bulk_batch_size)
            .run()
            .await?;

            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Search { filters } => {
            let query = filter_query(&filters)?;
            let body = get_json(&client, format!("{}/search?{}", cli.endpoint, query)).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Suggest { term } => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("term", &term)
                .finish();
            let body = get_json(&client, format!("{}/autocomplete?{}", cli.endpoint, query)).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let body = get_json(&client, format!("{}/health", cli.endpoint)).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
