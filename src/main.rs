pub mod centroids;
pub mod config;
pub mod data;
pub mod geography;
pub mod select;
pub mod server;
pub mod types;

use clap::{Parser, Subcommand};
use select::RenderRequest;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use types::{ColorScale, VizMode};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one render spec as JSON and exit
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// choropleth, scatter, or density
        #[arg(short, long, default_value = "choropleth")]
        mode: VizMode,
        /// One of the fixed dashboard color scales
        #[arg(short, long, default_value = "Reds")]
        scale: ColorScale,
        /// Lower inclusive HVI filter bound
        #[arg(long)]
        low: Option<u8>,
        /// Upper inclusive HVI filter bound
        #[arg(long)]
        high: Option<u8>,
        /// Write the spec here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Serve the dashboard API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render {
            config,
            mode,
            scale,
            low,
            high,
            output,
        } => {
            let app_config = config::AppConfig::load_from_file(config);
            let table = data::load_table(&app_config.data);
            let boundary = geography::resolve_geography(&app_config.geography)
                .await
                .map(Arc::new);

            let request = RenderRequest {
                mode: *mode,
                color_scale: *scale,
                low: *low,
                high: *high,
            };
            let outcome = select::select(&table, boundary.as_ref(), &request, &app_config.map);
            for advisory in &outcome.advisories {
                eprintln!("advisory: {}", advisory);
            }

            let json = serde_json::to_string_pretty(&outcome)?;
            match output {
                Some(path) => fs::write(path, json)?,
                None => println!("{}", json),
            }
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config);
            let table = data::load_table(&app_config.data);
            let boundary = geography::resolve_geography(&app_config.geography)
                .await
                .map(Arc::new);

            server::start_server(app_config, table, boundary).await?;
        }
    }

    Ok(())
}
