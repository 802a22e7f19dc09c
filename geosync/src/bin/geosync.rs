use std::process::exit;

use clap::Parser;
use geosync::config::args::{Args, Commands, SyncArgs};
use geosync::config::{Config, Env as _, OsEnv, read_config, read_datasets};
use geosync::logging::{ensure_core_log_level_matches, init_tracing};
use geosync::{GeosyncError, GeosyncResult, commands};
use geosync_core::catalog::FeatureSetId;
use geosync_core::catalog::postgres::PostgresCatalog;
use geosync_core::remote::OgcClient;
use geosync_core::styles::StyleResolver;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args, env: OsEnv, cancel: CancellationToken) -> GeosyncResult<()> {
    info!("Starting geosync v{VERSION}");

    let mut config = if let Some(ref cfg_filename) = args.meta.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &env)?
    } else {
        Config::default()
    };
    args.meta.merge_into_config(&mut config, &env);
    config.finalize()?;

    let store = PostgresCatalog::new(config.connection_string()?, config.pool_size()).await?;

    match args.command {
        Commands::Init => commands::init(&store).await?,
        Commands::Sync(SyncArgs {
            datasets,
            no_refresh,
        }) => {
            let catalog = match datasets {
                Some(path) => read_datasets(&path)?,
                None => config.catalog(),
            };
            if catalog.datasets.is_empty() {
                warn!("No datasets are configured, nothing will be mirrored");
            }
            let source = OgcClient::new(&config.client_options())?;
            let refresh = (!no_refresh).then(|| config.refresh_options());
            let output =
                commands::sync(&store, &source, &catalog, config.policies, refresh, cancel).await?;
            print_json(&output)?;
        }
        Commands::Refresh => {
            let source = OgcClient::new(&config.client_options())?;
            let report =
                commands::refresh(&store, &source, config.refresh_options(), cancel).await?;
            print_json(&report)?;
        }
        Commands::Upload { file, name } => {
            let report = commands::upload(&store, &file, name.as_deref()).await?;
            print_json(&report)?;
        }
        Commands::Export { feature_set } => {
            let resolver = StyleResolver::new(config.styles.colormap_mode);
            let collection =
                commands::export_feature_set(&store, FeatureSetId(feature_set), resolver).await?;
            print_json(&collection)?;
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> GeosyncResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(GeosyncError::OutputError)?;
    println!("{text}");
    Ok(())
}

/// The first Ctrl-C stops a refresh after the current feature set, the second one exits.
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {e}");
        return;
    }
    warn!("Interrupted, stopping after the current feature set. Press Ctrl-C again to exit now.");
    cancel.cancel();
    if tokio::signal::ctrl_c().await.is_ok() {
        exit(130);
    }
}

#[tokio::main]
async fn main() {
    let env = OsEnv::default();
    let filter = ensure_core_log_level_matches(env.log_filter());
    if let Err(e) = init_tracing(&filter, env.log_format()) {
        eprintln!("{e}");
        exit(1);
    }

    let args = Args::parse();
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    if let Err(e) = start(args, env, cancel).await {
        // Ensure the message is printed, even if the logging is disabled
        if tracing::enabled!(Level::ERROR) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        exit(1);
    }
}
