use clap::Parser;

pub mod cli;
mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod model;
pub mod network;
pub mod obs;
pub mod reconcile;
pub mod render;
pub mod server;

// Include generated constants from build.rs
pub mod app_constants {
    include!(concat!(env!("OUT_DIR"), "/app_constants.rs"));
}

use cli::{Cli, Commands};
use model::DeviceFamily;

/// Parse arguments, load settings, initialize logging and dispatch.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.settings.as_deref())?;
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        settings.logging.json = true;
    }
    logging::init_logging(&settings.logging);
    tracing::debug!("{} {}", app_constants::APP_NAME, app_constants::APP_VERSION);

    match cli.command {
        Commands::Render { config, output, theme } => commands::render(&settings, &config, output, theme),
        Commands::Serve { dir, port, bind } => commands::serve(&settings, &dir, port, bind),
        Commands::Reconcile {
            label,
            collection,
            asset_base,
            offline,
            assets,
            obs,
            password,
            variant,
            no_camera,
            no_screen,
            no_audio,
        } => {
            let excluded = [
                (no_camera, DeviceFamily::Camera),
                (no_screen, DeviceFamily::Screen),
                (no_audio, DeviceFamily::Audio),
            ]
            .into_iter()
            .filter_map(|(off, family)| off.then_some(family))
            .collect();
            let plan = commands::ReconcilePlan {
                label,
                collection,
                asset_base,
                assets,
                offline,
                variant,
                excluded,
            };
            commands::reconcile(&settings, plan, &obs, password)
        }
        Commands::Export {
            label,
            collection,
            asset_base,
            output,
            variant,
        } => commands::export(&settings, &label, collection, asset_base, output, variant),
        Commands::Cleanup {
            collection,
            protect,
            obs,
            password,
        } => commands::cleanup(&settings, &collection, protect, &obs, password),
        Commands::Network { obs } => commands::network(&settings, &obs),
        Commands::Run { config, obs, password } => commands::run(&settings, &config, &obs, password),
        Commands::InitConfig { force } => commands::init_config(cli.settings.as_deref(), force),
    }
}
