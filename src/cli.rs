//! Command-line surface.
//!
//! Usage:
//!   obs-scenes render <CONFIG>       Render overlays into a new asset set
//!   obs-scenes serve <DIR>           Serve an asset set over HTTP
//!   obs-scenes reconcile --label L   Inject the scene collection into OBS
//!   obs-scenes export --label L      Write an OBS-importable collection file
//!   obs-scenes cleanup --collection  Remove a collection's scenes
//!   obs-scenes network               Print the resolved network profile
//!   obs-scenes run <CONFIG>          Full pipeline, serving until Ctrl-C
//!   obs-scenes init-config           Write the default settings file

use crate::model::LayoutVariant;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "obs-scenes",
    about = "Render event overlays and inject a nested scene collection into OBS Studio",
    version
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where OBS is and how to authenticate.
#[derive(Args, Debug, Clone, Default)]
pub struct ObsArgs {
    /// OBS WebSocket host; omit to detect
    #[arg(long, env = "OBS_HOST")]
    pub obs_host: Option<String>,

    /// OBS WebSocket port
    #[arg(long, env = "OBS_PORT")]
    pub obs_port: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render overlay templates for an event
    Render {
        /// Event TOML file
        config: PathBuf,

        /// Parent directory for the asset set
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Template directory (defaults to the bundled theme)
        #[arg(long)]
        theme: Option<PathBuf>,
    },

    /// Serve a rendered asset set until Ctrl-C
    Serve {
        /// Asset set directory
        dir: PathBuf,

        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (defaults to the resolved network profile)
        #[arg(long)]
        bind: Option<IpAddr>,
    },

    /// Create the scene collection in OBS
    Reconcile {
        /// Human label; the collection name is derived from it
        #[arg(long)]
        label: String,

        /// Resume an existing collection instead of generating a name
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,

        /// URL the overlay pages are published under
        #[arg(long, conflicts_with = "offline")]
        asset_base: Option<String>,

        /// Serve a local asset set instead of a published one
        #[arg(long, env = "OBS_SCENES_OFFLINE", requires = "assets")]
        offline: bool,

        /// Asset set directory served in offline mode
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,

        #[command(flatten)]
        obs: ObsArgs,

        #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Layout variant: standard | content-focus
        #[arg(long)]
        variant: Option<LayoutVariant>,

        /// Build without a camera source
        #[arg(long)]
        no_camera: bool,

        /// Build without a screen capture source
        #[arg(long)]
        no_screen: bool,

        /// Build without a microphone source
        #[arg(long)]
        no_audio: bool,
    },

    /// Write the scene collection as a file for Scene Collection > Import
    Export {
        /// Human label; the collection name is derived from it
        #[arg(long)]
        label: String,

        /// Collection name to use instead of a generated one
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,

        /// URL the overlay pages are published under
        #[arg(long)]
        asset_base: Option<String>,

        /// Directory for the `<collection>.json` file
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Layout variant: standard | content-focus
        #[arg(long)]
        variant: Option<LayoutVariant>,
    },

    /// Remove every scene of a collection except the protected one
    Cleanup {
        #[arg(long)]
        collection: String,

        /// Scene to keep (defaults to settings, "Scene")
        #[arg(long)]
        protect: Option<String>,

        #[command(flatten)]
        obs: ObsArgs,

        #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Print the resolved network profile
    Network {
        #[command(flatten)]
        obs: ObsArgs,
    },

    /// Render, serve and reconcile, then serve until Ctrl-C
    Run {
        /// Event TOML file
        config: PathBuf,

        #[command(flatten)]
        obs: ObsArgs,

        #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Write the default settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
