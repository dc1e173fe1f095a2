//! Handlers behind each CLI subcommand.

use crate::cli::ObsArgs;
use crate::config::{self, LiveCollisionPolicy, Settings};
use crate::event::EventConfig;
use crate::error::SceneResult;
use crate::model::{
    self, BuildInput, DeviceFamily, InventorySettings, LayoutVariant, Platform, SceneCollection, SourceInventory,
};
use crate::network::{self, NetworkProfile, SystemProbe};
use crate::obs::{ObsClient, ObsConnection, Transport};
use crate::reconcile::{self, CancelFlag, ReconcileOptions, ReconciliationReport};
use crate::render::{self, RenderedAssetSet, ThemeSource};
use crate::server::{self, ServerHandle};
use anyhow::{bail, Context, Result};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inputs of the `reconcile` subcommand.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub label: String,
    pub collection: Option<String>,
    pub asset_base: Option<String>,
    pub assets: Option<PathBuf>,
    pub offline: bool,
    pub variant: Option<LayoutVariant>,
    pub excluded: Vec<DeviceFamily>,
}

/// Everything needed to build the collection once OBS reports its devices.
struct Blueprint<'a> {
    label: &'a str,
    name: String,
    roles: &'a [String],
    asset_base: &'a str,
    variant: LayoutVariant,
    excluded: &'a [DeviceFamily],
    platform: Platform,
}

impl Blueprint<'_> {
    fn build<T: Transport + ?Sized>(
        &self,
        obs: &mut T,
        inventory: &InventorySettings,
        name: &str,
    ) -> SceneResult<SceneCollection> {
        let inventory = reconcile::detect_inventory(obs, inventory, self.platform)?;
        let inventory = self
            .excluded
            .iter()
            .fold(inventory, |inv, family| inv.without(*family));
        let collection = model::build(
            &BuildInput {
                label: self.label,
                name,
                roles: self.roles,
                asset_base: self.asset_base,
                variant: self.variant,
            },
            &inventory,
        )?;
        for family in &collection.degraded {
            println!("warning: no {family} device, placeholder scene created");
        }
        Ok(collection)
    }
}

pub fn render(settings: &Settings, config_path: &Path, output: Option<PathBuf>, theme: Option<PathBuf>) -> Result<()> {
    let event = load_event(config_path)?;
    let set = render_event(settings, &event, output, theme)?;

    println!("Rendered {} scenes into {}", set.manifest.total_scenes, set.directory.display());
    for document in &set.documents {
        println!("  {}", document.file_name());
    }
    println!("Collection name: {}", set.manifest.collection_name);
    Ok(())
}

pub fn serve(settings: &Settings, dir: &Path, port: Option<u16>, bind: Option<IpAddr>) -> Result<()> {
    let profile = resolve_profile(settings, &ObsArgs::default());
    let bind = match bind {
        Some(ip) => ip,
        None => bind_address(settings, &profile)?,
    };
    let server = start_server(settings, dir, bind, port.unwrap_or(settings.server.port))?;
    let profile = profile.with_content_port(server.port());

    println!("Serving {} on {}", server.root().display(), server.local_addr());
    println!("Overlay base URL: {}", profile.content_public_url);
    println!("Press Ctrl-C to stop");

    let stop = watch_ctrl_c();
    wait_for(&stop);
    server.stop();
    Ok(())
}

pub fn reconcile(settings: &Settings, plan: ReconcilePlan, obs: &ObsArgs, password: Option<String>) -> Result<()> {
    let profile = resolve_profile(settings, obs);

    let mut server = None;
    let (asset_base, roles, profile) = if plan.offline {
        let dir = plan
            .assets
            .as_deref()
            .context("--offline needs --assets DIR")?;
        let manifest = render::read_manifest(dir)
            .with_context(|| format!("Failed to read asset set manifest in {}", dir.display()))?;
        let handle = start_server(settings, dir, bind_address(settings, &profile)?, settings.server.port)?;
        let profile = profile.with_content_port(handle.port());
        server = Some(handle);
        (profile.content_public_url.clone(), manifest.roles, profile)
    } else {
        let Some(base) = plan.asset_base.or_else(|| settings.assets.remote_base_url.clone()) else {
            bail!("No overlay location: pass --asset-base URL or --offline --assets DIR");
        };
        let roles = reconcile::discover_roles(&base, request_timeout(settings));
        (base, roles, profile)
    };

    // resuming a named collection always reconciles into it
    let (name, policy) = match plan.collection {
        Some(name) => (name, LiveCollisionPolicy::Reuse),
        None => (model::generate_name(&plan.label), settings.collection.on_live_collision),
    };
    let blueprint = Blueprint {
        label: &plan.label,
        name,
        roles: &roles,
        asset_base: &asset_base,
        variant: plan.variant.unwrap_or(settings.collection.variant),
        excluded: &plan.excluded,
        platform: Platform::current(),
    };

    let stop = watch_ctrl_c();
    let report = match inject(settings, &profile, password, &blueprint, policy, &stop) {
        Ok(report) => report,
        Err(e) => {
            if let Some(server) = server {
                server.stop();
            }
            return Err(e);
        }
    };

    if let Some(server) = server {
        if report.is_success() {
            println!("Serving overlays at {}; press Ctrl-C to stop", asset_base);
            wait_for(&stop);
        }
        server.stop();
    }
    finish(&report)
}

/// Build without OBS and write the collection as an importable file.
pub fn export(
    settings: &Settings,
    label: &str,
    collection: Option<String>,
    asset_base: Option<String>,
    output: Option<PathBuf>,
    variant: Option<LayoutVariant>,
) -> Result<()> {
    let Some(base) = asset_base.or_else(|| settings.assets.remote_base_url.clone()) else {
        bail!("No overlay location: pass --asset-base URL");
    };
    let roles = reconcile::discover_roles(&base, request_timeout(settings));
    let name = collection.unwrap_or_else(|| model::generate_name(label));
    let inventory = SourceInventory::from_settings(&settings.inventory, Platform::current());

    let collection = model::build(
        &BuildInput {
            label,
            name: &name,
            roles: &roles,
            asset_base: &base,
            variant: variant.unwrap_or(settings.collection.variant),
        },
        &inventory,
    )
    .context("Failed to build scene collection")?;
    for family in &collection.degraded {
        println!("warning: no {family} device, placeholder scene written");
    }

    let dir = output.unwrap_or_else(|| PathBuf::from("."));
    let path = model::write_obs_json(&collection, &dir)
        .with_context(|| format!("Failed to write collection file into {}", dir.display()))?;
    println!("Wrote {} ({} scenes)", path.display(), collection.scenes.len());
    println!("Import it in OBS with Scene Collection > Import");
    Ok(())
}

pub fn cleanup(
    settings: &Settings,
    collection: &str,
    protect: Option<String>,
    obs: &ObsArgs,
    password: Option<String>,
) -> Result<()> {
    let profile = resolve_profile(settings, obs);
    let protect = protect.unwrap_or_else(|| settings.collection.protected_scene.clone());
    let mut client = connect(settings, &profile, password)?;

    let report = reconcile::cleanup(&mut client, collection, &protect)
        .with_context(|| format!("Failed to clean up collection '{collection}'"))?;
    client.close();

    print!("{report}");
    if !report.failures.is_empty() {
        bail!("{} scenes could not be removed", report.failures.len());
    }
    Ok(())
}

pub fn network(settings: &Settings, obs: &ObsArgs) -> Result<()> {
    let profile = resolve_profile(settings, obs);
    println!("{profile}");
    Ok(())
}

/// Render, serve, build and reconcile, then keep serving until Ctrl-C.
pub fn run(settings: &Settings, config_path: &Path, obs: &ObsArgs, password: Option<String>) -> Result<()> {
    let event = load_event(config_path)?;
    let set = render_event(settings, &event, None, None)?;

    let profile = resolve_profile(settings, obs);
    let stop = watch_ctrl_c();
    let server = start_server(settings, &set.directory, bind_address(settings, &profile)?, settings.server.port)?;
    let profile = profile.with_content_port(server.port());
    tracing::info!("Overlays served at {}", profile.content_public_url);

    let blueprint = Blueprint {
        label: &event.event.title,
        name: set.manifest.collection_name.clone(),
        roles: &set.manifest.roles,
        asset_base: &profile.content_public_url,
        variant: settings.collection.variant,
        excluded: &[],
        platform: Platform::current(),
    };

    let report = match inject(
        settings,
        &profile,
        password,
        &blueprint,
        settings.collection.on_live_collision,
        &stop,
    ) {
        Ok(report) => report,
        Err(e) => {
            server.stop();
            return Err(e);
        }
    };

    if report.is_success() {
        println!("Serving overlays at {}; press Ctrl-C to stop", profile.content_public_url);
        wait_for(&stop);
    }
    server.stop();
    finish(&report)
}

pub fn init_config(settings_path: Option<&Path>, force: bool) -> Result<()> {
    let path = match settings_path {
        Some(p) => p.to_path_buf(),
        None => config::config_path().context("No config directory on this platform")?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_settings(&Settings::default(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn load_event(path: &Path) -> Result<EventConfig> {
    EventConfig::load(path).with_context(|| format!("Failed to load event config: {}", path.display()))
}

fn render_event(
    settings: &Settings,
    event: &EventConfig,
    output: Option<PathBuf>,
    theme: Option<PathBuf>,
) -> Result<RenderedAssetSet> {
    let theme_dir = theme.or_else(|| settings.assets.theme_dir.clone());
    let theme = ThemeSource::from_option(theme_dir.as_deref())
        .load()
        .context("Failed to load theme")?;
    let output_root = output.unwrap_or_else(|| settings.assets.output_root.clone());
    let name = model::generate_name(&event.event.title);

    render::render_theme(&theme, event, &output_root, &name)
        .with_context(|| format!("Failed to render overlays for '{}'", event.event.title))
}

fn request_timeout(settings: &Settings) -> Duration {
    Duration::from_millis(settings.obs.request_timeout_ms)
}

fn resolve_profile(settings: &Settings, obs: &ObsArgs) -> NetworkProfile {
    let host = obs.obs_host.as_deref().unwrap_or(&settings.obs.host);
    let port = obs.obs_port.unwrap_or(settings.obs.port);
    network::resolve(&SystemProbe, Some(host), port, settings.server.port)
}

/// Configured bind address, else the one the profile chose.
fn bind_address(settings: &Settings, profile: &NetworkProfile) -> Result<IpAddr> {
    match &settings.server.bind {
        Some(bind) => bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {bind}")),
        None => Ok(profile.content_bind),
    }
}

fn start_server(settings: &Settings, dir: &Path, bind: IpAddr, port: u16) -> Result<ServerHandle> {
    let grace = Duration::from_millis(settings.server.shutdown_grace_ms);
    server::start(dir, bind, port, grace)
        .with_context(|| format!("Failed to serve {} on {}:{}", dir.display(), bind, port))
}

fn connect(settings: &Settings, profile: &NetworkProfile, password: Option<String>) -> Result<ObsClient> {
    let conn = ObsConnection::new(
        &profile.control_host,
        profile.control_port,
        password.or_else(|| settings.obs.password.clone()),
        request_timeout(settings),
    );
    let client = ObsClient::connect(&conn).context("Failed to connect to OBS")?;
    tracing::info!("Connected to OBS {} at {}", client.server_version, conn.key());
    Ok(client)
}

fn inject(
    settings: &Settings,
    profile: &NetworkProfile,
    password: Option<String>,
    blueprint: &Blueprint<'_>,
    policy: LiveCollisionPolicy,
    stop: &CancelFlag,
) -> Result<ReconciliationReport> {
    let mut client = connect(settings, profile, password)?;
    let options = ReconcileOptions {
        on_live_collision: policy,
        cancel: stop.clone(),
    };
    let report = reconcile::reconcile_with(&mut client, &blueprint.name, &options, |obs, name| {
        blueprint.build(obs, &settings.inventory, name)
    })
    .with_context(|| format!("Reconciliation of '{}' aborted", blueprint.name))?;
    client.close();

    print!("{report}");
    Ok(report)
}

fn finish(report: &ReconciliationReport) -> Result<()> {
    if report.cancelled {
        bail!("Cancelled; scenes created so far were kept");
    }
    if !report.failures.is_empty() {
        bail!("{} scenes failed; rerun with --collection {} to complete them", report.failures.len(), report.collection_name);
    }
    Ok(())
}

/// A flag set when Ctrl-C arrives.
fn watch_ctrl_c() -> CancelFlag {
    let flag = CancelFlag::new();
    let setter = flag.clone();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
        };
        match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping");
                setter.cancel();
            }
            Err(e) => tracing::warn!("Ctrl-C handling unavailable: {}", e),
        }
    });
    flag
}

fn wait_for(flag: &CancelFlag) {
    while !flag.is_cancelled() {
        std::thread::sleep(Duration::from_millis(200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::fake::FakeObs;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("obs-scenes-cmd-{tag}-{}", rand::random::<u32>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let path = scratch_dir("init").join("settings.toml");
        init_config(Some(&path), false).unwrap();
        assert!(init_config(Some(&path), false).is_err());
        init_config(Some(&path), true).unwrap();

        let loaded = config::load_settings(Some(&path)).unwrap();
        assert_eq!(loaded.obs.port, config::DEFAULT_OBS_PORT);
    }

    #[test]
    fn explicit_host_overrides_settings() {
        let settings = Settings::default();
        let profile = resolve_profile(
            &settings,
            &ObsArgs {
                obs_host: Some("192.168.1.20".to_string()),
                obs_port: Some(4460),
            },
        );
        assert_eq!(profile.control_host, "192.168.1.20");
        assert_eq!(profile.control_port, 4460);
        assert_eq!(profile.discovery, network::Discovery::Explicit);
    }

    #[test]
    fn bad_bind_setting_is_reported() {
        let mut settings = Settings::default();
        settings.server.bind = Some("not-an-ip".to_string());
        let profile = resolve_profile(&settings, &ObsArgs::default());
        let err = bind_address(&settings, &profile).unwrap_err();
        assert!(format!("{err:#}").contains("server.bind"));
    }

    #[test]
    fn render_writes_asset_set() {
        let mut settings = Settings::default();
        settings.assets.output_root = scratch_dir("render");
        let config = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/event.toml");

        let event = load_event(&config).unwrap();
        let set = render_event(&settings, &event, None, None).unwrap();
        assert!(set.directory.starts_with(&settings.assets.output_root));
        assert!(set.directory.join(render::MANIFEST_FILE).exists());
        assert_eq!(set.manifest.total_scenes, set.documents.len());
    }

    #[test]
    fn blueprint_builds_from_detected_devices() {
        let mut obs = FakeObs::new();
        obs.set_devices("v4l2_source", &[("Cam Link 4K", "/dev/video0")]);
        obs.set_devices("pulse_input_capture", &[("Default", "default")]);
        let roles = vec!["intro".to_string(), "code-demo".to_string()];
        let blueprint = Blueprint {
            label: "Demo",
            name: "demo-00c0ffee".to_string(),
            roles: &roles,
            asset_base: "http://172.29.140.7:8080",
            variant: LayoutVariant::Standard,
            excluded: &[DeviceFamily::Audio],
            platform: Platform::Linux,
        };

        let collection = blueprint
            .build(&mut obs, &InventorySettings::default(), "demo-00c0ffee")
            .unwrap();
        let camera = collection.scene("📹 Camera").unwrap();
        assert_eq!(camera.items[0].name, "Cam Link 4K");
        assert_eq!(collection.degraded, vec![DeviceFamily::Audio]);
    }

    #[test]
    fn export_without_asset_location_fails_early() {
        let err = export(&Settings::default(), "Demo", None, None, None, None).unwrap_err();
        assert!(err.to_string().contains("--asset-base"));
    }

    #[test]
    fn reconcile_without_asset_location_fails_early() {
        let settings = Settings::default();
        let plan = ReconcilePlan {
            label: "Demo".to_string(),
            ..Default::default()
        };
        let err = reconcile(&settings, plan, &ObsArgs::default(), None).unwrap_err();
        assert!(err.to_string().contains("--asset-base"));
    }
}
