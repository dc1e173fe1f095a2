//! Which overlay roles a remote asset base provides.

use crate::model::SceneRole;
use crate::render::{Manifest, MANIFEST_FILE};
use reqwest::blocking::Client;
use std::time::Duration;

fn standard_roles() -> Vec<String> {
    SceneRole::STANDARD.iter().map(|r| r.id().to_string()).collect()
}

/// Roles served under `base_url`.
///
/// Reads the manifest first, then probes each standard role with HEAD, and
/// finally assumes the standard set. Never fails.
pub fn discover_roles(base_url: &str, timeout: Duration) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let client = match Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("HTTP client unavailable ({}); assuming standard roles", e);
            return standard_roles();
        }
    };

    match fetch_manifest(&client, base) {
        Ok(manifest) if !manifest.roles.is_empty() => {
            tracing::info!("Roles from {}/{}: {}", base, MANIFEST_FILE, manifest.roles.join(", "));
            return manifest.roles;
        }
        Ok(_) => tracing::debug!("Manifest at {} lists no roles", base),
        Err(e) => tracing::debug!("No manifest at {}: {:#}", base, e),
    }

    let probed: Vec<String> = SceneRole::STANDARD
        .iter()
        .map(|role| role.id().to_string())
        .filter(|role| {
            client
                .head(format!("{base}/{role}.html"))
                .send()
                .map(|resp| resp.status().is_success())
                .unwrap_or(false)
        })
        .collect();
    if !probed.is_empty() {
        tracing::info!("Roles probed at {}: {}", base, probed.join(", "));
        return probed;
    }

    tracing::warn!("Nothing answered at {}; assuming standard roles", base);
    standard_roles()
}

fn fetch_manifest(client: &Client, base: &str) -> anyhow::Result<Manifest> {
    let manifest = client
        .get(format!("{base}/{MANIFEST_FILE}"))
        .send()?
        .error_for_status()?
        .json()?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;

    fn dir_with(files: &[(&str, &str)]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("obs-scenes-discover-{}", rand::random::<u32>()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.join(name), contents).unwrap();
        }
        dir
    }

    fn serve(dir: &PathBuf) -> server::ServerHandle {
        server::start(
            dir,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            Duration::from_millis(100),
        )
        .unwrap()
    }

    #[test]
    fn manifest_roles_win() {
        let manifest = serde_json::json!({
            "collection_name": "demo-00000001",
            "label": "Demo",
            "generated_at": "2026-10-14T10:00:00",
            "event_title": "Demo",
            "presenter": "Sam",
            "scenes": ["🎬 Intro Scene", "🎨 Lower Third"],
            "roles": ["intro", "lower-third"],
            "total_scenes": 2,
        });
        let dir = dir_with(&[(MANIFEST_FILE, &manifest.to_string()), ("outro.html", "x")]);
        let server = serve(&dir);

        let roles = discover_roles(&server.base_url(), Duration::from_secs(2));
        assert_eq!(roles, vec!["intro", "lower-third"]);
        server.stop();
    }

    #[test]
    fn heads_each_role_when_manifest_missing() {
        let dir = dir_with(&[("intro.html", "x"), ("brb.html", "y")]);
        let server = serve(&dir);

        let roles = discover_roles(&format!("{}/", server.base_url()), Duration::from_secs(2));
        assert_eq!(roles, vec!["intro", "brb"]);
        server.stop();
    }

    #[test]
    fn unreachable_base_assumes_standard_set() {
        // port 9 (discard) is not served
        let roles = discover_roles("http://127.0.0.1:9", Duration::from_millis(200));
        assert_eq!(roles, standard_roles());
    }
}
