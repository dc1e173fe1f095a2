//! Filesystem side of rendering: reading theme trees and writing asset sets.

use super::{Manifest, RenderedDocument, MANIFEST_FILE};
use crate::error::SceneResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Every file under `root` as `("rel/path", bytes)`, sorted by path.
pub(super) fn read_tree(root: &Path) -> SceneResult<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    collect(root, root, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) -> SceneResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(root, &path, out)?;
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        out.push((relative, fs::read(&path)?));
    }
    Ok(())
}

/// Write the set into `<output_root>/.<dir_name>.staging`, then rename it to
/// `<output_root>/<dir_name>`. A failed write removes the staging directory.
pub(super) fn write_asset_set(
    output_root: &Path,
    dir_name: &str,
    documents: &[RenderedDocument],
    support: &[(String, Vec<u8>)],
    manifest: &Manifest,
    readme: &str,
) -> SceneResult<PathBuf> {
    let target = output_root.join(dir_name);
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )
        .into());
    }

    fs::create_dir_all(output_root)?;
    let staging = output_root.join(format!(".{dir_name}.staging"));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    let written = write_staging(&staging, documents, support, manifest, readme)
        .and_then(|()| fs::rename(&staging, &target).map_err(Into::into));

    if let Err(e) = written {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    Ok(target)
}

fn write_staging(
    staging: &Path,
    documents: &[RenderedDocument],
    support: &[(String, Vec<u8>)],
    manifest: &Manifest,
    readme: &str,
) -> SceneResult<()> {
    fs::create_dir_all(staging)?;

    for doc in documents {
        fs::write(staging.join(doc.file_name()), &doc.contents)?;
    }
    for (relative, bytes) in support {
        let path = staging.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
    }

    fs::write(
        staging.join(MANIFEST_FILE),
        serde_json::to_string_pretty(manifest)?,
    )?;
    fs::write(staging.join("README.md"), readme)?;
    Ok(())
}

pub(super) fn readme(manifest: &Manifest) -> String {
    let mut out = format!(
        "# {}\n\nPresenter: {}\nCollection: `{}`\nGenerated: {}\n\n## Scenes\n\n",
        manifest.event_title, manifest.presenter, manifest.collection_name, manifest.generated_at
    );
    for (role, file) in manifest.roles.iter().zip(&manifest.scenes) {
        out.push_str(&format!("- `{role}`: {file}\n"));
    }
    out.push_str(
        "\nServe this directory with `obs-scenes serve <DIR>` and add each page as a \
         1920x1080 browser source, or run `obs-scenes reconcile --offline --assets <DIR>`.\n",
    );
    out
}
