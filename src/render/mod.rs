//! Overlay rendering: event configuration in, a complete asset set out.
//!
//! A theme is a set of top-level `*.html` templates (role = file stem) plus
//! support files (`css/`, `js/`, `assets/`) copied untouched. All templates
//! are rendered in memory before anything is written, so a single
//! unresolved placeholder leaves the filesystem as it was.

mod assets;
pub mod template;

pub use template::{render, RenderedDocument, Template};

use crate::error::{SceneError, SceneResult};
use crate::event::EventConfig;
use crate::model::SceneRole;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod builtin {
    include!(concat!(env!("OUT_DIR"), "/builtin_theme.rs"));
}

/// Name of the manifest written next to the rendered documents
pub const MANIFEST_FILE: &str = "scene-collection.json";

/// Where templates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    /// Theme compiled into the binary
    Builtin,
    Directory(PathBuf),
}

impl ThemeSource {
    pub fn from_option(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::Directory(dir.to_path_buf()),
            None => Self::Builtin,
        }
    }

    pub fn load(&self) -> SceneResult<Theme> {
        match self {
            Self::Builtin => Theme::from_files(
                builtin::BUILTIN_THEME
                    .iter()
                    .map(|(path, bytes)| (path.to_string(), bytes.to_vec())),
            ),
            Self::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(SceneError::invalid_config(
                        dir.display().to_string(),
                        "theme directory does not exist",
                    ));
                }
                Theme::from_files(assets::read_tree(dir)?)
            }
        }
    }
}

/// A loaded theme.
#[derive(Debug, Clone)]
pub struct Theme {
    templates: Vec<Template>,
    support: Vec<(String, Vec<u8>)>,
}

impl Theme {
    /// Split `(relative path, bytes)` pairs into templates and support files.
    pub fn from_files(files: impl IntoIterator<Item = (String, Vec<u8>)>) -> SceneResult<Self> {
        let mut templates = Vec::new();
        let mut support = Vec::new();

        for (path, bytes) in files {
            match path.strip_suffix(".html").filter(|stem| !stem.contains('/')) {
                Some(role) => {
                    let source = String::from_utf8(bytes).map_err(|e| {
                        SceneError::TemplateSyntax {
                            template: path.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    templates.push(Template::parse(role, &source)?);
                }
                None => support.push((path, bytes)),
            }
        }

        if templates.is_empty() {
            return Err(SceneError::invalid_config(
                "theme",
                "no top-level .html templates found",
            ));
        }

        templates.sort_by_key(|t| SceneRole::from_id(t.role()));
        support.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { templates, support })
    }

    /// Role identifiers in scene order.
    pub fn roles(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.role().to_string()).collect()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }
}

/// Description of a rendered asset set; written as `scene-collection.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub collection_name: String,
    pub label: String,
    pub generated_at: String,
    pub event_title: String,
    pub presenter: String,
    pub scenes: Vec<String>,
    pub roles: Vec<String>,
    pub total_scenes: usize,
}

/// A fully written asset set.
#[derive(Debug, Clone)]
pub struct RenderedAssetSet {
    pub directory: PathBuf,
    pub manifest: Manifest,
    pub documents: Vec<RenderedDocument>,
}

/// Render every template of `theme` without touching the filesystem.
///
/// Fails with every unresolved path across all templates, each prefixed by
/// the template file name (`intro.html:event.subtitle`).
pub fn render_documents(theme: &Theme, config: &EventConfig) -> SceneResult<Vec<RenderedDocument>> {
    let data = config.placeholder_tree()?;
    let mut documents = Vec::with_capacity(theme.templates.len());
    let mut unresolved = Vec::new();

    for template in &theme.templates {
        match template.render(&data) {
            Ok(doc) => documents.push(doc),
            Err(SceneError::UnresolvedPlaceholder { paths }) => {
                let file = format!("{}.html", template.role());
                unresolved.extend(paths.into_iter().map(|p| format!("{file}:{p}")));
            }
            Err(e) => return Err(e),
        }
    }

    if !unresolved.is_empty() {
        return Err(SceneError::UnresolvedPlaceholder { paths: unresolved });
    }
    Ok(documents)
}

/// Render `theme` and write a new asset set under `output_root`.
///
/// The directory is named `<collection_name>_<YYYYmmdd_HHMMSS>` and is never
/// reused; a second render always produces a sibling directory.
pub fn render_theme(
    theme: &Theme,
    config: &EventConfig,
    output_root: &Path,
    collection_name: &str,
) -> SceneResult<RenderedAssetSet> {
    render_theme_at(theme, config, output_root, collection_name, Local::now())
}

fn render_theme_at(
    theme: &Theme,
    config: &EventConfig,
    output_root: &Path,
    collection_name: &str,
    now: DateTime<Local>,
) -> SceneResult<RenderedAssetSet> {
    let documents = render_documents(theme, config)?;

    let manifest = Manifest {
        collection_name: collection_name.to_string(),
        label: config.event.title.clone(),
        generated_at: now.to_rfc3339(),
        event_title: config.event.title.clone(),
        presenter: config.presenter.name.clone(),
        scenes: documents.iter().map(RenderedDocument::file_name).collect(),
        roles: theme.roles(),
        total_scenes: documents.len(),
    };

    let dir_name = format!("{}_{}", collection_name, now.format("%Y%m%d_%H%M%S"));
    let readme = assets::readme(&manifest);
    let directory = assets::write_asset_set(
        output_root,
        &dir_name,
        &documents,
        &theme.support,
        &manifest,
        &readme,
    )?;

    tracing::info!(
        "Rendered {} scenes into {}",
        manifest.total_scenes,
        directory.display()
    );

    Ok(RenderedAssetSet {
        directory,
        manifest,
        documents,
    })
}

/// Read a manifest written by [`render_theme`].
pub fn read_manifest(directory: &Path) -> SceneResult<Manifest> {
    let contents = std::fs::read_to_string(directory.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn workshop() -> EventConfig {
        EventConfig::from_toml_str(
            r#"
[event]
title = "Security Workshop"

[presenter]
name = "A. Muhardin"

[session]
topics = ["SQLi", "XSS"]
"#,
        )
        .unwrap()
    }

    fn theme(files: &[(&str, &str)]) -> Theme {
        Theme::from_files(
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec())),
        )
        .unwrap()
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("obs-scenes-render-{}-{}", tag, rand::random::<u32>()))
    }

    #[test]
    fn builtin_theme_renders_demo_event() {
        let config = EventConfig::from_toml_str(include_str!("../../demos/event.toml")).unwrap();
        let theme = ThemeSource::Builtin.load().unwrap();
        let docs = render_documents(&theme, &config).unwrap();

        assert_eq!(
            theme.roles(),
            vec!["intro", "talking-head", "code-demo", "screen-only", "dual-cam", "brb", "outro"]
        );
        assert_eq!(docs.len(), 7);
        assert!(docs.iter().all(|d| !d.contents.contains("{{")));
    }

    #[test]
    fn builtin_theme_reports_unset_optionals_per_file() {
        let theme = ThemeSource::Builtin.load().unwrap();
        match render_documents(&theme, &workshop()).unwrap_err() {
            SceneError::UnresolvedPlaceholder { paths } => {
                assert!(paths.iter().any(|p| p == "intro.html:event.subtitle"));
                assert!(paths.iter().all(|p| p.contains(".html:")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn render_writes_documents_support_and_manifest() {
        let theme = theme(&[
            ("outro.html", "<h1>{{event.title}}</h1>{{#session.topics}}<li>{{.}}</li>{{/session.topics}}"),
            ("intro.html", "<p>{{presenter.name}}</p>"),
            ("css/main.css", "body { margin: 0 }"),
            ("assets/logo.svg", "<svg/>"),
        ]);
        let root = scratch_dir("write");
        let now = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let set = render_theme_at(&theme, &workshop(), &root, "security-workshop-0a1b2c3d", now)
            .unwrap();

        assert_eq!(
            set.directory.file_name().unwrap(),
            "security-workshop-0a1b2c3d_20260301_093000"
        );
        let outro = std::fs::read_to_string(set.directory.join("outro.html")).unwrap();
        assert!(outro.find("SQLi").unwrap() < outro.find("XSS").unwrap());
        assert_eq!(
            std::fs::read(set.directory.join("css/main.css")).unwrap(),
            b"body { margin: 0 }"
        );
        assert!(set.directory.join("README.md").exists());

        let manifest = read_manifest(&set.directory).unwrap();
        assert_eq!(manifest.roles, vec!["intro", "outro"]);
        assert_eq!(manifest.scenes, vec!["intro.html", "outro.html"]);
        assert_eq!(manifest.total_scenes, 2);
        assert_eq!(manifest.event_title, "Security Workshop");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn unresolved_placeholder_leaves_no_files() {
        let theme = theme(&[
            ("intro.html", "{{event.title}}"),
            ("outro.html", "{{messages.thanks}} {{branding.website}}"),
        ]);
        let root = scratch_dir("abort");

        match render_theme(&theme, &workshop(), &root, "x-00000000").unwrap_err() {
            SceneError::UnresolvedPlaceholder { paths } => assert_eq!(
                paths,
                vec!["outro.html:branding.website", "outro.html:messages.thanks"]
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!root.exists());
    }

    #[test]
    fn identical_inputs_render_identically() {
        let theme = ThemeSource::Builtin.load().unwrap();
        let config = EventConfig::from_toml_str(include_str!("../../demos/event.toml")).unwrap();
        assert_eq!(
            render_documents(&theme, &config).unwrap(),
            render_documents(&theme, &config).unwrap()
        );
    }

    #[test]
    fn second_render_creates_sibling_directory() {
        let theme = theme(&[("intro.html", "{{event.title}}")]);
        let root = scratch_dir("sibling");
        let first = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let second = Local.with_ymd_and_hms(2026, 3, 1, 9, 31, 0).unwrap();

        let a = render_theme_at(&theme, &workshop(), &root, "w-1", first).unwrap();
        let b = render_theme_at(&theme, &workshop(), &root, "w-1", second).unwrap();
        assert_ne!(a.directory, b.directory);
        assert!(a.directory.exists() && b.directory.exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn theme_without_templates_is_rejected() {
        let err = Theme::from_files(vec![("css/main.css".to_string(), Vec::new())]).unwrap_err();
        assert!(matches!(err, SceneError::InvalidConfig { .. }));
    }

    #[test]
    fn nested_html_is_support_not_template() {
        let theme = theme(&[("intro.html", "x"), ("partials/card.html", "{{never}}")]);
        assert_eq!(theme.roles(), vec!["intro"]);
        assert_eq!(theme.support.len(), 1);
    }
}
