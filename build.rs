use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let theme_dir = Path::new(&manifest_dir).join("themes").join("default");

    generate_app_constants();
    generate_builtin_theme(&theme_dir);

    // Tell Cargo to rerun if the bundled theme changes
    println!("cargo:rerun-if-changed=themes/default");
}

fn generate_app_constants() {
    let product_name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "obs-scenes".to_string());
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("app_constants.rs");

    let constants = format!(
        r#"/// Auto-generated from Cargo.toml - do not edit manually

/// Application name used for paths and the HTTP server header (e.g., "obs-scenes")
pub const APP_NAME: &str = "{product_name}";

/// Crate version at build time
pub const APP_VERSION: &str = "{version}";
"#
    );

    fs::write(&dest_path, constants).expect("Failed to write app_constants.rs");
}

/// Embed every file of the default theme so the binary can render without a theme directory.
fn generate_builtin_theme(theme_dir: &Path) {
    let mut files = Vec::new();
    collect_files(theme_dir, &mut files);
    files.sort();

    let mut entries = String::new();
    for file in &files {
        let relative = file
            .strip_prefix(theme_dir)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        entries.push_str(&format!(
            "    ({:?}, include_bytes!({:?})),\n",
            relative,
            file.display().to_string()
        ));
    }

    let source = format!(
        "/// Auto-generated from themes/default - do not edit manually\n\
         pub const BUILTIN_THEME: &[(&str, &[u8])] = &[\n{entries}];\n"
    );

    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(Path::new(&out_dir).join("builtin_theme.rs"), source)
        .expect("Failed to write builtin_theme.rs");
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}
