use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &[
    "website",
    "website/db",
    "website/uploads",
    "website/templates",
];

/// Page templates; a missing one turns its page into a 500
const PAGE_TEMPLATES: &[&str] = &[
    "website/templates/base.html.tera",
    "website/templates/home.html.tera",
    "website/templates/post.html.tera",
    "website/templates/list.html.tera",
    "website/templates/login.html.tera",
    "website/templates/register.html.tera",
    "website/templates/profile.html.tera",
    "website/templates/admin.html.tera",
];

/// Create `dir` if needed and confirm it is writable.
pub fn ensure_writable_dir(dir: &str) -> Result<(), String> {
    let path = Path::new(dir);
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", dir, e))?;
        info!("  Created directory: {}", dir);
    }
    let marker = path.join(".write_test");
    fs::write(&marker, "test").map_err(|e| format!("{} is not writable: {}", dir, e))?;
    let _ = fs::remove_file(&marker);
    Ok(())
}

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories, warns about missing templates, and
/// aborts if the database directory is unusable.
pub fn run() {
    info!("Quill boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    // ── 1. Directories ──
    for dir in REQUIRED_DIRS {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    // ── 2. Templates ──
    for file in PAGE_TEMPLATES {
        if !Path::new(file).exists() {
            warn!("  Missing template: {} (its page will 500)", file);
            warnings += 1;
        }
    }

    // ── 3. Database directory writable ──
    if let Err(e) = ensure_writable_dir("website/db") {
        error!("  Database directory unusable: {}", e);
        errors += 1;
    }

    // ── 4. Rocket.toml exists ──
    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found, using default config");
        warnings += 1;
    }

    // ── Summary ──
    if errors > 0 {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!(
            "Boot check passed with {} warning(s). Some pages may not render.",
            warnings
        );
    } else {
        info!("Boot check passed.");
    }
}
