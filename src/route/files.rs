use std::path::{Path, PathBuf};

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;

/// Path prefixes that never fall back to the browser app.
static RESERVED_PREFIXES: [&str; 3] = ["api", "uploads", "swagger"];

async fn app_index_file(c: &Config) -> Option<NamedFile> {
    let index = c.public_content.join("index.html");

    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("unable to open '{}': {}", index.display(), e);
            None
        }
    }
}

fn is_reserved(path: &Path) -> bool {
    path.components()
        .next()
        .and_then(|it| it.as_os_str().to_str())
        .map_or(false, |first| RESERVED_PREFIXES.contains(&first))
}

/// Browser app entry point
#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

/// Serves bundle assets; unknown paths get `index.html` for client side routing.
#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    if is_reserved(&path) {
        return None;
    }

    match NamedFile::open(c.public_content.join(&path)).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_paths_are_reserved() {
        assert!(is_reserved(Path::new("api/courses/abc")));
        assert!(is_reserved(Path::new("uploads/1-2.pdf")));
        assert!(!is_reserved(Path::new("dashboard/courses")));
        assert!(!is_reserved(Path::new("")));
    }
}
