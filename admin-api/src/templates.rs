//! Browsable template files and the static render page

use crate::error::AdminError;
use std::path::Path;
use tracing::debug;

/// Sorted names of non-hidden `.html`/`.txt` files in `dir`.
/// A missing directory yields an empty list.
pub async fn list_templates(dir: &Path) -> Vec<String> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Template directory {} unreadable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_listed(&name) {
            names.push(name);
        }
    }
    names.sort();
    names
}

fn is_listed(name: &str) -> bool {
    let lower = name.to_lowercase();
    !name.starts_with('.') && (lower.ends_with(".html") || lower.ends_with(".txt"))
}

/// Raw contents of template `name`. Only the final path component of
/// `name` is used, so the lookup never leaves `dir`.
pub async fn read_template(dir: &Path, name: &str) -> Result<String, AdminError> {
    let file_name = Path::new(name).file_name().ok_or(AdminError::NotFound)?;
    let path = dir.join(file_name);

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(AdminError::NotFound),
    }

    let bytes = tokio::fs::read(&path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The static HTML page served by `GET /render`
pub async fn read_render_page(path: &Path) -> Result<String, AdminError> {
    match tokio::fs::read_to_string(path).await {
        Ok(page) => Ok(page),
        Err(e) => {
            debug!("Render page {} unavailable: {}", path.display(), e);
            Err(AdminError::RenderPageMissing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.HTML", ".hidden.html", "notes.md", "c.html"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.html")).unwrap();

        let names = list_templates(dir.path()).await;
        assert_eq!(names, vec!["a.HTML", "b.txt", "c.html", "sub.html"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_templates(&dir.path().join("missing")).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_template_uses_basename_only() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(templates.join("welcome.html"), "Hi {{ username }}").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();

        assert_eq!(
            read_template(&templates, "welcome.html").await.unwrap(),
            "Hi {{ username }}"
        );
        assert_eq!(
            read_template(&templates, "../templates/welcome.html").await.unwrap(),
            "Hi {{ username }}"
        );
        assert!(matches!(
            read_template(&templates, "../secret.txt").await,
            Err(AdminError::NotFound)
        ));
        assert!(matches!(
            read_template(&templates, "..").await,
            Err(AdminError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_render_page() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_render_page(&dir.path().join("render_page.html")).await,
            Err(AdminError::RenderPageMissing)
        ));
    }
}
