//! Loading of the legacy alias table from configuration and an optional TOML file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::application::resolver::AliasTable;
use crate::config::AliasSettings;

use super::error::InfraError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AliasFile {
    redirects: BTreeMap<String, String>,
}

/// Build the alias table. Entries from the file override inline ones with the same key.
pub async fn load_alias_table(settings: &AliasSettings) -> Result<AliasTable, InfraError> {
    let mut table = AliasTable::new(&settings.redirects);

    if let Some(path) = settings.file.as_deref() {
        let from_file = read_alias_file(path).await?;
        info!(
            target = "pagina::aliases",
            path = %path.display(),
            count = from_file.len(),
            "loaded alias file"
        );
        table.extend(from_file);
    }

    Ok(table)
}

async fn read_alias_file(path: &Path) -> Result<BTreeMap<String, String>, InfraError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| InfraError::alias_file(path, err.to_string()))?;
    parse_alias_file(&contents).map_err(|message| InfraError::alias_file(path, message))
}

fn parse_alias_file(contents: &str) -> Result<BTreeMap<String, String>, String> {
    let parsed: AliasFile = toml::from_str(contents).map_err(|err| err.to_string())?;
    for (from, to) in &parsed.redirects {
        if to.trim().is_empty() {
            return Err(format!("alias `{from}` has an empty target"));
        }
    }
    Ok(parsed.redirects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_redirect_table() {
        let parsed = parse_alias_file(
            r#"
[redirects]
"Old/Page.html" = "/About"
"node/7/feed" = "/atom.xml"
"#,
        )
        .expect("valid file");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["Old/Page.html"], "/About");
    }

    #[test]
    fn rejects_empty_targets() {
        let err = parse_alias_file("[redirects]\nold = \"  \"\n").unwrap_err();
        assert!(err.contains("old"));
    }

    #[tokio::test]
    async fn file_entries_override_inline_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aliases.toml");
        std::fs::write(
            &path,
            "[redirects]\n\"feed.rss\" = \"/feed/atom.xml\"\n\"OLD\" = \"/New\"\n",
        )
        .expect("write alias file");

        let settings = AliasSettings {
            file: Some(path),
            redirects: BTreeMap::from([
                ("feed.rss".to_string(), "/atom.xml".to_string()),
                ("kept".to_string(), "/Kept".to_string()),
            ]),
        };

        let table = load_alias_table(&settings).await.expect("table loads");
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("/feed.rss"), Some("/feed/atom.xml"));
        assert_eq!(table.lookup("old"), Some("/New"));
        assert_eq!(table.lookup("KEPT"), Some("/Kept"));
    }

    #[tokio::test]
    async fn file_entries_override_inline_ones_regardless_of_case() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aliases.toml");
        std::fs::write(&path, "[redirects]\n\"Old/Path\" = \"/FromFile\"\n")
            .expect("write alias file");

        let settings = AliasSettings {
            file: Some(path),
            redirects: BTreeMap::from([("old/path".to_string(), "/Inline".to_string())]),
        };

        let table = load_alias_table(&settings).await.expect("table loads");
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("/OLD/PATH"), Some("/FromFile"));
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let settings = AliasSettings {
            file: Some("/nonexistent/pagina-aliases.toml".into()),
            redirects: BTreeMap::new(),
        };
        let err = load_alias_table(&settings).await.unwrap_err();
        assert!(err.to_string().contains("pagina-aliases.toml"));
    }
}
