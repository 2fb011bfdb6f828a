/// Export of the in-memory entry list for promotion into the bundled defaults.
///
/// The output is pretty-printed JSON in the persisted shape, ready to paste over
/// `defaults/catalog.json`.
use crate::error::AppError;
use crate::model::CatalogEntry;

pub fn export_json(entries: &[CatalogEntry]) -> Result<String, AppError> {
    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_catalog;
    use crate::model::tests::entry;

    #[test]
    fn test_export_matches_persisted_shape() {
        let entries = vec![entry("1", "Web"), entry("2", "Automation")];
        let exported = export_json(&entries).unwrap();
        assert!(exported.contains("\n  {\n    \"id\": \"1\""));
        let parsed: Vec<CatalogEntry> = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_export_of_defaults_reproduces_bundled_file() {
        let exported = export_json(&default_catalog()).unwrap();
        assert_eq!(exported, include_str!("../defaults/catalog.json"));
    }
}
