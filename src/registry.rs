// Slug -> location lookup, loaded once from feeds.yml

use crate::config::ConfigError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Location {
    pub name: String,
    pub slug: String,
    #[serde(rename = "lat", deserialize_with = "scalar_string")]
    pub latitude: String,
    #[serde(rename = "lon", deserialize_with = "scalar_string")]
    pub longitude: String,
    #[serde(rename = "lang")]
    pub language: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<Location>,
}

// Coordinates are kept verbatim, whether the file quotes them or not
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number, found {:?}",
            other
        ))),
    }
}

pub fn parse_locations(yaml: &str) -> Result<Vec<Location>, ConfigError> {
    // An empty document has no `feeds` key at all
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: FeedsFile =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Locations(e.to_string()))?;
    Ok(file.feeds)
}

pub fn load_locations(path: impl AsRef<Path>) -> Result<Vec<Location>, ConfigError> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let locations = parse_locations(&yaml)?;
    tracing::info!(path = %path.display(), count = locations.len(), "loaded feed locations");
    Ok(locations)
}

/// Read-only after construction. When a slug appears more than once the
/// first occurrence in load order answers lookups.
#[derive(Debug, Default, Clone)]
pub struct LocationRegistry {
    locations: Vec<Location>,
}

impl LocationRegistry {
    pub fn new(locations: Vec<Location>) -> Self {
        let mut seen = HashSet::new();
        for location in &locations {
            if !seen.insert(location.slug.as_str()) {
                tracing::warn!(slug = %location.slug, name = %location.name, "duplicate slug, later entry is shadowed");
            }
        }

        Self { locations }
    }

    pub fn lookup(&self, slug: &str) -> Option<&Location> {
        self.locations.iter().find(|location| location.slug == slug)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FEEDS_YML: &str = r#"
feeds:
  - name: Москва
    slug: moscow
    lat: "55.75396"
    lon: "37.620393"
    lang: ru_RU
  - name: Saint Petersburg
    slug: spb
    lat: 59.9386
    lon: 30.3141
    lang: en_US
"#;

    #[test]
    fn test_parse_feeds_file() {
        let locations = parse_locations(FEEDS_YML).unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(
            locations[0],
            Location {
                name: "Москва".to_string(),
                slug: "moscow".to_string(),
                latitude: "55.75396".to_string(),
                longitude: "37.620393".to_string(),
                language: "ru_RU".to_string(),
            }
        );
        assert_eq!(locations[1].latitude, "59.9386");
        assert_eq!(locations[1].longitude, "30.3141");
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = LocationRegistry::new(parse_locations(FEEDS_YML).unwrap());

        assert_eq!(registry.lookup("spb").map(|l| l.language.as_str()), Some("en_US"));
        assert!(registry.lookup("kazan").is_none());
        assert!(registry.lookup("").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_slug_first_match_wins() {
        let yaml = r#"
feeds:
  - {name: First, slug: dup, lat: "1", lon: "1", lang: ru_RU}
  - {name: Second, slug: dup, lat: "2", lon: "2", lang: en_US}
"#;
        let registry = LocationRegistry::new(parse_locations(yaml).unwrap());

        let found = registry.lookup("dup").unwrap();
        assert_eq!(found.name, "First");
        assert_eq!(found.latitude, "1");
        assert_eq!(registry.len(), 2);

        // Both entries stay visible in load order
        let names: Vec<&str> = registry.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["First", "Second"]);
    }

    #[test]
    fn test_empty_document_has_no_locations() {
        assert!(parse_locations("").unwrap().is_empty());
        assert!(parse_locations("feeds: []").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let result = parse_locations("feeds:\n  - name: [unterminated");
        assert!(matches!(result, Err(ConfigError::Locations(_))));

        let missing_slug = "feeds:\n  - {name: X, lat: '1', lon: '2', lang: ru}";
        assert!(matches!(
            parse_locations(missing_slug),
            Err(ConfigError::Locations(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FEEDS_YML.as_bytes()).unwrap();

        let locations = load_locations(file.path()).unwrap();
        assert_eq!(locations.len(), 2);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_locations("/definitely/not/here/feeds.yml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
