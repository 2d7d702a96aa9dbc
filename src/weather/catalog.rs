use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Lowest wind speed the generator ever draws, in km/h.
pub const MIN_WIND_SPEED: u32 = 5;

/// A weather-condition template with the parameter ranges the generator draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionArchetype {
    pub name: String,
    pub icon: String,
    /// Temperature at the diurnal minimum (dawn), in °C
    pub min_temp: f64,
    /// Temperature at the diurnal maximum (18:00), in °C
    pub max_temp: f64,
    /// Peak-to-peak amplitude of the symmetric hourly noise
    pub variance: f64,
    pub humidity_min: u8,
    pub humidity_max: u8,
    /// Wind-speed ceiling in km/h
    pub max_wind: u32,
    /// Probability per hour of leaving this condition
    pub transition: f64,
    #[serde(default)]
    pub precipitation: bool,
    /// Heavy precipitation, hail or thunderstorms
    #[serde(default)]
    pub severe: bool,
}

/// Ordered sequence of archetypes. Neighbouring entries are similar, and the
/// order runs from calm to severe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub archetypes: Vec<ConditionArchetype>,
    /// Number of leading low-severity entries a day may start in
    #[serde(default = "default_calm_entries")]
    pub calm_entries: usize,
    /// Index warm fronts gravitate towards
    #[serde(default = "default_wet_middle")]
    pub wet_middle: usize,
}

fn default_calm_entries() -> usize {
    2
}

fn default_wet_middle() -> usize {
    4
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid TOML in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("catalog must contain at least one archetype")]
    Empty,
    #[error("archetype '{name}': {reason}")]
    InvalidArchetype { name: String, reason: String },
    #[error("{field} = {value} is out of range for a catalog of {len} archetypes")]
    IndexOutOfRange {
        field: &'static str,
        value: usize,
        len: usize,
    },
}

#[allow(clippy::too_many_arguments)]
fn archetype(
    name: &str,
    icon: &str,
    temp: (f64, f64),
    variance: f64,
    humidity: (u8, u8),
    max_wind: u32,
    transition: f64,
    precipitation: bool,
    severe: bool,
) -> ConditionArchetype {
    ConditionArchetype {
        name: name.to_string(),
        icon: icon.to_string(),
        min_temp: temp.0,
        max_temp: temp.1,
        variance,
        humidity_min: humidity.0,
        humidity_max: humidity.1,
        max_wind,
        transition,
        precipitation,
        severe,
    }
}

impl Catalog {
    /// The built-in catalog, ordered from clear skies to thunderstorms.
    pub fn standard() -> Self {
        Catalog {
            archetypes: vec![
                archetype("Clear", "☀️", (12.0, 26.0), 3.0, (30, 50), 15, 0.10, false, false),
                archetype("Partly Cloudy", "🌤️", (10.0, 23.0), 4.0, (40, 60), 20, 0.20, false, false),
                archetype("Cloudy", "☁️", (7.0, 19.0), 3.0, (55, 75), 25, 0.25, false, false),
                archetype("Drizzle", "🌦️", (5.0, 16.0), 2.0, (70, 88), 25, 0.35, true, false),
                archetype("Rain", "🌧️", (3.0, 14.0), 2.0, (75, 95), 35, 0.45, true, false),
                archetype("Sleet", "🌨️", (-3.0, 5.0), 2.0, (80, 95), 35, 0.50, true, false),
                archetype("Heavy Rain", "☔", (4.0, 13.0), 2.0, (85, 100), 50, 0.55, true, true),
                archetype("Hail", "🧊", (0.0, 10.0), 3.0, (75, 95), 55, 0.60, true, true),
                archetype("Thunderstorms", "⛈️", (8.0, 22.0), 3.0, (80, 100), 70, 0.70, true, true),
            ],
            calm_entries: 2,
            wet_middle: 4,
        }
    }

    /// Load a catalog from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(content).map_err(|e| CatalogError::Parse {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reject catalogs the generator cannot draw from.
    ///
    /// A bad catalog is a configuration mistake; callers are expected to stop
    /// at startup rather than recover.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.archetypes.is_empty() {
            return Err(CatalogError::Empty);
        }

        for a in &self.archetypes {
            let invalid = |reason: String| CatalogError::InvalidArchetype {
                name: a.name.clone(),
                reason,
            };
            if a.name.trim().is_empty() {
                return Err(invalid("name must not be empty".to_string()));
            }
            if !(a.min_temp.is_finite() && a.max_temp.is_finite()) || a.min_temp > a.max_temp {
                return Err(invalid(format!(
                    "min_temp {} must be <= max_temp {}",
                    a.min_temp, a.max_temp
                )));
            }
            if !a.variance.is_finite() || a.variance < 0.0 {
                return Err(invalid(format!("variance must be >= 0, got {}", a.variance)));
            }
            if a.humidity_min > a.humidity_max || a.humidity_max > 100 {
                return Err(invalid(format!(
                    "humidity range {}-{} must be ordered and within 0-100",
                    a.humidity_min, a.humidity_max
                )));
            }
            if a.max_wind < MIN_WIND_SPEED {
                return Err(invalid(format!(
                    "max_wind must be >= {}, got {}",
                    MIN_WIND_SPEED, a.max_wind
                )));
            }
            if !(0.0..=1.0).contains(&a.transition) {
                return Err(invalid(format!(
                    "transition must be 0.0-1.0, got {}",
                    a.transition
                )));
            }
        }

        let len = self.archetypes.len();
        if self.calm_entries == 0 || self.calm_entries > len {
            return Err(CatalogError::IndexOutOfRange {
                field: "calm_entries",
                value: self.calm_entries,
                len,
            });
        }
        if self.wet_middle >= len {
            return Err(CatalogError::IndexOutOfRange {
                field: "wet_middle",
                value: self.wet_middle,
                len,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConditionArchetype> {
        self.archetypes.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&ConditionArchetype> {
        self.archetypes.iter().find(|a| a.name == name)
    }

    /// Unknown conditions are never severe.
    pub fn is_severe(&self, name: &str) -> bool {
        self.find(name).is_some_and(|a| a.severe)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_path() -> PathBuf {
        PathBuf::from("catalog.toml")
    }

    #[test]
    fn standard_catalog_is_valid() {
        Catalog::standard().validate().unwrap();
    }

    #[test]
    fn standard_catalog_severe_entries() {
        let catalog = Catalog::standard();
        assert!(catalog.is_severe("Heavy Rain"));
        assert!(catalog.is_severe("Hail"));
        assert!(catalog.is_severe("Thunderstorms"));
        assert!(!catalog.is_severe("Rain"));
        assert!(!catalog.is_severe("Clear"));
        assert!(!catalog.is_severe("Volcanic Ash"));
    }

    #[test]
    fn standard_catalog_calm_entries_are_not_precipitating() {
        let catalog = Catalog::standard();
        for a in &catalog.archetypes[..catalog.calm_entries] {
            assert!(!a.precipitation, "{} should be calm", a.name);
        }
    }

    #[test]
    fn inverted_temperature_range_rejected() {
        let mut catalog = Catalog::standard();
        catalog.archetypes[0].min_temp = 30.0;
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("Clear"));
        assert!(err.to_string().contains("min_temp"));
    }

    #[test]
    fn humidity_above_100_rejected() {
        let mut catalog = Catalog::standard();
        catalog.archetypes[2].humidity_max = 120;
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn wind_ceiling_below_floor_rejected() {
        let mut catalog = Catalog::standard();
        catalog.archetypes[1].max_wind = 2;
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::InvalidArchetype { .. })
        ));
    }

    #[test]
    fn transition_probability_out_of_range_rejected() {
        let mut catalog = Catalog::standard();
        catalog.archetypes[3].transition = 1.5;
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("transition"));
    }

    #[test]
    fn empty_catalog_rejected() {
        let catalog = Catalog {
            archetypes: Vec::new(),
            calm_entries: 1,
            wet_middle: 0,
        };
        assert!(matches!(catalog.validate(), Err(CatalogError::Empty)));
    }

    #[test]
    fn wet_middle_out_of_range_rejected() {
        let mut catalog = Catalog::standard();
        catalog.wet_middle = catalog.len();
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::IndexOutOfRange {
                field: "wet_middle",
                ..
            })
        ));
    }

    #[test]
    fn zero_calm_entries_rejected() {
        let mut catalog = Catalog::standard();
        catalog.calm_entries = 0;
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::IndexOutOfRange {
                field: "calm_entries",
                ..
            })
        ));
    }

    #[test]
    fn from_toml_string_applies_index_defaults() {
        let toml = r#"
[[archetypes]]
name = "Clear"
icon = "☀️"
min_temp = 10.0
max_temp = 20.0
variance = 0.0
humidity_min = 30
humidity_max = 40
max_wind = 10
transition = 0.1

[[archetypes]]
name = "Fog"
icon = "🌫️"
min_temp = 4.0
max_temp = 9.0
variance = 1.0
humidity_min = 90
humidity_max = 100
max_wind = 6
transition = 0.3

[[archetypes]]
name = "Drizzle"
icon = "🌦️"
min_temp = 4.0
max_temp = 12.0
variance = 1.0
humidity_min = 80
humidity_max = 95
max_wind = 20
transition = 0.3
precipitation = true

[[archetypes]]
name = "Rain"
icon = "🌧️"
min_temp = 3.0
max_temp = 11.0
variance = 1.0
humidity_min = 85
humidity_max = 100
max_wind = 30
transition = 0.4
precipitation = true

[[archetypes]]
name = "Storm"
icon = "⛈️"
min_temp = 6.0
max_temp = 15.0
variance = 2.0
humidity_min = 85
humidity_max = 100
max_wind = 60
transition = 0.5
precipitation = true
severe = true
"#;
        let catalog = Catalog::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.calm_entries, 2);
        assert_eq!(catalog.wet_middle, 4);
        assert!(catalog.is_severe("Storm"));
        assert!(!catalog.archetypes[0].precipitation);
    }

    #[test]
    fn from_toml_invalid_archetype_fails_fast() {
        let toml = r#"
calm_entries = 1
wet_middle = 0

[[archetypes]]
name = "Broken"
icon = "?"
min_temp = 25.0
max_temp = 5.0
variance = 1.0
humidity_min = 30
humidity_max = 40
max_wind = 10
transition = 0.1
"#;
        let err = Catalog::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn from_file_missing() {
        let err = Catalog::from_file(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(err.to_string().contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "this is not valid toml {{{{").unwrap();

        let err = Catalog::from_file(tmpfile.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"), "Error: {}", err);
    }
}
