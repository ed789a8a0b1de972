//! Payload, channel and target descriptions.
//!
//! Everything the simulator consumes is described by serde structs loaded
//! from JSON. Units are fixed by convention: wavelengths, pixel pitch and slit
//! widths in µm, temperatures in K, telescope area in m², times in s, dark
//! current in counts/s/pixel, read noise in counts/pixel/read.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Named numeric columns, in the order they appear in the JSON object.
///
/// ```json
/// {"Wavelength": [0.5, 1.0], "Transmission": [0.9, 0.95]}
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<(String, Vec<f64>)>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.columns.push((name.to_string(), values));
        self
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// First of `candidates` present in the table.
    pub fn find_column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.contains(c))
    }
}

impl Serialize for DataTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, values) in &self.columns {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DataTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = DataTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of named numeric columns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DataTable, A::Error> {
                let mut columns = Vec::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<f64>>()? {
                    columns.push((name, values));
                }
                Ok(DataTable { columns })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Kind of optical element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    #[default]
    #[serde(rename = "surface")]
    Surface,
    #[serde(rename = "filter")]
    Filter,
    #[serde(rename = "dichroic")]
    Dichroic,
    #[serde(rename = "slit")]
    Slit,
    #[serde(rename = "optics box")]
    OpticsBox,
    #[serde(rename = "detector box")]
    DetectorBox,
    /// Any other type sits in the light path
    #[serde(other)]
    Other,
}

/// Static description of one optical element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ElementKind,
    /// Temperature in K; absent means no self-emission
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub emissivity: Option<f64>,
    #[serde(default)]
    pub transmission: Option<f64>,
    #[serde(default)]
    pub reflectivity: Option<f64>,
    /// Selects the transmission source when several are available
    #[serde(rename = "use", default)]
    pub use_column: Option<String>,
    #[serde(default)]
    pub wl_min: Option<f64>,
    #[serde(default)]
    pub wl_max: Option<f64>,
    /// Acceptance solid angle override in sr
    #[serde(default)]
    pub solid_angle: Option<f64>,
    /// Slit width in µm
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub data: Option<DataTable>,
    #[serde(default)]
    pub wl_col_name: Option<String>,
}

/// Detector quantum efficiency: one number or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QeConfig {
    Constant(f64),
    Table { wavelength: Vec<f64>, qe: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub wl_min: f64,
    pub cut_off: f64,
    /// Pixel pitch in µm
    pub delta_pix: f64,
    pub qe: QeConfig,
    /// Full well in counts
    pub well_depth: f64,
    /// Non-destructive read frequency in Hz
    pub freq_ndr: f64,
    pub dark_current: f64,
    pub read_noise: f64,
    /// Fraction of the well filled by the brightest pixel in one frame
    #[serde(default)]
    pub f_well_depth: Option<f64>,
    /// Fixed frame time in s, overrides `f_well_depth`
    #[serde(default)]
    pub frame_time: Option<f64>,
    /// Grouped-read factor of the multiaccum scheme
    #[serde(default)]
    pub multiaccum_m: Option<f64>,
}

/// Photometric aperture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApertureConfig {
    /// Aperture radius in λF units (pixels for pixel-based PSFs)
    #[serde(default)]
    pub radius: Option<f64>,
    /// Encircled energy fraction defining the aperture
    #[serde(rename = "EnE", default)]
    pub ene: Option<f64>,
    #[serde(default)]
    pub aperture_correction: Option<f64>,
}

/// Source of the point spread function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum PsfConfig {
    /// Diffraction-limited Airy pattern from the channel F-numbers
    #[default]
    Airy,
    /// Pre-sampled PSF, one value per detector pixel
    PixelBased { image: Vec<Vec<f64>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometerConfig {
    pub aperture: ApertureConfig,
    #[serde(default)]
    pub psf: PsfConfig,
}

/// Spectral binning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvingPower {
    Fixed(f64),
    Tabulated { wavelength: Vec<f64>, r: Vec<f64> },
    Keyword(String),
}

impl Default for ResolvingPower {
    fn default() -> Self {
        ResolvingPower::Keyword("native".to_string())
    }
}

/// Detector position (µm along dispersion) of each wavelength (µm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavelengthSolution {
    pub wavelength: Vec<f64>,
    pub x: Vec<f64>,
}

/// Encircled energy radius (λF units) as a function of wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncircledEnergySolution {
    pub wavelength: Vec<f64>,
    pub radius: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrometerConfig {
    #[serde(default)]
    pub target_r: ResolvingPower,
    #[serde(default)]
    pub wl_solution: Option<WavelengthSolution>,
    #[serde(default)]
    pub enc_e_solution: Option<EncircledEnergySolution>,
    #[serde(default)]
    pub window_spatial_scale: Option<f64>,
    /// Explicit spectral window width in pixels
    #[serde(default)]
    pub window_spectral_px: Option<f64>,
    /// Explicit spatial window width in pixels
    #[serde(default)]
    pub window_spatial_px: Option<f64>,
    /// Wavefront error rms in µm
    #[serde(default)]
    pub wfe_rms: Option<f64>,
}

/// Instrument kind, selected by the `class` key of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum ChannelKind {
    Photometer(PhotometerConfig),
    Spectrometer(SpectrometerConfig),
}

/// An additional noise term added in quadrature to the total noise.
///
/// Either a constant `value` in ppm·√hr or a `data` table holding a
/// `Wavelength` column and one noise column (relative noise·√hr).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomNoiseConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub data: Option<DataTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub wl_min: f64,
    pub wl_max: f64,
    pub f_num_x: f64,
    pub f_num_y: f64,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub optics: Vec<ElementConfig>,
    /// Excess photon noise multiplier
    #[serde(default)]
    pub noise_x: f64,
    #[serde(default)]
    pub custom_noise: Vec<CustomNoiseConfig>,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

/// Map of zodiacal scaling coefficients over the sky, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZodiacalMapConfig {
    pub ra: Vec<f64>,
    pub dec: Vec<f64>,
    pub coeff: Vec<f64>,
}

fn unit_factor() -> f64 {
    1.0
}

/// Diffuse foreground in front of the telescope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ForegroundConfig {
    Zodiacal {
        #[serde(default = "unit_factor")]
        zodiac_factor: f64,
        #[serde(default)]
        map: Option<ZodiacalMapConfig>,
    },
    /// Tabulated `Wavelength`, `Radiance` and `Transmission` columns
    Sky { name: String, data: DataTable },
}

impl ForegroundConfig {
    pub fn name(&self) -> &str {
        match self {
            ForegroundConfig::Zodiacal { .. } => "zodi",
            ForegroundConfig::Sky { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonConfig {
    pub wl_min: f64,
    pub wl_max: f64,
    /// Collecting area in m²
    pub telescope_area: f64,
    #[serde(default)]
    pub force_channel_wl_edge: bool,
    #[serde(default)]
    pub foregrounds: Vec<ForegroundConfig>,
    #[serde(default)]
    pub custom_noise: Vec<CustomNoiseConfig>,
}

/// Complete payload: shared telescope optics plus channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub common: CommonConfig,
    /// Shared optics, light-path order from the aperture inward
    #[serde(default)]
    pub optics: Vec<ElementConfig>,
    pub channels: Vec<ChannelConfig>,
}

impl PayloadConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

/// Point-source spectral energy distribution in W m⁻² µm⁻¹.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SedConfig {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub sed: SedConfig,
    /// (ra, dec) in degrees
    #[serde(default)]
    pub coordinates: Option<(f64, f64)>,
}

pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    read_json(path)
}

/// Process-level run settings, set once before any target is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Worker threads for target-level parallelism
    pub threads: usize,
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_table_preserves_order() {
        let table: DataTable =
            serde_json::from_str(r#"{"b": [1.0], "a": [2.0], "Wavelength": [3.0]}"#).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["b", "a", "Wavelength"]);
        assert_eq!(table.find_column(&["Wavelength", "wavelength"]), Some("Wavelength"));
        let back = serde_json::to_string(&table).unwrap();
        assert_eq!(back, r#"{"b":[1.0],"a":[2.0],"Wavelength":[3.0]}"#);
    }

    #[test]
    fn test_channel_kind_tag() {
        let json = r#"{
            "name": "Phot", "class": "photometer",
            "wl_min": 0.5, "wl_max": 0.6, "f_num_x": 40.0, "f_num_y": 40.0,
            "detector": {"wl_min": 0.4, "cut_off": 2.0, "delta_pix": 18.0, "qe": 0.55,
                         "well_depth": 100000.0, "freq_ndr": 1.0, "dark_current": 1.0,
                         "read_noise": 10.0, "f_well_depth": 0.9},
            "aperture": {"EnE": 0.8}
        }"#;
        let ch: ChannelConfig = serde_json::from_str(json).unwrap();
        match ch.kind {
            ChannelKind::Photometer(p) => {
                assert_eq!(p.aperture.ene, Some(0.8));
                assert_eq!(p.psf, PsfConfig::Airy);
            }
            ChannelKind::Spectrometer(_) => panic!("wrong kind"),
        }
        assert_eq!(ch.detector.qe, QeConfig::Constant(0.55));
    }

    #[test]
    fn test_resolving_power_forms() {
        let r: ResolvingPower = serde_json::from_str("50.0").unwrap();
        assert_eq!(r, ResolvingPower::Fixed(50.0));
        let r: ResolvingPower = serde_json::from_str(r#""native""#).unwrap();
        assert_eq!(r, ResolvingPower::default());
        let r: ResolvingPower =
            serde_json::from_str(r#"{"wavelength": [1.0, 2.0], "r": [20.0, 40.0]}"#).unwrap();
        assert!(matches!(r, ResolvingPower::Tabulated { .. }));
    }

    #[test]
    fn test_element_kind_names() {
        let el: ElementConfig =
            serde_json::from_str(r#"{"name": "box", "type": "optics box", "temperature": 80.0}"#)
                .unwrap();
        assert_eq!(el.kind, ElementKind::OpticsBox);
        assert_eq!(el.temperature, Some(80.0));

        let el: ElementConfig =
            serde_json::from_str(r#"{"name": "M3", "type": "mirror"}"#).unwrap();
        assert_eq!(el.kind, ElementKind::Other);
    }
}
