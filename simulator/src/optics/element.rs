//! A single optical component and its wavelength-dependent behaviour.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algo::misc::{interp_fill, InterpError};
use crate::config::{DataTable, ElementConfig, ElementKind};
use crate::units::{Temperature, TemperatureExt};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElementError {
    #[error("{element}: wavelength column not found in data table")]
    MissingWavelengthColumn { element: String },
    #[error("{element}: column '{column}' not found in data table")]
    MissingColumn { element: String, column: String },
    #[error("{element}: both transmission and reflectivity are given but 'use' is not set")]
    AmbiguousTransmission { element: String },
    #[error("{element}: 'use' must be 'transmission' or 'reflectivity', got '{value}'")]
    InvalidUse { element: String, value: String },
    #[error("{element}: emissivity column not found in data table")]
    MissingEmissivityColumn { element: String },
    #[error("{element}: slit has no width")]
    MissingSlitWidth { element: String },
    #[error("{element}: {source}")]
    Interp {
        element: String,
        source: InterpError,
    },
}

/// Where an element sits relative to the detector, which fixes the solid
/// angle its emission is collected over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Inside the detector enclosure: full π sr
    Detector,
    /// The optics enclosure: π sr minus the beam
    OpticsBox,
    /// In the beam: the pixel solid angle
    Path,
}

impl From<ElementKind> for Position {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::DetectorBox => Position::Detector,
            ElementKind::OpticsBox => Position::OpticsBox,
            _ => Position::Path,
        }
    }
}

/// An optical element sampled on a wavelength grid.
///
/// Built once from its [`ElementConfig`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalElement {
    pub name: String,
    pub kind: ElementKind,
    pub position: Position,
    pub wl: Vec<f64>,
    pub transmission: Vec<f64>,
    pub emissivity: Vec<f64>,
    pub temperature: Option<Temperature>,
    /// Acceptance solid angle override in sr
    pub solid_angle: Option<f64>,
    /// Slit width in µm, slits only
    pub slit_width: Option<f64>,
}

impl OpticalElement {
    /// Sample the element described by `config` on `wl` (µm).
    ///
    /// # Errors
    /// Missing wavelength or selected data columns, ambiguous
    /// transmission/reflectivity, missing emissivity column, or a slit
    /// without a width.
    pub fn new(config: &ElementConfig, wl: &[f64]) -> Result<Self, ElementError> {
        log::debug!("initializing optical element {}", config.name);
        let transmission = transmission(config, wl)?;
        let emissivity = emissivity(config, wl)?;

        let slit_width = match config.kind {
            ElementKind::Slit => Some(config.width.ok_or_else(|| ElementError::MissingSlitWidth {
                element: config.name.clone(),
            })?),
            _ => None,
        };

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            position: Position::from(config.kind),
            wl: wl.to_vec(),
            transmission,
            emissivity,
            temperature: config.temperature.map(Temperature::from_kelvin),
            solid_angle: config.solid_angle,
            slit_width,
        })
    }

    pub fn is_slit(&self) -> bool {
        self.kind == ElementKind::Slit
    }
}

fn wavelength_column<'a>(config: &ElementConfig, data: &'a DataTable) -> Result<&'a [f64], ElementError> {
    let name = match &config.wl_col_name {
        Some(name) => Some(name.as_str()),
        None => data.find_column(&["Wavelength", "wavelength"]),
    };
    name.and_then(|n| data.column(n))
        .ok_or_else(|| ElementError::MissingWavelengthColumn {
            element: config.name.clone(),
        })
}

fn interpolate_column(
    config: &ElementConfig,
    data: &DataTable,
    column: &str,
    wl: &[f64],
) -> Result<Vec<f64>, ElementError> {
    let x = wavelength_column(config, data)?;
    let y = data.column(column).ok_or_else(|| ElementError::MissingColumn {
        element: config.name.clone(),
        column: column.to_string(),
    })?;
    interp_fill(wl, x, y, 0.0).map_err(|source| ElementError::Interp {
        element: config.name.clone(),
        source,
    })
}

fn transmission(config: &ElementConfig, wl: &[f64]) -> Result<Vec<f64>, ElementError> {
    if let Some(data) = &config.data {
        let column = match &config.use_column {
            Some(column) => column.clone(),
            None => data
                .find_column(&["Transmission", "Reflectivity"])
                .ok_or_else(|| ElementError::MissingColumn {
                    element: config.name.clone(),
                    column: "Transmission".to_string(),
                })?
                .to_string(),
        };
        log::debug!("{}: transmission from data column {}", config.name, column);
        return interpolate_column(config, data, &column, wl);
    }

    // band limits only cut a single scalar transmission or reflectivity
    let (value, bounded) = match (config.transmission, config.reflectivity) {
        (Some(t), Some(r)) => match config.use_column.as_deref().map(str::to_lowercase) {
            Some(u) if u == "transmission" => (t, false),
            Some(u) if u == "reflectivity" => (r, false),
            Some(u) => {
                return Err(ElementError::InvalidUse {
                    element: config.name.clone(),
                    value: u,
                })
            }
            None => {
                log::error!("{}: both transmission and reflectivity given", config.name);
                return Err(ElementError::AmbiguousTransmission {
                    element: config.name.clone(),
                });
            }
        },
        (Some(t), None) => (t, true),
        (None, Some(r)) => {
            log::debug!("{}: reflectivity used as transmission", config.name);
            (r, true)
        }
        (None, None) => return Ok(vec![1.0; wl.len()]),
    };
    if !bounded {
        return Ok(vec![value; wl.len()]);
    }

    let lower = config.wl_min.unwrap_or(f64::NEG_INFINITY);
    let upper = config.wl_max.unwrap_or(f64::INFINITY);
    Ok(wl
        .iter()
        .map(|&w| if w < lower || w > upper { 0.0 } else { value })
        .collect())
}

fn emissivity(config: &ElementConfig, wl: &[f64]) -> Result<Vec<f64>, ElementError> {
    if let Some(data) = &config.data {
        if let Some(column) = data.find_column(&["Emissivity", "emissivity"]) {
            return interpolate_column(config, data, column, wl);
        }
        if config.emissivity.is_none() {
            log::error!("{}: emissivity column not found", config.name);
            return Err(ElementError::MissingEmissivityColumn {
                element: config.name.clone(),
            });
        }
    }

    let value = match (config.emissivity, config.kind) {
        (Some(e), _) => e,
        (None, ElementKind::DetectorBox) => 1.0,
        (None, _) => 0.0,
    };
    Ok(vec![value; wl.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::misc::linspace;
    use approx::assert_relative_eq;

    fn grid() -> Vec<f64> {
        linspace(1.0, 3.0, 21)
    }

    #[test]
    fn test_constant_transmission_everywhere() {
        let config = ElementConfig {
            name: "M1".into(),
            transmission: Some(0.97),
            ..Default::default()
        };
        let el = OpticalElement::new(&config, &grid()).unwrap();
        assert!(el.transmission.iter().all(|&t| t == 0.97));
        assert!(el.emissivity.iter().all(|&e| e == 0.0));
        assert_eq!(el.position, Position::Path);
    }

    #[test]
    fn test_bounded_transmission() {
        let config = ElementConfig {
            name: "filter".into(),
            kind: ElementKind::Filter,
            reflectivity: Some(0.5),
            wl_min: Some(1.5),
            wl_max: Some(2.5),
            ..Default::default()
        };
        let wl = grid();
        let el = OpticalElement::new(&config, &wl).unwrap();
        for (w, t) in wl.iter().zip(&el.transmission) {
            let expected = if *w < 1.5 || *w > 2.5 { 0.0 } else { 0.5 };
            assert_eq!(*t, expected);
        }
    }

    #[test]
    fn test_selected_transmission_ignores_band_limits() {
        let config = ElementConfig {
            name: "D1".into(),
            kind: ElementKind::Dichroic,
            transmission: Some(0.9),
            reflectivity: Some(0.1),
            use_column: Some("transmission".into()),
            wl_min: Some(1.5),
            wl_max: Some(2.5),
            ..Default::default()
        };
        let el = OpticalElement::new(&config, &grid()).unwrap();
        assert!(el.transmission.iter().all(|&t| t == 0.9));
    }

    #[test]
    fn test_unknown_type_is_a_path_element() {
        let config: ElementConfig =
            serde_json::from_str(r#"{"name": "M3", "type": "mirror", "reflectivity": 0.98}"#)
                .unwrap();
        let el = OpticalElement::new(&config, &grid()).unwrap();
        assert_eq!(el.position, Position::Path);
        assert!(!el.is_slit());
    }

    #[test]
    fn test_ambiguous_transmission_is_an_error() {
        let mut config = ElementConfig {
            name: "D1".into(),
            transmission: Some(0.9),
            reflectivity: Some(0.1),
            ..Default::default()
        };
        assert_eq!(
            OpticalElement::new(&config, &grid()),
            Err(ElementError::AmbiguousTransmission { element: "D1".into() })
        );

        config.use_column = Some("reflectivity".into());
        let el = OpticalElement::new(&config, &grid()).unwrap();
        assert_eq!(el.transmission[0], 0.1);
    }

    #[test]
    fn test_tabulated_data() {
        let data = DataTable::new()
            .with_column("Wavelength", vec![3.0, 1.0, 2.0])
            .with_column("Transmission", vec![0.6, 0.2, 0.4])
            .with_column("Emissivity", vec![0.3, 0.1, 0.2]);
        let config = ElementConfig {
            name: "lens".into(),
            data: Some(data),
            ..Default::default()
        };
        let wl = vec![0.5, 1.5, 2.5, 3.5];
        let el = OpticalElement::new(&config, &wl).unwrap();
        assert_eq!(el.transmission[0], 0.0);
        assert_relative_eq!(el.transmission[1], 0.3, epsilon = 1e-12);
        assert_relative_eq!(el.emissivity[2], 0.25, epsilon = 1e-12);
        assert_eq!(el.emissivity[3], 0.0);
    }

    #[test]
    fn test_data_errors() {
        let config = ElementConfig {
            name: "bad".into(),
            data: Some(DataTable::new().with_column("Transmission", vec![1.0, 1.0])),
            ..Default::default()
        };
        assert_eq!(
            OpticalElement::new(&config, &grid()),
            Err(ElementError::MissingWavelengthColumn { element: "bad".into() })
        );

        let config = ElementConfig {
            name: "no-em".into(),
            data: Some(
                DataTable::new()
                    .with_column("wavelength", vec![1.0, 3.0])
                    .with_column("Transmission", vec![1.0, 1.0]),
            ),
            ..Default::default()
        };
        assert_eq!(
            OpticalElement::new(&config, &grid()),
            Err(ElementError::MissingEmissivityColumn { element: "no-em".into() })
        );
    }

    #[test]
    fn test_detector_box_defaults() {
        let config = ElementConfig {
            name: "detector".into(),
            kind: ElementKind::DetectorBox,
            temperature: Some(42.0),
            ..Default::default()
        };
        let el = OpticalElement::new(&config, &grid()).unwrap();
        assert_eq!(el.position, Position::Detector);
        assert!(el.emissivity.iter().all(|&e| e == 1.0));
        assert!(el.transmission.iter().all(|&t| t == 1.0));
        assert_relative_eq!(el.temperature.unwrap().as_kelvin(), 42.0);
    }

    #[test]
    fn test_slit_requires_width() {
        let config = ElementConfig {
            name: "slit".into(),
            kind: ElementKind::Slit,
            ..Default::default()
        };
        assert!(matches!(
            OpticalElement::new(&config, &grid()),
            Err(ElementError::MissingSlitWidth { .. })
        ));
    }
}
