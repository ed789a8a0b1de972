//! Ordered chain of optical elements and their self-emission.
//!
//! Element order is the light-path order, from the aperture towards the
//! detector. Light emitted by an element is attenuated by every element
//! after it, so reordering emitting or absorbing elements changes the
//! result.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diffuse::{convolve_with_slit, integrate_light, DiffuseContext, DiffuseError};
use super::element::{ElementError, OpticalElement, Position};
use crate::algo::misc::logspace;
use crate::config::{DetectorConfig, ElementConfig};
use crate::photometry::planck::planck_curve;
use crate::photometry::quantum_efficiency::NATIVE_GRID_POINTS;
use crate::photometry::signal::Signal;
use crate::table::{columns, ChannelTable, TableError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    #[error(transparent)]
    Element(#[from] ElementError),
    #[error("optical element '{0}' appears twice in the path")]
    DuplicateElement(String),
    #[error("optical paths are sampled on different wavelength grids")]
    GridMismatch,
    #[error("optical path wavelength grid is empty")]
    EmptyGrid,
    #[error(transparent)]
    Diffuse(#[from] DiffuseError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Self-emission of one element as it reaches the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRadiance {
    pub name: String,
    pub position: Position,
    pub solid_angle: Option<f64>,
    /// A slit lies downstream of the element
    pub slit: bool,
    pub radiance: Signal,
}

impl ElementRadiance {
    /// Acceptance solid angle in sr for a pixel of solid angle `omega_pix`.
    pub fn acceptance(&self, omega_pix: f64) -> f64 {
        if let Some(solid_angle) = self.solid_angle {
            return solid_angle;
        }
        match self.position {
            Position::Detector => PI,
            Position::OpticsBox => PI - omega_pix,
            Position::Path => omega_pix,
        }
    }
}

/// Derived tables of a chained path, kept with the built instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathProducts {
    pub transmission_table: ChannelTable,
    pub radiance_table: ChannelTable,
    pub signal_table: ChannelTable,
    pub max_signal_per_pixel: ChannelTable,
}

#[derive(Debug, Clone)]
pub struct OpticalPath {
    wl: Vec<f64>,
    elements: Vec<OpticalElement>,
    radiance: Vec<ElementRadiance>,
    slit_width: Option<f64>,
    signal_table: Option<ChannelTable>,
    max_signal_per_pixel: Option<ChannelTable>,
}

impl OpticalPath {
    /// Sample `configs` on `wl`.
    ///
    /// A single-value grid is replaced by the detector's native logarithmic
    /// grid from its `wl_min` to its cut-off.
    pub fn new(
        configs: &[ElementConfig],
        wl: Vec<f64>,
        detector: &DetectorConfig,
    ) -> Result<Self, PathError> {
        let wl = match wl.len() {
            0 => return Err(PathError::EmptyGrid),
            1 => {
                log::debug!("single-value wavelength grid, using the detector grid instead");
                logspace(detector.wl_min, detector.cut_off, NATIVE_GRID_POINTS)
            }
            _ => wl,
        };

        let mut elements: Vec<OpticalElement> = Vec::with_capacity(configs.len());
        for config in configs {
            log::debug!("preparing {}", config.name);
            if elements.iter().any(|e| e.name == config.name) {
                return Err(PathError::DuplicateElement(config.name.clone()));
            }
            elements.push(OpticalElement::new(config, &wl)?);
        }

        Ok(Self {
            wl,
            elements,
            radiance: Vec::new(),
            slit_width: None,
            signal_table: None,
            max_signal_per_pixel: None,
        })
    }

    pub fn wl(&self) -> &[f64] {
        &self.wl
    }

    pub fn elements(&self) -> &[OpticalElement] {
        &self.elements
    }

    /// Put the elements of `upstream` ahead of this path's own elements.
    pub fn prepend(&mut self, upstream: OpticalPath) -> Result<(), PathError> {
        if upstream.wl != self.wl {
            return Err(PathError::GridMismatch);
        }
        if let Some(dup) = upstream
            .elements
            .iter()
            .find(|u| self.elements.iter().any(|e| e.name == u.name))
        {
            return Err(PathError::DuplicateElement(dup.name.clone()));
        }
        let mut elements = upstream.elements;
        elements.append(&mut self.elements);
        self.elements = elements;
        Ok(())
    }

    /// Product of every element's transmission.
    pub fn total_transmission(&self) -> Vec<f64> {
        let mut total = vec![1.0; self.wl.len()];
        for element in &self.elements {
            total
                .iter_mut()
                .zip(&element.transmission)
                .for_each(|(t, e)| *t *= e);
        }
        total
    }

    /// Per-element transmission plus the `total` column.
    pub fn transmission_table(&self) -> Result<ChannelTable, PathError> {
        log::info!("building transmission table");
        let mut table = ChannelTable::new("transmission");
        table.set_column(columns::WAVELENGTH, self.wl.clone())?;
        for element in &self.elements {
            table.set_column(&element.name, element.transmission.clone())?;
        }
        table.set_column("total", self.total_transmission())?;
        Ok(table)
    }

    /// Self-emission of every element with a temperature, attenuated by all
    /// elements downstream of it.
    pub fn chain(&mut self) -> &[ElementRadiance] {
        self.radiance.clear();
        for (i, element) in self.elements.iter().enumerate() {
            let Some(temperature) = element.temperature else {
                log::debug!("{}: skipped because of missing temperature", element.name);
                continue;
            };
            log::debug!("propagating {}", element.name);

            let mut data: Vec<f64> = planck_curve(&element.wl, temperature)
                .into_iter()
                .zip(&element.emissivity)
                .map(|(b, e)| b * e)
                .collect();
            let mut slit = false;
            for downstream in &self.elements[i + 1..] {
                data.iter_mut()
                    .zip(&downstream.transmission)
                    .for_each(|(d, t)| *d *= t);
                if let Some(width) = downstream.slit_width {
                    slit = true;
                    self.slit_width = Some(width);
                }
            }

            self.radiance.push(ElementRadiance {
                name: element.name.clone(),
                position: element.position,
                solid_angle: element.solid_angle,
                slit,
                radiance: Signal {
                    wl_grid: self.wl.clone(),
                    data,
                },
            });
        }
        &self.radiance
    }

    pub fn radiance(&self) -> &[ElementRadiance] {
        &self.radiance
    }

    /// Width in µm of the slit found while chaining, if any.
    pub fn slit_width(&self) -> Option<f64> {
        self.slit_width
    }

    pub fn radiance_table(&self) -> Result<ChannelTable, PathError> {
        let mut table = ChannelTable::new("radiance");
        table.set_column(columns::WAVELENGTH, self.wl.clone())?;
        for entry in &self.radiance {
            table.set_column(&entry.name, entry.radiance.data.clone())?;
        }
        Ok(table)
    }

    /// Detected self-emission of every chained element.
    ///
    /// Appends the `instrument_signal` and `instrument_MaxSignal_inPixel`
    /// totals to `table`.
    pub fn compute_signal(
        &mut self,
        table: &mut ChannelTable,
        ctx: &DiffuseContext,
    ) -> Result<(), PathError> {
        let mut signal_table = ChannelTable::new(&table.ch_name);
        let mut max_table = ChannelTable::new(&table.ch_name);
        let mut total_signal = ctx.zeros();
        let mut total_max = ctx.zeros();

        for entry in &self.radiance {
            log::debug!("computing signal for {}", entry.name);
            let (max_signal, signal) = match (&ctx.slit, entry.slit) {
                (Some(slit), true) => convolve_with_slit(ctx, slit, &entry.radiance)?,
                _ => {
                    let rate = ctx.photon_rate(&entry.radiance, entry.acceptance(ctx.omega_pix));
                    integrate_light(&rate, &ctx.window_size)
                }
            };
            log::debug!("{} signal: {:?}", entry.name, signal);

            total_signal
                .iter_mut()
                .zip(&signal)
                .for_each(|(t, s)| *t += s);
            total_max
                .iter_mut()
                .zip(&max_signal)
                .for_each(|(t, s)| *t += s);
            signal_table.set_column(&format!("{}_signal", entry.name), signal)?;
            max_table.set_column(&entry.name, max_signal)?;
        }

        table.set_column(columns::INSTRUMENT_SIGNAL, total_signal)?;
        table.set_column(columns::INSTRUMENT_MAX_SIGNAL, total_max)?;
        self.signal_table = Some(signal_table);
        self.max_signal_per_pixel = Some(max_table);
        Ok(())
    }

    /// Collect the derived tables for storage.
    pub fn products(&self) -> Result<PathProducts, PathError> {
        let empty = || ChannelTable::new("empty");
        Ok(PathProducts {
            transmission_table: self.transmission_table()?,
            radiance_table: self.radiance_table()?,
            signal_table: self.signal_table.clone().unwrap_or_else(empty),
            max_signal_per_pixel: self.max_signal_per_pixel.clone().unwrap_or_else(empty),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ElementKind, QeConfig};
    use crate::photometry::planck::planck;
    use crate::units::{Temperature, TemperatureExt};
    use approx::assert_relative_eq;

    fn detector() -> DetectorConfig {
        DetectorConfig {
            wl_min: 1.0,
            cut_off: 5.0,
            delta_pix: 18.0,
            qe: QeConfig::Constant(0.7),
            well_depth: 1.0e5,
            freq_ndr: 1.0,
            dark_current: 1.0,
            read_noise: 10.0,
            f_well_depth: Some(0.9),
            frame_time: None,
            multiaccum_m: None,
        }
    }

    fn element(name: &str, temperature: Option<f64>, transmission: f64, emissivity: f64) -> ElementConfig {
        ElementConfig {
            name: name.into(),
            temperature,
            transmission: Some(transmission),
            emissivity: Some(emissivity),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_value_grid_refined() {
        let path = OpticalPath::new(&[], vec![2.0], &detector()).unwrap();
        assert_eq!(path.wl().len(), NATIVE_GRID_POINTS);
        assert_relative_eq!(path.wl()[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(path.wl()[NATIVE_GRID_POINTS - 1], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_chain_attenuates_downstream_only() {
        let wl = vec![2.0, 3.0, 4.0];
        let configs = vec![
            element("M1", Some(70.0), 0.9, 0.1),
            element("M2", Some(50.0), 0.8, 0.2),
            element("filter", None, 0.5, 0.0),
        ];
        let mut path = OpticalPath::new(&configs, wl.clone(), &detector()).unwrap();
        let radiance = path.chain().to_vec();
        assert_eq!(radiance.len(), 2);

        let t70 = Temperature::from_kelvin(70.0);
        let t50 = Temperature::from_kelvin(50.0);
        assert_relative_eq!(
            radiance[0].radiance.data[1],
            0.1 * planck(3.0, t70) * 0.8 * 0.5,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            radiance[1].radiance.data[1],
            0.2 * planck(3.0, t50) * 0.5,
            max_relative = 1e-12
        );
        assert!(!radiance[0].slit);
    }

    #[test]
    fn test_transparent_elements_commute() {
        let wl = vec![2.0, 3.0, 4.0];
        let hot = element("hot", Some(100.0), 0.9, 0.3);
        let a = element("a", None, 1.0, 0.0);
        let b = element("b", None, 1.0, 0.0);

        let mut one = OpticalPath::new(&[hot.clone(), a.clone(), b.clone()], wl.clone(), &detector()).unwrap();
        let mut two = OpticalPath::new(&[hot, b, a], wl, &detector()).unwrap();
        assert_eq!(one.chain()[0].radiance, two.chain()[0].radiance);
    }

    #[test]
    fn test_slit_flags_upstream_radiance() {
        let wl = vec![2.0, 3.0];
        let slit = ElementConfig {
            name: "slit".into(),
            kind: ElementKind::Slit,
            width: Some(36.0),
            ..Default::default()
        };
        let configs = vec![element("M1", Some(70.0), 0.9, 0.1), slit, element("M2", Some(60.0), 0.9, 0.1)];
        let mut path = OpticalPath::new(&configs, wl, &detector()).unwrap();
        let radiance = path.chain().to_vec();
        assert!(radiance[0].slit);
        assert!(!radiance[1].slit);
        assert_eq!(path.slit_width(), Some(36.0));
    }

    #[test]
    fn test_prepend_keeps_order_and_rejects_duplicates() {
        let wl = vec![2.0, 3.0];
        let common = OpticalPath::new(&[element("M1", None, 0.9, 0.0)], wl.clone(), &detector()).unwrap();
        let mut channel = OpticalPath::new(&[element("D1", None, 0.5, 0.0)], wl.clone(), &detector()).unwrap();
        channel.prepend(common).unwrap();
        let names: Vec<_> = channel.elements().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["M1", "D1"]);
        assert_relative_eq!(channel.total_transmission()[0], 0.45, epsilon = 1e-12);

        let dup = OpticalPath::new(&[element("D1", None, 0.5, 0.0)], wl, &detector()).unwrap();
        assert_eq!(channel.prepend(dup), Err(PathError::DuplicateElement("D1".into())));
    }

    #[test]
    fn test_acceptance_by_position() {
        let entry = |position, solid_angle| ElementRadiance {
            name: "x".into(),
            position,
            solid_angle,
            slit: false,
            radiance: Signal::constant(vec![1.0], 0.0),
        };
        assert_relative_eq!(entry(Position::Detector, None).acceptance(0.01), PI);
        assert_relative_eq!(entry(Position::OpticsBox, None).acceptance(0.01), PI - 0.01);
        assert_relative_eq!(entry(Position::Path, None).acceptance(0.01), 0.01);
        assert_relative_eq!(entry(Position::Path, Some(0.5)).acceptance(0.01), 0.5);
    }
}
