//! Tabulated sky foregrounds.

use super::{Foreground, ForegroundError};
use crate::config::DataTable;
use crate::photometry::signal::Signal;

fn column<'a>(data: &'a DataTable, name: &str, column: &str) -> Result<&'a [f64], ForegroundError> {
    data.column(column).ok_or_else(|| ForegroundError::MissingColumn {
        name: name.to_string(),
        column: column.to_string(),
    })
}

/// Sky foreground from `Wavelength`, `Radiance` and `Transmission` columns.
///
/// Radiance is zero outside the table and transmission is one.
pub fn sky_foreground(wl: &[f64], name: &str, data: &DataTable) -> Result<Foreground, ForegroundError> {
    log::info!("estimating sky foreground {name}");
    let table_wl = column(data, name, "Wavelength")?;
    let radiance = Signal::new(table_wl.to_vec(), column(data, name, "Radiance")?.to_vec())?;
    let transmission = Signal::new(table_wl.to_vec(), column(data, name, "Transmission")?.to_vec())?;

    let radiance = Signal {
        wl_grid: wl.to_vec(),
        data: radiance.interp(wl, 0.0)?,
    };
    let transmission = Signal {
        wl_grid: wl.to_vec(),
        data: transmission.interp(wl, 1.0)?,
    };
    log::debug!("{name} transmission: {:?}", transmission.data);

    Ok(Foreground {
        name: name.to_string(),
        radiance,
        transmission: Some(transmission),
    })
}
