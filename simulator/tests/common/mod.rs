//! Payload and target fixtures shared by the integration tests

#![allow(dead_code)]

use radsim::config::{
    ApertureConfig, ChannelConfig, ChannelKind, CommonConfig, DetectorConfig, ElementConfig,
    ElementKind, PayloadConfig, PhotometerConfig, PsfConfig, QeConfig, ResolvingPower, SedConfig,
    SpectrometerConfig, TargetConfig, WavelengthSolution,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn detector(wl_min: f64, cut_off: f64, qe: f64) -> DetectorConfig {
    DetectorConfig {
        wl_min,
        cut_off,
        delta_pix: 18.0,
        qe: QeConfig::Constant(qe),
        well_depth: 1.0e5,
        freq_ndr: 1.0,
        dark_current: 1.0,
        read_noise: 10.0,
        f_well_depth: Some(0.9),
        frame_time: None,
        multiaccum_m: None,
    }
}

pub fn common() -> CommonConfig {
    CommonConfig {
        wl_min: 0.4,
        wl_max: 5.0,
        telescope_area: 0.63,
        force_channel_wl_edge: false,
        foregrounds: Vec::new(),
        custom_noise: Vec::new(),
    }
}

/// Photometer over [wl_min, wl_max] with a constant QE and a 1 λF aperture.
pub fn photometer(name: &str, wl_min: f64, wl_max: f64, qe: f64) -> ChannelConfig {
    ChannelConfig {
        name: name.into(),
        wl_min,
        wl_max,
        f_num_x: 40.0,
        f_num_y: 40.0,
        detector: detector(0.4, 2.0, qe),
        optics: Vec::new(),
        noise_x: 0.0,
        custom_noise: Vec::new(),
        kind: ChannelKind::Photometer(PhotometerConfig {
            aperture: ApertureConfig {
                radius: Some(1.0),
                aperture_correction: Some(0.8),
                ..Default::default()
            },
            psf: PsfConfig::Airy,
        }),
    }
}

/// Spectrometer over [1, 2] µm dispersing 1 µm over 1000 µm of detector.
pub fn spectrometer(name: &str, target_r: ResolvingPower) -> ChannelConfig {
    ChannelConfig {
        name: name.into(),
        wl_min: 1.0,
        wl_max: 2.0,
        f_num_x: 20.0,
        f_num_y: 20.0,
        detector: detector(0.8, 2.5, 0.7),
        optics: Vec::new(),
        noise_x: 0.0,
        custom_noise: Vec::new(),
        kind: ChannelKind::Spectrometer(SpectrometerConfig {
            target_r,
            wl_solution: Some(WavelengthSolution {
                wavelength: vec![0.9, 2.1],
                x: vec![0.0, 1200.0],
            }),
            ..Default::default()
        }),
    }
}

pub fn payload(channels: Vec<ChannelConfig>) -> PayloadConfig {
    PayloadConfig {
        common: common(),
        optics: Vec::new(),
        channels,
    }
}

pub fn hot_element(name: &str, kind: ElementKind, temperature: f64) -> ElementConfig {
    ElementConfig {
        name: name.into(),
        kind,
        temperature: Some(temperature),
        emissivity: Some(1.0),
        ..Default::default()
    }
}

/// Flat SED of 1e-12 W m⁻² µm⁻¹ over the payload band.
pub fn flat_target(name: &str) -> TargetConfig {
    let wavelength: Vec<f64> = (0..=460).map(|i| 0.4 + 0.01 * i as f64).collect();
    let flux = vec![1.0e-12; wavelength.len()];
    TargetConfig {
        name: name.into(),
        sed: SedConfig { wavelength, flux },
        coordinates: None,
    }
}
