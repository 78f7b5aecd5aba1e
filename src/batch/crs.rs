//! Coordinate systems accepted for input points.
//!
//! Tiles are built in WGS84, so every input coordinate is brought into WGS84
//! before resolution. GCJ-02 and BD-09 are the offset systems used by
//! Chinese map providers.

use std::f64::consts::PI;
use std::str::FromStr;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordSystem {
    #[default]
    Wgs84,
    Gcj02,
    Bd09,
    /// EPSG:3857 metres
    WebMercator,
}

impl FromStr for CoordSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(|c: char| matches!(c, '-' | '_' | ':'), "").as_str() {
            "wgs84" | "epsg4326" => Ok(CoordSystem::Wgs84),
            "gcj02" => Ok(CoordSystem::Gcj02),
            "bd09" => Ok(CoordSystem::Bd09),
            "webmercator" | "epsg3857" => Ok(CoordSystem::WebMercator),
            _ => Err(Error::Config(format!("unknown coordinate system '{s}'"))),
        }
    }
}

/// Brings coordinates into the canonical (WGS84) system.
pub trait CoordTransform: Send + Sync {
    fn to_canonical(&self, coord: Coord<f64>, from: CoordSystem) -> Coord<f64>;
}

/// Built-in transforms for the systems in [`CoordSystem`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTransform;

impl CoordTransform for StandardTransform {
    fn to_canonical(&self, coord: Coord<f64>, from: CoordSystem) -> Coord<f64> {
        match from {
            CoordSystem::Wgs84 => coord,
            CoordSystem::Gcj02 => gcj02_to_wgs84(coord),
            CoordSystem::Bd09 => gcj02_to_wgs84(bd09_to_gcj02(coord)),
            CoordSystem::WebMercator => web_mercator_to_wgs84(coord),
        }
    }
}

// Krasovsky 1940 ellipsoid, as used by GCJ-02
const KRASOVSKY_A: f64 = 6_378_245.0;
const KRASOVSKY_EE: f64 = 0.006_693_421_622_965_943;
const BD_X_PI: f64 = PI * 3000.0 / 180.0;
const EARTH_RADIUS: f64 = 6_378_137.0;

fn out_of_china(c: Coord<f64>) -> bool {
    !(72.004..=137.8347).contains(&c.x) || !(0.8293..=55.8271).contains(&c.y)
}

fn offset_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn offset_lng(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// WGS84 to GCJ-02. Coordinates outside China are returned unchanged.
pub fn wgs84_to_gcj02(c: Coord<f64>) -> Coord<f64> {
    if out_of_china(c) {
        return c;
    }
    let d_lat = offset_lat(c.x - 105.0, c.y - 35.0);
    let d_lng = offset_lng(c.x - 105.0, c.y - 35.0);
    let rad_lat = c.y / 180.0 * PI;
    let magic = 1.0 - KRASOVSKY_EE * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();
    let d_lat =
        (d_lat * 180.0) / ((KRASOVSKY_A * (1.0 - KRASOVSKY_EE)) / (magic * sqrt_magic) * PI);
    let d_lng = (d_lng * 180.0) / (KRASOVSKY_A / sqrt_magic * rad_lat.cos() * PI);
    Coord {
        x: c.x + d_lng,
        y: c.y + d_lat,
    }
}

/// GCJ-02 to WGS84 by fixed-point iteration on the forward transform.
pub fn gcj02_to_wgs84(c: Coord<f64>) -> Coord<f64> {
    if out_of_china(c) {
        return c;
    }
    let mut wgs = c;
    for _ in 0..10 {
        let probe = wgs84_to_gcj02(wgs);
        let dx = c.x - probe.x;
        let dy = c.y - probe.y;
        wgs.x += dx;
        wgs.y += dy;
        if dx.abs() < 1e-10 && dy.abs() < 1e-10 {
            break;
        }
    }
    wgs
}

pub fn bd09_to_gcj02(c: Coord<f64>) -> Coord<f64> {
    let x = c.x - 0.0065;
    let y = c.y - 0.006;
    let z = (x * x + y * y).sqrt() - 0.000_02 * (y * BD_X_PI).sin();
    let theta = y.atan2(x) - 0.000_003 * (x * BD_X_PI).cos();
    Coord {
        x: z * theta.cos(),
        y: z * theta.sin(),
    }
}

pub fn web_mercator_to_wgs84(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (c.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}
