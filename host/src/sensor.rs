use std::path::Path;

use log::{debug, warn};

use simtrack_common::error::Error;

pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Parses the sysfs thermal zone format, an integer in millidegrees Celsius.
pub fn parse_millidegrees(text: &str) -> crate::Result<f32> {
    let millidegrees = text.trim().parse::<i32>().map_err(|_| Error::ParseError)?;
    Ok(millidegrees as f32 / 1000.0)
}

pub fn read_thermal_zone(path: &Path) -> crate::Result<f32> {
    let text = std::fs::read_to_string(path)?;
    parse_millidegrees(&text)
}

/// Temperature to report: `explicit` if given, then the thermal zone, then `fallback`.
pub fn temperature(explicit: Option<f32>, path: &Path, fallback: f32) -> f32 {
    if let Some(temperature) = explicit {
        return temperature;
    }
    match read_thermal_zone(path) {
        Ok(temperature) => {
            debug!("Temperature from {}: {temperature:.1} C", path.display());
            temperature
        }
        Err(err) => {
            warn!("Cannot read {}: {err}, using {fallback:.1} C", path.display());
            fallback
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("48312\n").unwrap(), 48.312);
        assert_eq!(parse_millidegrees("-5000").unwrap(), -5.0);
        assert!(parse_millidegrees("hot").is_err());
    }

    #[test]
    fn test_temperature_priority() {
        let missing = Path::new("/nonexistent/thermal_zone0/temp");
        assert_eq!(temperature(Some(30.5), missing, 20.0), 30.5);
        assert_eq!(temperature(None, missing, 20.0), 20.0);
    }
}
