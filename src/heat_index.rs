//! NOAA heat-index calculation and temperature unit conversions.
//!
//! The heat index combines air temperature and relative humidity into an
//! apparent temperature. Below 80 °F the index is the air temperature
//! itself; above, the Rothfusz nine-coefficient regression applies, with the
//! published low- and high-humidity corrections.

use crate::config::model_config::heat_index_coefficients as c;

/// Convert Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Heat index in °F for a temperature in °F and relative humidity in percent.
pub fn heat_index_f(temperature_f: f64, humidity_pct: f64) -> f64 {
    if temperature_f < 80.0 {
        return temperature_f;
    }

    let t = temperature_f;
    let rh = humidity_pct;

    let mut hi = c::C1
        + c::C2 * t
        + c::C3 * rh
        + c::C4 * t * rh
        + c::C5 * t * t
        + c::C6 * rh * rh
        + c::C7 * t * t * rh
        + c::C8 * t * rh * rh
        + c::C9 * t * t * rh * rh;

    // Low-humidity correction (RH < 13 %, 80–112 °F)
    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    }
    // High-humidity correction (RH > 85 %, 80–87 °F)
    else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    hi
}

/// Heat index in °F from a temperature in °C.
pub fn heat_index_from_celsius(temperature_c: f64, humidity_pct: f64) -> f64 {
    heat_index_f(celsius_to_fahrenheit(temperature_c), humidity_pct)
}
