use crate::models::ColourStop;
use colorgrad::Color;
use std::fs;
use std::path::Path;

/// Default NDVI ramp: bare soil browns through to dense canopy green.
const NDVI_RAMP: &[(f32, &str)] = &[
    (-0.2, "#6b2f2f"),
    (0.0, "#c87f4b"),
    (0.2, "#e2c65c"),
    (0.4, "#a9d86f"),
    (0.6, "#5dbb63"),
    (0.8, "#1f8a4c"),
];

/// Pixels that cannot be classified.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Parse a `value,red,green,blue,alpha` style file. Lines starting with `#`
/// or `INTERPOLATION` and blank lines are skipped, as are short lines.
pub fn parse_style_file<P: AsRef<Path>>(path: P) -> Result<Vec<ColourStop>, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read style file: {}", e))?;
    parse_style(&content)
}

pub fn parse_style(content: &str) -> Result<Vec<ColourStop>, String> {
    let mut stops = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with("INTERPOLATION") || line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 5 {
            continue;
        }

        let value = parts[0]
            .parse()
            .map_err(|e| format!("Invalid value: {}", e))?;
        let red = parts[1]
            .parse()
            .map_err(|e| format!("Invalid red: {}", e))?;
        let green = parts[2]
            .parse()
            .map_err(|e| format!("Invalid green: {}", e))?;
        let blue = parts[3]
            .parse()
            .map_err(|e| format!("Invalid blue: {}", e))?;
        let alpha = parts[4]
            .parse()
            .map_err(|e| format!("Invalid alpha: {}", e))?;

        stops.push(ColourStop {
            value,
            red,
            green,
            blue,
            alpha,
        });
    }

    if stops.len() < 2 {
        return Err("A colour ramp needs at least two stops".to_string());
    }
    if stops.windows(2).any(|w| w[1].value <= w[0].value) {
        return Err("Colour stop values must be strictly increasing".to_string());
    }

    Ok(stops)
}

/// Piecewise-linear colour ramp used to paint NDVI values.
#[derive(Debug, Clone, PartialEq)]
pub struct NdviRamp {
    stops: Vec<ColourStop>,
}

impl Default for NdviRamp {
    fn default() -> Self {
        let stops = NDVI_RAMP
            .iter()
            .map(|&(value, html)| {
                // The table above is fixed, a parse failure would be a typo in it.
                let [red, green, blue, alpha] = Color::from_html(html)
                    .map(|c| c.to_rgba8())
                    .unwrap_or([0, 0, 0, 255]);
                ColourStop {
                    value,
                    red,
                    green,
                    blue,
                    alpha,
                }
            })
            .collect();
        Self { stops }
    }
}

impl NdviRamp {
    pub fn from_stops(stops: Vec<ColourStop>) -> Result<Self, String> {
        if stops.len() < 2 {
            return Err("A colour ramp needs at least two stops".to_string());
        }
        Ok(Self { stops })
    }

    pub fn from_style_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::from_stops(parse_style_file(path)?)
    }

    pub fn stops(&self) -> &[ColourStop] {
        &self.stops
    }

    /// Colour for an NDVI value. The value is clamped to [-1, 1]; the first
    /// segment whose upper stop is >= the value is interpolated, so values
    /// below the first stop extrapolate along it (channels clamp), values
    /// above the last stop take the last colour.
    pub fn colour_at(&self, value: f32) -> [u8; 4] {
        let v = value.clamp(-1.0, 1.0);
        for w in self.stops.windows(2) {
            let a = &w[0];
            let b = &w[1];
            if v <= b.value {
                let t = (v - a.value) / (b.value - a.value);
                return [
                    lerp(a.red, b.red, t),
                    lerp(a.green, b.green, t),
                    lerp(a.blue, b.blue, t),
                    lerp(a.alpha, b.alpha, t),
                ];
            }
        }
        self.stops.last().map(ColourStop::rgba).unwrap_or(TRANSPARENT)
    }

    /// Map a near-infrared / red band pair to a colour. Non-finite input and a
    /// zero denominator give transparent black.
    pub fn classify(&self, nir: f32, red: f32) -> [u8; 4] {
        if !nir.is_finite() || !red.is_finite() || nir + red == 0.0 {
            return TRANSPARENT;
        }
        let ndvi = (nir - red) / (nir + red);
        if !ndvi.is_finite() {
            return TRANSPARENT;
        }
        let [r, g, b, _] = self.colour_at(ndvi);
        [r, g, b, 255]
    }
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    ((1.0 - t) * a as f32 + t * b as f32).round().clamp(0.0, 255.0) as u8
}

/// Plain NDVI value, `None` where [`NdviRamp::classify`] would be transparent.
pub fn ndvi(nir: f32, red: f32) -> Option<f32> {
    if !nir.is_finite() || !red.is_finite() || nir + red == 0.0 {
        return None;
    }
    Some((nir - red) / (nir + red)).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    #[test]
    fn test_default_ramp_colours() {
        let ramp = NdviRamp::default();
        assert_eq!(ramp.stops().len(), 6);
        assert_eq!(ramp.colour_at(-0.2), [0x6b, 0x2f, 0x2f, 255]);
        assert_eq!(ramp.colour_at(0.0), [0xc8, 0x7f, 0x4b, 255]);
        assert_eq!(ramp.colour_at(0.8), [0x1f, 0x8a, 0x4c, 255]);
        // above the last stop
        assert_eq!(ramp.colour_at(0.95), [0x1f, 0x8a, 0x4c, 255]);
        assert_eq!(ramp.colour_at(7.0), [0x1f, 0x8a, 0x4c, 255]);
    }

    #[test]
    fn test_midpoint_interpolation() {
        let ramp = NdviRamp::default();
        // halfway between #e2c65c and #a9d86f
        let [r, g, b, a] = ramp.colour_at(0.3);
        assert!((197..=198).contains(&r), "red {}", r);
        assert_eq!(g, 207);
        assert!((101..=102).contains(&b), "blue {}", b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_classify_degenerate_inputs_are_transparent() {
        let ramp = NdviRamp::default();
        assert_eq!(ramp.classify(0.0, 0.0), TRANSPARENT);
        assert_eq!(ramp.classify(0.3, -0.3), TRANSPARENT);
        assert_eq!(ramp.classify(f32::NAN, 0.2), TRANSPARENT);
        assert_eq!(ramp.classify(0.2, f32::INFINITY), TRANSPARENT);
        assert_eq!(ndvi(0.0, 0.0), None);
    }

    #[test]
    fn test_classify_is_opaque_for_valid_pixels() {
        let ramp = NdviRamp::default();
        let px = ramp.classify(0.5, 0.1);
        assert_eq!(px[3], 255);
        assert_eq!(ndvi(0.5, 0.1), Some(0.4 / 0.6));
    }

    #[test]
    fn test_classify_is_continuous_near_equal_bands() {
        let ramp = NdviRamp::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let red: f32 = rng.random_range(0.05..1.0);
            let eps = 1e-4;
            let below = ramp.classify(red - eps, red);
            let at = ramp.classify(red, red);
            let above = ramp.classify(red + eps, red);
            for c in 0..3 {
                assert!((below[c] as i16 - at[c] as i16).abs() <= 1);
                assert!((above[c] as i16 - at[c] as i16).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_parse_style_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("style.txt");
        std::fs::write(
            &path,
            "# ndvi\nINTERPOLATION:INTERPOLATED\n-1,0,0,0,255\n\n1, 0, 255, 0, 255\nbad line\n",
        )
        .unwrap();
        let ramp = NdviRamp::from_style_file(&path).unwrap();
        assert_eq!(ramp.stops().len(), 2);
        assert_eq!(ramp.colour_at(0.0), [0, 128, 0, 255]);
    }

    #[test]
    fn test_parse_style_rejects_unordered_or_short() {
        assert!(parse_style("0,1,2,3,4\n").is_err());
        assert!(parse_style("1,0,0,0,255\n0,0,0,0,255\n").is_err());
        assert!(parse_style("x,0,0,0,255\n1,0,0,0,255\n").is_err());
    }
}
