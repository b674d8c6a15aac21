//! Standard filter set
//!
//! Each `parse_*` function validates the raw argument string and returns a
//! ready-to-apply [`Filter`] instance. Validation is strict: out-of-range
//! values fail the whole request rather than clamping silently.

use super::{Filter, OutputOptions};
use crate::engine::{EngineError, ImageHandle, OutputFormat};

struct Brightness {
    percent: i32,
}

impl Filter for Brightness {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.brighten(255 * self.percent / 100);
        Ok(())
    }
}

pub fn parse_brightness(args: &str) -> Result<Box<dyn Filter>, String> {
    let percent: i32 = args
        .trim()
        .parse()
        .map_err(|_| "must be an integer percentage".to_string())?;
    if !(-100..=100).contains(&percent) {
        return Err("percentage must be between -100 and 100".to_string());
    }
    Ok(Box::new(Brightness { percent }))
}

struct Contrast {
    percent: f32,
}

impl Filter for Contrast {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.adjust_contrast(self.percent);
        Ok(())
    }
}

pub fn parse_contrast(args: &str) -> Result<Box<dyn Filter>, String> {
    let percent: f32 = args
        .trim()
        .parse()
        .map_err(|_| "must be a number".to_string())?;
    if !(-100.0..=100.0).contains(&percent) {
        return Err("percentage must be between -100 and 100".to_string());
    }
    Ok(Box::new(Contrast { percent }))
}

struct Grayscale;

impl Filter for Grayscale {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.grayscale();
        Ok(())
    }
}

pub fn parse_grayscale(args: &str) -> Result<Box<dyn Filter>, String> {
    if !args.trim().is_empty() {
        return Err("takes no arguments".to_string());
    }
    Ok(Box::new(Grayscale))
}

struct Blur {
    sigma: f32,
}

impl Filter for Blur {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.blur(self.sigma);
        Ok(())
    }
}

pub fn parse_blur(args: &str) -> Result<Box<dyn Filter>, String> {
    let sigma: f32 = args
        .trim()
        .parse()
        .map_err(|_| "must be a number".to_string())?;
    if !(sigma > 0.0 && sigma <= 100.0) {
        return Err("sigma must be in (0, 100]".to_string());
    }
    Ok(Box::new(Blur { sigma }))
}

struct Sharpen {
    sigma: f32,
}

impl Filter for Sharpen {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.sharpen(self.sigma);
        Ok(())
    }
}

pub fn parse_sharpen(args: &str) -> Result<Box<dyn Filter>, String> {
    let sigma: f32 = args
        .trim()
        .parse()
        .map_err(|_| "must be a number".to_string())?;
    if !(sigma > 0.0 && sigma <= 10.0) {
        return Err("sigma must be in (0, 10]".to_string());
    }
    Ok(Box::new(Sharpen { sigma }))
}

struct Rotate {
    degrees: u16,
}

impl Filter for Rotate {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        _output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        if self.degrees != 0 {
            image.rotate(self.degrees);
        }
        Ok(())
    }
}

pub fn parse_rotate(args: &str) -> Result<Box<dyn Filter>, String> {
    let degrees: u16 = args
        .trim()
        .parse()
        .map_err(|_| "must be 0, 90, 180 or 270".to_string())?;
    if ![0, 90, 180, 270].contains(&degrees) {
        return Err("must be 0, 90, 180 or 270".to_string());
    }
    Ok(Box::new(Rotate { degrees }))
}

struct Fill {
    color: [u8; 4],
}

impl Filter for Fill {
    fn apply(
        &self,
        image: &mut Box<dyn ImageHandle>,
        output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        image.fill(self.color, output.requested);
        Ok(())
    }
}

pub fn parse_fill(args: &str) -> Result<Box<dyn Filter>, String> {
    let color = parse_color(args.trim())?;
    Ok(Box::new(Fill { color }))
}

struct Format {
    format: OutputFormat,
}

impl Filter for Format {
    fn apply(
        &self,
        _image: &mut Box<dyn ImageHandle>,
        output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        output.format = Some(self.format);
        Ok(())
    }
}

pub fn parse_format(args: &str) -> Result<Box<dyn Filter>, String> {
    let format: OutputFormat = args.trim().parse()?;
    Ok(Box::new(Format { format }))
}

struct Quality {
    quality: u8,
}

impl Filter for Quality {
    fn apply(
        &self,
        _image: &mut Box<dyn ImageHandle>,
        output: &mut OutputOptions,
    ) -> Result<(), EngineError> {
        output.quality = Some(self.quality);
        Ok(())
    }
}

pub fn parse_quality(args: &str) -> Result<Box<dyn Filter>, String> {
    let quality: u8 = args
        .trim()
        .parse()
        .map_err(|_| "must be 1-100".to_string())?;
    if !(1..=100).contains(&quality) {
        return Err("must be 1-100".to_string());
    }
    Ok(Box::new(Quality { quality }))
}

/// Parse a fill color: a small named palette or 3/6-digit hex.
fn parse_color(s: &str) -> Result<[u8; 4], String> {
    match s.to_lowercase().as_str() {
        "white" => return Ok([255, 255, 255, 255]),
        "black" => return Ok([0, 0, 0, 255]),
        "red" => return Ok([255, 0, 0, 255]),
        "green" => return Ok([0, 128, 0, 255]),
        "blue" => return Ok([0, 0, 255, 255]),
        "yellow" => return Ok([255, 255, 0, 255]),
        "gray" | "grey" => return Ok([128, 128, 128, 255]),
        _ => {}
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    let expanded = match hex.len() {
        3 => hex
            .chars()
            .flat_map(|c| [c, c])
            .collect::<String>(),
        6 => hex.to_string(),
        _ => return Err(format!("unknown color: {}", s)),
    };

    let value = u32::from_str_radix(&expanded, 16).map_err(|_| format!("unknown color: {}", s))?;
    Ok([
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
        255,
    ])
}
