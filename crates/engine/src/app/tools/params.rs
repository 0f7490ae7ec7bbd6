use thiserror::Error;

use crate::assets::{format_hex_color, parse_hex_color};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Number { min: f32, max: f32, step: f32 },
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Number(f32),
    Color(u32),
}

impl ParamValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            ParamValue::Number(value) => Some(value),
            ParamValue::Color(_) => None,
        }
    }

    pub fn as_color(self) -> Option<u32> {
        match self {
            ParamValue::Color(value) => Some(value),
            ParamValue::Number(_) => None,
        }
    }

    pub fn display(self) -> String {
        match self {
            ParamValue::Number(value) => format!("{value:.2}"),
            ParamValue::Color(value) => format_hex_color(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub folder: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("unknown param '{name}'")]
    UnknownParam { name: String },
    #[error("param '{name}' expects a number, got '{raw}'")]
    InvalidNumber { name: String, raw: String },
    #[error("param '{name}' expects a color like #rrggbb: {reason}")]
    InvalidColor { name: String, reason: String },
    #[error("param '{name}' is already registered")]
    DuplicateParam { name: String },
}

/// Flat ordered set of tunable values grouped into folders.
///
/// Numbers are clamped to their range and snapped to their step on write;
/// colors keep the low 24 bits. Every successful write is recorded so the
/// owner can push changed values into the live scene.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    specs: Vec<ParamSpec>,
    values: Vec<ParamValue>,
    dirty: Vec<usize>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_number(
        &mut self,
        folder: &str,
        name: &str,
        min: f32,
        max: f32,
        step: f32,
        initial: f32,
    ) -> Result<(), ParamError> {
        let kind = ParamKind::Number { min, max, step };
        let value = ParamValue::Number(normalize_number(initial, min, max, step));
        self.push(folder, name, kind, value)
    }

    pub fn add_color(&mut self, folder: &str, name: &str, initial: u32) -> Result<(), ParamError> {
        self.push(
            folder,
            name,
            ParamKind::Color,
            ParamValue::Color(initial & 0x00FF_FFFF),
        )
    }

    fn push(
        &mut self,
        folder: &str,
        name: &str,
        kind: ParamKind,
        value: ParamValue,
    ) -> Result<(), ParamError> {
        if self.index_of(name).is_some() {
            return Err(ParamError::DuplicateParam {
                name: name.to_string(),
            });
        }
        self.specs.push(ParamSpec {
            name: name.to_string(),
            folder: folder.to_string(),
            kind,
        });
        self.values.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamSpec, ParamValue)> {
        self.specs.iter().zip(self.values.iter().copied())
    }

    /// Folder names in first-registration order.
    pub fn folders(&self) -> Vec<&str> {
        let mut folders: Vec<&str> = Vec::new();
        for spec in &self.specs {
            if !folders.contains(&spec.folder.as_str()) {
                folders.push(spec.folder.as_str());
            }
        }
        folders
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.index_of(name).map(|index| self.values[index])
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(ParamValue::as_number)
    }

    pub fn color(&self, name: &str) -> Option<u32> {
        self.get(name).and_then(ParamValue::as_color)
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.index_of(name).map(|index| &self.specs[index])
    }

    /// Parses console input for the named param and stores the normalized value.
    pub fn set_from_str(&mut self, name: &str, raw: &str) -> Result<ParamValue, ParamError> {
        let index = self.require(name)?;
        let value = match self.specs[index].kind {
            ParamKind::Number { .. } => {
                let parsed = raw
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| ParamError::InvalidNumber {
                        name: name.to_string(),
                        raw: raw.to_string(),
                    })?;
                ParamValue::Number(parsed)
            }
            ParamKind::Color => {
                let parsed = parse_hex_color(raw).map_err(|reason| ParamError::InvalidColor {
                    name: name.to_string(),
                    reason,
                })?;
                ParamValue::Color(parsed)
            }
        };
        self.store(index, value)
    }

    pub fn set_number(&mut self, name: &str, value: f32) -> Result<ParamValue, ParamError> {
        let index = self.require(name)?;
        if !matches!(self.specs[index].kind, ParamKind::Number { .. }) || !value.is_finite() {
            return Err(ParamError::InvalidNumber {
                name: name.to_string(),
                raw: value.to_string(),
            });
        }
        self.store(index, ParamValue::Number(value))
    }

    pub fn set_color(&mut self, name: &str, color: u32) -> Result<ParamValue, ParamError> {
        let index = self.require(name)?;
        if self.specs[index].kind != ParamKind::Color {
            return Err(ParamError::InvalidColor {
                name: name.to_string(),
                reason: "param is numeric".to_string(),
            });
        }
        self.store(index, ParamValue::Color(color))
    }

    /// Names written since the last drain, each once, in write order.
    pub fn drain_dirty(&mut self) -> Vec<String> {
        self.dirty
            .drain(..)
            .map(|index| self.specs[index].name.clone())
            .collect()
    }

    fn store(&mut self, index: usize, value: ParamValue) -> Result<ParamValue, ParamError> {
        let normalized = match (self.specs[index].kind, value) {
            (ParamKind::Number { min, max, step }, ParamValue::Number(raw)) => {
                ParamValue::Number(normalize_number(raw, min, max, step))
            }
            (ParamKind::Color, ParamValue::Color(raw)) => ParamValue::Color(raw & 0x00FF_FFFF),
            (_, other) => other,
        };
        self.values[index] = normalized;
        if !self.dirty.contains(&index) {
            self.dirty.push(index);
        }
        Ok(normalized)
    }

    fn require(&self, name: &str) -> Result<usize, ParamError> {
        self.index_of(name).ok_or_else(|| ParamError::UnknownParam {
            name: name.to_string(),
        })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.name == name)
    }
}

fn normalize_number(value: f32, min: f32, max: f32, step: f32) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let clamped = value.clamp(lo, hi);
    if step > 0.0 {
        let steps = ((clamped - lo) / step).round();
        // Decimal steps divide by their whole reciprocal so 46 * 0.01 stays 0.46.
        let per_unit = step.recip().round();
        let offset = if per_unit >= 1.0 && (per_unit * step - 1.0).abs() <= f32::EPSILON {
            steps / per_unit
        } else {
            steps * step
        };
        (lo + offset).clamp(lo, hi)
    } else {
        clamped
    }
}
