//! Simulated device values and their reading generators

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SimulationError;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const STRING_READING_LEN: usize = 30;

/// How a value's reading is synthesized on refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    None,
    /// Set once at creation, never regenerated
    Static,
    String,
    #[serde(rename = "int")]
    Integer,
    Float,
}

impl ValueType {
    /// Whether refresh produces a new reading for this type.
    pub fn is_dynamic(self) -> bool {
        matches!(self, ValueType::String | ValueType::Integer | ValueType::Float)
    }
}

impl FromStr for ValueType {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ValueType::None),
            "static" => Ok(ValueType::Static),
            "string" | "str" => Ok(ValueType::String),
            "int" | "integer" => Ok(ValueType::Integer),
            "float" => Ok(ValueType::Float),
            _ => Err(SimulationError::UnknownValueType(s.to_string())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ValueType::None => "none",
            ValueType::Static => "static",
            ValueType::String => "string",
            ValueType::Integer => "int",
            ValueType::Float => "float",
        };
        write!(f, "{}", name)
    }
}

/// Identity tuple of a value within its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueIdentity {
    pub cls: u32,
    pub inst: u32,
    pub idx: u32,
}

/// Construction input for a [`Value`].
///
/// All fields are optional at the type level so that incomplete descriptions
/// coming from configuration files can be reported instead of rejected by the
/// deserializer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueDescription {
    pub cls: Option<u32>,
    pub inst: Option<u32>,
    pub idx: Option<u32>,
    pub label: Option<String>,
    pub vtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A single simulated device property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Value {
    pub cls: u32,
    pub inst: u32,
    pub idx: u32,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub value: Option<String>,
    pub vtype: ValueType,
}

impl Value {
    pub fn from_description(desc: &ValueDescription) -> Result<Self, SimulationError> {
        let cls = desc
            .cls
            .ok_or(SimulationError::MalformedDescription("cls"))?;
        let inst = desc
            .inst
            .ok_or(SimulationError::MalformedDescription("inst"))?;
        let idx = desc
            .idx
            .ok_or(SimulationError::MalformedDescription("idx"))?;
        let label = desc
            .label
            .clone()
            .ok_or(SimulationError::MalformedDescription("label"))?;
        let vtype = desc
            .vtype
            .as_deref()
            .ok_or(SimulationError::MalformedDescription("vtype"))?
            .parse::<ValueType>()?;

        Ok(Self {
            cls,
            inst,
            idx,
            label,
            units: desc.units.clone(),
            value: desc.value.clone(),
            vtype,
        })
    }

    pub fn identity(&self) -> ValueIdentity {
        ValueIdentity {
            cls: self.cls,
            inst: self.inst,
            idx: self.idx,
        }
    }

    /// Value id as published in events: `<node>-<cls>-<inst>-<idx>`
    pub fn value_id(&self, node_id: u32) -> String {
        format!("{}-{}-{}-{}", node_id, self.cls, self.inst, self.idx)
    }

    /// Regenerates the reading using the thread-local RNG.
    pub fn refresh(&mut self) -> bool {
        self.refresh_with(&mut rand::thread_rng())
    }

    /// Regenerates the reading according to the value type.
    ///
    /// Returns `false` without touching the reading for `None` and `Static`.
    pub fn refresh_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let reading = match self.vtype {
            ValueType::None | ValueType::Static => return false,
            ValueType::String => random_letters(rng, STRING_READING_LEN),
            ValueType::Integer => rng.gen_range(0..=100u32).to_string(),
            ValueType::Float => format!("{:.2}", rng.gen_range(0.0..=100.0f64)),
        };
        self.value = Some(reading);
        true
    }
}

/// Random ASCII letters, used for string readings and request nonces.
pub fn random_letters<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}
