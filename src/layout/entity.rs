//! Entities and filename matching.

use crate::error::{IndexError, Result};
use crate::types::FileRecord;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::borrow::Cow;

/// Type an extracted value is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Str => "str",
            Dtype::Int => "int",
            Dtype::Float => "float",
            Dtype::Bool => "bool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "str" => Some(Dtype::Str),
            "int" => Some(Dtype::Int),
            "float" => Some(Dtype::Float),
            "bool" => Some(Dtype::Bool),
            _ => None,
        }
    }

    /// Convert a captured string into a typed JSON value.
    pub fn coerce(&self, entity: &str, raw: &str) -> Result<Value> {
        let fail = || IndexError::Coercion {
            entity: entity.to_string(),
            value: raw.to_string(),
            dtype: self.as_str(),
        };

        match self {
            Dtype::Str => Ok(Value::String(raw.to_string())),
            Dtype::Int => raw
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| fail()),
            Dtype::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail),
            Dtype::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
        }
    }
}

/// What part of the file an entity pattern is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchScope {
    /// The absolute path.
    #[default]
    Path,
    /// The file name only.
    Filename,
}

impl MatchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchScope::Path => "path",
            MatchScope::Filename => "filename",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(MatchScope::Path),
            "filename" => Some(MatchScope::Filename),
            _ => None,
        }
    }
}

/// Entity as written in a layout config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub dtype: Dtype,
    #[serde(default)]
    pub scope: MatchScope,
}

/// A named key whose value comes from a filename or a sidecar payload.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub pattern: Option<String>,
    regex: Option<Regex>,
    pub mandatory: bool,
    pub dtype: Dtype,
    pub scope: MatchScope,
    pub is_metadata: bool,
    /// Name of the layout config that declared this entity.
    pub config: Option<String>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.pattern == other.pattern
            && self.mandatory == other.mandatory
            && self.dtype == other.dtype
            && self.scope == other.scope
            && self.is_metadata == other.is_metadata
            && self.config == other.config
    }
}

impl Entity {
    /// Compile an entity declared by a layout config.
    pub fn from_spec(spec: EntitySpec, config: Option<&str>) -> Result<Self> {
        let regex = spec
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| IndexError::Pattern {
                entity: spec.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name: spec.name,
            pattern: spec.pattern,
            regex,
            mandatory: spec.mandatory,
            dtype: spec.dtype,
            scope: spec.scope,
            is_metadata: false,
            config: config.map(str::to_string),
        })
    }

    /// Entity discovered in a sidecar payload. It never matches filenames.
    pub fn metadata(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            regex: None,
            mandatory: false,
            dtype: Dtype::Str,
            scope: MatchScope::Path,
            is_metadata: true,
            config: None,
        }
    }

    /// Extract this entity's value from `file`, or `None` if the pattern
    /// does not apply.
    ///
    /// When the pattern has a capture group the first group is the value,
    /// otherwise the whole match is.
    pub fn match_file(&self, file: &FileRecord) -> Result<Option<Value>> {
        let Some(regex) = &self.regex else {
            return Ok(None);
        };

        let haystack: Cow<'_, str> = match self.scope {
            MatchScope::Path => Cow::Owned(file.path_str()),
            MatchScope::Filename => Cow::Borrowed(file.filename.as_str()),
        };

        let Some(caps) = regex.captures(&haystack) else {
            return Ok(None);
        };

        let captured = if caps.len() > 1 { caps.get(1) } else { caps.get(0) };
        match captured {
            Some(m) => self.dtype.coerce(&self.name, m.as_str()).map(Some),
            None => Ok(None),
        }
    }
}
