//! Typed view of an OpenAPI 3.x document.
//!
//! Only the parts needed for validation and binding are modelled; everything
//! else stays reachable through the raw JSON tree held by
//! [`Contract`](super::Contract).

use std::collections::BTreeMap;
use std::fmt;

use axum::routing::MethodFilter;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Top-level document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// OpenAPI version string (`3.0.3`, `3.1.0`, ...).
    #[serde(deserialize_with = "scalar_string")]
    pub openapi: String,
    /// Document metadata.
    pub info: Info,
    /// Declared paths, keyed by template. `x-` extensions are dropped.
    #[serde(default, deserialize_with = "without_extensions")]
    pub paths: BTreeMap<String, PathItem>,
    /// Reusable components.
    #[serde(default)]
    pub components: Components,
}

/// Document metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    /// API title.
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: String,
    /// API version (not the OpenAPI version). `version: 1.0` is read as "1.0".
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Operations available on one path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// Parameters shared by every operation on the path.
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,
    #[serde(default)]
    pub options: Option<Operation>,
    #[serde(default)]
    pub head: Option<Operation>,
    #[serde(default)]
    pub patch: Option<Operation>,
    #[serde(default)]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Declared operations in a fixed method order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Options, &self.options),
            (HttpMethod::Head, &self.head),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Trace, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

/// A single API operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    /// Unique operation identifier.
    #[serde(default, rename = "operationId")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Operation-level parameters; override path-level ones by `(name, in)`.
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
    /// Responses keyed by status code, range or `default`. `x-` extensions
    /// are dropped.
    #[serde(default, deserialize_with = "optional_without_extensions")]
    pub responses: Option<BTreeMap<String, RefOr<Response>>>,
}

/// Operation parameter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,
    /// `query`, `header`, `path` or `cookie`. Checked during validation.
    #[serde(default, rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
}

/// Operation response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: Option<String>,
}

/// Reusable components. Kept raw; references into them are resolved through
/// the document tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
}

/// Whether `key` is a specification extension (`x-...`).
pub fn is_extension(key: &str) -> bool {
    key.starts_with("x-")
}

/// Accept any YAML scalar where a string is expected.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "invalid type: expected a string, found {other}"
        ))),
    }
}

/// Decode a map, skipping extension keys before their values are typed.
fn without_extensions<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(optional_without_extensions(deserializer)?.unwrap_or_default())
}

fn optional_without_extensions<'de, D, T>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(raw) = Option::<BTreeMap<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };

    raw.into_iter()
        .filter(|(key, _)| !is_extension(key))
        .map(|(key, value)| match T::deserialize(value) {
            Ok(item) => Ok((key, item)),
            Err(e) => Err(<D::Error as de::Error>::custom(format!("{key}: {e}"))),
        })
        .collect::<Result<BTreeMap<String, T>, D::Error>>()
        .map(Some)
}

/// Either an inline object or a `$ref` to one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    /// Reference to another part of the document.
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    /// Inline definition.
    Item(T),
}

/// HTTP methods an OpenAPI path item can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Matching router filter.
    pub fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Options => MethodFilter::OPTIONS,
            HttpMethod::Head => MethodFilter::HEAD,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Trace => MethodFilter::TRACE,
        }
    }
}

/// A declared operation, flattened out of the path map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredOperation {
    pub method: HttpMethod,
    /// Path template as written in the document.
    pub path: String,
    /// Key handlers are registered under.
    pub key: String,
}

impl DeclaredOperation {
    /// `operationId` when declared, `"<METHOD> <path>"` otherwise.
    pub fn key_for(method: HttpMethod, path: &str, operation: &Operation) -> String {
        match &operation.operation_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{method} {path}"),
        }
    }
}

impl fmt::Display for DeclaredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.method, self.path, self.key)
    }
}

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Fixed text.
    Literal(String),
    /// Whole-segment variable (`{id}`).
    Param(String),
    /// Text and variables mixed in one segment (`{name}.{ext}`).
    Mixed(String),
}

/// Parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse an OpenAPI path such as `/users/{id}`.
    pub fn parse(path: &str) -> Result<Self, String> {
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| "path must start with '/'".to_string())?;

        if rest.is_empty() {
            return Ok(Self { segments: Vec::new() });
        }

        let segments = rest
            .split('/')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Variable names in order of appearance.
    pub fn params(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Param(name) => names.push(name.as_str()),
                Segment::Mixed(raw) => names.extend(mixed_params(raw)),
                Segment::Literal(_) => {}
            }
        }
        names
    }

    /// Template with variable names erased, for conflict detection.
    pub fn normalized(&self) -> String {
        self.render(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Param(_) => "{}".to_string(),
            Segment::Mixed(raw) => erase_params(raw),
        })
    }

    /// Router path under `base` (`/users/{id}` → `/api/users/:id`).
    ///
    /// Returns `None` when a segment mixes text and variables.
    pub fn to_router_path(&self, base: &str) -> Option<String> {
        if self.segments.iter().any(|s| matches!(s, Segment::Mixed(_))) {
            return None;
        }

        let rendered = self.render(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Param(name) => format!(":{name}"),
            Segment::Mixed(raw) => raw.clone(),
        });

        Some(match (base.is_empty(), rendered.as_str()) {
            (true, _) => rendered,
            (false, "/") => base.to_string(),
            (false, _) => format!("{base}{rendered}"),
        })
    }

    fn render(&self, f: impl Fn(&Segment) -> String) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments.iter().map(|s| format!("/{}", f(s))).collect()
    }
}

fn parse_segment(segment: &str) -> Result<Segment, String> {
    if segment.is_empty() {
        return Err("path contains an empty segment".to_string());
    }

    let mut depth = 0usize;
    let mut params = 0usize;
    let mut current = String::new();
    for ch in segment.chars() {
        match ch {
            '{' if depth == 0 => {
                depth = 1;
                current.clear();
            }
            '{' => return Err(format!("nested '{{' in segment {segment:?}")),
            '}' if depth == 1 => {
                if current.is_empty() {
                    return Err(format!("empty parameter name in segment {segment:?}"));
                }
                depth = 0;
                params += 1;
            }
            '}' => return Err(format!("unbalanced '}}' in segment {segment:?}")),
            _ if depth == 1 => current.push(ch),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!("unclosed '{{' in segment {segment:?}"));
    }

    let whole = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|inner| params == 1 && !inner.contains(['{', '}']));

    Ok(match (params, whole) {
        (0, _) => Segment::Literal(segment.to_string()),
        (_, Some(name)) => Segment::Param(name.to_string()),
        _ => Segment::Mixed(segment.to_string()),
    })
}

fn mixed_params(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('{')
        .skip(1)
        .filter_map(|part| part.split_once('}').map(|(name, _)| name))
}

fn erase_params(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut inside = false;
    for ch in raw.chars() {
        match ch {
            '{' => {
                inside = true;
                out.push_str("{}");
            }
            '}' => inside = false,
            _ if inside => {}
            _ => out.push(ch),
        }
    }
    out
}
