//! Typed decoding of the launch and terminate forms.

use podgate_common::{is_valid_subdomain, Env, ImageSelector};
use serde::Serialize;
use std::fmt;

/// Raw form fields in submission order. Repeated fields appear repeatedly.
pub type FormFields = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field_names: Vec<String>,
    pub classification: String,
    pub message: String,
}

impl FieldError {
    fn new(field_names: &[&str], classification: &str, message: impl Into<String>) -> Self {
        Self {
            field_names: field_names.iter().map(|f| f.to_string()).collect(),
            classification: classification.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Values used when a launch form leaves `port` or `net` empty.
#[derive(Debug, Clone)]
pub struct FormDefaults {
    pub port: u16,
    pub net: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchForm {
    pub image: ImageSelector,
    pub subdomain: String,
    pub port: u16,
    pub net: String,
    pub env: Vec<Env>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateForm {
    pub subdomain: String,
}

/// Last non-empty value of `name`.
fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .rev()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.as_str())
}

fn subdomain(fields: &[(String, String)], errors: &mut ValidationErrors) -> String {
    match field(fields, "subdomain") {
        None => {
            errors.push(FieldError::new(
                &["subdomain"],
                "RequiredError",
                "subdomain is required",
            ));
            String::new()
        }
        Some(subdomain) => {
            if !is_valid_subdomain(subdomain) {
                errors.push(FieldError::new(
                    &["subdomain"],
                    "RegExpError",
                    "subdomain is not good",
                ));
            }
            subdomain.to_string()
        }
    }
}

/// Splits `KEY=VAL` at the first `=`; the value may itself contain `=`.
fn parse_env(raw: &str) -> Option<Env> {
    match raw.split_once('=') {
        Some((key, val)) if !key.is_empty() => Some(Env::new(key, val)),
        _ => None,
    }
}

impl LaunchForm {
    pub fn decode(
        fields: &[(String, String)],
        defaults: &FormDefaults,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        // An id wins over a name when both are given.
        let image = match (field(fields, "image_id"), field(fields, "image_name")) {
            (Some(id), _) => Some(ImageSelector::Id(id.to_string())),
            (None, Some(name)) => Some(ImageSelector::Name(name.to_string())),
            (None, None) => {
                errors.push(FieldError::new(
                    &["image_id", "image_name"],
                    "RequiredError",
                    "require image_id or image_name",
                ));
                None
            }
        };

        let subdomain = subdomain(fields, &mut errors);

        let port = match field(fields, "port") {
            None => defaults.port,
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                errors.push(FieldError::new(
                    &["port"],
                    "TypeError",
                    format!("port is not a valid port number: {}", raw),
                ));
                0
            }),
        };

        let net = field(fields, "net").unwrap_or(defaults.net.as_str()).to_string();

        let mut env = Vec::new();
        for (_, raw) in fields.iter().filter(|(key, _)| key == "env") {
            match parse_env(raw) {
                Some(pair) => env.push(pair),
                None => errors.push(FieldError::new(
                    &["env"],
                    "EnvParseError",
                    format!("cannot parse Env for: {}", raw),
                )),
            }
        }

        match image {
            Some(image) if errors.is_empty() => Ok(Self {
                image,
                subdomain,
                port,
                net,
                env,
            }),
            _ => Err(errors),
        }
    }
}

impl TerminateForm {
    pub fn decode(fields: &[(String, String)]) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let subdomain = subdomain(fields, &mut errors);
        if errors.is_empty() {
            Ok(Self { subdomain })
        } else {
            Err(errors)
        }
    }
}
