use super::delay::Delay;
use crate::config::{schema, ConfigNode};
use crate::error::{FloodError, Result};
use crate::params::{ExpandMode, ParamStore};
use crate::utils;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::Method;
use std::fs;
use std::path::Path;

/// Where a request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Sent as written.
    Literal(String),
    /// Expanded against the parameter store for every request.
    Template(String),
    /// File contents read when the profile starts.
    File(Vec<u8>),
}

/// One `<url>` of a URL list after sequence expansion.
///
/// Immutable once the profile has started.
#[derive(Debug, Clone)]
pub struct UrlEntry {
    pub url: String,
    pub method: Method,
    pub payload: Option<Payload>,
    pub content_type: Option<String>,
    pub extra_headers: Vec<String>,
    pub predelay: Delay,
    pub postdelay: Delay,
    pub request_template: Option<String>,
    pub response_template: Option<String>,
    pub response_script: Option<String>,
    pub response_name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl UrlEntry {
    /// Read a `<url>` element.
    pub fn from_node(node: &ConfigNode) -> Result<Self> {
        let attr = |name: &str| node.attribute(name).map(str::to_string);

        let method = match node.attribute(schema::URL_METHOD) {
            None => Method::GET,
            Some(verb) => Method::from_bytes(verb.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| FloodError::invalid(schema::URL_METHOD, verb))?,
        };

        let payload = if let Some(literal) = attr(schema::URL_PAYLOAD) {
            Some(Payload::Literal(literal))
        } else if let Some(template) = attr(schema::URL_PAYLOAD_TEMPLATE) {
            Some(Payload::Template(template))
        } else if let Some(path) = node.attribute(schema::URL_PAYLOAD_FILE) {
            let bytes = fs::read(Path::new(path)).map_err(|e| {
                FloodError::Config(format!("cannot read payload file '{}': {}", path, e))
            })?;
            Some(Payload::File(bytes))
        } else {
            None
        };

        let extra_headers = node
            .attribute(schema::URL_EXTRA_HEADERS)
            .map(|raw| {
                utils::unescape(raw)
                    .split(['\r', '\n'])
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let entry = Self {
            url: node.text().to_string(),
            method,
            payload,
            content_type: attr(schema::URL_CONTENT_TYPE),
            extra_headers,
            predelay: delay(node, schema::URL_PREDELAY, schema::URL_PREDELAY_PRECISION)?,
            postdelay: delay(node, schema::URL_POSTDELAY, schema::URL_POSTDELAY_PRECISION)?,
            request_template: attr(schema::URL_REQUEST_TEMPLATE),
            response_template: attr(schema::URL_RESPONSE_TEMPLATE),
            response_script: attr(schema::URL_RESPONSE_SCRIPT),
            response_name: attr(schema::URL_RESPONSE_NAME),
            user: attr(schema::URL_USER),
            password: attr(schema::URL_PASSWORD),
        };

        if entry.url.is_empty() && entry.request_template.is_none() {
            return Err(FloodError::Config(
                "<url> has neither a URL nor a request template".to_string(),
            ));
        }
        if entry.response_template.is_some() && entry.response_name.is_none() {
            return Err(FloodError::Config(format!(
                "<url>{}</url> has a {} but no {}",
                entry.url,
                schema::URL_RESPONSE_TEMPLATE,
                schema::URL_RESPONSE_NAME
            )));
        }

        Ok(entry)
    }

    /// Resolve the sequence variables currently bound, leaving the rest for
    /// request time.
    pub fn bind_sequence_variables(&mut self, params: &mut ParamStore) {
        let mut pass = |text: &mut String| *text = params.expand(text, ExpandMode::PassThrough);

        pass(&mut self.url);
        if let Some(Payload::Template(template)) = &mut self.payload {
            pass(template);
        }
        for text in [
            &mut self.request_template,
            &mut self.response_template,
        ]
        .into_iter()
        .flatten()
        {
            pass(text);
        }
    }

    /// Whether the whole response body has to be kept.
    pub fn wants_full_response(&self) -> bool {
        self.response_template.is_some() || self.response_script.is_some()
    }

    /// `Authorization: Basic ...` header line when a user is configured.
    pub fn authorization(&self) -> Option<String> {
        let user = self.user.as_deref()?;
        let password = self.password.as_deref().unwrap_or_default();
        let credentials = STANDARD.encode(format!("{}:{}", user, password));
        Some(format!("Authorization: Basic {}", credentials))
    }
}

fn delay(node: &ConfigNode, base: &str, precision: &str) -> Result<Delay> {
    let micros = |name: &str| -> Result<i64> {
        match node.attribute(name) {
            None => Ok(0),
            Some(value) => utils::seconds_to_micros(value)
                .ok_or_else(|| FloodError::invalid(format!("<url> attribute '{}'", name), value)),
        }
    };
    Ok(Delay::new(micros(base)?, micros(precision)?))
}
