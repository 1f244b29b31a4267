//! Display-name rules for series columns.
//!
//! A rule is either a `%(key)s` template over the flattened series metadata, or a
//! `!name` reference to a transform registered in an [`AliasRegistry`]. Transforms are
//! plain Rust functions registered by the embedding program; a rule string can only
//! select one of them, never supply code.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Flattened series metadata: `metric` plus one `tags.<key>` entry per tag.
pub type Metadata = BTreeMap<String, String>;

pub type TransformFn = dyn Fn(&Metadata) -> Result<String, AliasError> + Send + Sync;

pub const TRANSFORM_SENTINEL: char = '!';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("no transform registered as `{0}`")]
    UnknownTransform(String),
    #[error("template references missing key `{0}`")]
    MissingKey(String),
    #[error("unterminated placeholder at byte {0}")]
    UnterminatedPlaceholder(usize),
    #[error("unsupported conversion `%{0}` at byte {1}")]
    UnsupportedConversion(char, usize),
    #[error("transform `{name}` failed: {reason}")]
    TransformFailed { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasRule {
    Template(String),
    Transform(String),
}

impl AliasRule {
    pub fn parse(rule: &str) -> AliasRule {
        match rule.strip_prefix(TRANSFORM_SENTINEL) {
            Some(name) => AliasRule::Transform(name.trim().to_owned()),
            None => AliasRule::Template(rule.to_owned()),
        }
    }

    pub fn apply(&self, metadata: &Metadata, registry: &AliasRegistry) -> Result<String, AliasError> {
        match self {
            AliasRule::Template(template) => render_template(template, metadata),
            AliasRule::Transform(name) => registry.apply(name, metadata),
        }
    }
}

impl From<&str> for AliasRule {
    fn from(rule: &str) -> Self {
        AliasRule::parse(rule)
    }
}

impl fmt::Display for AliasRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasRule::Template(t) => f.write_str(t),
            AliasRule::Transform(name) => write!(f, "{TRANSFORM_SENTINEL}{name}"),
        }
    }
}

/// Result of deriving a display name: either the rule's output or the canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasOutcome {
    Derived(String),
    Fallback { id: String, reason: String },
}

impl AliasOutcome {
    pub fn name(&self) -> &str {
        match self {
            AliasOutcome::Derived(name) => name,
            AliasOutcome::Fallback { id, .. } => id,
        }
    }

    pub fn into_name(self) -> String {
        match self {
            AliasOutcome::Derived(name) => name,
            AliasOutcome::Fallback { id, .. } => id,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AliasOutcome::Fallback { .. })
    }
}

/// Named transforms that `!name` rules may select.
#[derive(Clone, Default)]
pub struct AliasRegistry {
    transforms: HashMap<String, Arc<TransformFn>>,
}

impl fmt::Debug for AliasRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.transforms.keys().map(|k| k.as_str()).collect();
        names.sort();
        f.debug_struct("AliasRegistry")
            .field("transforms", &names)
            .finish()
    }
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("metric", |m| Ok(metric_of(m).to_owned()));
        registry.register("short_metric", |m| {
            let metric = metric_of(m);
            Ok(metric.rsplit('.').next().unwrap_or(metric).to_owned())
        });
        registry.register("tag_values", |m| {
            let values: Vec<&str> = m
                .iter()
                .filter(|(k, _)| k.starts_with("tags."))
                .map(|(_, v)| v.as_str())
                .collect();
            if values.is_empty() {
                Ok(metric_of(m).to_owned())
            } else {
                Ok(values.join(","))
            }
        });
        registry
    }

    /// Registers `f` under `name`, replacing any previous transform with that name.
    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&Metadata) -> Result<String, AliasError> + Send + Sync + 'static,
    {
        self.transforms.insert(name.to_owned(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn apply(&self, name: &str, metadata: &Metadata) -> Result<String, AliasError> {
        let f = self
            .transforms
            .get(name)
            .ok_or_else(|| AliasError::UnknownTransform(name.to_owned()))?;
        f(metadata)
    }
}

fn metric_of(metadata: &Metadata) -> &str {
    metadata.get("metric").map(|m| m.as_str()).unwrap_or("")
}

/// Renders a mapping-style format string: `%(key)s` and `%%` are the only directives.
pub fn render_template(template: &str, metadata: &Metadata) -> Result<String, AliasError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let at = offset + pos;
        let directive = &rest[pos + 1..];
        let consumed = match directive.chars().next() {
            Some('%') => {
                out.push('%');
                2
            }
            Some('(') => {
                let close = directive
                    .find(')')
                    .ok_or(AliasError::UnterminatedPlaceholder(at))?;
                let key = &directive[1..close];
                match directive[close + 1..].chars().next() {
                    Some('s') => {}
                    Some(c) => return Err(AliasError::UnsupportedConversion(c, at)),
                    None => return Err(AliasError::UnterminatedPlaceholder(at)),
                }
                let value = metadata
                    .get(key)
                    .ok_or_else(|| AliasError::MissingKey(key.to_owned()))?;
                out.push_str(value);
                close + 3
            }
            Some(c) => return Err(AliasError::UnsupportedConversion(c, at)),
            None => return Err(AliasError::UnterminatedPlaceholder(at)),
        };
        rest = &directive[consumed - 1..];
        offset = at + consumed;
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata::from([
            ("metric".to_owned(), "sys.cpu.user".to_owned()),
            ("tags.host".to_owned(), "web01".to_owned()),
            ("tags.dc".to_owned(), "lga".to_owned()),
        ])
    }

    #[test]
    fn test_parse_rule() {
        assert_eq!(
            AliasRule::parse("!short_metric"),
            AliasRule::Transform("short_metric".to_owned())
        );
        assert_eq!(
            AliasRule::parse("%(metric)s"),
            AliasRule::Template("%(metric)s".to_owned())
        );
        assert_eq!(AliasRule::parse("!tag_values").to_string(), "!tag_values");
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template("%(metric)s@%(tags.host)s 100%%", &metadata());
        assert_eq!(rendered, Ok("sys.cpu.user@web01 100%".to_owned()));
        assert_eq!(
            render_template("plain", &metadata()),
            Ok("plain".to_owned())
        );
        assert_eq!(render_template("", &metadata()), Ok(String::new()));
    }

    #[test]
    fn test_render_template_errors() {
        let md = metadata();
        assert_eq!(
            render_template("%(nonexistent)s", &md),
            Err(AliasError::MissingKey("nonexistent".to_owned()))
        );
        assert_eq!(
            render_template("x %(metric", &md),
            Err(AliasError::UnterminatedPlaceholder(2))
        );
        assert_eq!(
            render_template("%(metric)", &md),
            Err(AliasError::UnterminatedPlaceholder(0))
        );
        assert_eq!(
            render_template("%(metric)d", &md),
            Err(AliasError::UnsupportedConversion('d', 0))
        );
        assert_eq!(
            render_template("50%", &md),
            Err(AliasError::UnterminatedPlaceholder(2))
        );
    }

    #[test]
    fn test_builtins() {
        let registry = AliasRegistry::with_builtins();
        let md = metadata();
        assert_eq!(registry.apply("metric", &md), Ok("sys.cpu.user".to_owned()));
        assert_eq!(registry.apply("short_metric", &md), Ok("user".to_owned()));
        assert_eq!(registry.apply("tag_values", &md), Ok("lga,web01".to_owned()));
        assert_eq!(
            registry.apply("eval", &md),
            Err(AliasError::UnknownTransform("eval".to_owned()))
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = AliasRegistry::with_builtins();
        registry.register("metric", |_| Ok("overridden".to_owned()));
        assert!(registry.contains("metric"));
        assert_eq!(
            AliasRule::parse("!metric").apply(&metadata(), &registry),
            Ok("overridden".to_owned())
        );
    }
}
