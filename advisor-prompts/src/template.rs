//! Prompt templates with literal placeholder substitution.

use std::collections::BTreeSet;
use std::fmt;

use advisor_primitives::Record;
use serde_json::Value;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while parsing or rendering templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder names a field the record does not provide.
    #[error("unresolved placeholder: {name}")]
    UnresolvedPlaceholder {
        /// Name inside the placeholder braces.
        name: String,
    },

    /// A placeholder is syntactically invalid (empty or containing spaces).
    #[error("malformed placeholder `{placeholder}`")]
    MalformedPlaceholder {
        /// The raw placeholder text.
        placeholder: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed prompt template.
///
/// Placeholders are written `{{name}}` or `{{{name}}}`; both forms substitute
/// the field value verbatim, with no escaping. An unterminated `{{` is kept as
/// literal text.
///
/// # Examples
///
/// ```
/// use advisor_primitives::Record;
/// use advisor_prompts::PromptTemplate;
///
/// let template = PromptTemplate::parse("Feed: {{{feedData}}}").unwrap();
/// let record = Record::new().with("feedData", "LSF=98.5");
/// assert_eq!(template.render(&record).unwrap(), "Feed: LSF=98.5");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MalformedPlaceholder`] for placeholders that
    /// are empty or contain whitespace or braces.
    pub fn parse(source: impl Into<String>) -> TemplateResult<Self> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// Returns the raw template string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Renders the template against a record.
    ///
    /// String values are inserted as-is; numbers and booleans use their JSON
    /// text. Rendering is deterministic for a given template and record.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnresolvedPlaceholder`] if a placeholder has no
    /// matching (non-null) field in the record.
    pub fn render(&self, record: &Record) -> TemplateResult<String> {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => match record.get(name) {
                    Some(Value::String(text)) => rendered.push_str(text),
                    Some(Value::Null) | None => {
                        return Err(TemplateError::UnresolvedPlaceholder { name: name.clone() });
                    }
                    Some(other) => rendered.push_str(&other.to_string()),
                },
            }
        }
        Ok(rendered)
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses and renders a template in one step.
///
/// # Errors
///
/// Returns any parse or render error from [`PromptTemplate`].
pub fn render(template: &str, record: &Record) -> TemplateResult<String> {
    PromptTemplate::parse(template)?.render(record)
}

fn parse_segments(source: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        literal.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (open, close) = if tail.starts_with("{{{") {
            ("{{{", "}}}")
        } else {
            ("{{", "}}")
        };
        let body = &tail[open.len()..];

        let Some(end) = body.find(close) else {
            literal.push_str(tail);
            rest = "";
            break;
        };

        let name = body[..end].trim();
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || c == '{' || c == '}')
        {
            return Err(TemplateError::MalformedPlaceholder {
                placeholder: tail[..open.len() + end + close.len()].to_owned(),
            });
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(name.to_owned()));
        rest = &body[end + close.len()..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new()
            .with("feedData", "LSF=98.5")
            .with("currentBlend", r#"{"limestone":70}"#)
            .with("rate", 250)
    }

    #[test]
    fn renders_double_and_triple_braces() {
        let rendered = render(
            "Feed: {{{feedData}}}\nBlend: {{ currentBlend }}\nRate: {{rate}}",
            &record(),
        )
        .unwrap();
        assert_eq!(
            rendered,
            "Feed: LSF=98.5\nBlend: {\"limestone\":70}\nRate: 250"
        );
    }

    #[test]
    fn substitution_is_literal() {
        let record = Record::new().with("x", "<b>{{y}}</b> & \"q\"");
        assert_eq!(render("[{{x}}]", &record).unwrap(), "[<b>{{y}}</b> & \"q\"]");
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = PromptTemplate::parse("{{feedData}} / {{currentBlend}} / {{feedData}}")
            .unwrap();
        let first = template.render(&record()).unwrap();
        for _ in 0..5 {
            assert_eq!(template.render(&record()).unwrap(), first);
        }
    }

    #[test]
    fn unresolved_placeholder_errors() {
        let err = render("Targets: {{qualityTargets}}", &record()).expect_err("missing");
        assert_eq!(
            err,
            TemplateError::UnresolvedPlaceholder {
                name: "qualityTargets".to_owned()
            }
        );
    }

    #[test]
    fn placeholders_are_distinct_and_ordered() {
        let template =
            PromptTemplate::parse("{{b}} {{{a}}} {{b}} {{c}}").unwrap();
        assert_eq!(template.placeholders(), ["b", "a", "c"]);
    }

    #[test]
    fn unterminated_braces_stay_literal() {
        let template = PromptTemplate::parse("json like {{ not closed").unwrap();
        assert!(template.placeholders().is_empty());
        assert_eq!(template.render(&Record::new()).unwrap(), "json like {{ not closed");
    }

    #[test]
    fn malformed_placeholders_error() {
        assert!(matches!(
            PromptTemplate::parse("{{}}"),
            Err(TemplateError::MalformedPlaceholder { .. })
        ));
        assert!(PromptTemplate::parse("{{two words}}").is_err());
    }
}
