//! Best-effort extraction of a structured record from model text.
//!
//! Models are asked for a bare JSON object, but answers still arrive wrapped
//! in code fences, surrounded by prose, or as `Label: value` sections. This
//! module tries, in order:
//!
//! 1. the whole text as a JSON object,
//! 2. the body of the first fenced code block,
//! 3. the outermost `{ ... }` span,
//! 4. labelled sections matched against the contract's field names.
//!
//! A JSON candidate only counts if it yields at least one contract field, so
//! an inline JSON value inside a labelled answer does not shadow the labels.
//! Trailing commas are tolerated in JSON candidates.
//!
//! The result is only a candidate; callers validate it against the output
//! contract before trusting it.

use advisor_primitives::{Contract, FieldKind, FieldSpec, Record};
use serde_json::{Map, Number, Value};

/// How a candidate record was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Parsed from a JSON object.
    Json,
    /// Assembled from `Label: value` sections.
    Labelled,
}

/// Extracts a candidate record for `contract` from raw model text.
///
/// Returns `None` when nothing resembling the contract's fields was found.
#[must_use]
pub fn extract(text: &str, contract: &Contract) -> Option<(Record, Extraction)> {
    json_candidates(text)
        .into_iter()
        .filter_map(parse_object)
        .map(|object| from_object(object, contract))
        .find(|record| !record.is_empty())
        .map(|record| (record, Extraction::Json))
        .or_else(|| {
            let record = from_labels(text, contract);
            (!record.is_empty()).then_some((record, Extraction::Labelled))
        })
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    let value = serde_json::from_str::<Value>(candidate)
        .or_else(|_| serde_json::from_str::<Value>(&without_trailing_commas(candidate)))
        .ok()?;
    match value {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Drops commas that directly precede `}` or `]` outside string literals.
fn without_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = text[index + 1..].trim_start().chars().next();
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text.trim()];
    if let Some(fenced) = fenced_block(text) {
        candidates.push(fenced);
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }
    candidates
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    // Skip an info string such as `json`.
    let body_start = rest.find('\n').map_or(0, |newline| newline + 1);
    let body = &rest[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

fn from_object(mut object: Map<String, Value>, contract: &Contract) -> Record {
    // A lone wrapper key such as `{"result": {...}}` is unwrapped once.
    if object.len() == 1 && !contract.fields().iter().any(|spec| object.contains_key(spec.name())) {
        let inner = object.values().next().and_then(Value::as_object).cloned();
        if let Some(inner) = inner {
            object = inner;
        }
    }

    let mut record = Record::new();
    for spec in contract.fields() {
        let value = object.get(spec.name()).or_else(|| {
            let wanted = normalise(spec.name());
            object
                .iter()
                .find(|(key, _)| normalise(key) == wanted)
                .map(|(_, value)| value)
        });
        if let Some(value) = value {
            record.insert(spec.name(), coerce(spec, value.clone()));
        }
    }
    record
}

fn from_labels(text: &str, contract: &Contract) -> Record {
    let mut sections: Vec<(&FieldSpec, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        if let Some((spec, first)) = label_line(line, contract) {
            sections.push((spec, vec![first]));
        } else if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let mut record = Record::new();
    for (spec, mut lines) in sections {
        if record.contains(spec.name()) {
            continue;
        }
        tidy_section(&mut lines);
        let joined = lines.join("\n");
        let body = unquote(&joined);
        if body.is_empty() {
            continue;
        }
        record.insert(spec.name(), coerce(spec, Value::String(body.to_owned())));
    }
    record
}

/// Removes code fences and the unmatched closing brackets left behind when a
/// broken JSON object is read as labelled lines.
fn tidy_section(lines: &mut Vec<&str>) {
    lines.retain(|line| !line.trim_start().starts_with("```"));
    while let Some(last) = lines.last().copied().map(str::trim) {
        let closing = !last.is_empty() && last.chars().all(|c| matches!(c, '}' | ']' | ','));
        if last.is_empty() || (closing && has_unmatched_closers(lines)) {
            lines.pop();
        } else {
            break;
        }
    }
}

fn has_unmatched_closers(lines: &[&str]) -> bool {
    let (mut open, mut close) = (0usize, 0usize);
    for c in lines.iter().flat_map(|line| line.chars()) {
        match c {
            '{' | '[' => open += 1,
            '}' | ']' => close += 1,
            _ => {}
        }
    }
    close > open
}

/// Trims a trailing comma and one pair of wrapping double quotes.
fn unquote(body: &str) -> &str {
    let body = body.trim().trim_end_matches(',').trim_end();
    body.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .map_or(body, str::trim)
}

fn label_line<'a, 'c>(line: &'a str, contract: &'c Contract) -> Option<(&'c FieldSpec, &'a str)> {
    let stripped = line.trim_start_matches(is_decoration);
    let (label, rest) = stripped.split_once(':')?;
    let label = normalise(label.trim_end_matches(is_decoration));
    if label.is_empty() {
        return None;
    }
    let spec = contract
        .fields()
        .iter()
        .find(|spec| normalise(spec.name()) == label)?;
    Some((spec, rest.trim_start_matches(is_decoration)))
}

fn is_decoration(c: char) -> bool {
    matches!(c, '#' | '*' | '-' | '_') || c.is_whitespace()
}

/// Lowercase alphanumerics only, so `Predicted Energy Savings` and
/// `predictedEnergySavings` compare equal.
fn normalise(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn coerce(spec: &FieldSpec, value: Value) -> Value {
    match (spec.kind(), value) {
        (FieldKind::Number, Value::String(text)) => first_number(&text)
            .and_then(Number::from_f64)
            .map_or(Value::String(text), Value::Number),
        (FieldKind::String, Value::Number(number)) => Value::String(number.to_string()),
        (FieldKind::String, Value::Bool(flag)) => Value::String(flag.to_string()),
        (FieldKind::String, nested @ (Value::Array(_) | Value::Object(_))) => {
            Value::String(nested.to_string())
        }
        (_, value) => value,
    }
}

/// Parses the first numeric token, ignoring thousands separators.
fn first_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let negative = start > 0
        && bytes[start - 1] == b'-'
        && (start == 1 || !bytes[start - 2].is_ascii_alphanumeric());

    let token: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    let token = token.trim_end_matches('.');
    let value: f64 = token.parse().ok()?;
    Some(if negative { -value } else { value })
}
