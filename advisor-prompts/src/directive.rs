//! Structured-output directive derived from an output contract.

use std::fmt::{self, Write as _};

use advisor_primitives::{Contract, FieldKind};

/// System instruction telling the model which JSON object to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirective {
    content: String,
}

impl OutputDirective {
    /// Builds the directive for the supplied output contract.
    #[must_use]
    pub fn for_contract(contract: &Contract) -> Self {
        let mut content = String::from(
            "Respond with a single JSON object and nothing else. \
             Do not wrap it in markdown code fences.\n\
             The object must use exactly these keys:\n",
        );

        for spec in contract.fields() {
            let presence = if spec.is_required() {
                "required"
            } else {
                "optional"
            };
            // Writing into a String cannot fail.
            let _ = writeln!(
                content,
                "- \"{}\" ({}, {}): {}",
                spec.name(),
                spec.kind(),
                presence,
                spec.description()
            );
        }

        if contract
            .fields()
            .iter()
            .any(|spec| spec.kind() == FieldKind::Number)
        {
            content.push_str(
                "Number fields must be plain JSON numbers without units or thousands separators.\n",
            );
        }
        content.push_str("String fields must be plain text; do not nest objects or arrays.");

        Self { content }
    }

    /// Returns the directive text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for OutputDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}
