//! Cell formulas.

use crate::common::error::{Error, Result};
use std::fmt;

/// Longest formula text a cell may hold, in characters.
pub const MAX_FORMULA_LENGTH: usize = 8192;

/// Longest URI accepted by [`Formula::hyperlink`].
pub const MAX_HYPERLINK_URI_LENGTH: usize = 255;

/// Longest friendly name accepted by [`Formula::hyperlink`].
pub const MAX_HYPERLINK_FRIENDLY_NAME_LENGTH: usize = 255;

/// The text of a cell formula, without the leading `=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Formula {
    text: String,
}

impl Formula {
    /// Create a formula. A leading `=` is accepted and dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use spreadstream::Formula;
    /// let formula = Formula::new("=SUM(A1:A3)").unwrap();
    /// assert_eq!(formula.text(), "SUM(A1:A3)");
    /// ```
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let mut text = text.into();
        if text.starts_with('=') {
            text.remove(0);
        }

        if text.is_empty() {
            return Err(Error::invalid_argument("Formula text cannot be empty"));
        }
        if text.chars().count() > MAX_FORMULA_LENGTH {
            return Err(Error::invalid_argument(format!(
                "Formula text cannot be longer than {} characters",
                MAX_FORMULA_LENGTH
            )));
        }

        Ok(Self { text })
    }

    /// Build a `HYPERLINK` formula pointing at an absolute URI.
    ///
    /// Relative or malformed URIs are rejected here, before the formula can
    /// reach any worksheet.
    pub fn hyperlink(uri: &str, friendly_name: Option<&str>) -> Result<Self> {
        if uri.chars().count() > MAX_HYPERLINK_URI_LENGTH {
            return Err(Error::invalid_argument(format!(
                "Hyperlink URI cannot be longer than {} characters",
                MAX_HYPERLINK_URI_LENGTH
            )));
        }
        let parsed = url::Url::parse(uri)?;
        if parsed.cannot_be_a_base() && parsed.scheme() != "mailto" {
            return Err(Error::invalid_argument(format!(
                "Hyperlink URI must be absolute: '{}'",
                uri
            )));
        }

        let mut text = String::with_capacity(uri.len() + 16);
        text.push_str("HYPERLINK(");
        push_string_literal(&mut text, uri);

        if let Some(name) = friendly_name {
            if name.chars().count() > MAX_HYPERLINK_FRIENDLY_NAME_LENGTH {
                return Err(Error::invalid_argument(format!(
                    "Hyperlink friendly name cannot be longer than {} characters",
                    MAX_HYPERLINK_FRIENDLY_NAME_LENGTH
                )));
            }
            text.push_str(", ");
            push_string_literal(&mut text, name);
        }

        text.push(')');
        Ok(Self { text })
    }

    /// The formula text as written into the `<f>` element.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "={}", self.text)
    }
}

/// Push `value` as a quoted formula string literal.
pub(crate) fn push_string_literal(text: &mut String, value: &str) {
    text.push('"');
    for c in value.chars() {
        if c == '"' {
            text.push('"');
        }
        text.push(c);
    }
    text.push('"');
}
