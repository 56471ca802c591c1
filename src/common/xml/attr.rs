//! Attribute fragment helpers.
//!
//! An attribute whose value is unset is omitted entirely rather than emitted
//! empty; every serializer in the crate goes through these helpers so the
//! escaping and omission rules stay identical.

use super::escape::escape_xml;

/// Push ` name="value"` with the value escaped.
#[inline]
pub fn push_attr(xml: &mut String, name: &str, value: &str) {
    xml.push(' ');
    xml.push_str(name);
    xml.push_str("=\"");
    xml.push_str(&escape_xml(value));
    xml.push('"');
}

/// Push ` name="value"` only when a value is present.
#[inline]
pub fn push_opt_attr(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        push_attr(xml, name, value);
    }
}

/// Push ` name="1"` / ` name="0"` only when a value is present.
#[inline]
pub fn push_bool_attr(xml: &mut String, name: &str, value: Option<bool>) {
    if let Some(value) = value {
        xml.push(' ');
        xml.push_str(name);
        xml.push_str(if value { "=\"1\"" } else { "=\"0\"" });
    }
}

/// Push a numeric attribute without going through `fmt`.
#[inline]
pub fn push_num_attr<N: itoa::Integer>(xml: &mut String, name: &str, value: N) {
    let mut buf = itoa::Buffer::new();
    xml.push(' ');
    xml.push_str(name);
    xml.push_str("=\"");
    xml.push_str(buf.format(value));
    xml.push('"');
}
