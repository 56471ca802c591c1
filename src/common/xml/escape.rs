use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

const SPECIALS: [&str; 5] = ["&", "<", ">", "\"", "'"];
const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];

// Static initialization: automaton is built only once, thread-safe
static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(SPECIALS)
        .expect("Failed to build XML escaper")
});

/// Escape XML special characters.
///
/// # Examples
///
/// ```
/// use spreadstream::common::xml::escape_xml;
/// assert_eq!(escape_xml("a & b"), "a &amp; b");
/// assert_eq!(escape_xml("<tag>\"hello\"</tag>"), "&lt;tag&gt;&quot;hello&quot;&lt;/tag&gt;");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &ENTITIES)
}

/// Append the escaped form of `s` to `out`.
///
/// Unlike [`escape_xml`] this does not allocate an intermediate string, which
/// matters on the per-cell path.
#[inline]
pub fn escape_into(s: &str, out: &mut Vec<u8>) {
    XML_ESCAPER.replace_all_with_bytes(s.as_bytes(), out, |mat, _, dst| {
        dst.extend_from_slice(ENTITIES[mat.pattern().as_usize()].as_bytes());
        true
    });
}

/// Exact byte length of `s` after escaping.
#[inline]
pub fn escaped_len(s: &str) -> usize {
    s.bytes()
        .map(|b| match b {
            b'&' => 5,
            b'<' | b'>' => 4,
            b'"' | b'\'' => 6,
            _ => 1,
        })
        .sum()
}
