//! Metadata text formats consumed from archives.
//!
//! Three small formats live here: the manifest-style attribute block
//! (`Name: Value` with leading-space continuation lines), the simple
//! `key=value` properties block used for bootstrap system properties, and
//! the newline-delimited table of contents listing nested archives in load
//! order. [`split_escaped`] handles the delimiter-separated attribute
//! values where doubling the delimiter escapes a literal one.

use std::collections::BTreeMap;

/// Manifest-style attribute block.
///
/// Attribute names are case-insensitive, per the manifest convention. Named
/// sub-sections (blocks introduced by a `Name:` attribute after a blank
/// line) carry per-entry attributes such as content digests.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    attributes: BTreeMap<String, String>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

fn parse_block<'a>(
    lines: &mut std::iter::Peekable<impl Iterator<Item = &'a str>>,
) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let mut current: Option<(String, String)> = None;
    while let Some(line) = lines.peek() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        lines.next();
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((key, value)) = current.take() {
            attributes.insert(key, value);
        }
        if let Some((name, value)) = line.split_once(':') {
            current = Some((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    if let Some((key, value)) = current {
        attributes.insert(key, value);
    }
    attributes
}

impl Manifest {
    /// Parse a manifest: the main attribute block followed by optional
    /// per-entry sections.
    ///
    /// A line starting with a single space continues the previous value.
    /// Lines without a colon are ignored. Sections without a `name`
    /// attribute are dropped.
    pub fn parse(text: &str) -> Manifest {
        let mut lines = text.lines().peekable();
        let attributes = parse_block(&mut lines);
        let mut sections = BTreeMap::new();
        while lines.peek().is_some() {
            // Skip the blank separator line(s).
            while lines
                .peek()
                .is_some_and(|l| l.trim_end_matches('\r').is_empty())
            {
                lines.next();
            }
            if lines.peek().is_none() {
                break;
            }
            let mut block = parse_block(&mut lines);
            if let Some(name) = block.remove("name") {
                sections.insert(name, block);
            }
        }
        Manifest {
            attributes,
            sections,
        }
    }

    /// Look up a main attribute by (case-insensitive) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Look up a per-entry attribute by entry name and attribute name.
    pub fn entry_attribute(&self, entry: &str, name: &str) -> Option<&str> {
        self.sections
            .get(entry)?
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.sections.is_empty()
    }

    /// All main attributes, sorted by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a simple `key=value` properties block.
///
/// Blank lines and lines starting with `#` or `!` are skipped; whitespace
/// around keys and values is trimmed. Later keys override earlier ones.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            result.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    result
}

/// Parse the table of contents listing nested archive names in load order.
///
/// One name per line; blank lines are ignored, order is preserved.
pub fn parse_toc(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a delimiter-separated value where a doubled delimiter escapes a
/// literal delimiter character.
///
/// `"a;b"` splits into `["a", "b"]`; `"a;;b"` is the single item `"a;b"`.
pub fn split_escaped(value: &str, sep: char) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == sep {
            if chars.peek() == Some(&sep) {
                chars.next();
                current.push(sep);
            } else {
                items.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_attributes_and_continuations() {
        let text = "Manifest-Version: 1.0\r\n\
                    Automatic-Module-Name: com.acme.widget\r\n\
                    Executable-Jar-Extra-Classpath: /opt/lib/first.jar;/opt\r\n \
                    /lib/second.jar\r\n\
                    \r\n\
                    Name: LIB-INF/core.jar\r\n\
                    SHA-256-Digest: abc=\r\n";
        let manifest = Manifest::parse(text);
        assert_eq!(
            manifest.attribute("Automatic-Module-Name"),
            Some("com.acme.widget")
        );
        // Continuation lines are joined without the leading space.
        assert_eq!(
            manifest.attribute("executable-jar-extra-classpath"),
            Some("/opt/lib/first.jar;/opt/lib/second.jar")
        );
        // Per-entry sections are not part of the main block.
        assert_eq!(manifest.attribute("SHA-256-Digest"), None);
        assert_eq!(
            manifest.entry_attribute("LIB-INF/core.jar", "SHA-256-Digest"),
            Some("abc=")
        );
        assert_eq!(manifest.entry_attribute("LIB-INF/other.jar", "SHA-256-Digest"), None);
    }

    #[test]
    fn properties_skip_comments_and_trim() {
        let props = parse_properties("# comment\nfoo = bar\n! other\n\nempty.key=\n");
        assert_eq!(props.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(props.get("empty.key").map(String::as_str), Some(""));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn toc_preserves_order() {
        let toc = parse_toc("core-1.0.0.jar\n\nutil.jar\n");
        assert_eq!(toc, vec!["core-1.0.0.jar", "util.jar"]);
    }

    #[test]
    fn split_escaped_handles_doubled_delimiter() {
        assert_eq!(split_escaped("a;b;c", ';'), vec!["a", "b", "c"]);
        assert_eq!(split_escaped("a;;b;c", ';'), vec!["a;b", "c"]);
        assert_eq!(split_escaped("a;;;;b", ';'), vec!["a;;b"]);
        assert_eq!(split_escaped("", ';'), vec![""]);
        assert_eq!(split_escaped("x;", ';'), vec!["x", ""]);
    }
}
