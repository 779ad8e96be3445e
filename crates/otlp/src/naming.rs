use crate::attributes::Attributes;

/// Substitute `{identifier}` placeholders in a span name with attribute values.
///
/// Placeholders are discovered in the original name; each one whose identifier
/// is an attribute key is replaced everywhere by plain substring replacement.
/// Unknown placeholders are left verbatim.
pub fn resolve_span_name(name: &str, attributes: &Attributes) -> String {
    if attributes.is_empty() {
        return name.to_string();
    }

    let mut resolved = name.to_string();
    for key in placeholders(name) {
        if let Some(value) = attributes.get(key) {
            resolved = resolved.replace(&format!("{{{}}}", key), &value.to_string());
        }
    }
    resolved
}

/// Identifiers of every `{word}` sequence in `name`, in order of appearance
fn placeholders(name: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = name;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let len: usize = after
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();

        if len > 0 && after[len..].starts_with('}') {
            found.push(&after[..len]);
            rest = &after[len + 1..];
        } else {
            rest = after;
        }
    }
    found
}
