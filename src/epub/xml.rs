//! Small helpers shared by the OPF, NAV, NCX and container parsers.

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::BytesStart;

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the first attribute whose local name is `name`, with entities resolved.
pub fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == name)
        .map(|a| {
            let raw = String::from_utf8_lossy(&a.value);
            match unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.into_owned(),
            }
        })
}

/// Whether a whitespace-separated attribute value (`properties`, `epub:type`)
/// contains `token`.
pub fn has_token(list: &str, token: &str) -> bool {
    list.split_ascii_whitespace().any(|t| t == token)
}

/// Text of a general entity reference as reported by the reader (`amp`,
/// `#8217`, `#x2019`). Also accepts `nbsp`.
pub fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    match entity {
        "nbsp" => Some("\u{a0}".to_string()),
        _ => resolve_predefined_entity(entity).map(str::to_string),
    }
}
