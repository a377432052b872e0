//! Volume labels in the merged table of contents.

/// Built-in label phrases keyed by merge language code.
const LOCALIZED_LABELS: &[(&str, &str)] = &[
    ("ko", "제 {n}권"),
    ("ja", "第{n}巻"),
    ("zh", "第{n}卷"),
    ("en", "Volume {n}"),
];

const DEFAULT_LABEL: &str = "Volume {n}";

/// Format the label of volume `index` (0-based).
///
/// A caller `template` may use `{n}` (1-based volume number) and `{name}`
/// (the alias). Without one, a phrase is picked by `language`, defaulting
/// to English.
pub fn format_volume_label(
    index: usize,
    alias: &str,
    language: Option<&str>,
    template: Option<&str>,
) -> String {
    let number = (index + 1).to_string();
    let name = if alias.trim().is_empty() {
        DEFAULT_LABEL.replace("{n}", &number)
    } else {
        alias.to_string()
    };

    if let Some(template) = template.filter(|t| !t.is_empty()) {
        return fill_template(template, &number, &name);
    }

    // Exact code match: `zh-CN` is not `zh`
    let phrase = language
        .and_then(|lang| {
            LOCALIZED_LABELS
                .iter()
                .find(|(key, _)| *key == lang)
                .map(|(_, phrase)| *phrase)
        })
        .unwrap_or(DEFAULT_LABEL);

    phrase.replace("{n}", &number)
}

/// Substitute `{n}` and `{name}` in one left-to-right pass so that braces
/// inside the alias are never re-expanded.
fn fill_template(template: &str, number: &str, name: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{n}") {
            out.push_str(number);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{name}") {
            out.push_str(name);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
