//! Conversions between API schema filenames and dotted namespaces.

const EXPERIMENTAL: &str = "experimental";
const DEVTOOLS: &str = "devtools";

/// Namespace for a schema filename stem.
///
/// Path separators and underscores become dots and an `experimental`
/// segment moves to the front, so `devtools/experimental_audits` becomes
/// `experimental.devtools.audits`. Names with empty segments are returned
/// unchanged.
#[must_use]
pub fn namespace_from_filename(name: &str) -> String {
    let segments: Vec<&str> = name.split(['/', '_']).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return name.to_owned();
    }
    let (experimental, rest): (Vec<&str>, Vec<&str>) = segments
        .into_iter()
        .partition(|segment| *segment == EXPERIMENTAL);
    experimental
        .into_iter()
        .chain(rest)
        .collect::<Vec<_>>()
        .join(".")
}

/// Candidate filename stems (no extension) for a namespace, most likely
/// first.
///
/// The `devtools` prefix maps to a directory, the experimental marker to a
/// filename prefix, and camelCase names are also tried in snake case.
#[must_use]
pub fn schema_file_stems(namespace: &str) -> Vec<String> {
    let mut segments: Vec<&str> = namespace.split('.').collect();
    let experimental = segments.first() == Some(&EXPERIMENTAL);
    if experimental {
        segments.remove(0);
    }
    let directory = if segments.len() > 1 && segments.first() == Some(&DEVTOOLS) {
        segments.remove(0);
        Some(DEVTOOLS)
    } else {
        None
    };

    let base = segments.join("_");
    let mut names = vec![base.clone()];
    let snake = camel_to_snake(&base);
    if snake != base {
        names.push(snake);
    }

    names
        .into_iter()
        .map(|name| {
            let file = if experimental {
                format!("{EXPERIMENTAL}_{name}")
            } else {
                name
            };
            directory.map_or_else(|| file.clone(), |dir| format!("{dir}/{file}"))
        })
        .collect()
}

/// `inspectedWindow` → `inspected_window`.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
