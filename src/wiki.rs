use regex::Regex;

/// Derive a CamelCase page name from a free-form title.
///
/// Splits on every non-alphanumeric character, capitalizes the first letter
/// of each word, and preserves the remaining characters (so acronyms and
/// digits survive). The derivation is deterministic and stable.
pub fn camel_case(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Normalized form of a page name: lowercase, non-alphanumerics stripped.
/// Idempotent.
pub fn normalize_page_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A wiki link token: `[target]` or `[display|target]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub display: String,
    pub target: String,
}

/// Extract all `[...]` link tokens from page content, including directive
/// tokens. Callers that only care about page references filter those out.
pub fn parse_links(content: &str) -> Vec<WikiLink> {
    let re = Regex::new(r"\[([^\[\]\n]+)\]").unwrap();
    re.captures_iter(content)
        .map(|cap| {
            let inner = cap[1].trim();
            match inner.split_once('|') {
                Some((display, target)) => WikiLink {
                    display: display.trim().to_string(),
                    target: target.trim().to_string(),
                },
                None => WikiLink {
                    display: inner.to_string(),
                    target: inner.to_string(),
                },
            }
        })
        .collect()
}

/// Convert stray Markdown constructs in LM output into the target wiki
/// syntax: `#` headings to `!!!`/`!!`/`!`, `**bold**` to `__bold__`, inline
/// `*italic*` to `''italic''`, `-` bullets to `*`, `[[x]]` to `[x]`.
pub fn normalize_markup(content: &str) -> String {
    let bold_re = Regex::new(r"\*\*([^*\n]+)\*\*").unwrap();
    let italic_re = Regex::new(r"\*([^*\s][^*\n]*?)\*").unwrap();

    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.replace("[[", "[").replace("]]", "]");

        let converted = if let Some(rest) = line.strip_prefix("### ") {
            format!("!{rest}")
        } else if let Some(rest) = line.strip_prefix("## ") {
            format!("!!{rest}")
        } else if let Some(rest) = line.strip_prefix("# ") {
            format!("!!!{rest}")
        } else if let Some(rest) = line.strip_prefix("- ") {
            format!("* {rest}")
        } else {
            line.to_string()
        };

        let converted = bold_re.replace_all(&converted, "__${1}__").to_string();

        // Inline italics only — a leading `*` is a list bullet, not emphasis.
        let converted = if let Some(rest) = converted.strip_prefix("* ") {
            format!("* {}", italic_re.replace_all(rest, "''${1}''"))
        } else {
            italic_re.replace_all(&converted, "''${1}''").to_string()
        };

        out.push(converted);
    }
    out.join("\n")
}
