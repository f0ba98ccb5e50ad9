use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Parse an LM response into a typed record.
///
/// This is the trust boundary for string-typed LM output. The pipeline is
/// fail-closed with exactly one recovery step:
/// 1. unwrap a markdown code fence if the whole response is wrapped in one;
/// 2. deserialize the remainder directly;
/// 3. on failure, extract the outermost balanced JSON value from the
///    surrounding prose and deserialize that;
/// 4. otherwise `Error::Parse`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let candidate = without_code_fence(raw);
    if candidate.is_empty() {
        return Err(Error::Parse("empty response".to_string()));
    }

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let Some(recovered) = extract_json_value(candidate) else {
                return Err(Error::Parse(format!("no JSON value found: {first_err}")));
            };
            serde_json::from_str(recovered)
                .map_err(|e| Error::Parse(format!("recovered JSON did not match schema: {e}")))
        }
    }
}

/// Follow-up prompt sent after a malformed response: names the parse error
/// and restates the required shape by example.
pub fn correction_prompt(example_json: &str, parse_error: &str) -> String {
    format!(
        "The response you just produced was not valid JSON ({parse_error}).\n\
         Reply again with nothing but a single JSON value of this exact shape:\n\
         {example_json}\n\
         No markdown fences, no commentary before or after."
    )
}

/// Unwrap a response the model fenced as a code block. The opening fence may
/// carry a language tag on its own line; an unterminated fence keeps the
/// rest of the text. Unfenced input is returned trimmed.
fn without_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some((_tag, body)) = after_open.split_once('\n') else {
        return "";
    };
    let body = body.trim_end();
    match body.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => body.trim_start(),
    }
}

/// Locate the outermost balanced `{...}` or `[...]` in the text, skipping
/// brackets inside JSON string literals.
pub fn extract_json_value(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
