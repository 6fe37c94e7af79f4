//! Tolerant JSON extraction from model output.
//!
//! Models wrap JSON in code fences, lead with prose, or trail with
//! commentary. The extractor accepts all of that as long as one balanced
//! top-level `{…}` object can be isolated.

/// Isolate the first balanced top-level JSON object in `text`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let candidate = strip_fences(text);

    let bytes = candidate.as_bytes();
    let start = candidate.find('{')?;
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
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// When the text contains a fenced block, prefer its contents.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(open) = trimmed.find(fence) {
            let body_start = open + fence.len();
            if let Some(close_rel) = trimmed[body_start..].find("```") {
                let inner = trimmed[body_start..body_start + close_rel].trim();
                if inner.contains('{') {
                    return inner;
                }
            }
        }
    }
    trimmed
}
