//! Pulling JSON out of free-form model text, and keeping untrusted text out
//! of prompts.

/// Extract and validate JSON from text that might contain markdown code blocks.
///
/// Uses brace-depth tracking that respects string escaping, then validates
/// with serde_json before returning.
pub fn extract_json(text: &str) -> Option<String> {
    if let Some(json) = try_markdown_block(text, "```json") {
        return Some(json);
    }

    if let Some(json) = try_markdown_block(text, "```") {
        return Some(json);
    }

    try_raw_json_object(text)
}

fn try_markdown_block(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)?;
    let after_marker = start + marker.len();
    // Skip the rest of the fence line (language tag)
    let json_start = text[after_marker..]
        .find('\n')
        .map(|n| after_marker + n + 1)
        .unwrap_or(after_marker);
    let end = text[json_start..].find("```")?;
    let candidate = text[json_start..json_start + end].trim();

    serde_json::from_str::<serde_json::Value>(candidate).ok()?;
    Some(candidate.to_string())
}

/// Extract a JSON object from raw text using brace-depth tracking.
fn try_raw_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if ch == '{' {
            depth += 1;
        } else if ch == '}' {
            depth -= 1;
            if depth == 0 {
                let candidate = &text[start..start + i + 1];
                if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                    return Some(candidate.to_string());
                }
                break;
            }
        }
    }
    None
}

/// Strip control characters, fences and pseudo-tags from user supplied match
/// text before it is placed inside a prompt.
pub fn sanitize_user_text(text: &str, max_chars: usize) -> String {
    let sanitized: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == ' ')
        .take(max_chars)
        .collect();

    sanitized
        .replace("```", "")
        .replace("<SYSTEM", "")
        .replace("</SYSTEM", "")
        .replace("<USER_INPUT", "")
        .replace("</USER_INPUT", "")
}

/// Truncate a string to at most `max_len` bytes on a char boundary.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let boundary = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= max_len)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}...", &s[..boundary])
}
