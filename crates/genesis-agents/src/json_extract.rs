//! Forgiving extraction of a single JSON object from free-form LLM text
//! (spec.md §4.6 step 4): accepts a fenced ```json block, a bare fenced
//! block, or the first balanced `{...}` substring.

/// Extract the first JSON object found in `text`, trying each strategy in
/// order and returning the first one that parses.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    for candidate in candidates(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate.trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

fn candidates(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(fenced) = fenced_block(text, "```json") {
        out.push(fenced);
    }
    if let Some(fenced) = fenced_block(text, "```") {
        out.push(fenced);
    }
    if let Some(balanced) = first_balanced_braces(text) {
        out.push(balanced);
    }
    out
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn first_balanced_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_a_json_fenced_block() {
        let text = "here is the plan:\n```json\n{\"a\": 1}\n```\nthanks";
        let value = extract_json_object(text).expect("value");
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extracts_from_a_bare_fenced_block() {
        let text = "```\n{\"a\": 2}\n```";
        let value = extract_json_object(text).expect("value");
        assert_eq!(value["a"], 2);
    }

    #[test]
    fn extracts_the_first_balanced_object_with_no_fences() {
        let text = "sure, here you go: {\"a\": 3, \"nested\": {\"b\": 1}} -- hope that helps";
        let value = extract_json_object(text).expect("value");
        assert_eq!(value["a"], 3);
        assert_eq!(value["nested"]["b"], 1);
    }

    #[test]
    fn returns_none_for_text_with_no_object() {
        assert!(extract_json_object("no json here at all").is_none());
    }
}
