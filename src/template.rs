//! Wikitext template handling: parameter extraction and block rendering.

use std::collections::HashMap;

/// Extract the parameters of every instance of a named template.
///
/// Nested templates and links are kept verbatim inside parameter values.
/// Positional parameters are keyed `"1"`, `"2"`, ... the way MediaWiki
/// numbers them. Keys and values are whitespace-trimmed.
pub fn extract_templates(wikitext: &str, template_name: &str) -> Vec<HashMap<String, String>> {
    let mut result = Vec::new();
    for body in template_bodies(wikitext) {
        let segments = split_top_level(&body, '|');
        let mut segments = segments.into_iter();
        let name = match segments.next() {
            Some(name) => name.trim().to_string(),
            None => continue,
        };
        if name != template_name {
            continue;
        }

        let mut params = HashMap::new();
        let mut position = 0u32;
        for segment in segments {
            match split_once_top_level(&segment, '=') {
                Some((key, value)) => {
                    params.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    position += 1;
                    params.insert(position.to_string(), segment.trim().to_string());
                }
            }
        }
        result.push(params);
    }
    result
}

/// Return the inner text of every balanced `{{ ... }}` block, including
/// nested blocks' outermost occurrence only.
fn template_bodies(wikitext: &str) -> Vec<String> {
    let chars: Vec<char> = wikitext.chars().collect();
    let mut bodies = Vec::new();
    let mut i = 0;
    while i + 1 < chars.len() {
        if chars[i] == '{' && chars[i + 1] == '{' {
            let mut depth = 1;
            let mut j = i + 2;
            while j + 1 < chars.len() + 1 {
                if j + 1 < chars.len() && chars[j] == '{' && chars[j + 1] == '{' {
                    depth += 1;
                    j += 2;
                } else if j + 1 < chars.len() && chars[j] == '}' && chars[j + 1] == '}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    j += 2;
                } else {
                    j += 1;
                }
            }
            if depth == 0 {
                bodies.push(chars[i + 2..j].iter().collect());
                // Nested templates inside this body are still interesting
                // when looking for row templates inside wrappers.
                let inner: String = chars[i + 2..j].iter().collect();
                bodies.extend(template_bodies(&inner));
                i = j + 2;
                continue;
            }
        }
        i += 1;
    }
    bodies
}

/// Split on a separator, ignoring occurrences inside `{{ }}` or `[[ ]]`.
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut brace_depth = 0i32;
    let mut link_depth = 0i32;
    let mut i = 0;
    while i < chars.len() {
        if i + 1 < chars.len() {
            match (chars[i], chars[i + 1]) {
                ('{', '{') => {
                    brace_depth += 1;
                    current.push_str("{{");
                    i += 2;
                    continue;
                }
                ('}', '}') => {
                    brace_depth -= 1;
                    current.push_str("}}");
                    i += 2;
                    continue;
                }
                ('[', '[') => {
                    link_depth += 1;
                    current.push_str("[[");
                    i += 2;
                    continue;
                }
                (']', ']') => {
                    link_depth -= 1;
                    current.push_str("]]");
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        if chars[i] == separator && brace_depth == 0 && link_depth == 0 {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(chars[i]);
        }
        i += 1;
    }
    parts.push(current);
    parts
}

/// Split at the first top-level occurrence of a separator, if any.
fn split_once_top_level(text: &str, separator: char) -> Option<(String, String)> {
    let parts = split_top_level(text, separator);
    if parts.len() < 2 {
        return None;
    }
    let key = parts[0].clone();
    let value = parts[1..].join(&separator.to_string());
    Some((key, value))
}

/// Render a template over several lines, one parameter per line:
///
/// ```text
/// {{Name
/// | key = value
/// }}
/// ```
///
/// Parameter order is preserved.
pub fn render_block_template(name: &str, params: &[(String, String)]) -> String {
    let mut out = format!("{{{{{}", name);
    for (key, value) in params {
        out.push_str(&format!("\n| {} = {}", key, value));
    }
    out.push_str("\n}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn extract_empty() {
        assert!(extract_templates("", "").is_empty());
        assert!(extract_templates("no templates here", "a").is_empty());
    }

    #[test]
    fn extract_single_with_nested() {
        let wikitext = "{{a|A|b=b|c={{c|c=pling}}}}";
        let expected = vec![map(&[("1", "A"), ("b", "b"), ("c", "{{c|c=pling}}")])];
        assert_eq!(extract_templates(wikitext, "a"), expected);
    }

    #[test]
    fn extract_multiple() {
        let wikitext = "{{a|b=b}} {{a|b=b}} {{a|c}}";
        let expected = vec![map(&[("b", "b")]), map(&[("b", "b")]), map(&[("1", "c")])];
        assert_eq!(extract_templates(wikitext, "a"), expected);
    }

    #[test]
    fn extract_finds_nested_instances() {
        let wikitext = "{{wrapper|inner={{a|b=1}}}}";
        let expected = vec![map(&[("b", "1")])];
        assert_eq!(extract_templates(wikitext, "a"), expected);
    }

    #[test]
    fn extract_ignores_pipes_in_links() {
        let wikitext = "{{a|b=[[Page|label]]}}";
        let expected = vec![map(&[("b", "[[Page|label]]")])];
        assert_eq!(extract_templates(wikitext, "a"), expected);
    }

    #[test]
    fn extract_trims_keys_and_values() {
        let wikitext = "{{a| b = some value }}";
        let expected = vec![map(&[("b", "some value")])];
        assert_eq!(extract_templates(wikitext, "a"), expected);
    }

    #[test]
    fn render_block_basic() {
        let params = vec![
            ("name".to_string(), "A".to_string()),
            ("category".to_string(), String::new()),
        ];
        assert_eq!(
            render_block_template("mapping-row", &params),
            "{{mapping-row\n| name = A\n| category = \n}}"
        );
    }

    #[test]
    fn render_block_no_params() {
        assert_eq!(render_block_template("empty", &[]), "{{empty\n}}");
    }
}
