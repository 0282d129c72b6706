//! String touch-up helpers for descriptions and target filenames.

/// Shorten strings above this length when a sensible cut point exists.
pub const GOOD_LENGTH: usize = 100;
/// Hard cut-off; nothing longer survives `shorten_string`.
pub const MAX_LENGTH: usize = 128;

/// Turn a single "Last, First" name into "First Last".
///
/// Anything without exactly one comma is returned unchanged.
pub fn flip_name(name: &str) -> String {
    let parts: Vec<&str> = name.split(',').collect();
    if parts.len() == 2 {
        format!("{} {}", parts[1].trim(), parts[0].trim())
    } else {
        name.to_string()
    }
}

/// Apply `flip_name` to every entry in a list.
pub fn flip_names(names: &[String]) -> Vec<String> {
    names.iter().map(|n| flip_name(n)).collect()
}

/// Remove characters which are forbidden or undesired in filenames.
///
/// ":" is complicated as it has several interpretations: possessive case and
/// sentence break are rewritten first, any remaining colon becomes a dash.
pub fn clean_string(text: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("\\", "-"),
        ("/", "-"),
        ("|", "-"),
        ("#", "-"),
        ("[", "("),
        ("]", ")"),
        ("{", "("),
        ("}", ")"),
        (":s", "s"),
        (": ", ", "),
        ("\u{00a0}", " "),
        ("\u{008f}", " "),
        ("\t", " "),
        ("\n", " "),
        ("e\u{00b4}", "\u{00e9}"),
        ("\u{201d}", " "),
        ("\"", " "),
        ("\u{201c}", " "),
    ];

    let mut text = text.to_string();
    for (from, to) in REPLACEMENTS {
        text = text.replace(from, to);
    }
    text = text.replace(':', "-");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    text.trim().to_string()
}

/// Strip one matching surrounding bracket/quote pair and trailing
/// punctuation, then upper-case the first character.
pub fn touchup(text: &str) -> String {
    const BRACKETS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}'), ('"', '"')];

    let mut text = text.to_string();
    for &(open, close) in BRACKETS {
        if text.starts_with(open) && text.ends_with(close) {
            // Only strip when the opener appears once, so that
            // "(a) and (b)" keeps its brackets. The slice excludes the last
            // char to cope with the quote pair where open == close.
            let all_but_last: String = {
                let mut cs: Vec<char> = text.chars().collect();
                cs.pop();
                cs.into_iter().collect()
            };
            if all_but_last.matches(open).count() == 1 {
                let chars: Vec<char> = text.chars().collect();
                text = chars[1..chars.len() - 1].iter().collect();
            }
        }
    }

    let text = text.trim_matches(|c: char| c == ' ' || c == '.' || c == ',' || c == ';');
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Attempt a sensible shortening of an over-long string.
///
/// Prefers cutting at a `<!>` marker, then at a trailing bracket, then at
/// `.`, ` - `, `;` or `,` boundaries. Falls back to a hard cut with `...`
/// when nothing works and the string exceeds `MAX_LENGTH`.
pub fn shorten_string(text: &str) -> String {
    const BAD_TRAIL: &[char] = &['-', '.', ',', ' '];

    let text = match text.find("<!>") {
        Some(pos) => &text[..pos],
        None => text,
    };
    if text.chars().count() < GOOD_LENGTH {
        return text.to_string();
    }

    if text.ends_with(')') {
        if let Some(pos) = text.rfind('(') {
            if pos > 0 {
                return shorten_string(text[..pos].trim_matches(BAD_TRAIL));
            }
        }
    }

    let pos = text
        .rfind('.')
        .or_else(|| text.rfind(" - "))
        .or_else(|| text.rfind(';'))
        .or_else(|| text.rfind(','));
    match pos {
        Some(pos) => shorten_string(text[..pos].trim_matches(BAD_TRAIL)),
        None => {
            if text.chars().count() > MAX_LENGTH {
                let cut: String = text.chars().take(MAX_LENGTH - 3).collect();
                format!("{}...", cut)
            } else {
                text.to_string()
            }
        }
    }
}

/// Compose a repository filename from a description, the source institution
/// and the institution's item id: `"<description> - <institution> - <id>"`.
pub fn format_filename(description: &str, institution: &str, idno: &str) -> String {
    let descr = shorten_string(&touchup(&clean_string(description)));
    format!(
        "{} - {} - {}",
        descr,
        clean_string(institution),
        clean_string(idno)
    )
}

/// Wrap a string in wikitext italics.
pub fn italicize(text: &str) -> String {
    format!("''{}''", text)
}
