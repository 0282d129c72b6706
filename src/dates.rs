//! Normalization of ad-hoc (largely Swedish) date strings.
//!
//! Institutions deliver dates as anything from clean ISO strings to
//! "troligen ca 1920-talets början". `std_date` maps these onto either an
//! ISO date or the `{{other date|...}}` wikitext template.

/// Date values equivalent to "no date given".
const BAD_DATES: &[&str] = &["n.d", "odaterad"];

/// Suffix fragments and their `{{other date}}` keywords.
///
/// Longest fragments first so that e.g. "cirka" wins over "ca" over "c" and
/// "slutet" over "slut".
const ENDINGS: &[(&str, &str)] = &[
    ("f\u{00f6}rsta fj\u{00e4}rdedel", "1quarter"),
    ("andra fj\u{00e4}rdedel", "2quarter"),
    ("tredje fj\u{00e4}rdedel", "3quarter"),
    ("fj\u{00e4}rde fj\u{00e4}rdedel", "4quarter"),
    ("sista fj\u{00e4}rdedel", "4quarter"),
    ("f\u{00f6}rsta h\u{00e4}lft", "1half"),
    ("andra h\u{00e4}lft", "2half"),
    ("b\u{00f6}rjan", "early"),
    ("slutet", "end"),
    ("slut", "end"),
    ("mitt", "mid"),
    ("cirka", "ca"),
    ("f\u{00f6}re", "<"),
    ("efter", ">"),
    ("(?)", "?"),
    ("ca", "ca"),
    ("?", "?"),
    ("c", "ca"),
    ("-", ">"),
];

/// Prefix fragments and their `{{other date}}` keywords, longest first.
const STARTS: &[(&str, &str)] = &[
    ("sekelskiftet", "turn of the century"),
    ("sommaren", "summer"),
    ("tidigt", "early"),
    ("v\u{00e5}ren", "spring"),
    ("vintern", "winter"),
    ("h\u{00f6}sten", "fall"),
    ("br av", "early"),
    ("sl av", "late"),
    ("sent", "late"),
    ("tid ", "early"),
    ("f\u{00f6}re", "<"),
    ("efter", ">"),
    ("ca", "ca"),
    ("-", "<"),
];

/// Decade/century suffixes ("1920-tal", "1800-talets").
const TAL_ENDINGS: &[&str] = &["-talets", "-talet", "-tal", " talets"];

/// Uncertainty markers rendered as `{{Probably}}`.
const MODALITY_ENDINGS: &[&str] = &["troligen", "sannolikt"];

fn strip_edges(date: &str) -> &str {
    date.trim_matches(|c: char| c == '.' || c == ' ' || c == '\u{00a0}')
}

/// Standardise a single date (not a range) to ISO form or an
/// `{{other date|...}}` template.
///
/// Ranges must be separated before calling this since YYYY-MM and YYYY-YY
/// are otherwise indistinguishable.
///
/// Returns `Some("")` for recognised no-date values and `None` when the
/// string cannot be interpreted.
pub fn std_date(date: &str) -> Option<String> {
    let date = strip_edges(date);
    if date.is_empty() || BAD_DATES.contains(&date.to_lowercase().as_str()) {
        return Some(String::new());
    }
    let date = date.replace(" - ", "-");
    let lower = date.to_lowercase();

    for &(fragment, keyword) in STARTS {
        if lower.starts_with(fragment) {
            return match std_date(&date[fragment.len()..]) {
                Some(inner) if !inner.is_empty() => {
                    Some(format!("{{{{other date|{}|{}}}}}", keyword, inner))
                }
                _ => None,
            };
        }
    }

    for &(fragment, keyword) in ENDINGS {
        if lower.ends_with(fragment) {
            return match std_date(&date[..date.len() - fragment.len()]) {
                Some(inner) if !inner.is_empty() => {
                    Some(format!("{{{{other date|{}|{}}}}}", keyword, inner))
                }
                _ => None,
            };
        }
    }

    for &fragment in MODALITY_ENDINGS {
        if lower.ends_with(fragment) {
            let head = date[..date.len() - fragment.len()]
                .trim_matches(|c: char| c == '.' || c == ',' || c == ' ' || c == '\u{00a0}');
            return match std_date(head) {
                Some(inner) if !inner.is_empty() => Some(format!("{} {{{{Probably}}}}", inner)),
                _ => None,
            };
        }
    }

    for &fragment in TAL_ENDINGS {
        if lower.ends_with(fragment) {
            let head = strip_edges(&date[..date.len() - fragment.len()]);
            if head.ends_with("00") {
                // "1900-talet" is a century, not a decade
                return if head.len() == 4 {
                    head[..2]
                        .parse::<u32>()
                        .ok()
                        .map(|c| format!("{{{{other date|century|{}}}}}", c + 1))
                } else {
                    None
                };
            }
            return match std_date(head) {
                Some(inner) if !inner.is_empty() => {
                    Some(format!("{{{{other date|decade|{}}}}}", inner))
                }
                _ => None,
            };
        }
    }

    iso_date(&date)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn parse_component(s: &str, max_len: usize) -> Option<u32> {
    let head: String = s.chars().take(max_len).collect();
    if all_digits(&head) {
        head.parse().ok()
    } else {
        None
    }
}

/// Interpret a string as an ISO date (`YYYY[-MM[-DD]]`), if possible.
///
/// Timestamps such as `2014-07-11T08:14:46Z` are truncated to the date part.
pub fn iso_date(date: &str) -> Option<String> {
    let head: String = date.chars().take("YYYY-MM-DD".len()).collect();
    let parts: Vec<&str> = head.split('-').collect();
    match parts.as_slice() {
        [y, m, d] => {
            if all_digits(y) && all_digits(m) && all_digits(d) {
                let month = parse_component(m, 2)?;
                let day = parse_component(d, 2)?;
                if (1..=12).contains(&month) && (1..=31).contains(&day) {
                    return Some(format!("{}-{}-{}", y, m, d));
                }
            }
            None
        }
        [y, m] => {
            let month = parse_component(m, 2)?;
            if all_digits(y) && (1..=12).contains(&month) {
                Some(format!("{}-{}", y, m))
            } else {
                None
            }
        }
        [y] => {
            let year: String = y.chars().take(4).collect();
            if all_digits(&year) {
                Some(y.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_date_empty_and_blacklist() {
        assert_eq!(std_date(""), Some(String::new()));
        assert_eq!(std_date(" . "), Some(String::new()));
        assert_eq!(std_date("odaterad"), Some(String::new()));
        assert_eq!(std_date("N.D"), Some(String::new()));
    }

    #[test]
    fn std_date_plain_iso() {
        assert_eq!(std_date("1921-09-17"), Some("1921-09-17".to_string()));
        assert_eq!(std_date("1921-09"), Some("1921-09".to_string()));
        assert_eq!(std_date("1921"), Some("1921".to_string()));
    }

    #[test]
    fn std_date_timestamp_truncates() {
        assert_eq!(
            std_date("2014-07-11T08:14:46Z"),
            Some("2014-07-11".to_string())
        );
    }

    #[test]
    fn std_date_uncertain_suffix() {
        assert_eq!(
            std_date("1921?"),
            Some("{{other date|?|1921}}".to_string())
        );
        assert_eq!(
            std_date("1921 (?)"),
            Some("{{other date|?|1921}}".to_string())
        );
    }

    #[test]
    fn std_date_circa() {
        assert_eq!(
            std_date("ca 1921"),
            Some("{{other date|ca|1921}}".to_string())
        );
        assert_eq!(
            std_date("1921 cirka"),
            Some("{{other date|ca|1921}}".to_string())
        );
    }

    #[test]
    fn std_date_halves_and_quarters() {
        assert_eq!(
            std_date("1800 andra h\u{00e4}lft"),
            Some("{{other date|2half|1800}}".to_string())
        );
        assert_eq!(
            std_date("1800 f\u{00f6}rsta fj\u{00e4}rdedel"),
            Some("{{other date|1quarter|1800}}".to_string())
        );
    }

    #[test]
    fn std_date_seasons_prefix() {
        assert_eq!(
            std_date("sommaren 1921"),
            Some("{{other date|summer|1921}}".to_string())
        );
    }

    #[test]
    fn std_date_before_and_after() {
        assert_eq!(
            std_date("f\u{00f6}re 1921"),
            Some("{{other date|<|1921}}".to_string())
        );
        assert_eq!(
            std_date("1921-"),
            Some("{{other date|>|1921}}".to_string())
        );
        assert_eq!(
            std_date("-1921"),
            Some("{{other date|<|1921}}".to_string())
        );
    }

    #[test]
    fn std_date_decade() {
        assert_eq!(
            std_date("1920-tal"),
            Some("{{other date|decade|1920}}".to_string())
        );
        assert_eq!(
            std_date("1920-talets"),
            Some("{{other date|decade|1920}}".to_string())
        );
    }

    #[test]
    fn std_date_century() {
        assert_eq!(
            std_date("1900-talet"),
            Some("{{other date|century|20}}".to_string())
        );
    }

    #[test]
    fn std_date_nested_prefix_suffix() {
        assert_eq!(
            std_date("tidigt 1920-tal"),
            Some("{{other date|early|{{other date|decade|1920}}}}".to_string())
        );
    }

    #[test]
    fn std_date_modality() {
        assert_eq!(
            std_date("1921 troligen"),
            Some("1921 {{Probably}}".to_string())
        );
    }

    #[test]
    fn std_date_garbage_is_none() {
        assert_eq!(std_date("not a date"), None);
        assert_eq!(std_date("ca gurka"), None);
    }

    #[test]
    fn iso_date_rejects_bad_month_and_day() {
        assert_eq!(iso_date("1921-13-01"), None);
        assert_eq!(iso_date("1921-12-32"), None);
        assert_eq!(iso_date("19x1"), None);
    }
}
