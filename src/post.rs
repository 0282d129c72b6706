//! Post-upload category cleanup.
//!
//! Uploaded files start out over-categorised: the maintenance categories and
//! any parent of a more specific category can be dropped once the batch is
//! on the wiki.

use crate::api::{ApiError, WikiClient};
use thiserror::Error;
use tracing::{debug, info};

const FILE_NAMESPACE: u32 = 6;

/// Errors from post-upload processing.
#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Remove a parent category from files that are also in one of its
/// subcategories. Returns the number of edited pages.
pub async fn trim_parent_category(
    client: &mut WikiClient,
    category: &str,
    summary: Option<&str>,
) -> Result<usize, PostError> {
    let summary =
        summary.unwrap_or("Removing parent category when file already in subcategory");
    let category = crate::api::with_prefix(category, "Category:");

    let subcats = client.category_members(&category, None, "subcat").await?;
    if subcats.is_empty() {
        info!("{} has no subcategories, nothing to trim", category);
        return Ok(0);
    }
    let files = client
        .category_members(&category, Some(FILE_NAMESPACE), "file")
        .await?;

    let mut edited = 0;
    for file in &files {
        let categories = client.page_categories(file).await?;
        if !categories.iter().any(|cat| subcats.contains(cat)) {
            continue;
        }
        if remove_category(client, file, &category, summary).await? {
            edited += 1;
        }
    }
    info!("Removed {} from {} of {} files", category, edited, files.len());
    Ok(edited)
}

/// Remove one category from every file in another category, optionally
/// limited to filenames containing a substring. Returns the number of
/// edited pages.
pub async fn trim_second_category(
    client: &mut WikiClient,
    start_category: &str,
    del_category: &str,
    in_filename: Option<&str>,
    summary: Option<&str>,
) -> Result<usize, PostError> {
    let start_category = crate::api::with_prefix(start_category, "Category:");
    let del_category = crate::api::with_prefix(del_category, "Category:");
    let default_summary = format!(
        "Removing {} for file already in {}",
        del_category, start_category
    );
    let summary = summary.unwrap_or(&default_summary);

    let files = client
        .category_members(&start_category, Some(FILE_NAMESPACE), "file")
        .await?;

    let mut edited = 0;
    for file in &files {
        if let Some(fragment) = in_filename {
            if !file.contains(fragment) {
                continue;
            }
        }
        if remove_category(client, file, &del_category, summary).await? {
            edited += 1;
        }
    }
    info!(
        "Removed {} from {} of {} files",
        del_category,
        edited,
        files.len()
    );
    Ok(edited)
}

/// Strip one category link from a page, keeping the rest of the text as is.
async fn remove_category(
    client: &mut WikiClient,
    title: &str,
    category: &str,
    summary: &str,
) -> Result<bool, PostError> {
    let text = match client.get_wikitext(title).await? {
        Some(text) => text,
        None => return Ok(false),
    };
    let trimmed = match strip_category_link(&text, category) {
        Some(trimmed) => trimmed,
        None => {
            debug!("{} does not link {}", title, category);
            return Ok(false);
        }
    };
    client.edit(title, &trimmed, summary).await?;
    Ok(true)
}

/// Remove a `[[Category:X]]` link from wikitext, sortkey tolerated.
///
/// Returns `None` when the text does not carry the link. A link on a line of
/// its own is removed including the line break.
pub fn strip_category_link(text: &str, category: &str) -> Option<String> {
    let name = category.strip_prefix("Category:").unwrap_or(category);
    let lower = text.to_lowercase();
    let needle = format!("[[category:{}", name.to_lowercase());

    let mut from = 0;
    while let Some(found) = lower[from..].find(&needle) {
        let start = from + found;
        let end = match text[start..].find("]]") {
            Some(pos) => start + pos + 2,
            None => return None,
        };
        from = end;

        // a prefix match may still be a longer name or carry a sortkey
        let inner = &text[start + 2..end - 2];
        let link_name = inner
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(inner)
            .split('|')
            .next()
            .unwrap_or_default()
            .trim();
        if !link_name.eq_ignore_ascii_case(name) {
            continue;
        }

        let mut result = String::with_capacity(text.len());
        result.push_str(&text[..start]);
        let mut rest = &text[end..];
        let line_start = text[..start].ends_with('\n') || start == 0;
        if line_start && rest.starts_with('\n') {
            rest = &rest[1..];
        }
        result.push_str(rest);
        return Some(result);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_link_removed_with_line() {
        let text = "Some text\n[[Category:Ships]]\n[[Category:Museums]]\n";
        let trimmed = strip_category_link(text, "Category:Ships").unwrap();
        assert_eq!(trimmed, "Some text\n[[Category:Museums]]\n");
    }

    #[test]
    fn sortkey_is_tolerated() {
        let text = "Text\n[[Category:Ships|sortkey]]\n";
        let trimmed = strip_category_link(text, "Ships").unwrap();
        assert_eq!(trimmed, "Text\n");
    }

    #[test]
    fn matching_is_case_insensitive_on_the_prefix() {
        let text = "Text\n[[category:Ships]]\n";
        assert!(strip_category_link(text, "Ships").is_some());
    }

    #[test]
    fn longer_category_names_are_not_matched() {
        let text = "Text\n[[Category:Ships of Sweden]]\n";
        assert!(strip_category_link(text, "Ships").is_none());
    }

    #[test]
    fn exact_link_found_behind_a_longer_prefix_match() {
        let text = "Text\n[[Category:Ships of Sweden]]\n[[Category:Ships]]\n";
        let trimmed = strip_category_link(text, "Ships").unwrap();
        assert_eq!(trimmed, "Text\n[[Category:Ships of Sweden]]\n");
    }

    #[test]
    fn missing_link_yields_none() {
        assert!(strip_category_link("Just text", "Ships").is_none());
    }
}
