/// Convert a title into a URL-safe slug.
///
/// Lowercases ASCII letters, keeps digits and underscores, and collapses every
/// other run of characters into a single `-`. Leading and trailing separators
/// are dropped.
///
/// ```
/// use blog_core::domain::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("  Who was Django Reinhardt?  "), "who-was-django-reinhardt");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug.trim_matches('_').to_string()
}

/// Whether `slug` only contains letters, digits, hyphens and underscores.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("one   more -- post"), "one-more-post");
        assert_eq!(slugify("--Hello, World!--"), "hello-world");
        assert_eq!(slugify("snake_case title"), "snake_case-title");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Grüße 2025"), "gr-e-2025");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world"));
        assert!(is_valid_slug("Hello_World-2"));
        assert!(!is_valid_slug("hello world"));
        assert!(!is_valid_slug("héllo"));
        assert!(!is_valid_slug(""));
    }
}
