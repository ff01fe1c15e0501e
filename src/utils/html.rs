use ammonia;

/// Clean HTML content using the ammonia library.
///
/// This employs a whitelist-based sanitization strategy: it preserves safe tags
/// (like <b>, <p>) while stripping dangerous tags (like <script>, <iframe>)
/// and malicious attributes (like onclick).
///
/// Applied to user-authored rich text that other users' browsers will render:
/// opportunity descriptions, cover letters and quiz descriptions.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
