// src/utils/html.rs

/// Whitelist-sanitizes admin-entered question content.
///
/// Safe inline markup (<b>, <i>, <p>) survives; <script>, <iframe> and event
/// handler attributes are stripped along with their content. The web client
/// renders question text as HTML, so this is the guard against stored XSS
/// from a compromised admin account.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
