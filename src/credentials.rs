//! Credential resolution from an environment-supplied JSON payload.
//!
//! The payload may be stored verbatim or as a quoted string literal (common
//! when the JSON is pasted into a `.env` file or a CI secret). Anything that
//! does not end up as a JSON object is skipped and the client falls back to
//! ambient credential discovery.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::ClientOption;

/// Environment variable carrying an optional service account JSON document
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON";

/// Turn a raw payload into at most one credentials option.
///
/// An empty or unusable payload yields `None`; this is never an error.
pub fn resolve_credentials(raw: &str) -> Option<ClientOption> {
    if raw.is_empty() {
        return None;
    }

    if is_json_object(raw) {
        return Some(ClientOption::CredentialsJson(raw.as_bytes().to_vec()));
    }

    match unquote(raw) {
        Some(unquoted) if is_json_object(&unquoted) => {
            debug!("Credential payload was quoted, using unquoted form");
            Some(ClientOption::CredentialsJson(unquoted.into_bytes()))
        }
        _ => {
            warn!(
                "Ignoring credential payload ({} bytes): not a JSON object, \
                 falling back to default credential discovery",
                raw.len()
            );
            None
        }
    }
}

/// Read [`CREDENTIALS_ENV`] and resolve it
pub fn from_env() -> Option<ClientOption> {
    let value = std::env::var(CREDENTIALS_ENV).unwrap_or_default();
    resolve_credentials(&value)
}

/// Append the credentials found in the environment (if any) after the
/// caller-supplied options
pub fn with_env_credentials(options: Vec<ClientOption>) -> Vec<ClientOption> {
    let value = std::env::var(CREDENTIALS_ENV).unwrap_or_default();
    append_credentials(options, &value)
}

/// Resolve `raw` and append the result, if any, after `options`
pub fn append_credentials(mut options: Vec<ClientOption>, raw: &str) -> Vec<ClientOption> {
    if let Some(option) = resolve_credentials(raw) {
        options.push(option);
    }
    options
}

fn is_json_object(s: &str) -> bool {
    serde_json::from_str::<Map<String, Value>>(s).is_ok()
}

/// Strip one level of string-literal quoting.
///
/// Two forms are accepted:
///
/// - A double-quoted literal with C-style escapes: `\a \b \f \n \r \t \v
///   \\ \"`, `\xNN`, three-digit octal `\NNN`, `\uXXXX` and `\UXXXXXXXX`.
///   Unknown escapes (`\/`, `\'`), a raw newline or an unescaped `"` make the
///   whole literal invalid. Byte escapes must add up to valid UTF-8.
/// - A back-quoted raw literal that contains no backquote. Carriage returns
///   inside it are dropped.
///
/// Returns `None` for anything else.
pub fn unquote(s: &str) -> Option<String> {
    if s.len() < 2 {
        return None;
    }

    if s.starts_with('"') && s.ends_with('"') {
        return unescape(&s[1..s.len() - 1]);
    }

    if s.starts_with('`') && s.ends_with('`') {
        let inner = &s[1..s.len() - 1];
        if inner.contains('`') {
            return None;
        }
        return Some(inner.replace('\r', ""));
    }

    None
}

fn unescape(inner: &str) -> Option<String> {
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\n' => return None,
            '\\' => {}
            c => {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                continue;
            }
        }

        let byte = match chars.next()? {
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0c,
            'n' => b'\n',
            'r' => b'\r',
            't' => b'\t',
            'v' => 0x0b,
            '\\' => b'\\',
            '"' => b'"',
            'x' => u8::try_from(hex_digits(&mut chars, 2)?).ok()?,
            escape @ ('u' | 'U') => {
                let width = if escape == 'u' { 4 } else { 8 };
                let c = char::from_u32(hex_digits(&mut chars, width)?)?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                continue;
            }
            first @ '0'..='7' => {
                let mut value = first.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        out.push(byte);
    }

    String::from_utf8(out).ok()
}

fn hex_digits(chars: &mut std::str::Chars<'_>, width: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..width {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(option: Option<ClientOption>) -> Option<String> {
        match option {
            Some(ClientOption::CredentialsJson(bytes)) => Some(String::from_utf8(bytes).unwrap()),
            Some(other) => panic!("unexpected option {:?}", other),
            None => None,
        }
    }

    #[test]
    fn test_empty_payload_yields_nothing() {
        assert!(resolve_credentials("").is_none());
    }

    #[test]
    fn test_raw_json_passed_unmodified() {
        let raw = r#"{"type":"service_account"}"#;
        assert_eq!(payload(resolve_credentials(raw)).as_deref(), Some(raw));
    }

    #[test]
    fn test_raw_json_whitespace_preserved() {
        let raw = "{\n  \"type\": \"service_account\",\n  \"project_id\": \"p\"\n}";
        assert_eq!(payload(resolve_credentials(raw)).as_deref(), Some(raw));
    }

    #[test]
    fn test_quoted_json_is_unquoted() {
        let quoted = r#""{\"type\":\"service_account\"}""#;
        assert_eq!(
            payload(resolve_credentials(quoted)).as_deref(),
            Some(r#"{"type":"service_account"}"#)
        );
    }

    #[test]
    fn test_backquoted_json_is_unquoted() {
        let quoted = r#"`{"type":"authorized_user"}`"#;
        assert_eq!(
            payload(resolve_credentials(quoted)).as_deref(),
            Some(r#"{"type":"authorized_user"}"#)
        );
    }

    #[test]
    fn test_quoted_escapes_resolved() {
        let quoted = r#""{\"private_key\":\"-----BEGIN\\nKEY\\n\"}""#;
        assert_eq!(
            payload(resolve_credentials(quoted)).as_deref(),
            Some(r#"{"private_key":"-----BEGIN\nKEY\n"}"#)
        );
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(resolve_credentials("not json at all").is_none());
        assert!(resolve_credentials("{broken").is_none());
    }

    #[test]
    fn test_non_object_json_is_skipped() {
        assert!(resolve_credentials("[1, 2, 3]").is_none());
        assert!(resolve_credentials("42").is_none());
        // Unquotes fine, but to a string rather than an object
        assert!(resolve_credentials(r#""just a string""#).is_none());
    }

    #[test]
    fn test_quoted_garbage_is_skipped() {
        assert!(resolve_credentials(r#""{not json}""#).is_none());
        assert!(resolve_credentials(r#""unterminated"#).is_none());
    }

    #[test]
    fn test_unquote_forms() {
        assert_eq!(unquote(r#""a\tb""#).as_deref(), Some("a\tb"));
        assert_eq!(unquote(r#""é""#).as_deref(), Some("é"));
        assert_eq!(unquote("`raw \\n`").as_deref(), Some("raw \\n"));
        assert_eq!(unquote("``").as_deref(), Some(""));
        assert!(unquote("'x'").is_none());
        assert!(unquote("\"").is_none());
        assert!(unquote("`a`b`").is_none());
        assert!(unquote("plain").is_none());
    }

    #[test]
    fn test_unquote_c_style_escapes() {
        assert_eq!(unquote(r#""\x41\101\u00e9""#).as_deref(), Some("AAé"));
        assert_eq!(unquote(r#""\a\b\f\v""#).as_deref(), Some("\x07\x08\x0c\x0b"));
        assert_eq!(unquote(r#""\U0001F600""#).as_deref(), Some("\u{1F600}"));
        // Byte escapes forming a multi-byte character
        assert_eq!(unquote(r#""\xc3\xa9""#).as_deref(), Some("é"));
        // A raw tab is fine, a raw newline is not
        assert_eq!(unquote("\"a\tb\"").as_deref(), Some("a\tb"));
        assert!(unquote("\"a\nb\"").is_none());
    }

    #[test]
    fn test_unquote_rejects_invalid_escapes() {
        assert!(unquote(r#""\/""#).is_none());
        assert!(unquote(r#""\'""#).is_none());
        assert!(unquote(r#""\x4""#).is_none());
        assert!(unquote(r#""\400""#).is_none());
        assert!(unquote(r#""\ud800""#).is_none());
        assert!(unquote(r#""\U00110000""#).is_none());
        assert!(unquote(r#""\xff""#).is_none());
        assert!(unquote(r#""a"b""#).is_none());
        assert!(unquote(r#""trailing\""#).is_none());
    }

    #[test]
    fn test_backquoted_carriage_returns_dropped() {
        assert_eq!(unquote("`{\r\n}`").as_deref(), Some("{\n}"));
        assert_eq!(
            payload(resolve_credentials("`{\"type\":\r\n\"service_account\"}`")).as_deref(),
            Some("{\"type\":\n\"service_account\"}")
        );
    }

    #[test]
    fn test_quoted_json_with_byte_escapes() {
        let quoted = r#""{\x22type\x22:\042service_account\042}""#;
        assert_eq!(
            payload(resolve_credentials(quoted)).as_deref(),
            Some(r#"{"type":"service_account"}"#)
        );
    }

    #[test]
    fn test_credentials_appended_last() {
        let timeout = ClientOption::Timeout(std::time::Duration::from_secs(5));
        let options = append_credentials(vec![timeout.clone()], r#"{"type":"service_account"}"#);

        assert_eq!(
            options,
            vec![
                timeout.clone(),
                ClientOption::CredentialsJson(br#"{"type":"service_account"}"#.to_vec()),
            ]
        );
        assert_eq!(append_credentials(vec![timeout.clone()], ""), vec![timeout.clone()]);
        assert_eq!(append_credentials(vec![timeout.clone()], "junk"), vec![timeout]);
    }
}
