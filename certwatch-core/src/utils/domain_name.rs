//! Domain name normalization.
//!
//! Canonicalizes user-supplied host strings before storage or lookup:
//! trim, lowercase, strip scheme, strip path, strip port. Never fails;
//! garbage input yields a best-effort string validated by the caller.

/// Normalizes a raw host string to its canonical form.
///
/// `"HTTPS://Example.com:443/path"` becomes `"example.com"`.
/// The function is idempotent.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut name = raw.trim().to_lowercase();

    if let Some(stripped) = name.strip_prefix("https://") {
        name = stripped.to_string();
    } else if let Some(stripped) = name.strip_prefix("http://") {
        name = stripped.to_string();
    }

    if let Some(idx) = name.find('/') {
        name.truncate(idx);
    }

    if let Some(idx) = name.find(':') {
        name.truncate(idx);
    }

    name
}
