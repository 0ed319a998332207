//! Intake validation: email format, website URLs, domain extraction, and
//! slug derivation. A validation failure surfaces synchronously to the
//! intake caller and never creates a customer or job.

use crate::errors::AppError;
use crate::models::IntakeRequest;
use regex::Regex;
use url::Url;

/// Validate email address
///
/// Checks for:
/// - Basic shape (contains @ and ., minimum length)
/// - RFC 5322 simplified format
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex
    // Matches: local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Parse and check a website URL: must be absolute http(s) with a host.
pub fn parse_website(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Validation(format!("Invalid URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "URL '{}' must use http or https",
            raw
        )));
    }

    if url.host_str().is_none() {
        return Err(AppError::Validation(format!("URL '{}' has no host", raw)));
    }

    Ok(url)
}

/// Extract the bare hostname used as the unit of data-provider lookups.
/// A leading `www.` label is stripped.
pub fn domain_of(raw: &str) -> Result<String, AppError> {
    let url = parse_website(raw)?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Validation(format!("URL '{}' has no host", raw)))?;

    let domain = host.strip_prefix("www.").unwrap_or(host);
    Ok(domain.to_ascii_lowercase())
}

/// Derive a URL-safe slug from a company name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // suppress a leading dash

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "customer".to_string()
    } else {
        slug
    }
}

/// Full intake validation: required fields plus well-formed URLs on the
/// website and every competitor.
pub fn validate_intake(request: &IntakeRequest) -> Result<(), AppError> {
    if request.company_name.trim().is_empty() {
        return Err(AppError::Validation(
            "companyName is required".to_string(),
        ));
    }

    if request.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }

    if !is_valid_email(request.email.trim()) {
        return Err(AppError::Validation(format!(
            "email '{}' is not a valid address",
            request.email
        )));
    }

    if request.website.trim().is_empty() {
        return Err(AppError::Validation("website is required".to_string()));
    }

    parse_website(&request.website)?;

    for competitor in &request.competitors {
        parse_website(competitor)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_url_safe() {
        assert_eq!(slugify("Acme Tools"), "acme-tools");
        assert_eq!(slugify("  Müller & Söhne GmbH "), "m-ller-s-hne-gmbh");
        assert_eq!(slugify("!!!"), "customer");
    }

    #[test]
    fn domain_strips_www_and_lowercases() {
        assert_eq!(domain_of("https://WWW.Acme.test/path").unwrap(), "acme.test");
        assert_eq!(domain_of("http://acme.test").unwrap(), "acme.test");
    }

    #[test]
    fn non_http_schemes_rejected() {
        assert!(parse_website("ftp://acme.test").is_err());
        assert!(parse_website("not a url").is_err());
    }
}
