//! Redirect Targets
//!
//! Validation of WooPay-supplied redirect URLs and construction of the
//! minimum-session redirect.

use url::Url;

use crate::session_data::EncryptedSessionData;

/// Query key WooPay includes in a logged-in redirect session URL
pub const PLATFORM_CHECKOUT_KEY: &str = "platform_checkout_key";

/// Check a redirect URL against the configured WooPay host
///
/// The URL's origin must equal the host's origin and its query must contain
/// `required_param`. Unparseable input is simply invalid.
pub fn validate_redirect_url(redirect_url: &str, woopay_host: &str, required_param: &str) -> bool {
    let (Ok(redirect), Ok(host)) = (Url::parse(redirect_url), Url::parse(woopay_host)) else {
        return false;
    };

    redirect.origin() == host.origin()
        && redirect.query_pairs().any(|(key, _)| key == required_param)
}

/// Redirect URL for shoppers not known to be logged in to WooPay
///
/// Built locally from the minimum session bundle; `None` when the bundle is
/// incomplete.
pub fn minimum_session_url(woopay_host: &Url, data: &EncryptedSessionData) -> Option<String> {
    if !data.is_valid() {
        return None;
    }
    let blog_id = data.blog_id?.to_string();
    let session = data.data.session.as_deref()?;
    let iv = data.data.iv.as_deref()?;
    let hash = data.data.hash.as_deref()?;

    let mut url = woopay_host.join("woopay/").ok()?;
    url.query_pairs_mut()
        .append_pair("checkout_redirect", "1")
        .append_pair("blog_id", &blog_id)
        .append_pair("session", session)
        .append_pair("iv", iv)
        .append_pair("hash", hash);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_redirect_url() {
        let url = "https://woopay.example/?platform_checkout_key=abc";
        assert!(validate_redirect_url(url, "https://woopay.example", PLATFORM_CHECKOUT_KEY));
        assert!(!validate_redirect_url(url, "https://other.example", PLATFORM_CHECKOUT_KEY));
        assert!(!validate_redirect_url(url, "https://woopay.example", "session"));
        assert!(!validate_redirect_url("not a url", "https://woopay.example", PLATFORM_CHECKOUT_KEY));
        assert!(!validate_redirect_url(url, "not a host", PLATFORM_CHECKOUT_KEY));
    }

    #[test]
    fn test_origin_includes_scheme_and_port() {
        let host = "https://woopay.example";
        assert!(!validate_redirect_url(
            "http://woopay.example/?platform_checkout_key=1",
            host,
            PLATFORM_CHECKOUT_KEY
        ));
        assert!(!validate_redirect_url(
            "https://woopay.example:8443/?platform_checkout_key=1",
            host,
            PLATFORM_CHECKOUT_KEY
        ));
        assert!(validate_redirect_url(
            "https://woopay.example/some/path?x=1&platform_checkout_key=",
            "https://woopay.example/",
            PLATFORM_CHECKOUT_KEY
        ));
    }

    #[test]
    fn test_minimum_session_url() {
        let host = Url::parse("https://woopay.example").unwrap();
        let data = EncryptedSessionData::new(12, "se ss", "iv/1", "h+2");

        assert_eq!(
            minimum_session_url(&host, &data).unwrap(),
            "https://woopay.example/woopay/?checkout_redirect=1&blog_id=12&session=se+ss&iv=iv%2F1&hash=h%2B2"
        );
        assert!(minimum_session_url(&host, &EncryptedSessionData::default()).is_none());
    }
}
