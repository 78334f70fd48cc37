//! OpenID Connect implicit-flow redirect: the authorization URL out, the `id_token` fragment in.

use url::{form_urlencoded, Url};

use crate::error::ZkLoginError;
use crate::nonce::Nonce;

/// Fragment parameter carrying the identity token.
const ID_TOKEN_PARAM: &str = "id_token";

/// Builds the provider authorization URL committing to `nonce`.
///
/// # Errors
/// Returns `ZkLoginError::InvalidInput` if `endpoint` is not an absolute URL.
pub fn build_authorization_url(
    endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    nonce: &Nonce,
) -> Result<Url, ZkLoginError> {
    let mut url = Url::parse(endpoint).map_err(|e| ZkLoginError::InvalidInput {
        attribute: "authorization_endpoint".to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "id_token")
        .append_pair("scope", "openid")
        .append_pair("nonce", nonce.as_str());
    Ok(url)
}

/// A token found in a post-redirect location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedToken {
    /// Raw `id_token` value.
    pub id_token: String,
    /// The location with its fragment removed. Hosts put this back in the address bar so the
    /// token is neither processed twice nor shared by copying the URL.
    pub cleaned_location: String,
}

/// Extracts `id_token` from a post-redirect location.
///
/// `location` may be a full URL, a `#fragment`, or a bare fragment body. Absent or malformed
/// input yields `None`: this runs on every load, most of which carry no token.
#[must_use]
pub fn parse_returned_token(location: &str) -> Option<ReturnedToken> {
    let location = location.trim();
    let (base, fragment) = match location.split_once('#') {
        Some((base, fragment)) => (base, fragment),
        None if location.contains("://") => return None,
        None => ("", location),
    };

    let id_token = form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == ID_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())?;

    Some(ReturnedToken {
        id_token,
        cleaned_location: base.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_authorization_url_carries_all_parameters() {
        let nonce = Nonce::new("n0nce-_value".to_string());
        let url = build_authorization_url(
            "https://accounts.google.com/o/oauth2/v2/auth",
            "client.apps.googleusercontent.com",
            "http://localhost:5173",
            &nonce,
        )
        .unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".into(), "client.apps.googleusercontent.com".into()),
                ("redirect_uri".into(), "http://localhost:5173".into()),
                ("response_type".into(), "id_token".into()),
                ("scope".into(), "openid".into()),
                ("nonce".into(), "n0nce-_value".into()),
            ]
        );
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let nonce = Nonce::new("abc".to_string());
        let a = build_authorization_url("https://idp.test/auth", "c", "r", &nonce).unwrap();
        let b = build_authorization_url("https://idp.test/auth", "c", "r", &nonce).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_endpoint_is_rejected() {
        let nonce = Nonce::new("abc".to_string());
        assert!(build_authorization_url("/auth", "c", "r", &nonce).is_err());
    }

    #[test]
    fn test_token_in_full_url_is_extracted_and_stripped() {
        let returned = parse_returned_token(
            "http://localhost:5173/#state=x&id_token=aaa.bbb.ccc&authuser=0",
        )
        .unwrap();
        assert_eq!(returned.id_token, "aaa.bbb.ccc");
        assert_eq!(returned.cleaned_location, "http://localhost:5173/");
    }

    #[test]
    fn test_bare_fragment() {
        let returned = parse_returned_token("#id_token=aaa.bbb.ccc").unwrap();
        assert_eq!(returned.id_token, "aaa.bbb.ccc");
        assert_eq!(returned.cleaned_location, "");

        let returned = parse_returned_token("id_token=aaa.bbb.ccc").unwrap();
        assert_eq!(returned.id_token, "aaa.bbb.ccc");
    }

    #[test_case("" ; "empty")]
    #[test_case("http://localhost:5173/" ; "no fragment")]
    #[test_case("http://localhost:5173/?id_token=in.the.query" ; "token in query")]
    #[test_case("http://localhost:5173/#" ; "empty fragment")]
    #[test_case("#access_token=xyz" ; "other parameter")]
    #[test_case("#id_token=" ; "empty token")]
    #[test_case("#%%%=&&==" ; "garbage")]
    fn test_no_token(location: &str) {
        assert_eq!(parse_returned_token(location), None);
    }
}
