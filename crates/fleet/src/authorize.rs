//! Consent-page URL for the authorization-code flow.

use fleetbroker_core::authorization::RedirectParams;

use crate::error::FleetError;

/// Build the provider URL a user is redirected to for consent.
pub fn authorize_url(
    base_url: &str,
    params: &RedirectParams,
    locale: &str,
) -> Result<String, FleetError> {
    let query = [
        ("response_type", "code"),
        ("prompt", "login"),
        ("client_id", params.client_id.as_str()),
        ("redirect_uri", params.redirect_uri.as_str()),
        ("scope", params.scope.as_str()),
        ("state", params.state.as_str()),
        ("nonce", params.nonce.as_str()),
        ("locale", locale),
        ("prompt_missing_scopes", bool_str(params.prompt_missing_scopes)),
        ("require_requested_scopes", bool_str(params.require_requested_scopes)),
    ];
    reqwest::Url::parse_with_params(base_url, query)
        .map(String::from)
        .map_err(|e| FleetError::Url(format!("{base_url}: {e}")))
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn params() -> RedirectParams {
        RedirectParams {
            client_id: "abc".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scope: "openid offline_access".to_string(),
            state: "s-1".to_string(),
            nonce: "n-1".to_string(),
            prompt_missing_scopes: false,
            require_requested_scopes: false,
        }
    }

    #[test]
    fn encodes_every_parameter() {
        let url = authorize_url("https://auth.example.com/oauth2/v3/authorize", &params(), "en-US")
            .unwrap();
        let parsed = reqwest::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(parsed.path(), "/oauth2/v3/authorize");
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.example.com/callback".into())));
        assert!(pairs.contains(&("scope".into(), "openid offline_access".into())));
        assert!(pairs.contains(&("state".into(), "s-1".into())));
        assert!(pairs.contains(&("nonce".into(), "n-1".into())));
        assert!(pairs.contains(&("locale".into(), "en-US".into())));
    }

    #[test]
    fn invalid_base_is_url_error() {
        assert_matches!(
            authorize_url("not a url", &params(), "en-US"),
            Err(FleetError::Url(_))
        );
    }
}
