use fleetbroker_core::upstream::ClientCredentials;

/// Provider endpoints and the broker's own application credentials.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Consent page users are redirected to.
    pub authorize_url: String,
    /// Base URL of the fleet API (partner-account calls).
    pub api_base_url: String,
    /// `audience` sent with every token request.
    pub audience: String,
    /// Upper bound for a single upstream request, in seconds.
    pub http_timeout_secs: u64,
    /// Application client id. Empty disables partner initialization.
    pub client_id: String,
    pub client_secret: String,
    /// Domain registered as partner account at startup, if any.
    pub partner_domain: Option<String>,
    /// `locale` query parameter of the consent page.
    pub authorize_locale: String,
}

impl FleetConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                      |
    /// |---------------------------|----------------------------------------------|
    /// | `FLEET_TOKEN_URL`         | `https://auth.tesla.cn/oauth2/v3/token`      |
    /// | `FLEET_AUTHORIZE_URL`     | `https://auth.tesla.cn/oauth2/v3/authorize`  |
    /// | `FLEET_API_BASE_URL`      | `https://fleet-api.prd.cn.vn.cloud.tesla.cn` |
    /// | `FLEET_AUDIENCE`          | value of `FLEET_API_BASE_URL`                |
    /// | `FLEET_HTTP_TIMEOUT_SECS` | `10`                                         |
    /// | `FLEET_CLIENT_ID`         | empty                                        |
    /// | `FLEET_CLIENT_SECRET`     | empty                                        |
    /// | `FLEET_PARTNER_DOMAIN`    | unset                                        |
    /// | `FLEET_AUTHORIZE_LOCALE`  | `en-US`                                      |
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("FLEET_API_BASE_URL")
            .unwrap_or_else(|_| "https://fleet-api.prd.cn.vn.cloud.tesla.cn".into());

        let http_timeout_secs: u64 = std::env::var("FLEET_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("FLEET_HTTP_TIMEOUT_SECS must be a valid u64");

        Self {
            token_url: std::env::var("FLEET_TOKEN_URL")
                .unwrap_or_else(|_| "https://auth.tesla.cn/oauth2/v3/token".into()),
            authorize_url: std::env::var("FLEET_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://auth.tesla.cn/oauth2/v3/authorize".into()),
            audience: std::env::var("FLEET_AUDIENCE").unwrap_or_else(|_| api_base_url.clone()),
            api_base_url,
            http_timeout_secs,
            client_id: std::env::var("FLEET_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("FLEET_CLIENT_SECRET").unwrap_or_default(),
            partner_domain: std::env::var("FLEET_PARTNER_DOMAIN")
                .ok()
                .filter(|d| !d.trim().is_empty()),
            authorize_locale: std::env::var("FLEET_AUTHORIZE_LOCALE")
                .unwrap_or_else(|_| "en-US".into()),
        }
    }

    /// Point every endpoint at one base URL. Used against local stand-ins.
    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            token_url: format!("{base_url}/oauth2/v3/token"),
            authorize_url: format!("{base_url}/oauth2/v3/authorize"),
            api_base_url: base_url.to_string(),
            audience: base_url.to_string(),
            http_timeout_secs: 10,
            client_id: String::new(),
            client_secret: String::new(),
            partner_domain: None,
            authorize_locale: "en-US".to_string(),
        }
    }

    /// The configured application credentials, if a client id is set.
    pub fn credentials(&self) -> Option<ClientCredentials> {
        if self.client_id.trim().is_empty() {
            None
        } else {
            Some(ClientCredentials::new(&self.client_id, &self.client_secret))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let config = FleetConfig::with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.token_url, "http://127.0.0.1:9000/oauth2/v3/token");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn blank_client_id_disables_credentials() {
        let mut config = FleetConfig::with_base_url("http://localhost");
        assert!(config.credentials().is_none());
        config.client_id = "abc".to_string();
        config.client_secret = "s".to_string();
        assert_eq!(config.credentials().unwrap().client_id, "abc");
    }
}
