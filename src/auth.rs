use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub const BASIC_CHALLENGE: &str = "Basic realm=\"NovaDesk Admin\", charset=\"UTF-8\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// The single administrator identity allowed on the admin surface.
#[derive(Clone)]
pub struct AdminIdentity {
    username: String,
    password: String,
}

impl AdminIdentity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exact, case-sensitive match on both halves.
    pub fn matches(&self, credentials: &BasicCredentials) -> bool {
        credentials.username == self.username && credentials.password == self.password
    }
}

impl std::fmt::Debug for AdminIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminIdentity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn verify_basic(headers: &HeaderMap, identity: &AdminIdentity) -> Result<(), &'static str> {
    let credentials = extract_basic_credentials(headers)?;

    if !identity.matches(&credentials) {
        return Err("Invalid administrator credentials");
    }

    Ok(())
}

pub fn extract_basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, &'static str> {
    let Some(raw_header) = headers.get(AUTHORIZATION) else {
        return Err("Missing Authorization header");
    };

    let Ok(value) = raw_header.to_str() else {
        return Err("Invalid Authorization header");
    };

    let Some((scheme, encoded)) = value.trim().split_once(' ') else {
        return Err("Authorization must use Basic scheme");
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err("Authorization must use Basic scheme");
    }

    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return Err("Basic credentials are not valid base64");
    };

    let Ok(decoded) = String::from_utf8(decoded) else {
        return Err("Basic credentials are not valid UTF-8");
    };

    let Some((username, password)) = decoded.split_once(':') else {
        return Err("Basic credentials must be user:password");
    };

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
