use secrecy::SecretString;

/// Settings shared by every part of the server.
#[derive(Clone)]
pub struct GlobalArgs {
    pub identity_url: String,
    pub session_secret: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(identity_url: String, session_secret: SecretString) -> Self {
        Self {
            identity_url,
            session_secret,
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("identity_url", &self.identity_url)
            .field("session_secret", &"***")
            .finish()
    }
}
