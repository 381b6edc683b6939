use serde::{Deserialize, Serialize};

/// STUN/TURN server handed to the negotiation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// One server, possibly reachable under several URLs
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self::stun(url).with_auth(username, credential)
    }

    pub fn with_auth(mut self, username: impl Into<String>, credential: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    /// Any URL uses the `turn:` or `turns:` scheme
    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.credential.is_some()
    }

    /// Public Google STUN server
    pub fn default_stun_servers() -> Vec<Self> {
        vec![Self::stun("stun:stun.l.google.com:19302")]
    }
}
