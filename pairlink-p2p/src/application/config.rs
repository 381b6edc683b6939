use crate::domain::{IceServer, MediaConstraints};

/// What a session does after acquiring media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Full protocol: lobby, pairing, negotiation
    #[default]
    Matched,
    /// Local media only, no signaling
    Preview,
}

/// Configuration for a pairing session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Matchbox signalling server URL
    pub signalling_server: String,

    /// Topic every participant joins to be matched
    pub lobby_topic: String,

    /// Prefix of per-pair topics; the pair id is appended
    pub pair_topic_prefix: String,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    pub ice_servers: Vec<IceServer>,

    pub mode: SessionMode,

    pub media: MediaConstraints,

    /// Unsubscribe from the lobby once the pair topic is active
    pub leave_lobby_on_match: bool,

    /// Matchbox only: wait this long for member introductions on topic open
    pub membership_settle_ms: u64,

    /// Seed for partner selection; random when unset
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signalling_server: "wss://match.konnektoren.help".to_string(),
            lobby_topic: "observable-match".to_string(),
            pair_topic_prefix: "observable-".to_string(),
            poll_interval_ms: 100,
            ice_servers: IceServer::default_stun_servers(),
            mode: SessionMode::Matched,
            media: MediaConstraints::default(),
            leave_lobby_on_match: true,
            membership_settle_ms: 1500,
            rng_seed: None,
        }
    }
}

impl SessionConfig {
    pub fn new(signalling_server: impl Into<String>) -> Self {
        Self {
            signalling_server: signalling_server.into(),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Add a TURN server after the configured STUN servers
    pub fn with_turn_server(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers
            .push(IceServer::turn(url, username, credential));
        self
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_lobby_topic(mut self, topic: impl Into<String>) -> Self {
        self.lobby_topic = topic.into();
        self
    }

    pub fn with_media(mut self, media: MediaConstraints) -> Self {
        self.media = media;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_membership_settle(mut self, ms: u64) -> Self {
        self.membership_settle_ms = ms;
        self
    }

    /// Keep the lobby subscription for the whole session
    pub fn staying_in_lobby(mut self) -> Self {
        self.leave_lobby_on_match = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.lobby_topic, "observable-match");
        assert_eq!(config.pair_topic_prefix, "observable-");
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.mode, SessionMode::Matched);
        assert!(config.leave_lobby_on_match);
        assert!(config.rng_seed.is_none());
        assert_eq!(config.ice_servers, IceServer::default_stun_servers());
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::new("wss://relay.example.com")
            .with_poll_interval(20)
            .with_turn_server("turn:t.example.com:3478", "u", "p")
            .with_mode(SessionMode::Preview)
            .with_lobby_topic("test-lobby")
            .with_media(MediaConstraints::audio_only())
            .with_rng_seed(9)
            .with_membership_settle(0)
            .staying_in_lobby();

        assert_eq!(config.signalling_server, "wss://relay.example.com");
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.ice_servers.len(), 2);
        assert!(config.ice_servers[1].is_turn());
        assert_eq!(config.mode, SessionMode::Preview);
        assert_eq!(config.lobby_topic, "test-lobby");
        assert!(!config.media.video);
        assert_eq!(config.rng_seed, Some(9));
        assert_eq!(config.membership_settle_ms, 0);
        assert!(!config.leave_lobby_on_match);
    }
}
