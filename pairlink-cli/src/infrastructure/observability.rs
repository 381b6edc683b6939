use crate::infrastructure::error::{CliError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub json_format: bool,
    pub chrome_trace: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether to write logs to stdout at all
    pub show_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            json_format: false,
            chrome_trace: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
        }
    }
}

/// Keeps trace writers alive; drop it last
#[derive(Default)]
pub struct LogGuard {
    #[cfg(feature = "chrome-trace")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// One JSON object per line, for log shippers
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.default_level = level;
        self
    }

    /// Write a Chrome trace file (needs the `chrome-trace` feature)
    pub fn with_chrome_trace(mut self) -> Self {
        self.chrome_trace = true;
        self
    }

    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// `RUST_LOG` if set, otherwise per-crate defaults
    pub fn env_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let directives = [
            format!("pairlink_cli={}", self.default_level),
            format!("pairlink_core={}", self.default_level),
            format!("pairlink_p2p={}", self.default_level),
            "matchbox_socket=info".to_string(),
            "webrtc=warn".to_string(),
        ];

        let mut filter = EnvFilter::new("warn");
        for directive in directives {
            let directive = directive
                .parse()
                .map_err(|e| CliError::Logging(format!("bad directive '{}': {}", directive, e)))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    pub fn init(self) -> Result<LogGuard> {
        let env_filter = self.env_filter()?;

        let text_layer = (self.show_logs && !self.json_format).then(|| {
            fmt::layer()
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids)
        });
        let json_layer = (self.show_logs && self.json_format).then(|| {
            fmt::layer()
                .json()
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids)
        });

        let registry = tracing_subscriber::registry()
            .with(env_filter)
            .with(text_layer)
            .with(json_layer);

        #[cfg(feature = "chrome-trace")]
        if self.chrome_trace {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new().build();

            if self.show_logs {
                eprintln!("📊 Chrome trace enabled, view at https://ui.perfetto.dev/");
            }

            registry
                .with(chrome_layer)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))?;

            return Ok(LogGuard {
                _chrome: Some(guard),
            });
        }

        #[cfg(not(feature = "chrome-trace"))]
        if self.chrome_trace {
            eprintln!("⚠️ Chrome trace requested but the chrome-trace feature is disabled");
        }

        registry
            .try_init()
            .map_err(|e| CliError::Logging(e.to_string()))?;

        Ok(LogGuard::default())
    }
}
