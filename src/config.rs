use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Sessions older than this are removed by the background sweep.
    pub session_timeout_secs: u64,
    /// How often the sweep scans for expired sessions.
    pub sweep_interval_ms: u64,
    /// Base URL used to build activation links in registration mail.
    pub activation_base_url: String,
    /// From-address on outbound mail.
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let session_timeout_secs = std::env::var("SESSION_TIMEOUT_S")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        let sweep_interval_ms = std::env::var("SESSION_SWEEP_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60_000);
        let activation_base_url = std::env::var("ACTIVATION_BASE_URL")
            .unwrap_or_else(|_| "https://localhost:8080".into());
        let mail_from =
            std::env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@koordinator.local".into());
        Ok(Self {
            session_timeout_secs,
            sweep_interval_ms,
            activation_base_url,
            mail_from,
        })
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 3600,
            sweep_interval_ms: 60_000,
            activation_base_url: "https://localhost:8080".into(),
            mail_from: "noreply@koordinator.local".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.session_timeout(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_millis(60_000));
    }
}
