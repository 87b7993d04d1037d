use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

pub struct Config {
    pub api_base_url: String,
    pub data_dir: String,
    pub debounce: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// `.env` first (if present), then the process environment. Never fails:
    /// anything missing or malformed falls back to its default.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        Self {
            api_base_url: try_load("SWEET_SHOP_API_URL", "http://localhost:8080".to_string()),
            data_dir: try_load("SWEET_SHOP_DATA_DIR", ".sweet_shop".to_string()),
            debounce: Duration::from_millis(try_load("SWEET_SHOP_DEBOUNCE_MS", 300u64)),
            http_timeout: Duration::from_secs(try_load("SWEET_SHOP_HTTP_TIMEOUT_SECS", 30u64)),
        }
    }
}

/// Log directory, resolved before any subscriber exists so that
/// [`Config::load`] can run with logging already installed. Logs nothing.
pub fn log_dir() -> String {
    dotenvy::dotenv().ok();
    env::var("SWEET_SHOP_LOG_DIR")
        .ok()
        .map(|dir| dir.trim().to_string())
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| "logs".to_string())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_reports_fallbacks_through_installed_subscriber() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        env::set_var("SWEET_SHOP_DEBOUNCE_MS", "soon");
        let config = tracing::subscriber::with_default(subscriber, Config::load);
        env::remove_var("SWEET_SHOP_DEBOUNCE_MS");

        assert_eq!(config.debounce, Duration::from_millis(300));
        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Invalid SWEET_SHOP_DEBOUNCE_MS value \"soon\""), "{output}");
    }

    #[test]
    fn test_log_dir_resolves_without_logging() {
        env::set_var("SWEET_SHOP_LOG_DIR", " /tmp/sweet-logs ");
        assert_eq!(log_dir(), "/tmp/sweet-logs");
        env::set_var("SWEET_SHOP_LOG_DIR", "   ");
        assert_eq!(log_dir(), "logs");
        env::remove_var("SWEET_SHOP_LOG_DIR");
    }

    #[test]
    fn test_try_load_falls_back() {
        env::set_var("SWEET_SHOP_TEST_NUMBER", "not-a-number");
        assert_eq!(try_load("SWEET_SHOP_TEST_NUMBER", 300u64), 300);

        env::set_var("SWEET_SHOP_TEST_NUMBER", " 120 ");
        assert_eq!(try_load("SWEET_SHOP_TEST_NUMBER", 300u64), 120);

        env::remove_var("SWEET_SHOP_TEST_NUMBER");
        assert_eq!(
            try_load("SWEET_SHOP_TEST_MISSING", "fallback".to_string()),
            "fallback"
        );
    }
}
