//! Continuous polling loop.
//!
//! Polls a [`ContentSource`] on a fixed interval and hands every new item to
//! a sink, until SIGINT/SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::Result;
use crate::domain::ContentItem;
use crate::source::ContentSource;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Poll interval in seconds (default: 1800 = 30 minutes)
    pub poll_interval_secs: u64,
    /// Whether to poll immediately on start
    pub poll_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1800,
            poll_on_start: true,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
        }?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

pub struct Daemon<'a> {
    source: &'a dyn ContentSource,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl<'a> Daemon<'a> {
    pub fn new(source: &'a dyn ContentSource, config: DaemonConfig) -> Self {
        Self {
            source,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Poll until a shutdown signal arrives, passing new items to `sink`.
    pub async fn run<F>(&self, mut sink: F) -> Result<()>
    where
        F: FnMut(&ContentItem),
    {
        self.install_signal_handler();

        info!(
            source = self.source.name(),
            interval = %DaemonConfig::format_interval(self.config.poll_interval_secs),
            "poller started"
        );

        if self.config.poll_on_start {
            self.run_cycle(&mut sink).await;
        }

        let mut timer = interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // first tick is immediate

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.run_cycle(&mut sink).await;
        }

        info!("poller shutting down");
        Ok(())
    }

    /// One poll. Failures are logged; the loop keeps going.
    pub async fn run_cycle<F>(&self, sink: &mut F) -> usize
    where
        F: FnMut(&ContentItem),
    {
        let start = Utc::now();
        match self.source.fetch_items().await {
            Ok(items) => {
                items.iter().for_each(&mut *sink);
                let elapsed = Utc::now().signed_duration_since(start);
                info!(
                    count = items.len(),
                    elapsed_ms = elapsed.num_milliseconds(),
                    "poll complete"
                );
                items.len()
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "poll failed, will retry next interval");
                0
            }
            Err(e) => {
                warn!(error = %e, "poll failed");
                0
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn install_signal_handler(&self) {
        let running = self.running.clone();

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    _ => {
                        warn!("could not install signal handlers");
                        return;
                    }
                };
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            running.store(false, Ordering::SeqCst);
        });

        #[cfg(not(unix))]
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
        });
    }
}
