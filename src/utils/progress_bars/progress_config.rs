// src/utils/progress_bars/progress_config.rs - Terminal progress settings for the dedupe binary

use indicatif::MultiProgress;
use log::info;
use std::time::Duration;

use crate::utils::constants::DEFAULT_PROGRESS_BUFFER_SIZE;
use crate::utils::env::env_or;

/// Floor for the spinner tick; faster ticks only burn CPU.
const MIN_REFRESH_MS: u64 = 10;

/// How the batch run is rendered on the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    pub enabled: bool,
    /// Show full progress events instead of the phase name alone.
    pub detailed: bool,
    pub refresh_rate_ms: u64,
    pub show_memory: bool,
    pub show_cache_stats: bool,
    /// Capacity of the bounded progress event channel; never zero.
    pub buffer_size: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            refresh_rate_ms: 100,
            show_memory: true,
            show_cache_stats: true,
            buffer_size: DEFAULT_PROGRESS_BUFFER_SIZE,
        }
    }
}

impl ProgressConfig {
    /// Reads `PROGRESS_*` variables; anything missing or malformed keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("PROGRESS_ENABLED", defaults.enabled),
            detailed: env_or("PROGRESS_DETAILED", defaults.detailed),
            refresh_rate_ms: env_or("PROGRESS_REFRESH_RATE_MS", defaults.refresh_rate_ms),
            show_memory: env_or("PROGRESS_SHOW_MEMORY", defaults.show_memory),
            show_cache_stats: env_or("PROGRESS_SHOW_CACHE_STATS", defaults.show_cache_stats),
            buffer_size: env_or("PROGRESS_BUFFER_SIZE", defaults.buffer_size).max(1),
        }
    }

    pub fn log_config(&self) {
        info!("📊 Progress Configuration:");
        info!(
            "   Bars: {}, detailed: {}, refresh: {:?}",
            self.enabled,
            self.detailed,
            self.refresh_interval()
        );
        info!(
            "   Memory in summary: {}, cache stats in summary: {}, event buffer: {}",
            self.show_memory, self.show_cache_stats, self.buffer_size
        );
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms.max(MIN_REFRESH_MS))
    }

    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        self.enabled.then(MultiProgress::new)
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }

    pub fn should_show_cache_stats(&self) -> bool {
        self.enabled && self.show_cache_stats
    }

    /// `.env` lines reproducing this configuration, one commented variable per line pair.
    pub fn env_template(&self) -> String {
        let settings = [
            ("PROGRESS_ENABLED", "progress bars at all", self.enabled.to_string()),
            ("PROGRESS_DETAILED", "full event text on the bar", self.detailed.to_string()),
            ("PROGRESS_REFRESH_RATE_MS", "spinner tick", self.refresh_rate_ms.to_string()),
            ("PROGRESS_SHOW_MEMORY", "memory line in the summary", self.show_memory.to_string()),
            ("PROGRESS_SHOW_CACHE_STATS", "cache line in the summary", self.show_cache_stats.to_string()),
            ("PROGRESS_BUFFER_SIZE", "events buffered before drops", self.buffer_size.to_string()),
        ];
        settings
            .iter()
            .map(|(name, about, value)| format!("# {}\n{}={}\n", about, name, value))
            .collect()
    }
}

/// Prints the progress variables with their defaults, ready for a `.env` file.
pub fn print_env_config_example() {
    print!("{}", ProgressConfig::default().env_template());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_overrides_and_clamps() {
        env::set_var("PROGRESS_DETAILED", "false");
        env::set_var("PROGRESS_REFRESH_RATE_MS", "1");
        env::set_var("PROGRESS_SHOW_CACHE_STATS", "maybe");
        env::set_var("PROGRESS_BUFFER_SIZE", "0");

        let config = ProgressConfig::from_env();
        assert!(!config.detailed);
        assert_eq!(config.refresh_interval(), Duration::from_millis(MIN_REFRESH_MS));
        // Malformed values keep the default.
        assert!(config.show_cache_stats);
        assert_eq!(config.buffer_size, 1);

        env::remove_var("PROGRESS_DETAILED");
        env::remove_var("PROGRESS_REFRESH_RATE_MS");
        env::remove_var("PROGRESS_SHOW_CACHE_STATS");
        env::remove_var("PROGRESS_BUFFER_SIZE");
    }

    #[test]
    fn test_disabled_bars_hide_everything() {
        let config = ProgressConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(config.create_multi_progress().is_none());
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
        assert!(!config.should_show_cache_stats());

        let quiet_memory = ProgressConfig {
            show_memory: false,
            ..Default::default()
        };
        assert!(quiet_memory.create_multi_progress().is_some());
        assert!(!quiet_memory.should_show_memory());
        assert!(quiet_memory.should_show_cache_stats());
    }

    #[test]
    fn test_env_template_lists_current_values() {
        let config = ProgressConfig {
            buffer_size: 7,
            detailed: false,
            ..Default::default()
        };
        let template = config.env_template();
        assert!(template.contains("PROGRESS_BUFFER_SIZE=7\n"));
        assert!(template.contains("PROGRESS_DETAILED=false\n"));
        assert_eq!(template.lines().filter(|l| l.starts_with("PROGRESS_")).count(), 6);
        assert_eq!(template.lines().filter(|l| l.starts_with('#')).count(), 6);
    }
}
