//! Runtime settings for the merkle-state workspace (spec §6's "Runtime
//! settings" table): one `clap::Parser` struct with every field also
//! `serde`-derived so the same shape loads from a TOML file, following
//! `kanari-config`'s `KanariOpt` precedent of deriving both traits on one
//! struct rather than keeping CLI and file schemas separate.

mod error;

pub use error::{SettingsError, SettingsResult};

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Which physical [`merkle_route::AnyRoute`] encoding a process selects
/// at startup. A thin CLI/serde-facing mirror of
/// [`merkle_route::RouteEncoding`], kept separate so the route crate
/// itself stays free of configuration-layer dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteEncodingSetting {
    #[default]
    BinaryCompressed,
    Uncompressed,
}

impl From<RouteEncodingSetting> for merkle_route::RouteEncoding {
    fn from(value: RouteEncodingSetting) -> Self {
        match value {
            RouteEncodingSetting::BinaryCompressed => merkle_route::RouteEncoding::BinaryCompressed,
            RouteEncodingSetting::Uncompressed => merkle_route::RouteEncoding::Uncompressed,
        }
    }
}

/// The reconnect protocol's settings (spec §6, `reconnect.*` rows),
/// flattened into [`RuntimeSettings`] the way `KanariOpt` flattens
/// `StoreConfig`.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Per-read timeout on anticipated streams, in milliseconds.
    #[clap(long, env = "MERKLE_RECONNECT_ASYNC_STREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub async_stream_timeout_ms: u64,

    /// Flush cadence on the outbound stream, in milliseconds.
    #[clap(long, env = "MERKLE_RECONNECT_ASYNC_OUTPUT_STREAM_FLUSH_MS", default_value_t = 500)]
    pub async_output_stream_flush_ms: u64,

    /// The teacher's per-subtree ack wait budget, in milliseconds.
    #[clap(long, env = "MERKLE_RECONNECT_MAX_ACK_DELAY_MS", default_value_t = 5_000)]
    pub max_ack_delay_ms: u64,

    /// Bounded queue depth between the sending/receiving worker tasks.
    #[clap(long, env = "MERKLE_RECONNECT_ASYNC_STREAM_BUFFER_SIZE", default_value_t = 256)]
    pub async_stream_buffer_size: usize,

    /// Consecutive reconnect failures before the controller refuses
    /// further attempts.
    #[clap(long, env = "MERKLE_RECONNECT_MAX_CONSECUTIVE_FAILURES", default_value_t = 10)]
    pub max_consecutive_failures: u32,

    /// Backoff floor between successive reconnect attempts, in
    /// milliseconds.
    #[clap(long, env = "MERKLE_RECONNECT_MIN_TIME_BETWEEN_RECONNECTS_MS", default_value_t = 60_000)]
    pub min_time_between_reconnects_ms: u64,
}

impl ReconnectSettings {
    pub fn async_stream_timeout(&self) -> Duration {
        Duration::from_millis(self.async_stream_timeout_ms)
    }

    pub fn async_output_stream_flush(&self) -> Duration {
        Duration::from_millis(self.async_output_stream_flush_ms)
    }

    pub fn max_ack_delay(&self) -> Duration {
        Duration::from_millis(self.max_ack_delay_ms)
    }

    pub fn min_time_between_reconnects(&self) -> Duration {
        Duration::from_millis(self.min_time_between_reconnects_ms)
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            async_stream_timeout_ms: 10_000,
            async_output_stream_flush_ms: 500,
            max_ack_delay_ms: 5_000,
            async_stream_buffer_size: 256,
            max_consecutive_failures: 10,
            min_time_between_reconnects_ms: 60_000,
        }
    }
}

/// One place for every setting named in spec §6's "Runtime settings"
/// table, loaded either from CLI flags, matching environment variables,
/// or a TOML config file, per `kanari-config`'s `KanariOpt` precedent.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Selects the merkle-route representation new trees are built with.
    #[clap(long, env = "MERKLE_ROUTE_ENCODING", value_enum, default_value_t = RouteEncodingSetting::BinaryCompressed)]
    pub route_encoding: RouteEncodingSetting,

    /// The merkle hasher's worker pool size.
    #[clap(long, env = "MERKLE_CPU_THREAD_COUNT", default_value_t = default_cpu_thread_count())]
    pub cpu_thread_count: usize,

    #[clap(flatten)]
    pub reconnect: ReconnectSettings,

    /// Size of the signed-state tracking window `W` (spec §4.7).
    #[clap(long, env = "MERKLE_ROUNDS_NON_ANCIENT", default_value_t = 26)]
    pub rounds_non_ancient: i64,

    /// Warning threshold on pending GC events in an `FCHashMap` family.
    #[clap(long, env = "MERKLE_FCHASHMAP_MAX_GC_QUEUE_SIZE", default_value_t = 10_000)]
    pub fchashmap_max_gc_queue_size: usize,
}

fn default_cpu_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            route_encoding: RouteEncodingSetting::default(),
            cpu_thread_count: default_cpu_thread_count(),
            reconnect: ReconnectSettings::default(),
            rounds_non_ancient: 26,
            fchashmap_max_gc_queue_size: 10_000,
        }
    }
}

impl RuntimeSettings {
    /// Loads settings from `path` if given (TOML, via `serde`), falling
    /// back to [`RuntimeSettings::default`] for anything the file
    /// doesn't mention isn't representable by this step: unlike
    /// `KanariOpt`, which merges CLI/file/default per-field, a config
    /// file here is expected to be complete or absent, matching
    /// spec §6's "or defaults" framing for the table as a whole.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            None => {
                tracing::debug!("no config path given, using default runtime settings");
                Ok(Self::default())
            }
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
                let settings: Self = toml::from_str(&text)
                    .map_err(|e| SettingsError::Parse(path.to_path_buf(), e))?;
                tracing::info!(path = %path.display(), "loaded runtime settings");
                Ok(settings)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_every_effect_cell_in_the_settings_table() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.route_encoding, RouteEncodingSetting::BinaryCompressed);
        assert_eq!(settings.rounds_non_ancient, 26);
        assert_eq!(settings.reconnect.max_consecutive_failures, 10);
        assert!(settings.cpu_thread_count >= 1);
    }

    #[test]
    fn load_with_no_path_returns_defaults() {
        let settings = RuntimeSettings::load(None).unwrap();
        assert_eq!(settings.fchashmap_max_gc_queue_size, 10_000);
    }

    #[test]
    fn load_reads_a_toml_file_overriding_every_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            route_encoding = "uncompressed"
            cpu_thread_count = 4
            rounds_non_ancient = 50
            fchashmap_max_gc_queue_size = 500

            [reconnect]
            async_stream_timeout_ms = 1000
            async_output_stream_flush_ms = 100
            max_ack_delay_ms = 2000
            async_stream_buffer_size = 64
            max_consecutive_failures = 3
            min_time_between_reconnects_ms = 5000
            "#
        )
        .unwrap();

        let settings = RuntimeSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.route_encoding, RouteEncodingSetting::Uncompressed);
        assert_eq!(settings.cpu_thread_count, 4);
        assert_eq!(settings.reconnect.max_consecutive_failures, 3);
        assert_eq!(
            settings.reconnect.max_ack_delay(),
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn load_reports_a_missing_file() {
        let err = RuntimeSettings::load(Some(Path::new("/no/such/settings.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_, _)));
    }
}
