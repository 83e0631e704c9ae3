// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of hello-cafe.
//
// hello-cafe is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// hello-cafe is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with hello-cafe.  If not,
// see <http://www.gnu.org/licenses/>.

//! # hello-cafed
//!
//! The hello-cafe daemon: parse the command line & configuration file, set up logging, open the
//! configured store & serve the hello-cafe API until asked to stop.

use std::{
    env,
    fmt::Display,
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use chrono::Duration;
use clap::{crate_authors, crate_version, value_parser, Arg, ArgAction, Command};
use secrecy::SecretString;
use serde::Deserialize;
use snafu::{prelude::*, IntoError};
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, Layer, Registry};

use hello_cafe::{
    catalog::{Catalog, DEFAULT_MAX_PAGE_SIZE},
    http::{make_router, Cafe},
    memory, sessions,
    sessions::Sessions,
    sqlite,
    storage::{AdminBackend, ItemBackend},
    token::SigningKey,
};

/// The hello-cafed application error type
///
/// [Debug] is implemented by hand, in terms of [Display]: `main()` returns `Result<(), Error>`, and
/// the runtime prints the `Err` variant using [Debug], which when derived is neither readable nor
/// brief.
#[derive(Snafu)]
pub enum Error {
    #[snafu(display("Failed to bind to {addr}: {source}"))]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[snafu(display("Unable to read configuration file {pth:?}: {source}"))]
    ConfigNotFound {
        pth: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Error parsing configuration file {pth:?}: {source}"))]
    ConfigParse {
        pth: PathBuf,
        source: toml::de::Error,
    },
    #[snafu(display("Couldn't resolve the present working directory: {source}"))]
    CurrentDir { source: std::io::Error },
    #[snafu(display("Failed to parse RUST_LOG: {source}"))]
    EnvFilter {
        source: tracing_subscriber::filter::FromEnvError,
    },
    #[snafu(display("Failed to parse the log filter {filter:?}: {source}"))]
    LogFilter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[snafu(display("While serving requests, {source}"))]
    Serve { source: std::io::Error },
    #[snafu(display("Failed to install a handler for {name}: {source}"))]
    Signal {
        name: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to open the SQLite store at {pth:?}: {source}"))]
    Sqlite {
        pth: PathBuf,
        source: sqlite::Error,
    },
    #[snafu(display("Failed to set the tracing subscriber: {source}"))]
    Subscriber {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
    #[snafu(display("Failed to instantiate a Tokio runtime: {source}"))]
    TokioRuntime { source: std::io::Error },
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self::Display::fmt(&self, f)
    }
}

type Result<T> = std::result::Result<T, Error>;

static DEFAULT_CONFIG: &str = "/etc/hello-cafe.toml";

/// Logging-related options read from the command line or the environment
struct LogOpts {
    pub plain: bool,
    pub level: Level,
    pub filter: Option<String>,
}

impl LogOpts {
    fn new(matches: &clap::ArgMatches) -> LogOpts {
        LogOpts {
            plain: matches.get_flag("plain"),
            level: match (
                matches.get_flag("debug"),
                matches.get_flag("verbose"),
                matches.get_flag("quiet"),
            ) {
                (true, _, _) => Level::TRACE,
                (false, true, _) => Level::DEBUG,
                (false, false, true) => Level::ERROR,
                (_, _, _) => Level::INFO,
            },
            filter: matches.get_one::<String>("log-filter").cloned(),
        }
    }
}

/// Configuration options read from the CLI (or the environment)
struct CliOpts {
    pub log_opts: LogOpts,
    pub cfg: Option<PathBuf>,
    pub token_secret: Option<SecretString>,
}

impl CliOpts {
    fn new(matches: clap::ArgMatches) -> Result<CliOpts> {
        let here = env::current_dir().context(CurrentDirSnafu)?;
        Ok(CliOpts {
            log_opts: LogOpts::new(&matches),
            cfg: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .map(|p| here.join(p)),
            token_secret: matches
                .get_one::<String>("token-secret")
                .cloned()
                .map(SecretString::from),
        })
    }
}

/// hello-cafe datastore configuration
///
/// Application code only ever sees the [AdminBackend] & [ItemBackend] traits; this selects the
/// implementation at startup.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Keep everything in memory; nothing survives a restart
    #[default]
    Memory,
    /// A SQLite database file, created if need be
    Sqlite { path: PathBuf },
}

/// hello-cafe configuration, version one
// Deserialize only; the token secret shouldn't be written anywhere.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
struct ConfigV1 {
    /// Local address at which to listen for requests; specify as "address:port"
    #[serde(rename = "public-address")]
    public_address: SocketAddr,
    #[serde(rename = "storage-config")]
    storage_config: StorageConfig,
    /// The key under which access tokens are signed
    #[serde(rename = "token-secret")]
    token_secret: SigningKey,
    /// Access token lifetime, in seconds; a development override, production tokens live for
    /// twenty minutes
    #[serde(rename = "token-lifetime")]
    token_lifetime: i64,
    /// The largest page [Catalog::find_items] will hand back
    #[serde(rename = "max-page-size")]
    max_page_size: usize,
}

impl Default for ConfigV1 {
    fn default() -> Self {
        ConfigV1 {
            public_address: "0.0.0.0:8080".parse::<SocketAddr>().unwrap(/* known good */),
            storage_config: StorageConfig::default(),
            token_secret: SigningKey::default(),
            token_lifetime: sessions::TOKEN_LIFETIME_SECS,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl ConfigV1 {
    fn overrides_token_lifetime(&self) -> bool {
        self.token_lifetime != sessions::TOKEN_LIFETIME_SECS
    }
}

#[derive(Deserialize)]
#[serde(tag = "version")] // tag "internally"
enum Configuration {
    #[serde(rename = "1")]
    V1(ConfigV1),
}

/// Parse the hello-cafe configuration file
///
/// If no path was given & there's nothing at the default location, we run with defaults. If a
/// path *was* given, it had better be there.
fn parse_config(cfg: &Option<PathBuf>) -> Result<ConfigV1> {
    let (pth, defaulted): (PathBuf, bool) = cfg.as_ref().map_or_else(
        || (PathBuf::from(DEFAULT_CONFIG), true),
        |p| (p.clone(), false),
    );
    match std::fs::read_to_string(&pth) {
        Ok(text) => match toml::from_str::<Configuration>(&text) {
            Ok(cfg) => match cfg {
                Configuration::V1(cfg) => Ok(cfg),
            },
            Err(err) => Err(ConfigParseSnafu { pth }.into_error(err)),
        },
        Err(err) => {
            if defaulted {
                Ok(ConfigV1::default())
            } else {
                Err(ConfigNotFoundSnafu { pth }.into_error(err))
            }
        }
    }
}

/// Build our tracing formatter & filter
///
/// Structured (JSON) output to stdout by default, or a compact, human-readable format if `--plain`
/// was given. An explicit `--log-filter` takes precedence over `RUST_LOG`.
fn configure_logging(
    logopts: &LogOpts,
) -> Result<(Box<dyn Layer<Registry> + Send + Sync>, EnvFilter)> {
    let builder = EnvFilter::builder().with_default_directive(logopts.level.into());
    let filter = match &logopts.filter {
        Some(filter) => builder
            .parse(filter)
            .context(LogFilterSnafu { filter })?,
        None => builder.from_env().context(EnvFilterSnafu)?,
    };

    // `json()` & `compact()` produce layers *of different types*; `Box<dyn Layer<S> + Send +
    // Sync>` implements `Layer`, so:
    let formatter: Box<dyn Layer<Registry> + Send + Sync> = if logopts.plain {
        Box::new(fmt::Layer::default().compact().with_writer(io::stdout))
    } else {
        Box::new(
            fmt::Layer::default()
                .json()
                .with_current_span(true)
                .with_writer(io::stdout),
        )
    };

    Ok((formatter, filter))
}

#[allow(clippy::type_complexity)]
fn select_storage(
    config: &StorageConfig,
) -> Result<(
    Arc<dyn AdminBackend + Send + Sync>,
    Arc<dyn ItemBackend + Send + Sync>,
)> {
    match config {
        StorageConfig::Memory => {
            warn!("Using the in-memory store; nothing will survive a restart.");
            let x = Arc::new(memory::Store::new());
            Ok((x.clone(), x))
        }
        StorageConfig::Sqlite { path } => {
            let x = Arc::new(sqlite::Store::open(path).context(SqliteSnafu { pth: path.clone() })?);
            Ok((x.clone(), x))
        }
    }
}

/// Resolve when we receive SIGINT or SIGTERM
async fn shutdown_signal(
    mut sigint: tokio::signal::unix::Signal,
    mut sigterm: tokio::signal::unix::Signal,
) {
    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT; shutting down."),
        _ = sigterm.recv() => info!("Received SIGTERM; shutting down."),
    }
}

fn install_handler(kind: SignalKind, name: &str) -> Result<tokio::signal::unix::Signal> {
    signal(kind).context(SignalSnafu { name })
}

/// Serve hello-cafe API requests until asked to stop
#[tracing::instrument(skip(opts, cfg), fields(address = %cfg.public_address))]
async fn serve(opts: CliOpts, cfg: ConfigV1) -> Result<()> {
    let overrides_token_lifetime = cfg.overrides_token_lifetime();
    let signing_key = opts
        .token_secret
        .map(SigningKey::new)
        .unwrap_or(cfg.token_secret);
    if signing_key.is_insecure() {
        warn!(
            "Access tokens are being signed with the built-in default key; set `token-secret` in \
             the configuration file, or CAFE_TOKEN_SECRET, before exposing this instance."
        );
    }

    if overrides_token_lifetime {
        warn!(
            "Access tokens will live for {}s rather than the usual {}s; `token-lifetime` is \
             meant for development only.",
            cfg.token_lifetime,
            sessions::TOKEN_LIFETIME_SECS
        );
    }

    let (admins, items) = select_storage(&cfg.storage_config)?;
    let state = Arc::new(Cafe {
        sessions: Sessions::new(admins.clone(), signing_key)
            .with_token_lifetime(Duration::seconds(cfg.token_lifetime)),
        catalog: Catalog::new(admins, items).with_max_page_size(cfg.max_page_size),
    });

    let sigint = install_handler(SignalKind::interrupt(), "SIGINT")?;
    let sigterm = install_handler(SignalKind::terminate(), "SIGTERM")?;

    let listener = TcpListener::bind(cfg.public_address)
        .await
        .context(BindSnafu {
            addr: cfg.public_address,
        })?;
    info!("Listening on {}.", cfg.public_address);

    axum::serve(listener, make_router(state))
        .with_graceful_shutdown(shutdown_signal(sigint, sigterm))
        .await
        .context(ServeSnafu)?;

    info!("hello-cafe shut down.");
    Ok(())
}

/// Parse our configuration, set up logging & serve
///
/// Logging has to be configured *before* we call [serve], since it's instrumented.
async fn go_async(
    opts: CliOpts,
    bootstrap_logging_guard: tracing::dispatcher::DefaultGuard,
) -> Result<()> {
    #[allow(clippy::type_complexity)]
    fn go_async1(
        opts: &CliOpts,
    ) -> Result<(ConfigV1, Box<dyn Layer<Registry> + Send + Sync>, EnvFilter)> {
        let cfg = parse_config(&opts.cfg)?;
        let (formatter, filter) = configure_logging(&opts.log_opts)?;
        Ok((cfg, formatter, filter))
    }

    match go_async1(&opts) {
        Ok((cfg, formatter, filter)) => {
            // Nb. this can only be invoked once!
            tracing::subscriber::set_global_default(
                Registry::default().with(formatter).with(filter),
            )
            .context(SubscriberSnafu)?;
            drop(bootstrap_logging_guard);

            info!("hello-cafe version {} starting.", crate_version!());

            serve(opts, cfg).await
        }
        Err(err) => {
            error!("While configuring hello-cafe: {err:?}");
            Err(err)
        }
    }
}

fn main() -> Result<()> {
    // Most of hello-cafed's configuration is read from file; the command-line options govern where
    // to find that file, the token secret (which one may prefer not to write down) & logging.
    let opts = CliOpts::new(
        Command::new("hello-cafed")
            .version(crate_version!())
            .author(crate_authors!())
            .about("A catalog service for cafe owners")
            .long_about(
                "`hello-cafed` serves the hello-cafe API: admin sign-up & sign-in, plus a \
                 per-admin catalog of menu items.",
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .num_args(1)
                    .value_parser(value_parser!(PathBuf))
                    .env("CAFE_CONFIG")
                    .help(
                        "path (absolute or relative to the process' current directory) to a \
                         configuration file",
                    ),
            )
            .arg(
                Arg::new("debug")
                    .short('D')
                    .long("debug")
                    .num_args(0)
                    .action(ArgAction::SetTrue)
                    .env("CAFE_DEBUG")
                    .help("produce debug output"),
            )
            .arg(
                Arg::new("log-filter")
                    .long("log-filter")
                    .num_args(1)
                    .help("tracing filter directives (e.g. \"hello_cafe=debug,tower_http=info\")"),
            )
            .arg(
                Arg::new("plain")
                    .short('p')
                    .long("plain")
                    .num_args(0)
                    .action(ArgAction::SetTrue)
                    .env("CAFE_PLAIN")
                    .help("log in human-readable format, not JSON/structured logging"),
            )
            .arg(
                Arg::new("quiet")
                    .short('q')
                    .long("quiet")
                    .num_args(0)
                    .action(ArgAction::SetTrue)
                    .env("CAFE_QUIET")
                    .help("produce only error output"),
            )
            .arg(
                Arg::new("token-secret")
                    .long("token-secret")
                    .num_args(1)
                    .env("CAFE_TOKEN_SECRET")
                    .hide_env_values(true)
                    .help("the secret with which access tokens are signed; overrides the configuration file"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .num_args(0)
                    .action(ArgAction::SetTrue)
                    .env("CAFE_VERBOSE")
                    .help("produce prolix output"),
            )
            .get_matches(),
    )?;

    // Things can go wrong before we've parsed our configuration & set up logging properly; log
    // those to stderr via a *temporary* subscriber.
    let bootstrap_subscriber = Registry::default()
        .with(fmt::Layer::default().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(opts.log_opts.level.into())
                .from_env()
                .context(EnvFilterSnafu)?,
        );
    let bootstrap_logging_guard = tracing::subscriber::set_default(bootstrap_subscriber);
    debug!("Temporarily logging to stderr while initializing.");

    tokio::runtime::Runtime::new()
        .context(TokioRuntimeSnafu)?
        .block_on(go_async(opts, bootstrap_logging_guard))
}

#[cfg(test)]
mod test {
    use super::*;

    use std::{path::Path, str::FromStr};

    #[test]
    fn parse_minimal_config() {
        let cfg = match toml::from_str::<Configuration>("version = \"1\"\n") {
            Ok(Configuration::V1(cfg)) => cfg,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(cfg.public_address, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(matches!(cfg.storage_config, StorageConfig::Memory));
        assert!(cfg.token_secret.is_insecure());
        assert_eq!(cfg.token_lifetime, 1200);
        assert!(!cfg.overrides_token_lifetime());
        assert_eq!(cfg.max_page_size, 100);
    }

    #[test]
    fn parse_sqlite_config() {
        let text = r#"
version = "1"
public-address = "127.0.0.1:9000"
token-secret = "a much better secret"
token-lifetime = 60
max-page-size = 25

[storage-config]
kind = "sqlite"
path = "/var/lib/hello-cafe/cafe.db"
"#;
        let cfg = match toml::from_str::<Configuration>(text) {
            Ok(Configuration::V1(cfg)) => cfg,
            Err(err) => panic!("{err}"),
        };
        assert_eq!(cfg.public_address.port(), 9000);
        assert!(!cfg.token_secret.is_insecure());
        assert_eq!(cfg.token_lifetime, 60);
        assert!(cfg.overrides_token_lifetime());
        assert_eq!(cfg.max_page_size, 25);
        match cfg.storage_config {
            StorageConfig::Sqlite { path } => {
                assert_eq!(path, Path::new("/var/lib/hello-cafe/cafe.db"))
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn missing_explicit_config() {
        let pth = PathBuf::from_str("/no/such/hello-cafe.toml").unwrap();
        assert!(matches!(
            parse_config(&Some(pth)),
            Err(Error::ConfigNotFound { .. })
        ));
    }
}
