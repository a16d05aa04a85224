use std::borrow::Cow;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches, Parser};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::models::{ArtifactRoot, ServerConfig, Variant};
use crate::AppState;

const ARCHIVE_ABOUT: &str = "\
Start listening for artifacts GET requests using ROOT as the server root.

This server is just serving static .tar.gz files unless \"latest\" is present
as the base name in the URL path. If that is the case, the most recently
changed file from the relevant directory is returned by sending 303 See Other.";

const LATEST_ONLY_ABOUT: &str = "\
Start listening for GET requests using ROOT as the server root.

Only URL paths with \"latest\" as the base name are accepted. The most recently
changed file from the relevant directory is returned by sending
307 Temporary Redirect; every other file name is forbidden.";

#[derive(Debug, Parser)]
pub struct Args {
    /// Network address to listen on
    #[arg(long, value_name = "ADDR", default_value = "localhost:9876")]
    pub addr: String,

    /// Print verbose output to stderr
    #[arg(long)]
    pub verbose: bool,

    /// Directory to serve artifacts from
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,
}

impl Args {
    pub fn into_config(self, variant: Variant) -> ServerConfig {
        ServerConfig {
            addr: self.addr,
            verbose: self.verbose,
            root: ArtifactRoot::new(self.root),
            variant,
        }
    }
}

/// Long flags that are also accepted with a single dash (`-addr`, `-verbose=...`).
const SINGLE_DASH_FLAGS: &[&str] = &["addr", "verbose"];

/// Rewrite single-dash long flags to the `--` form clap expects.
///
/// The program name and everything after a bare `--` pass through untouched.
pub fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut after_terminator = false;

    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || after_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                after_terminator = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                    if SINGLE_DASH_FLAGS.contains(&name) {
                        OsString::from(format!("-{}", text))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

/// Listen address with an empty host (`:9876`) meaning every IPv4 interface
pub fn listen_addr(addr: &str) -> Cow<'_, str> {
    if addr.starts_with(':') {
        Cow::Owned(format!("0.0.0.0{}", addr))
    } else {
        Cow::Borrowed(addr)
    }
}

/// Parse the process arguments for `variant`.
///
/// Usage errors, including a missing or extra ROOT, print usage and exit
/// with status 2.
pub fn parse_args(variant: Variant) -> ServerConfig {
    let about = match variant {
        Variant::Archive => ARCHIVE_ABOUT,
        Variant::LatestOnly => LATEST_ONLY_ABOUT,
    };
    let matches = Args::command()
        .about(about)
        .get_matches_from(normalize_flags(std::env::args_os()));
    Args::from_arg_matches(&matches)
        .unwrap_or_else(|e| e.exit())
        .into_config(variant)
}

/// Install the stderr subscriber when verbose; otherwise events go nowhere.
pub fn init_logging(verbose: bool) {
    if !verbose {
        return;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artifacts_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Bind and serve until the process is killed.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    if !config.root.path().is_dir() {
        warn!("Root {} is not a directory", config.root.path().display());
    }

    let state = AppState::new(config.root.clone(), config.variant);
    let app = crate::app(state);

    let listener = TcpListener::bind(listen_addr(&config.addr).as_ref())
        .await
        .with_context(|| format!("failed to listen on {}", config.addr))?;
    info!(
        "{} server listening on {}, serving {}",
        config.variant,
        listener.local_addr()?,
        config.root.path().display()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Entry point shared by both binaries
pub async fn run(variant: Variant) -> anyhow::Result<()> {
    let config = parse_args(variant);
    init_logging(config.verbose);
    serve(config).await
}
