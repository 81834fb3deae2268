use anyhow::{Context, bail};
use clap::Parser;
use pichord::{Resolution, ResolutionSet};
use std::{fmt, path::PathBuf, time::Duration};

/// Runtime configuration for the `pichord-server` binary.
///
/// Every value can be given as a CLI flag or through the environment (a
/// `.env` file is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pichord-server",
    version,
    about = "Claims digits of pi for participants and serves the chord-diagram wallpapers"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Text file holding the decimal expansion, starting at `3.`. A missing
    /// file degrades to an all-zero sequence.
    ///
    /// Environment variable: `DIGITS_PATH`
    #[arg(long, env = "DIGITS_PATH", default_value = "data/pi.txt")]
    pub digits_path: PathBuf,

    /// JSON snapshot of the assignment table. Assignments are kept in memory
    /// only when unset.
    ///
    /// Environment variable: `DATA_PATH`
    #[arg(long, env = "DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// Directory the published wallpapers are mirrored to.
    ///
    /// Environment variable: `WALLPAPER_DIR`
    #[arg(long, env = "WALLPAPER_DIR")]
    pub wallpaper_dir: Option<PathBuf>,

    /// Externally visible origin used to build wallpaper URLs.
    ///
    /// Environment variable: `PUBLIC_BASE_URL`
    #[arg(long, env = "PUBLIC_BASE_URL", default_value_t = String::from("http://localhost:8080"))]
    pub public_base_url: String,

    /// Comma-separated `WIDTHxHEIGHT` list rendered on every pass.
    ///
    /// Environment variable: `RESOLUTIONS`
    #[arg(
        long,
        env = "RESOLUTIONS",
        default_value = "1170x2532,1290x2796,1125x2436,750x1334"
    )]
    pub resolutions: String,

    /// Resolution served as `latest`.
    ///
    /// Environment variable: `LATEST_RESOLUTION`
    #[arg(long, env = "LATEST_RESOLUTION", default_value = "1170x2532")]
    pub latest_resolution: String,

    /// HS256 secret used to verify participant bearer tokens.
    ///
    /// Environment variable: `JWT_SECRET`
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Required `iss` claim, if any.
    ///
    /// Environment variable: `JWT_ISSUER`
    #[arg(long, env = "JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Required `aud` claim, if any.
    ///
    /// Environment variable: `JWT_AUDIENCE`
    #[arg(long, env = "JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// Bearer token for `/admin/*`. Admin routes answer 404 when unset.
    ///
    /// Environment variable: `ADMIN_TOKEN`
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Seconds between background re-renders; `0` disables them.
    ///
    /// Environment variable: `RENDER_INTERVAL_SECS`
    #[arg(long, env = "RENDER_INTERVAL_SECS", default_value_t = 86_400)]
    pub render_interval_secs: u64,

    /// Seconds to wait for background tasks after a shutdown signal.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

/// Token verification settings.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub digits_path: PathBuf,
    pub data_path: Option<PathBuf>,
    pub wallpaper_dir: Option<PathBuf>,
    pub public_base_url: String,
    pub resolutions: ResolutionSet,
    pub jwt: JwtConfig,
    pub admin_token: Option<String>,
    pub render_interval: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server_addr", &self.server_addr)
            .field("digits_path", &self.digits_path)
            .field("data_path", &self.data_path)
            .field("wallpaper_dir", &self.wallpaper_dir)
            .field("public_base_url", &self.public_base_url)
            .field("resolutions", &self.resolutions)
            .field("jwt", &self.jwt)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("render_interval", &self.render_interval)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

/// Shortest accepted HS256 secret, in bytes.
const MIN_SECRET_LEN: usize = 32;

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let resolutions = parse_resolutions(&args.resolutions, &args.latest_resolution)?;

        let admin_token = args.admin_token.filter(|t| !t.trim().is_empty());
        let render_interval =
            (args.render_interval_secs > 0).then(|| Duration::from_secs(args.render_interval_secs));

        Ok(Self {
            server_addr: args.server_addr,
            digits_path: args.digits_path,
            data_path: args.data_path,
            wallpaper_dir: args.wallpaper_dir,
            public_base_url: args.public_base_url,
            resolutions,
            jwt: JwtConfig {
                secret: args.jwt_secret,
                issuer: args.jwt_issuer,
                audience: args.jwt_audience,
            },
            admin_token,
            render_interval,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

fn parse_resolutions(list: &str, latest: &str) -> anyhow::Result<ResolutionSet> {
    let resolutions = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<Resolution>)
        .collect::<Result<Vec<_>, _>>()
        .context("invalid RESOLUTIONS")?;
    if resolutions.is_empty() {
        bail!("RESOLUTIONS must name at least one resolution");
    }
    ResolutionSet::new(resolutions, latest.trim()).context("invalid resolution set")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn args(extra: &[&str]) -> CliArgs {
        let base = ["pichord-server", "--jwt-secret", SECRET];
        CliArgs::try_parse_from(base.iter().chain(extra)).unwrap()
    }

    #[test]
    fn defaults_validate() {
        let config = ServerConfig::try_from(args(&[])).unwrap();
        assert_eq!(config.resolutions, ResolutionSet::default());
        assert_eq!(config.render_interval, Some(Duration::from_secs(86_400)));
        assert_eq!(config.admin_token, None);
        assert!(!format!("{config:?}").contains(SECRET));
    }

    #[test]
    fn zero_interval_disables_scheduler() {
        let config = ServerConfig::try_from(args(&["--render-interval-secs", "0"])).unwrap();
        assert_eq!(config.render_interval, None);
    }

    #[test]
    fn rejects_short_secret() {
        let args = CliArgs::try_parse_from(["pichord-server", "--jwt-secret", "short"]).unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_bad_resolutions() {
        for extra in [
            ["--resolutions", "100x"].as_slice(),
            ["--resolutions", "100x100", "--latest-resolution", "200x200"].as_slice(),
            ["--resolutions", ","].as_slice(),
        ] {
            assert!(ServerConfig::try_from(args(extra)).is_err(), "{extra:?}");
        }
    }

    #[test]
    fn custom_resolutions() {
        let config = ServerConfig::try_from(args(&[
            "--resolutions",
            "100x200, 300x400",
            "--latest-resolution",
            "300x400",
        ]))
        .unwrap();
        assert_eq!(config.resolutions.latest(), "300x400");
        assert_eq!(config.resolutions.len(), 2);
    }
}
