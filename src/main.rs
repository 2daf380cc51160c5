use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use labrelay_lib::config::{LogConfig, RelayConfig};

#[derive(Parser, Debug)]
#[command(
    name = "labrelay",
    version,
    about = "HTTP relay for serial lab instruments and instrument logs"
)]
struct Cli {
    /// TOML configuration file (defaults to ./labrelay.toml when present).
    #[arg(long, value_name = "PATH", env = "LABRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, value_name = "ADDR")]
    bind: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Log file served on /getvoltage.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Minimum log level (overridden by RUST_LOG).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: log::LevelFilter,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(ip) = self.bind {
            config.bind.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind.set_port(port);
        }
        if let Some(path) = &self.log_file {
            config.log = Some(LogConfig { path: path.clone() });
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();

    let mut config =
        RelayConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);

    labrelay_lib::run(config).await.context("relay failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_bind_and_log_file() {
        let cli = Cli::try_parse_from([
            "labrelay",
            "--bind",
            "127.0.0.1",
            "--port",
            "8081",
            "--log-file",
            "/tmp/voltage.log",
        ])
        .expect("args should parse");

        let mut config = RelayConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.bind.to_string(), "127.0.0.1:8081");
        assert_eq!(config.log.unwrap().path, PathBuf::from("/tmp/voltage.log"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        assert!(Cli::try_parse_from(["labrelay", "--log-level", "loud"]).is_err());
    }
}
