use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};
use punch_rs::PunchConfig;

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_SERVERS: [&str; 3] = [
    "stun.syncthing.net:3478",
    "stun.nextcloud.com:3478",
    "stun.cloudflare.com:3478",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunServer {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for StunServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub servers: Vec<StunServer>,
    // no --server given, the operator picks from the list
    pub choose_server: bool,
    pub peer: Option<SocketAddr>,
    pub discovery_timeout: Duration,
    pub probe_interval: Duration,
    pub max_attempts: u32,
    pub keepalive_interval: Duration,
}

pub fn parse_server(s: &str) -> Result<StunServer, String> {
    let (host, port) = match s.rsplit_once(':') {
        Some(v) => v,
        None => return Err(format!("{}: expected host:port", s)),
    };

    if host.is_empty() {
        return Err(format!("{}: empty host", s));
    }

    let port = match port.parse::<u16>() {
        Ok(0) => return Err("port 0 not allow".to_string()),
        Ok(v) => v,
        Err(e) => return Err(format!("{}", e)),
    };

    Ok(StunServer {
        host: host.to_string(),
        port,
    })
}

/// Accepts "IP PORT" or "IP:PORT", dotted-quad ipv4 and port 1-65535.
pub fn parse_peer(s: &str) -> Result<SocketAddr, String> {
    let s = s.trim();
    let (ip, port) = match s.split_once(char::is_whitespace) {
        Some((ip, port)) => (ip, port.trim()),
        None => match s.rsplit_once(':') {
            Some(v) => v,
            None => return Err(format!("{}: expected IP PORT", s)),
        },
    };

    let ip = match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v)) => v,
        Ok(IpAddr::V6(_)) => return Err("ipv6 not support".to_string()),
        Err(e) => return Err(format!("{}", e)),
    };
    // wildcard is not a peer
    if ip.is_unspecified() {
        return Err("0.0.0.0 not allow".to_string());
    }

    let port = match port.parse::<u16>() {
        Ok(0) => return Err("port 0 not allow".to_string()),
        Ok(v) => v,
        Err(e) => return Err(format!("{}", e)),
    };

    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

impl Config {
    pub fn command() -> Command<'static> {
        Command::new(APP_NAME)
            .version(APP_VERSION)
            .about("discover the external udp endpoint and punch a hole to a peer")
            .arg(
                Arg::new("server")
                    .long("server")
                    .takes_value(true)
                    .action(ArgAction::Append)
                    .help("stun server host:port, may repeat")
                    .value_parser(ValueParser::new(parse_server)),
            )
            .arg(
                Arg::new("peer")
                    .long("peer")
                    .takes_value(true)
                    .help("peer ip:port, asked on stdin when missing")
                    .value_parser(ValueParser::new(parse_peer)),
            )
            .arg(
                Arg::new("timeout_ms")
                    .long("timeout-ms")
                    .takes_value(true)
                    .default_value("3000")
                    .help("stun response timeout")
                    .value_parser(clap::value_parser!(u64).range(1..)),
            )
            .arg(
                Arg::new("interval_ms")
                    .long("interval-ms")
                    .takes_value(true)
                    .default_value("400")
                    .help("punch probe interval")
                    .value_parser(clap::value_parser!(u64).range(1..)),
            )
            .arg(
                Arg::new("max_attempts")
                    .long("max-attempts")
                    .takes_value(true)
                    .default_value("300")
                    .help("punch probes before giving up")
                    .value_parser(clap::value_parser!(u32)),
            )
            .arg(
                Arg::new("keepalive_secs")
                    .long("keepalive-secs")
                    .takes_value(true)
                    .default_value("5")
                    .help("keepalive interval while waiting for the peer address")
                    .value_parser(clap::value_parser!(u64).range(1..)),
            )
    }

    pub fn from_matches(app: &ArgMatches) -> Self {
        let servers: Vec<StunServer> = match app.get_many::<StunServer>("server") {
            Some(v) => v.cloned().collect(),
            None => vec![],
        };
        let choose_server = servers.is_empty();
        let servers = match choose_server {
            true => DEFAULT_SERVERS
                .iter()
                .filter_map(|x| parse_server(x).ok())
                .collect(),
            false => servers,
        };

        let timeout_ms: u64 = *app.get_one("timeout_ms").expect("wrong timeout");
        let interval_ms: u64 = *app.get_one("interval_ms").expect("wrong interval");
        let max_attempts: u32 = *app.get_one("max_attempts").expect("wrong max attempts");
        let keepalive_secs: u64 = *app.get_one("keepalive_secs").expect("wrong keepalive");

        Self {
            servers,
            choose_server,
            peer: app.get_one::<SocketAddr>("peer").copied(),
            discovery_timeout: Duration::from_millis(timeout_ms),
            probe_interval: Duration::from_millis(interval_ms),
            max_attempts,
            keepalive_interval: Duration::from_secs(keepalive_secs),
        }
    }

    pub fn punch_config(&self) -> PunchConfig {
        PunchConfig::new(self.probe_interval, self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec![APP_NAME];
        argv.extend_from_slice(args);
        let app = Config::command().try_get_matches_from(argv).unwrap();
        Config::from_matches(&app)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert!(config.choose_server);
        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.servers[2].to_string(), "stun.cloudflare.com:3478");
        assert_eq!(config.peer, None);
        assert_eq!(config.probe_interval, Duration::from_millis(400));
        assert_eq!(config.max_attempts, 300);
        assert_eq!(config.discovery_timeout, Duration::from_secs(3));
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_values() {
        let config = parse(&[
            "--server",
            "stun.example.org:19302",
            "--server",
            "10.0.0.1:3478",
            "--peer",
            "203.0.113.5:54321",
            "--interval-ms",
            "1000",
            "--max-attempts",
            "10",
        ]);
        assert!(!config.choose_server);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].host, "stun.example.org");
        assert_eq!(config.peer, Some("203.0.113.5:54321".parse().unwrap()));

        let punch = config.punch_config();
        assert_eq!(punch.probe_interval, Duration::from_millis(1000));
        assert_eq!(punch.max_attempts, 10);
    }

    #[test]
    fn test_bad_peer_arg() {
        let argv = [APP_NAME, "--peer", "0.0.0.0:5000"];
        assert!(Config::command().try_get_matches_from(argv).is_err());
    }

    #[test]
    fn test_parse_peer() {
        let expected: SocketAddr = "203.0.113.5:54321".parse().unwrap();
        assert_eq!(parse_peer("203.0.113.5 54321"), Ok(expected));
        assert_eq!(parse_peer(" 203.0.113.5:54321\n"), Ok(expected));

        assert!(parse_peer("203.0.113.5").is_err());
        assert!(parse_peer("203.0.113.5 0").is_err());
        assert!(parse_peer("203.0.113.5 65536").is_err());
        assert!(parse_peer("0.0.0.0 4000").is_err());
        assert!(parse_peer("::1 4000").is_err());
        assert!(parse_peer("example.com 4000").is_err());
    }

    #[test]
    fn test_parse_server() {
        assert_eq!(
            parse_server("stun.cloudflare.com:3478"),
            Ok(StunServer {
                host: "stun.cloudflare.com".to_string(),
                port: 3478
            })
        );
        assert!(parse_server("stun.cloudflare.com").is_err());
        assert!(parse_server(":3478").is_err());
        assert!(parse_server("host:0").is_err());
    }
}
