use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use netscout_core::{AppConfig, IpFamily, LogFormat, LoggingConfig, MdnsSettings, SsdpSettings};
use netscout_discovery::{
    ssdp, Discover, Discoverer, MdnsConfig, MdnsResolver, Resolver, SsdpConfig, SsdpResolver,
};
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{filter::Directive, EnvFilter};

/// Buffer between the discovery task and the printer
const OUTPUT_CAPACITY: usize = 16;

/// netscout - discover services on the local network over mDNS and SSDP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Discovery timeout in milliseconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "NETSCOUT_LOG_LEVEL")]
    level: Option<String>,

    /// Development mode: debug logging
    #[arg(short = 'D', long, global = true)]
    development: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Browse for a DNS-SD service type over multicast DNS
    Mdns(MdnsArgs),
    /// Search for UPnP devices over SSDP
    Ssdp(SsdpArgs),
}

#[derive(ClapArgs, Debug)]
struct MdnsArgs {
    /// Service name, e.g. _http._tcp
    #[arg(short, long)]
    service: Option<String>,

    /// Browse domain
    #[arg(long)]
    domain: Option<String>,

    /// Interface to browse on (repeatable)
    #[arg(short, long = "iface")]
    iface: Vec<String>,

    /// Use IPv4 only
    #[arg(long, conflicts_with = "ipv6")]
    ipv4: bool,

    /// Use IPv6 only
    #[arg(long)]
    ipv6: bool,
}

#[derive(ClapArgs, Debug)]
struct SsdpArgs {
    /// Seconds to wait for responses in each round
    #[arg(short, long)]
    wait: Option<u64>,

    /// Number of search rounds
    #[arg(short, long)]
    retry: Option<u32>,

    /// Local address to search from (ip or ip:port)
    #[arg(long)]
    local_addr: Option<String>,

    /// Search target (ST header)
    #[arg(long)]
    target: Option<String>,

    /// Only report devices whose SERVER header contains this
    #[arg(long)]
    server_contains: Option<String>,

    /// Only report devices whose USN contains this
    #[arg(long)]
    usn_contains: Option<String>,

    /// Log every datagram sent and received
    #[arg(long)]
    trace_packets: bool,
}

impl Args {
    /// Applies command line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(timeout) = self.timeout {
            config.discovery.timeout_ms = timeout;
        }
        if let Some(level) = &self.level {
            config.logging.level = level.clone();
        }
        if self.development {
            config.logging.development = true;
        }

        match &self.command {
            Command::Mdns(args) => args.apply(&mut config.mdns),
            Command::Ssdp(args) => args.apply(&mut config.ssdp),
        }
    }
}

impl MdnsArgs {
    fn apply(&self, settings: &mut MdnsSettings) {
        if let Some(service) = &self.service {
            settings.service = service.clone();
        }
        if let Some(domain) = &self.domain {
            settings.domain = domain.clone();
        }
        if !self.iface.is_empty() {
            settings.interfaces = self.iface.clone();
        }
        if self.ipv4 {
            settings.ip_family = IpFamily::V4;
        } else if self.ipv6 {
            settings.ip_family = IpFamily::V6;
        }
    }
}

impl SsdpArgs {
    fn apply(&self, settings: &mut SsdpSettings) {
        if let Some(wait) = self.wait {
            settings.wait_secs = wait;
        }
        if let Some(retry) = self.retry {
            settings.retry = retry;
        }
        if let Some(local_addr) = &self.local_addr {
            settings.local_address = local_addr.clone();
        }
        if let Some(target) = &self.target {
            settings.search_target = target.clone();
        }
        if self.server_contains.is_some() {
            settings.server_contains = self.server_contains.clone();
        }
        if self.usn_contains.is_some() {
            settings.usn_contains = self.usn_contains.clone();
        }
        if self.trace_packets {
            settings.trace_packets = true;
        }
    }
}

/// Builds the log filter: configured level, then `RUST_LOG`, then the
/// SSDP wire target when packet tracing is on.
fn log_filter(logging: &LoggingConfig, trace_packets: bool) -> Result<EnvFilter> {
    let level = logging.parse_level()?;
    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    if trace_packets {
        let directive = format!("{}=debug", ssdp::WIRE_TARGET)
            .parse::<Directive>()
            .context("Invalid packet trace directive")?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

fn init_logging(logging: &LoggingConfig, trace_packets: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(logging, trace_packets)?)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

/// Runs one discovery, printing results as they arrive.
async fn run<R>(
    resolver: R,
    timeout: Duration,
    cancel: &CancellationToken,
    json: bool,
) -> Result<usize>
where
    R: Resolver,
    R::Item: Display + Serialize,
{
    let discover = Discover::new(resolver).with_timeout(timeout);
    let (tx, mut rx) = mpsc::channel(OUTPUT_CAPACITY);

    let printer = async {
        let mut printed = 0usize;
        while let Some(item) = rx.recv().await {
            let mut stdout = std::io::stdout().lock();
            if json {
                serde_json::to_writer(&mut stdout, &item)?;
                writeln!(stdout)?;
            } else {
                writeln!(stdout, "{}", item)?;
            }
            stdout.flush()?;
            printed += 1;
        }
        Ok::<_, anyhow::Error>(printed)
    };

    let (result, printed) = tokio::join!(discover.discover(cancel, tx), printer);
    result.context("Discovery failed")?;
    printed.context("Failed to write results")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration: files, environment, then flags
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let trace_packets = matches!(args.command, Command::Ssdp(_)) && config.ssdp.trace_packets;
    init_logging(&config.logging, trace_packets)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping discovery");
            interrupt.cancel();
        }
    });

    let timeout = config.discovery.timeout();
    let found = match &args.command {
        Command::Mdns(_) => {
            let mdns = MdnsConfig::from_settings(&config.mdns).context("Invalid mDNS options")?;
            run(MdnsResolver::new(mdns), timeout, &cancel, args.json).await?
        }
        Command::Ssdp(_) => {
            let ssdp = SsdpConfig::from_settings(&config.ssdp).context("Invalid SSDP options")?;
            run(SsdpResolver::new(ssdp), timeout, &cancel, args.json).await?
        }
    };

    info!(found, "Discovery complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> (Args, AppConfig) {
        let args = Args::try_parse_from(argv).unwrap();
        let mut config = AppConfig::default();
        args.apply(&mut config);
        (args, config)
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_mdns_flags() {
        let (args, config) = parse(&[
            "netscout", "mdns", "--service", "_ipp._tcp", "-i", "eth0", "--iface", "wlan0", "--ipv4",
        ]);

        assert!(matches!(args.command, Command::Mdns(_)));
        assert_eq!(config.mdns.service, "_ipp._tcp");
        assert_eq!(config.mdns.interfaces, vec!["eth0", "wlan0"]);
        assert_eq!(config.mdns.ip_family, IpFamily::V4);
        assert_eq!(config.mdns.domain, "local.");
    }

    #[test]
    fn test_ip_family_flags_conflict() {
        assert!(Args::try_parse_from(["netscout", "mdns", "--ipv4", "--ipv6"]).is_err());
    }

    #[test]
    fn test_ssdp_flags() {
        let (_, config) = parse(&[
            "netscout",
            "ssdp",
            "--wait",
            "1",
            "--retry",
            "3",
            "--server-contains",
            "Sonos",
            "--trace-packets",
        ]);

        assert_eq!(config.ssdp.wait_secs, 1);
        assert_eq!(config.ssdp.retry, 3);
        assert_eq!(config.ssdp.server_contains.as_deref(), Some("Sonos"));
        assert!(config.ssdp.usn_contains.is_none());
        assert!(config.ssdp.trace_packets);
        assert_eq!(config.ssdp.search_target, "upnp:rootdevice");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let (args, config) = parse(&["netscout", "ssdp", "--timeout", "5000", "-D", "--json"]);

        assert!(args.json);
        assert_eq!(config.discovery.timeout_ms, 5000);
        assert!(config.logging.development);
    }

    #[test]
    fn test_trace_packets_enables_wire_logging() {
        let (_, config) = parse(&["netscout", "ssdp", "--trace-packets"]);

        let filter = log_filter(&config.logging, config.ssdp.trace_packets).unwrap();
        assert!(filter.to_string().contains("netscout::ssdp::wire=debug"));

        let filter = log_filter(&config.logging, false).unwrap();
        assert!(!filter.to_string().contains("netscout::ssdp::wire"));
    }

    #[test]
    fn test_flags_override_loaded_config() {
        let mut config = AppConfig::from_yaml("ssdp:\n  wait_secs: 4\n  retry: 2\n").unwrap();
        let args = Args::try_parse_from(["netscout", "ssdp", "--retry", "5"]).unwrap();
        args.apply(&mut config);

        assert_eq!(config.ssdp.wait_secs, 4);
        assert_eq!(config.ssdp.retry, 5);
    }
}
