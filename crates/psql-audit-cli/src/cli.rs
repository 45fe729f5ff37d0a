//! Command line arguments.

use clap::Parser;
use psql_audit_core::ProxyConfig;

#[derive(Parser, Debug)]
#[command(name = "psql-audit", version, about = "Passive auditing proxy for PostgreSQL")]
pub struct Cli {
    /// Address psql-audit listens on
    #[arg(short = 'l', long = "listen", env = "PSQL_AUDIT_LISTEN", default_value = "0.0.0.0:6432")]
    pub listen: String,

    /// PostgreSQL server target
    #[arg(short = 'd', long = "dial", env = "PSQL_AUDIT_DIAL", default_value = "0.0.0.0:5432")]
    pub dial: String,

    /// Set whenever the server supports TLS connections
    #[arg(long, env = "PSQL_AUDIT_TLS", default_value_t = false)]
    pub tls: bool,
}

impl Cli {
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig::new(self.listen.clone(), self.dial.clone(), self.tls)
    }
}
