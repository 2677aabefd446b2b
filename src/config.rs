//! Configuration management.
//!
//! The node is configured entirely from the command line (with environment
//! fallbacks); there is no persisted on-disk state beyond the optional
//! resource-catalog file, which the module only ever reads.

use clap::builder::TypedValueParser as _;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the FOM REST node.
#[derive(Parser, Clone, Debug)]
#[command(name = "fom-rest-node")]
#[command(about = "REST control node for a FOM laboratory instrument", long_about = None)]
pub struct Args {
    /// Bind address for the REST interface.
    #[arg(long, env = "FOM_NODE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port for the REST interface.
    #[arg(long, env = "FOM_NODE_PORT", default_value_t = 3019)]
    pub port: u16,

    /// Hostname of the FOM instrument controller.
    #[arg(long, env = "FOM_HOST", default_value = "127.0.0.1")]
    pub fom_host: String,

    /// Port of the FOM instrument controller.
    #[arg(long, env = "FOM_PORT", default_value_t = 8000)]
    pub fom_port: u16,

    /// Optional path to a resource catalog descriptor file.
    #[arg(
        long,
        env = "FOM_RESOURCES",
        value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from)
    )]
    pub resources: Option<PathBuf>,
}

impl Args {
    /// The configured resource-catalog path, treating an empty string the
    /// same as an absent argument.
    pub fn resources_path(&self) -> Option<PathBuf> {
        self.resources
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["fom-rest-node"]).expect("defaults parse");
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 3019);
        assert_eq!(args.fom_host, "127.0.0.1");
        assert_eq!(args.fom_port, 8000);
        assert!(args.resources_path().is_none());
    }

    #[test]
    fn test_empty_resources_arg_means_unconfigured() {
        let args =
            Args::try_parse_from(["fom-rest-node", "--resources", ""]).expect("parse");
        assert!(args.resources_path().is_none());
    }

    #[test]
    fn test_explicit_instrument_target() {
        let args = Args::try_parse_from([
            "fom-rest-node",
            "--fom-host",
            "fom.lab.internal",
            "--fom-port",
            "9100",
        ])
        .expect("parse");
        assert_eq!(args.fom_host, "fom.lab.internal");
        assert_eq!(args.fom_port, 9100);
    }
}
