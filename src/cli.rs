use std::path::PathBuf;

use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use selfsigned::{ConfigOption, common_name, not_after, organization};

#[derive(Parser, Debug)]
#[command(version, about = "self-signed TLS credential generator")]
pub struct Args {
    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Generate a certificate and key and print them as PEM
    Generate {
        /// Subject common name (also the subject alternative name)
        #[arg(long, short = 'n')]
        common_name: Option<String>,

        /// Subject organization
        #[arg(long, short = 'o', conflicts_with = "no_organization")]
        organization: Option<String>,

        /// Leave the organization out of the subject
        #[arg(long)]
        no_organization: bool,

        /// End of validity, RFC 3339 (e.g. 2030-01-01T00:00:00Z)
        #[arg(long, value_parser = parse_rfc3339)]
        not_after: Option<OffsetDateTime>,

        /// Path to configuration file (defaults to the user config dir)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print a JSON object with both PEM blocks and certificate details
        #[arg(long)]
        json: bool,
    },
    /// Print details of a PEM certificate read from FILE or stdin
    Inspect {
        file: Option<PathBuf>,
    },
}

fn parse_rfc3339(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

/// Overrides given on the command line, applied after the config file
pub fn flag_options(
    cn: Option<String>,
    org: Option<String>,
    no_organization: bool,
    until: Option<OffsetDateTime>,
) -> Vec<ConfigOption> {
    let mut opts = Vec::new();
    if let Some(cn) = cn {
        opts.push(common_name(cn));
    }
    if let Some(org) = org {
        opts.push(organization(org));
    }
    if no_organization {
        opts.push(ConfigOption::NoOrganization);
    }
    if let Some(t) = until {
        opts.push(not_after(t));
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn generate_flags_parse() {
        let args = Args::try_parse_from([
            "selfsigned",
            "generate",
            "-n",
            "example.com",
            "--not-after",
            "2030-01-01T00:00:00Z",
        ])
        .unwrap();

        match args.sub {
            Cmd::Generate {
                common_name,
                not_after,
                json,
                ..
            } => {
                assert_eq!(common_name.as_deref(), Some("example.com"));
                assert_eq!(not_after.unwrap().year(), 2030);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let res = Args::try_parse_from(["selfsigned", "generate", "--not-after", "tomorrow"]);
        assert!(res.is_err());
    }

    #[test]
    fn organization_flags_conflict() {
        let res = Args::try_parse_from([
            "selfsigned",
            "generate",
            "-o",
            "Acme",
            "--no-organization",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn flags_become_options_in_order() {
        let opts = flag_options(Some("a.example".into()), None, true, None);
        assert_eq!(
            opts,
            vec![common_name("a.example"), ConfigOption::NoOrganization]
        );
    }
}
