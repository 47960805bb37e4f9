mod cli;

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use serde::Serialize;

use selfsigned::config::default_config_path;
use selfsigned::{CertDetails, CertificateConfig, ConfigFile, inspect_cert_pem, tls_config_from};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    match args.sub {
        cli::Cmd::Generate {
            common_name,
            organization,
            no_organization,
            not_after,
            config,
            json,
        } => {
            let mut opts = load_config_file(config)?.options();
            opts.extend(cli::flag_options(
                common_name,
                organization,
                no_organization,
                not_after,
            ));
            handle_generate(CertificateConfig::from_options(opts), json)
        }
        cli::Cmd::Inspect { file } => handle_inspect(file),
    }
}

/// An explicit path must exist; the default path is optional
fn load_config_file(explicit: Option<PathBuf>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        let file = ConfigFile::load(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        info!("Using config from: {}", path.display());
        return Ok(file);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let file = ConfigFile::load(&path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            info!("Using config from: {}", path.display());
            Ok(file)
        }
        _ => Ok(ConfigFile::default()),
    }
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    certificate_pem: &'a str,
    private_key_pem: &'a str,
    details: CertDetails,
}

fn handle_generate(config: CertificateConfig, json: bool) -> Result<()> {
    let tls = tls_config_from(&config).context("Failed to generate self-signed credential")?;
    let cert = tls
        .certificate()
        .context("Generated TLS config holds no certificate")?;

    if json {
        let output = GenerateOutput {
            certificate_pem: &cert.cert_pem,
            private_key_pem: &cert.key_pem,
            details: CertDetails::new(&cert.leaf, time::OffsetDateTime::now_utc()),
        };
        let rendered =
            serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{rendered}");
    } else {
        print!("{}{}", cert.cert_pem, cert.key_pem);
    }

    Ok(())
}

fn handle_inspect(file: Option<PathBuf>) -> Result<()> {
    let pem = match file {
        Some(path) => fs::read(&path)
            .with_context(|| format!("Failed to read certificate file {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read certificate from stdin")?;
            buf
        }
    };

    let details = inspect_cert_pem(&pem).context("Failed to inspect certificate")?;
    let rendered = serde_json::to_string_pretty(&details).context("Failed to serialize details")?;
    println!("{rendered}");
    Ok(())
}
