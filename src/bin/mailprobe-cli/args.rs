use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mailprobe_lib::VerifierConfig;

#[derive(Parser, Debug)]
#[command(name = "mailprobe-cli", version, about)]
pub struct Cli {
    /// adresses à vérifier
    pub emails: Vec<String>,

    /// fichier d'adresses (une par ligne)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// lit des adresses depuis stdin (une par ligne)
    #[arg(long)]
    pub stdin: bool,

    /// format de sortie
    #[arg(long, value_enum, default_value_t = Format::Human)]
    pub format: Format,

    /// écrit le rapport dans un fichier (écriture atomique)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// enveloppe MAIL FROM ("" pour <>)
    #[arg(long = "from", default_value = "test@example.com")]
    pub sender: String,

    /// nom utilisé pour EHLO/HELO
    #[arg(long, default_value = "test.com")]
    pub helo: String,

    /// port SMTP
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// budget connexion + bannière (ms)
    #[arg(long = "connect-timeout", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// délai par commande SMTP (ms)
    #[arg(long = "command-timeout", default_value_t = 10_000)]
    pub command_timeout_ms: u64,

    /// délai de résolution MX (ms)
    #[arg(long = "dns-timeout", default_value_t = 5_000)]
    pub dns_timeout_ms: u64,

    /// nombre d'adresses vérifiées en parallèle
    #[arg(long, default_value_t = 16)]
    pub concurrency: usize,

    /// nombre maximum d'MX interrogés par adresse
    #[arg(long = "max-mx")]
    pub max_mx: Option<usize>,

    /// serveur DNS à utiliser à la place de la configuration système (répétable)
    #[arg(long = "nameserver")]
    pub nameservers: Vec<IpAddr>,

    /// affiche la transcription SMTP (format human)
    #[arg(long)]
    pub transcript: bool,

    /// verbosité des logs (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
    Ndjson,
    Csv,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            sender_address: self.sender.clone(),
            helo_name: self.helo.clone(),
            port: self.port,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            dns_timeout: Duration::from_millis(self.dns_timeout_ms),
            max_concurrent_addresses: self.concurrency,
            max_hosts: self.max_mx,
            nameservers: self.nameservers.clone(),
        }
    }

    pub fn default_log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_config() {
        let cli = Cli::try_parse_from(["mailprobe-cli", "good@example.com"]).unwrap();
        assert_eq!(cli.verifier_config(), VerifierConfig::default());
        assert_eq!(cli.emails, ["good@example.com"]);
    }

    #[test]
    fn maps_flags_onto_config() {
        let cli = Cli::try_parse_from([
            "mailprobe-cli",
            "--from",
            "",
            "--helo",
            "probe.example.org",
            "--connect-timeout",
            "2500",
            "--max-mx",
            "2",
            "--nameserver",
            "9.9.9.9",
            "--format",
            "ndjson",
            "-vv",
        ])
        .unwrap();
        let config = cli.verifier_config();
        assert_eq!(config.sender_address, "");
        assert_eq!(config.helo_name, "probe.example.org");
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_hosts, Some(2));
        assert_eq!(config.nameservers, ["9.9.9.9".parse::<IpAddr>().unwrap()]);
        assert_eq!(cli.format, Format::Ndjson);
        assert_eq!(cli.default_log_level(), "debug");
    }
}
