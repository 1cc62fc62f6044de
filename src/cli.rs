use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Log each build step.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and sign a certificate signing request.
    Generate(GenerateArgs),
    /// Check a request's signature and print its contents.
    Verify(VerifyArgs),
    /// Issue a certificate for a request.
    Sign(SignArgs),
    /// Print the details of a certificate.
    InspectCert(InspectCertArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// TOML request file; flags override its values.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// RSASSA-PKCS1-V1_5, RSA-PSS or ECDSA.
    #[arg(long)]
    pub algorithm: Option<String>,
    /// SHA-1, SHA-256, SHA-384 or SHA-512.
    #[arg(long)]
    pub hash: Option<String>,
    /// ECDSA curve: P-256, P-384 or P-521.
    #[arg(long)]
    pub curve: Option<String>,
    /// RSA modulus length in bits.
    #[arg(long)]
    pub modulus_length: Option<usize>,
    #[arg(long = "cn")]
    pub common_name: Option<String>,
    #[arg(long = "org")]
    pub organization: Option<String>,
    #[arg(long = "ou")]
    pub organizational_unit: Option<String>,
    #[arg(long)]
    pub locality: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    /// Alternative name as TYPE=VALUE, e.g. DNSName=www.example.com. Repeatable.
    #[arg(long = "san")]
    pub alt_names: Vec<String>,
    /// PEM PKCS#8 private key to import instead of generating one.
    #[arg(long)]
    pub private_key: Option<PathBuf>,
    /// PEM SPKI public key matching --private-key.
    #[arg(long)]
    pub public_key: Option<PathBuf>,
    /// Where to write the generated private key.
    #[arg(long)]
    pub key_out: Option<PathBuf>,
    /// Output file; stdout when omitted.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Pem)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// PEM encoded request.
    pub csr: PathBuf,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    #[arg(long)]
    pub csr: PathBuf,
    /// Signer PEM PKCS#8 private key.
    #[arg(long)]
    pub key: PathBuf,
    /// Signer certificate; required unless --self-sign.
    #[arg(long)]
    pub cert: Option<PathBuf>,
    #[arg(long)]
    pub self_sign: bool,
    #[arg(long)]
    pub days: Option<i64>,
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectCertArgs {
    /// PEM encoded certificate.
    pub cert: PathBuf,
    /// Issuer certificate to check the signature against; a self-issued
    /// certificate is checked against its own key.
    #[arg(long)]
    pub issuer: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pem,
    Base64,
    Der,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::parse_from([
            "csrkit",
            "-v",
            "generate",
            "--cn",
            "www.example.com",
            "--san",
            "DNSName=www.example.com",
            "--san",
            "IPAddress=10.0.0.1",
            "--format",
            "base64",
        ]);
        assert!(cli.verbose);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.common_name.as_deref(), Some("www.example.com"));
        assert_eq!(args.alt_names.len(), 2);
        assert_eq!(args.format, OutputFormat::Base64);
    }

    #[test]
    fn test_inspect_cert_flags() {
        let cli = Cli::parse_from(["csrkit", "inspect-cert", "cert.pem", "--issuer", "ca.pem"]);
        let Commands::InspectCert(args) = cli.command else {
            panic!("expected inspect-cert");
        };
        assert_eq!(args.cert, PathBuf::from("cert.pem"));
        assert_eq!(args.issuer, Some(PathBuf::from("ca.pem")));
    }

    #[test]
    fn test_sign_requires_csr_and_key() {
        assert!(Cli::try_parse_from(["csrkit", "sign", "--csr", "req.pem"]).is_err());
    }
}
