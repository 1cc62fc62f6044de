mod cli;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};

use cli::{Cli, Commands, GenerateArgs, InspectCertArgs, OutputFormat, SignArgs, VerifyArgs};
use csrkit::cert::Certificate;
use csrkit::config::{KeyFiles, RequestConfig};
use csrkit::csr::alt_name::ExtensionRow;
use csrkit::csr::{CertificationRequest, build_csr_with};
use csrkit::engine::RustCryptoEngine;
use csrkit::issuer::{LocalCertificateSigner, issue_certificate};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(cli.command) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate(args) => generate(args),
        Commands::Verify(args) => verify(args),
        Commands::Sign(args) => sign(args),
        Commands::InspectCert(args) => inspect_cert(args),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let (mut config, base_dir) = match &args.config {
        Some(path) => (
            RequestConfig::from_file(path).with_context(|| format!("Can't load {path:?}"))?,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => (RequestConfig::default(), PathBuf::new()),
    };

    override_with(&mut config.algorithm, args.algorithm);
    override_with(&mut config.hash, args.hash);
    override_with(&mut config.curve, args.curve);
    override_with(&mut config.modulus_length, args.modulus_length);
    override_with(&mut config.subject.common_name, args.common_name);
    override_with(&mut config.subject.organization, args.organization);
    override_with(&mut config.subject.organizational_unit, args.organizational_unit);
    override_with(&mut config.subject.locality, args.locality);
    override_with(&mut config.subject.country, args.country);
    for alt_name in &args.alt_names {
        let row: ExtensionRow = alt_name
            .parse()
            .with_context(|| format!("Invalid --san {alt_name:?}"))?;
        config.extensions.push(row);
    }
    if args.private_key.is_some() || args.public_key.is_some() {
        // command-line key paths are relative to the working directory
        let cwd = std::env::current_dir().context("Can't read the working directory")?;
        let files = config.key.get_or_insert_with(KeyFiles::default);
        override_with(&mut files.private_key_file, args.private_key.map(|p| cwd.join(p)));
        override_with(&mut files.public_key_file, args.public_key.map(|p| cwd.join(p)));
    }

    let params = config.to_params(&base_dir)?;
    let signed = build_csr_with(&RustCryptoEngine, &params)?;

    if let Some(key_out) = &args.key_out {
        fs::write(key_out, signed.key_pair.to_pkcs8_pem()?)
            .with_context(|| format!("Can't write {key_out:?}"))?;
        info!("Private key written to {key_out:?}");
    }

    let output = match args.format {
        OutputFormat::Pem => signed.request.to_pem()?.into_bytes(),
        OutputFormat::Base64 => {
            let mut text = signed.request.to_base64()?;
            text.push('\n');
            text.into_bytes()
        }
        OutputFormat::Der => signed.request.to_der()?,
    };
    write_output(args.out.as_deref(), &output)
}

fn verify(args: VerifyArgs) -> Result<()> {
    let pem = fs::read_to_string(&args.csr).with_context(|| format!("Can't read {:?}", args.csr))?;
    let request = CertificationRequest::from_pem(&pem)?;
    request.verify().context("Signature check failed")?;

    let subject: Vec<String> = request
        .subject_fields()?
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Subject: {}", subject.join(", "));
    println!("Signature algorithm: {}", request.signature_algorithm()?);
    for name in request.subject_alt_names()? {
        println!("Alternative name: {name}");
    }
    if let Some(ski) = request.subject_key_identifier()? {
        let hex: Vec<String> = ski.iter().map(|b| format!("{b:02X}")).collect();
        println!("Subject key identifier: {}", hex.join(":"));
    }
    println!("Signature OK");
    Ok(())
}

fn sign(args: SignArgs) -> Result<()> {
    if !args.self_sign && args.cert.is_none() {
        bail!("--cert is required unless --self-sign is given");
    }
    let csr = fs::read_to_string(&args.csr).with_context(|| format!("Can't read {:?}", args.csr))?;
    let key = fs::read_to_string(&args.key).with_context(|| format!("Can't read {:?}", args.key))?;
    let cert = args
        .cert
        .as_ref()
        .map(|path| fs::read_to_string(path).with_context(|| format!("Can't read {path:?}")))
        .transpose()?;

    let mut signer = LocalCertificateSigner::default();
    if let Some(days) = args.days {
        signer.validity_days = days;
    }
    let pem = issue_certificate(&signer, &csr, &key, cert.as_deref(), args.self_sign)?;
    write_output(args.out.as_deref(), pem.as_bytes())
}

fn inspect_cert(args: InspectCertArgs) -> Result<()> {
    let cert = read_certificate(&args.cert)?;
    print!("{}", cert.details()?);

    let issuer_key = match &args.issuer {
        Some(path) => Some(read_certificate(path)?.public_key()?),
        None if cert.subject() == cert.issuer() => Some(cert.public_key()?),
        None => None,
    };
    match issuer_key {
        Some(key) => {
            cert.verify_signed_by(&key).context("Signature check failed")?;
            println!("Signature OK");
        }
        None => info!("Pass --issuer to check the signature"),
    }
    Ok(())
}

fn read_certificate(path: &Path) -> Result<Certificate> {
    let pem = fs::read_to_string(path).with_context(|| format!("Can't read {path:?}"))?;
    Certificate::from_pem(&pem).with_context(|| format!("Can't parse {path:?}"))
}

fn override_with<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn write_output(out: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, bytes).with_context(|| format!("Can't write {path:?}"))?;
            info!("Written to {path:?}");
        }
        None => std::io::stdout()
            .write_all(bytes)
            .context("Can't write to stdout")?,
    }
    Ok(())
}
