use csrkit::algorithm::{EcCurve, HashAlgorithm, KeyAlgorithm};
use csrkit::cert::Certificate;
use csrkit::csr::alt_name::{AltNameKind, ExtensionRow};
use csrkit::csr::build_csr_with;
use csrkit::csr::params::{CsrParams, SubjectFields};
use csrkit::engine::RustCryptoEngine;
use csrkit::issuer::{LocalCertificateSigner, issue_certificate};

fn main() -> anyhow::Result<()> {
    // Self-signed CA from its own request
    let ca_params = CsrParams::builder()
        .algorithm(KeyAlgorithm::Ecdsa)
        .curve(EcCurve::P384)
        .hash(HashAlgorithm::Sha384)
        .subject(SubjectFields::builder().common_name("My Test CA").build())
        .build();
    let ca = build_csr_with(&RustCryptoEngine, &ca_params)?;
    let ca_key_pem = ca.key_pair.to_pkcs8_pem()?;

    let signer = LocalCertificateSigner::default();
    let ca_cert_pem = issue_certificate(&signer, &ca.request.to_pem()?, &ca_key_pem, None, true)?;
    println!("CA Certificate PEM:\n{ca_cert_pem}");

    // Server request with a couple of alternative names
    let server_params = CsrParams::builder()
        .subject(
            SubjectFields::builder()
                .common_name("myserver.local")
                .organization("Example Corp")
                .build(),
        )
        .extensions(vec![
            ExtensionRow::new(AltNameKind::DnsName, "myserver.local"),
            ExtensionRow::new(AltNameKind::IpAddress, "192.168.1.10"),
        ])
        .build();
    let server = build_csr_with(&RustCryptoEngine, &server_params)?;
    let server_csr_pem = server.request.to_pem()?;
    println!("Server Request PEM:\n{server_csr_pem}");

    // Signed by the CA
    let server_cert_pem =
        issue_certificate(&signer, &server_csr_pem, &ca_key_pem, Some(&ca_cert_pem), false)?;
    println!("Server Certificate PEM:\n{server_cert_pem}");

    let details = Certificate::from_pem(&server_cert_pem)?.details()?;
    print!("{details}");

    Ok(())
}
