mod util;

use botan::Certificate as BotanCertificate;

use csrkit::algorithm::{EcCurve, KeyAlgorithm};
use csrkit::csr::params::CsrParams;
use csrkit::issuer::{Issuer, SelfIssuer, Validity};

fn self_signed_der(params: &CsrParams) -> Vec<u8> {
    let signed = util::build(params);
    SelfIssuer {
        key: &signed.key_pair,
    }
    .issue(&signed.request, Validity::for_days(30))
    .unwrap()
    .to_der()
    .unwrap()
}

fn check_cert(cert_der: &[u8]) {
    // Use botan crate to parse the DER and assert it succeeds
    BotanCertificate::load(cert_der).expect("Botan failed to parse certificate");
}

fn ecdsa_params(curve: EcCurve) -> CsrParams {
    let mut params = util::full_params();
    params.curve = curve;
    params
}

#[test]
#[ignore]
fn test_botan_ecdsa_p256() {
    check_cert(&self_signed_der(&ecdsa_params(EcCurve::P256)));
}

#[test]
#[ignore]
fn test_botan_ecdsa_p384() {
    check_cert(&self_signed_der(&ecdsa_params(EcCurve::P384)));
}

#[test]
#[ignore]
fn test_botan_ecdsa_p521() {
    check_cert(&self_signed_der(&ecdsa_params(EcCurve::P521)));
}

#[test]
#[ignore]
fn test_botan_rsa() {
    let mut params = util::full_params();
    params.algorithm = KeyAlgorithm::RsassaPkcs1V15;
    check_cert(&self_signed_der(&params));
}
