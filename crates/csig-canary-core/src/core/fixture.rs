// crates/csig-canary-core/src/core/fixture.rs
// ============================================================================
// Module: Self-Check Fixtures
// Description: Embedded known-good signature and addon fixtures.
// Purpose: Prove the verifier works before any remote result is trusted.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! The content-signature fixture is a fixed three-certificate chain, a signed
//! `OneCRL` payload, its signature, the signer identity, and the fingerprint of
//! the fixture root. A verifier that cannot validate it (or that validates a
//! tampered copy) cannot be trusted with remote collections.
//!
//! The addon fixtures are one signed and one unsigned XPI used the same way
//! for addon runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::SignerIdentity;
use crate::core::identifiers::TrustRootFingerprint;

// ============================================================================
// SECTION: Content Signature Fixture
// ============================================================================

/// End-entity certificate for the fixture signer.
const FIXTURE_EE_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIICdTCCAV2gAwIBAgIULWXqMXrDQ3IYzpWJIseQRInl9zEwDQYJKoZIhvcNAQEL\n\
BQAwIzEhMB8GA1UEAwwYY29sbGVjdGlvbi1zaWduZXItaW50LUNBMCIYDzIwMTkx\n\
MTI4MDAwMDAwWhgPMjAyMjAyMDUwMDAwMDBaMCYxJDAiBgNVBAMMG2NvbGxlY3Rp\n\
b24tc2lnbmVyLWVlLWludC1DQTB2MBAGByqGSM49AgEGBSuBBAAiA2IABKFockM2\n\
K1x7GInzeRVGFaHHP7SN7oY+AikV22COJS3ktxMtqM6Y6DFTTmqcDAsJyNY5regy\n\
BuW6gTRzoR+jMOBdqMluQ4P+J4c9qXEDviiIz/AC8Fr3Gh/dzIN0qm6pzqNIMEYw\n\
EwYDVR0lBAwwCgYIKwYBBQUHAwMwLwYDVR0RBCgwJoIkb25lY3JsLmNvbnRlbnQt\n\
c2lnbmF0dXJlLm1vemlsbGEub3JnMA0GCSqGSIb3DQEBCwUAA4IBAQBrU5DuGjBv\n\
Dj2seQLI1jDxDB8oS4oPU1sbHp5OCfisPYl2JMKo5Cy1nPC/8t/W3BDC0wI7ug7J\n\
5OyZGIy5I2dgN3zIShql7X2bLLw/SSZGY0jIWa+GFOE5YmkWtM8uFB8FVtpOtYeF\n\
+zXIyeWyPv/JL9A9/c8EfzzYMc/2NCQV+J0QsXOcWvsV794dG0Poq0N3W35ai/jd\n\
itmWERTlPS4ivZliIcSUyR57lfRIFZP9KjcJSuKfYIuntG7YPtsqioLRKQjyricj\n\
p85QFZ+8z2XOQxd1Nt5DoBBO3gx9TsVDErbTxPMRkWxzHiIbVQxDj+frB+ChpQVk\n\
zufihT+yBVxE\n\
-----END CERTIFICATE-----";

/// Intermediate CA certificate.
const FIXTURE_INTERMEDIATE_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIC+TCCAeGgAwIBAgIUP+jlP5+sjznUojGrupiX+yQReYswDQYJKoZIhvcNAQEL\n\
BQAwHzEdMBsGA1UEAwwUY29sbGVjdGlvbi1zaWduZXItY2EwIhgPMjAxOTExMjgw\n\
MDAwMDBaGA8yMDIyMDIwNTAwMDAwMFowIzEhMB8GA1UEAwwYY29sbGVjdGlvbi1z\n\
aWduZXItaW50LUNBMIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAuohR\n\
qESOFtZB/W62iAY2ED08E9nq5DVKtOz1aFdsJHvBxyWo4NgfvbGcBptuGobya+Kv\n\
WnVramRxCHqlWqdFh/cc1SScAn7NQ/weadA4ICmTqyDDSeTbuUzCa2wO7RWCD/F+\n\
rWkasdMCOosqQe6ncOAPDY39ZgsrsCSSpH25iGF5kLFXkD3SO8XguEgfqDfTiEPv\n\
JxbYVbdmWqp+ApAvOnsQgAYkzBxsl62WYVu34pYSwHUxowyR3bTK9/ytHSXTCe+5\n\
Fw6naOGzey8ib2njtIqVYR3uJtYlnauRCE42yxwkBCy/Fosv5fGPmRcxuLP+SSP6\n\
clHEMdUDrNoYCjXtjQIDAQABoyUwIzAMBgNVHRMEBTADAQH/MBMGA1UdJQQMMAoG\n\
CCsGAQUFBwMDMA0GCSqGSIb3DQEBCwUAA4IBAQCWEYQGVaiI5LNAAPOAPy5hYdfz\n\
i6mLMxjr/sPpOq1+W79KfxJBnZQv0K2fhyP2Sp78wBpgkZ6NOR/7f7XwWXkhFb+N\n\
u7f9Wmb9Ogbiy4rzlHaOitduzj/O0ohUZa+9v4q7LUJC/2xMlVXS2AxEZWdvh1NX\n\
zC9QujqgmhU5aTODJq2M87f3qHq7NJ1CGKeIx7dpEJ8mSeiboY3dXxK9iFBj0OuG\n\
YCh4ZW/IUwIB6QW6S0oPugCMvJJ0f3qr/npAHF7VzkPi1Pde4zxMVVBL9PNGV3WT\n\
x6/jV3zfMYu+OhU6shUJS4I4mA+EIT4Lr6JCO6QfcHjzYrgCvcwZmW5/j9l4\n\
-----END CERTIFICATE-----";

/// Self-signed fixture root certificate.
const FIXTURE_ROOT_PEM: &str = "\
-----BEGIN CERTIFICATE-----\n\
MIIC9TCCAd2gAwIBAgIUV6J20TV5oEm+lv4oelnu2EJ+9bMwDQYJKoZIhvcNAQEL\n\
BQAwHzEdMBsGA1UEAwwUY29sbGVjdGlvbi1zaWduZXItY2EwIhgPMjAxOTExMjgw\n\
MDAwMDBaGA8yMDIyMDIwNTAwMDAwMFowHzEdMBsGA1UEAwwUY29sbGVjdGlvbi1z\n\
aWduZXItY2EwggEiMA0GCSqGSIb3DQEBAQUAA4IBDwAwggEKAoIBAQC6iFGoRI4W\n\
1kH9braIBjYQPTwT2erkNUq07PVoV2wke8HHJajg2B+9sZwGm24ahvJr4q9adWtq\n\
ZHEIeqVap0WH9xzVJJwCfs1D/B5p0DggKZOrIMNJ5Nu5TMJrbA7tFYIP8X6taRqx\n\
0wI6iypB7qdw4A8Njf1mCyuwJJKkfbmIYXmQsVeQPdI7xeC4SB+oN9OIQ+8nFthV\n\
t2Zaqn4CkC86exCABiTMHGyXrZZhW7filhLAdTGjDJHdtMr3/K0dJdMJ77kXDqdo\n\
4bN7LyJvaeO0ipVhHe4m1iWdq5EITjbLHCQELL8Wiy/l8Y+ZFzG4s/5JI/pyUcQx\n\
1QOs2hgKNe2NAgMBAAGjJTAjMAwGA1UdEwQFMAMBAf8wEwYDVR0lBAwwCgYIKwYB\n\
BQUHAwMwDQYJKoZIhvcNAQELBQADggEBAEgx0mT791EuD+v0QBALSNrHo+dWUpuI\n\
w1FalKVxsdDxM6V6O1NEcGTKndBDaBex3lwmH4aT/rYWwNr/Xyy7Koqal83JA9WG\n\
J9ofyHK+0tuL+zrAojHEg9JIUwWwi5Jbc+ewVwvD61BKU7ixcjcGxEfwF1Q1lILd\n\
iJoGZd50P6/bEN9QQeGQV0y+mkn82GPgpvfu/uNhYRmCCs+qm1OuRWrXaCuO+epN\n\
IuUXbInCSB03y3XUK8JnB1igVH0Sx9r9P+7tylQDsy4udq3tghuneI+GJnLxtfUH\n\
d6p55v4o5khhgaH1sI/bqYXj0Dl4EWdsvoGzjuxaJ11RnNn38vKPmlE=\n\
-----END CERTIFICATE-----";

/// Signed fixture payload.
pub const FIXTURE_COLLECTION_DATA: &str = r#"[{"details":{"bug":"https://bugzilla.mozilla.org/show_bug.cgi?id=1155145","created":"2016-01-18T14:43:37Z","name":"GlobalSign certs","who":".","why":"."},"enabled":true,"id":"97fbf7c4-3ef2-f54f-0029-1ba6540c63ea","issuerName":"MHExKDAmBgNVBAMTH0dsb2JhbFNpZ24gUm9vdFNpZ24gUGFydG5lcnMgQ0ExHTAbBgNVBAsTFFJvb3RTaWduIFBhcnRuZXJzIENBMRkwFwYDVQQKExBHbG9iYWxTaWduIG52LXNhMQswCQYDVQQGEwJCRQ==","last_modified":2000,"serialNumber":"BAAAAAABA/A35EU="},{"details":{"bug":"https://bugzilla.mozilla.org/show_bug.cgi?id=1155145","created":"2016-01-18T14:48:11Z","name":"GlobalSign certs","who":".","why":"."},"enabled":true,"id":"e3bd531e-1ee4-7407-27ce-6fdc9cecbbdc","issuerName":"MIGBMQswCQYDVQQGEwJCRTEZMBcGA1UEChMQR2xvYmFsU2lnbiBudi1zYTElMCMGA1UECxMcUHJpbWFyeSBPYmplY3QgUHVibGlzaGluZyBDQTEwMC4GA1UEAxMnR2xvYmFsU2lnbiBQcmltYXJ5IE9iamVjdCBQdWJsaXNoaW5nIENB","last_modified":3000,"serialNumber":"BAAAAAABI54PryQ="}]"#;

/// Fixture signature value, without its algorithm tag.
pub const FIXTURE_SIGNATURE: &str = "f4pA2tYM5jQgWY6YUmhUwQiBLj6QO5sHLD_5MqLePz95qv-7cNCuQoZnPQwxoptDtW8hcWH3kLb0quR7SB-r82gkpR9POVofsnWJRA-ETb0BcIz6VvI3pDT49ZLlNg3p";

/// Signer fragment of the fixture end-entity certificate.
pub const FIXTURE_SIGNER_FRAGMENT: &str = "onecrl";

/// SHA-256 fingerprint of the fixture root certificate.
pub const FIXTURE_ROOT_HASH: &str = "83:D2:09:5F:1F:61:BE:9C:B5:C7:63:49:B6:59:9A:0E:20:BB:C4:7D:40:1F:C1:4D:84:9A:09:5B:3B:88:3C:78";

/// Everything needed to run the content-signature self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSignatureFixture {
    /// PEM chain, end-entity first, newline separated.
    pub certificate_chain: String,
    /// Signed payload bytes.
    pub collection_data: &'static [u8],
    /// Untagged signature value.
    pub signature: &'static str,
    /// Expected signer identity.
    pub signer: SignerIdentity,
    /// Root the chain must terminate at.
    pub trust_root: TrustRootFingerprint,
}

impl ContentSignatureFixture {
    /// Returns the embedded fixture.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            certificate_chain: [FIXTURE_EE_PEM, FIXTURE_INTERMEDIATE_PEM, FIXTURE_ROOT_PEM].join("\n"),
            collection_data: FIXTURE_COLLECTION_DATA.as_bytes(),
            signature: FIXTURE_SIGNATURE,
            signer: SignerIdentity::from_static_fragment(FIXTURE_SIGNER_FRAGMENT),
            trust_root: TrustRootFingerprint::from_static(FIXTURE_ROOT_HASH),
        }
    }
}

// ============================================================================
// SECTION: Addon Fixtures
// ============================================================================

/// XPI that must install with a valid signature.
pub const SIGNED_ADDON_FIXTURE_URL: &str = "https://searchfox.org/mozilla-central/source/toolkit/mozapps/extensions/test/xpcshell/data/signing_checks/signed1.xpi";

/// XPI that must be rejected for lacking a signature.
pub const UNSIGNED_ADDON_FIXTURE_URL: &str = "https://searchfox.org/mozilla-central/source/toolkit/mozapps/extensions/test/xpcshell/data/signing_checks/unsigned.xpi";

// ============================================================================
// SECTION: Tests
// ============================================================================
