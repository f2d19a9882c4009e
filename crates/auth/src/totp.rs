use crate::error::{AuthError, Result};
use base32::Alphabet;
use image::Luma;
use qrcode::QrCode;
use rand::Rng;
use totp_lite::{totp_custom, Sha1};

pub const TOTP_DIGITS: u32 = 6;
pub const TOTP_STEP: u64 = 30; // 30 seconds

/// Steps accepted either side of the current one.
const DRIFT_STEPS: i64 = 1;

const SECRET_ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Generate a random 20-byte secret, base32 encoded
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let secret_bytes: Vec<u8> = (0..20).map(|_| rng.gen()).collect();
    base32::encode(SECRET_ALPHABET, &secret_bytes)
}

/// Decode a base32 secret. Authenticator apps group secrets in blocks of
/// four and some pad with `=`, so both are tolerated.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let cleaned: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect::<String>()
        .to_uppercase();

    if cleaned.is_empty() {
        return Err(AuthError::InvalidConfiguration("Empty TOTP secret".to_string()));
    }

    base32::decode(SECRET_ALPHABET, &cleaned)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AuthError::InvalidConfiguration("Invalid TOTP secret format".to_string()))
}

/// The code for a secret at a given unix time
pub fn totp_at(secret: &[u8], unix_time: u64) -> String {
    totp_custom::<Sha1>(TOTP_STEP, TOTP_DIGITS, secret, unix_time)
}

/// Verify a code against a secret at `unix_time`.
/// Allows ±1 period (30 seconds) to account for clock drift.
pub fn verify_totp_at(secret: &[u8], code: &str, unix_time: u64) -> bool {
    let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if code.len() != TOTP_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    // Evaluate every window so the timing does not depend on which one matched
    let mut matched = false;
    for offset in -DRIFT_STEPS..=DRIFT_STEPS {
        let check_time = unix_time as i64 + offset * TOTP_STEP as i64;
        if check_time < 0 {
            continue;
        }
        let expected = totp_at(secret, check_time as u64);
        matched |= constant_time_compare(expected.as_bytes(), code.as_bytes());
    }

    matched
}

/// Generate a TOTP URI for QR code generation (otpauth:// format)
/// This is the format that authenticator apps expect
pub fn generate_totp_uri(secret: &str, account_name: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account_name),
        secret,
        urlencoding::encode(issuer),
        TOTP_DIGITS,
        TOTP_STEP
    )
}

/// Render a TOTP URI as PNG bytes
pub fn generate_qr_code(totp_uri: &str) -> Result<Vec<u8>> {
    let qr = QrCode::new(totp_uri.as_bytes())
        .map_err(|e| AuthError::Internal(format!("QR code generation failed: {}", e)))?;

    let image = qr.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut png_bytes = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| AuthError::Internal(format!("PNG encoding failed: {}", e)))?;

    Ok(png_bytes)
}

/// Constant-time comparison of equal-length inputs
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
