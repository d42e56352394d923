use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// `NE-XXXXXXXX-NNNN`. The hex part comes from the OS CSPRNG because the
/// ticket id is the only thing checked at the venue gate.
pub fn ticket_id(now: DateTime<Utc>) -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    format!("NE-{}-{}", hex::encode_upper(bytes), millis_suffix(now))
}

/// `BK-XXXXXX-NNNN`, the public reference shown on status pages.
pub fn booking_id(now: DateTime<Utc>) -> String {
    let bytes: [u8; 3] = rand::random();
    format!("BK-{}-{}", hex::encode_upper(bytes), millis_suffix(now))
}

pub fn invoice_number(now: DateTime<Utc>) -> String {
    format!("INV-{}", now.timestamp_millis())
}

/// Last four digits of the epoch milliseconds.
fn millis_suffix(now: DateTime<Utc>) -> String {
    format!("{:04}", now.timestamp_millis().rem_euclid(10_000))
}

#[cfg(test)]
pub(crate) fn matches_format(id: &str, prefix: &str, hex_len: usize) -> bool {
    let parts: Vec<&str> = id.split('-').collect();
    parts.len() == 3
        && parts[0] == prefix
        && parts[1].len() == hex_len
        && parts[1]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        && parts[2].len() == 4
        && parts[2].chars().all(|c| c.is_ascii_digit())
}
