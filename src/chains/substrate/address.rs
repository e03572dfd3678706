use crate::error::ScanError;
use blake2::{Blake2b512, Digest};

/// SS58 checksum preimage prefix, fixed by the address format.
const CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
/// Raw account key length. Reward event payloads reference this key,
/// not the formatted address.
const KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 2;

/// Raw public key behind an SS58 address, resolved once per scan and
/// used only for equality comparison against event payload keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKey([u8; KEY_LEN]);

impl AccountKey {
    /// Decode an SS58 address under the given network prefix.
    ///
    /// Fails with `InvalidAddress` on malformed base58, wrong payload
    /// length, prefix mismatch, or bad checksum.
    pub fn from_ss58(address: &str, expected_prefix: u16) -> Result<Self, ScanError> {
        let data = bs58::decode(address)
            .into_vec()
            .map_err(|e| ScanError::InvalidAddress(format!("{}: not base58 ({})", address, e)))?;

        // Network identifier is one byte below 64, two bytes above.
        let (prefix_len, prefix) = match data.first() {
            Some(&b @ 0..=63) => (1, b as u16),
            Some(&b @ 64..=127) => {
                let second = *data.get(1).ok_or_else(|| {
                    ScanError::InvalidAddress(format!("{}: truncated prefix", address))
                })?;
                let lower = ((b & 0b0011_1111) << 2) | (second >> 6);
                let upper = second & 0b0011_1111;
                (2, (lower as u16) | ((upper as u16) << 8))
            }
            _ => {
                return Err(ScanError::InvalidAddress(format!(
                    "{}: unsupported address format",
                    address
                )))
            }
        };

        if prefix != expected_prefix {
            return Err(ScanError::InvalidAddress(format!(
                "{}: network prefix {} does not match expected {}",
                address, prefix, expected_prefix
            )));
        }

        if data.len() != prefix_len + KEY_LEN + CHECKSUM_LEN {
            return Err(ScanError::InvalidAddress(format!(
                "{}: unexpected payload length {}",
                address,
                data.len()
            )));
        }

        let body_end = prefix_len + KEY_LEN;
        let mut hasher = Blake2b512::new();
        hasher.update(CHECKSUM_PREFIX);
        hasher.update(&data[..body_end]);
        let digest = hasher.finalize();
        if digest[..CHECKSUM_LEN] != data[body_end..] {
            return Err(ScanError::InvalidAddress(format!(
                "{}: checksum mismatch",
                address
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&data[prefix_len..body_end]);
        Ok(AccountKey(key))
    }

    /// 0x-prefixed lowercase hex rendering of the key.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Compare against a payload key in textual hex form. Upstream
    /// sources are inconsistent about the `0x` prefix, so both forms
    /// are accepted; the comparison is case-insensitive.
    pub fn matches_hex(&self, payload: &str) -> bool {
        let bare = payload.strip_prefix("0x").unwrap_or(payload);
        if bare.len() != KEY_LEN * 2 {
            return false;
        }
        bare.eq_ignore_ascii_case(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Canonical substrate dev account (//Alice), generic prefix 42.
    const ALICE_SS58: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_KEY_HEX: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    #[test]
    fn decodes_known_address() {
        let key = AccountKey::from_ss58(ALICE_SS58, 42).unwrap();
        assert_eq!(key.to_hex(), format!("0x{}", ALICE_KEY_HEX));
    }

    #[test]
    fn rejects_wrong_network_prefix() {
        let err = AccountKey::from_ss58(ALICE_SS58, 38).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAddress(_)));
        assert!(err.to_string().contains("network prefix"));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        // Flip the last character; base58 still decodes but the
        // checksum no longer matches.
        let mut corrupted = ALICE_SS58.to_string();
        corrupted.pop();
        corrupted.push('X');
        let err = AccountKey::from_ss58(&corrupted, 42).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_non_base58_input() {
        let err = AccountKey::from_ss58("not-an-address-0OIl", 42).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_truncated_payload() {
        let err = AccountKey::from_ss58("5Grwva", 42).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAddress(_)));
    }

    #[test]
    fn hex_match_ignores_prefix_and_case() {
        let key = AccountKey::from_ss58(ALICE_SS58, 42).unwrap();
        assert!(key.matches_hex(ALICE_KEY_HEX));
        assert!(key.matches_hex(&format!("0x{}", ALICE_KEY_HEX)));
        assert!(key.matches_hex(&ALICE_KEY_HEX.to_uppercase()));
        assert!(!key.matches_hex("0xdeadbeef"));
    }
}
