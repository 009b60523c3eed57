//! Payout address derivation
//!
//! Kaspa addresses are `<prefix>:<payload><checksum>` where the payload is
//! the version byte followed by the x-only public key, packed into 5-bit
//! groups, and the checksum is a 40-bit BCH code over the prefix and payload.

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::Zeroizing;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LEN: usize = 8;

/// Address version byte for a Schnorr (x-only) public key
const VERSION_PUBKEY: u8 = 0;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("private key is not valid hex")]
    InvalidHex,
    #[error("private key is not a valid secp256k1 secret key")]
    InvalidSecretKey,
    #[error("address is missing the '<prefix>:' part")]
    MissingPrefix,
    #[error("address prefix '{found}' does not match network prefix '{expected}'")]
    WrongPrefix { expected: &'static str, found: String },
    #[error("address contains invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("address checksum mismatch")]
    BadChecksum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet10,
    Testnet11,
    Devnet,
    Simnet,
}

impl Network {
    pub fn prefix(self) -> &'static str {
        match self {
            Network::Mainnet => "kaspa",
            Network::Testnet10 | Network::Testnet11 => "kaspatest",
            Network::Devnet => "kaspadev",
            Network::Simnet => "kaspasim",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet-10" => Ok(Network::Testnet10),
            "testnet-11" => Ok(Network::Testnet11),
            "devnet" => Ok(Network::Devnet),
            "simnet" => Ok(Network::Simnet),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet10 => "testnet-10",
            Network::Testnet11 => "testnet-11",
            Network::Devnet => "devnet",
            Network::Simnet => "simnet",
        };
        f.write_str(name)
    }
}

/// Derive the payout address for `network` from a hex-encoded private key.
pub fn payout_address(network: Network, private_key_hex: &str) -> Result<String, AddressError> {
    let key_bytes = Zeroizing::new(
        hex::decode(private_key_hex.trim()).map_err(|_| AddressError::InvalidHex)?,
    );
    let secret = SecretKey::from_slice(&key_bytes).map_err(|_| AddressError::InvalidSecretKey)?;

    let secp = Secp256k1::signing_only();
    let (x_only, _parity) = PublicKey::from_secret_key(&secp, &secret).x_only_public_key();

    Ok(encode_address(network.prefix(), VERSION_PUBKEY, &x_only.serialize()))
}

/// Check that `address` is well-formed for `network`.
pub fn validate_address(network: Network, address: &str) -> Result<(), AddressError> {
    let (prefix, data) = address.split_once(':').ok_or(AddressError::MissingPrefix)?;
    if prefix != network.prefix() {
        return Err(AddressError::WrongPrefix {
            expected: network.prefix(),
            found: prefix.to_string(),
        });
    }

    let values = data
        .chars()
        .map(|c| {
            CHARSET
                .iter()
                .position(|&b| b as char == c)
                .map(|p| p as u8)
                .ok_or(AddressError::InvalidCharacter(c))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    if values.len() <= CHECKSUM_LEN || polymod(prefix, &values) != 0 {
        return Err(AddressError::BadChecksum);
    }
    Ok(())
}

fn encode_address(prefix: &str, version: u8, payload: &[u8]) -> String {
    let mut versioned = Vec::with_capacity(payload.len() + 1);
    versioned.push(version);
    versioned.extend_from_slice(payload);

    let mut data = conv8to5(&versioned);
    let checksum = polymod(prefix, &[data.as_slice(), &[0u8; CHECKSUM_LEN]].concat());
    // Low 40 bits, big-endian, as eight 5-bit groups
    data.extend(conv8to5(&checksum.to_be_bytes()[3..]));

    let encoded: String = data.iter().map(|&v| CHARSET[v as usize] as char).collect();
    format!("{}:{}", prefix, encoded)
}

fn polymod(prefix: &str, values: &[u8]) -> u64 {
    const GENERATOR: [u64; 5] = [
        0x98f2bc8e61,
        0x79b76d99e2,
        0xf33e5fb3c4,
        0xae2eabe2a8,
        0x1e4f43e470,
    ];

    let prefix_values = prefix.bytes().map(|b| b & 0x1f);
    let mut c: u64 = 1;
    for d in prefix_values.chain(std::iter::once(0)).chain(values.iter().copied()) {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, g) in GENERATOR.iter().enumerate() {
            if (c0 >> i) & 1 == 1 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

/// Repack bytes into 5-bit groups, zero padding the tail.
fn conv8to5(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((payload.len() * 8 + 4) / 5);
    let mut acc: u16 = 0;
    let mut bits: u32 = 0;
    for &byte in payload {
        acc = (acc << 8) | byte as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 0x1f) as u8);
        }
        acc &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 0x1f) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "b7e151628aed2a6abf7158809cf4f3c762e7160f38b4da56a784d9045190cfef";

    #[test]
    fn test_network_parsing() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("testnet-10".parse::<Network>().unwrap(), Network::Testnet10);
        assert_eq!("Testnet-11".parse::<Network>().unwrap(), Network::Testnet11);
        assert!("moonnet".parse::<Network>().is_err());
        assert_eq!(Network::Testnet11.prefix(), "kaspatest");
    }

    #[test]
    fn test_conv8to5_pads_tail() {
        assert_eq!(conv8to5(&[0xff]), vec![0x1f, 0x1c]);
        assert_eq!(conv8to5(&[0u8; 5]).len(), 8);
        assert_eq!(conv8to5(&[0u8; 33]).len(), 53);
    }

    #[test]
    fn test_derived_address_shape() {
        let addr = payout_address(Network::Mainnet, TEST_KEY).unwrap();
        let (prefix, data) = addr.split_once(':').unwrap();

        assert_eq!(prefix, "kaspa");
        assert_eq!(data.len(), 61);
        // Version 0 packs to a leading 'q'
        assert!(data.starts_with('q'));
        validate_address(Network::Mainnet, &addr).unwrap();
    }

    #[test]
    fn test_testnet_address_uses_testnet_prefix() {
        let addr = payout_address(Network::Testnet10, TEST_KEY).unwrap();
        assert!(addr.starts_with("kaspatest:"));
        validate_address(Network::Testnet10, &addr).unwrap();
        assert!(matches!(
            validate_address(Network::Mainnet, &addr),
            Err(AddressError::WrongPrefix { .. })
        ));
    }

    /// Mainnet P2PK vector from kaspad's util/address_test.go
    const KASPAD_P2PK: &str = "kaspa:qr35ennsep3hxfe7lnz5ee7j5jgmkjswsn35ennsep3hxfe7ln35cdv0dy335";
    const KASPAD_P2PK_PUBKEY: &str = "e34cce70c86373273efcc54ce7d2a491bb4a0e84e34cce70c86373273efce34c";

    #[test]
    fn test_kaspad_vector_validates() {
        validate_address(Network::Mainnet, KASPAD_P2PK).unwrap();
    }

    #[test]
    fn test_encoder_reproduces_kaspad_vector() {
        let pubkey = hex::decode(KASPAD_P2PK_PUBKEY).unwrap();
        assert_eq!(encode_address("kaspa", VERSION_PUBKEY, &pubkey), KASPAD_P2PK);
    }

    #[test]
    fn test_known_key_derives_known_address() {
        // TEST_KEY is BIP-340 test vector 1; its x-only key is fixed by that vector
        let secret = SecretKey::from_slice(&hex::decode(TEST_KEY).unwrap()).unwrap();
        let (x_only, _) = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret).x_only_public_key();
        assert_eq!(
            hex::encode(x_only.serialize()),
            "dff1d77f2a671c5f36183726db2341be58feae1da2deced843240f7b502ba659"
        );

        assert_eq!(
            payout_address(Network::Mainnet, TEST_KEY).unwrap(),
            "kaspa:qr0lr4ml9fn3chekrqmjdkergxl93l4wrk3dankcgvjq776s9wn9jkdskewva"
        );
        assert_eq!(
            payout_address(Network::Testnet10, TEST_KEY).unwrap(),
            "kaspatest:qr0lr4ml9fn3chekrqmjdkergxl93l4wrk3dankcgvjq776s9wn9jhtkdksae"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = payout_address(Network::Mainnet, TEST_KEY).unwrap();
        let b = payout_address(Network::Mainnet, &format!("  {}\n", TEST_KEY)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutated_address_fails_checksum() {
        let addr = payout_address(Network::Mainnet, TEST_KEY).unwrap();
        let mut chars: Vec<char> = addr.chars().collect();
        let i = chars.len() - 12;
        chars[i] = if chars[i] == 'q' { 'p' } else { 'q' };
        let mutated: String = chars.into_iter().collect();

        assert!(matches!(
            validate_address(Network::Mainnet, &mutated),
            Err(AddressError::BadChecksum)
        ));
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(payout_address(Network::Mainnet, "zz"), Err(AddressError::InvalidHex)));
        assert!(matches!(
            payout_address(Network::Mainnet, &"00".repeat(32)),
            Err(AddressError::InvalidSecretKey)
        ));
        assert!(matches!(
            payout_address(Network::Mainnet, "abcd"),
            Err(AddressError::InvalidSecretKey)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(validate_address(Network::Mainnet, "noprefix"), Err(AddressError::MissingPrefix)));
        assert!(matches!(
            validate_address(Network::Mainnet, "kaspa:qqb1"),
            Err(AddressError::InvalidCharacter('b'))
        ));
        assert!(matches!(validate_address(Network::Mainnet, "kaspa:qq"), Err(AddressError::BadChecksum)));
    }
}
