//! Bitcoin address script-type detection.
//!
//! The connector only needs to know whether an address is taproot when it
//! builds PSBT signer descriptors, so this module classifies without building
//! scriptPubKeys. Both Base58Check (P2PKH, P2SH) and Bech32/Bech32m
//! (P2WPKH, P2WSH, P2TR) encodings are checked, including their checksums.

use sha2::{Digest, Sha256};

use crate::network::Network;

/// Address classification errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address format")]
    InvalidFormat,
    #[error("Invalid Base58 character: {0}")]
    InvalidBase58Char(char),
    #[error("Invalid checksum")]
    InvalidChecksum,
    #[error("Invalid Bech32 encoding: {0}")]
    InvalidBech32(&'static str),
    #[error("Invalid witness program: version {version}, {len} bytes")]
    InvalidWitnessProgram { version: u8, len: usize },
}

/// Bitcoin address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    P2PKH,
    P2SH,
    P2WPKH,
    P2WSH,
    /// Taproot, segwit v1 with a 32-byte x-only key.
    P2TR,
}

impl AddressType {
    /// Get the display name for this address type.
    pub fn name(&self) -> &'static str {
        match self {
            AddressType::P2PKH => "P2PKH",
            AddressType::P2SH => "P2SH",
            AddressType::P2WPKH => "P2WPKH",
            AddressType::P2WSH => "P2WSH",
            AddressType::P2TR => "P2TR",
        }
    }

    pub fn is_taproot(&self) -> bool {
        matches!(self, AddressType::P2TR)
    }
}

/// Result of classifying an address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressInfo {
    pub address_type: AddressType,
    pub network: Network,
}

/// Maps an address string to its script type.
pub trait AddressClassifier {
    fn address_type(&self, address: &str) -> Option<AddressType>;
}

/// Default classifier backed by [`classify_address`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptTypeClassifier;

impl AddressClassifier for ScriptTypeClassifier {
    fn address_type(&self, address: &str) -> Option<AddressType> {
        classify_address(address).ok().map(|info| info.address_type)
    }
}

/// Detect the script type and network of a mainnet or testnet address.
pub fn classify_address(address: &str) -> Result<AddressInfo, AddressError> {
    let address = address.trim();
    let lower = address.to_ascii_lowercase();

    if lower.starts_with("bc1") || lower.starts_with("tb1") {
        classify_segwit(address)
    } else {
        classify_base58(address)
    }
}

fn classify_base58(address: &str) -> Result<AddressInfo, AddressError> {
    let bytes = base58_decode(address)?;
    // version byte + 20-byte hash + 4-byte checksum
    if bytes.len() != 25 {
        return Err(AddressError::InvalidFormat);
    }

    let (payload, checksum) = bytes.split_at(21);
    let digest = Sha256::digest(Sha256::digest(payload));
    if checksum != &digest[..4] {
        return Err(AddressError::InvalidChecksum);
    }

    let (address_type, network) = match payload[0] {
        0x00 => (AddressType::P2PKH, Network::Mainnet),
        0x05 => (AddressType::P2SH, Network::Mainnet),
        0x6f => (AddressType::P2PKH, Network::Testnet),
        0xc4 => (AddressType::P2SH, Network::Testnet),
        _ => return Err(AddressError::InvalidFormat),
    };

    Ok(AddressInfo { address_type, network })
}

fn classify_segwit(address: &str) -> Result<AddressInfo, AddressError> {
    let decoded = Bech32Payload::decode(address)?;

    let network = Network::from_bech32_hrp(&decoded.hrp)
        .ok_or(AddressError::InvalidBech32("unknown human-readable part"))?;

    let (&version, words) = decoded
        .words
        .split_first()
        .ok_or(AddressError::InvalidFormat)?;

    match (version, decoded.variant) {
        (0, Variant::Bech32) | (1..=16, Variant::Bech32m) => {}
        (0, Variant::Bech32m) => return Err(AddressError::InvalidBech32("segwit v0 requires bech32")),
        (1..=16, Variant::Bech32) => return Err(AddressError::InvalidBech32("segwit v1+ requires bech32m")),
        _ => return Err(AddressError::InvalidBech32("witness version out of range")),
    }

    let program = regroup_words(words)?;
    let address_type = match (version, program.len()) {
        (0, 20) => AddressType::P2WPKH,
        (0, 32) => AddressType::P2WSH,
        (1, 32) => AddressType::P2TR,
        (version, len) => return Err(AddressError::InvalidWitnessProgram { version, len }),
    };

    Ok(AddressInfo { address_type, network })
}

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    if input.is_empty() {
        return Err(AddressError::InvalidFormat);
    }

    // little-endian accumulator
    let mut acc: Vec<u8> = Vec::with_capacity(input.len());
    for c in input.chars() {
        let digit = BASE58_ALPHABET
            .iter()
            .position(|&b| b as char == c)
            .ok_or(AddressError::InvalidBase58Char(c))? as u32;

        let mut carry = digit;
        for byte in acc.iter_mut() {
            carry += u32::from(*byte) * 58;
            *byte = carry as u8;
            carry >>= 8;
        }
        while carry > 0 {
            acc.push(carry as u8);
            carry >>= 8;
        }
    }

    let zeros = input.bytes().take_while(|&b| b == b'1').count();
    let mut out = vec![0u8; zeros];
    out.extend(acc.iter().rev());
    Ok(out)
}

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32M_CONST: u32 = 0x2bc8_30a3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Bech32,
    Bech32m,
}

struct Bech32Payload {
    hrp: String,
    /// 5-bit words with the checksum stripped.
    words: Vec<u8>,
    variant: Variant,
}

impl Bech32Payload {
    fn decode(input: &str) -> Result<Self, AddressError> {
        let has_lower = input.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = input.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::InvalidBech32("mixed case"));
        }

        let input = input.to_ascii_lowercase();
        let sep = input
            .rfind('1')
            .ok_or(AddressError::InvalidBech32("missing separator"))?;
        if sep == 0 || input.len() - sep - 1 < 6 {
            return Err(AddressError::InvalidBech32("invalid separator position"));
        }

        let (hrp, rest) = input.split_at(sep);
        let mut words = rest[1..]
            .bytes()
            .map(|b| {
                BECH32_CHARSET
                    .iter()
                    .position(|&c| c == b)
                    .map(|p| p as u8)
                    .ok_or(AddressError::InvalidBech32("invalid character"))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        let variant = match polymod(hrp, &words) {
            1 => Variant::Bech32,
            BECH32M_CONST => Variant::Bech32m,
            _ => return Err(AddressError::InvalidChecksum),
        };
        words.truncate(words.len() - 6);

        Ok(Self {
            hrp: hrp.to_string(),
            words,
            variant,
        })
    }
}

fn polymod(hrp: &str, words: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];

    let expanded = hrp
        .bytes()
        .map(|b| b >> 5)
        .chain(core::iter::once(0))
        .chain(hrp.bytes().map(|b| b & 0x1f));

    expanded.chain(words.iter().copied()).fold(1u32, |chk, value| {
        let top = chk >> 25;
        let mut chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(value);
        for (i, g) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
        chk
    })
}

/// Regroup 5-bit words into bytes, rejecting non-zero padding.
fn regroup_words(words: &[u8]) -> Result<Vec<u8>, AddressError> {
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    let mut out = Vec::with_capacity(words.len() * 5 / 8);

    for &word in words {
        acc = (acc << 5) | u32::from(word);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }

    if bits >= 5 || (acc << (8 - bits)) & 0xff != 0 {
        return Err(AddressError::InvalidBech32("invalid padding"));
    }
    Ok(out)
}
