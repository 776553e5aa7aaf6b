//! Minimal contract ABI support: static-type call encoding and event log
//! decoding. Dynamic types (string, bytes, arrays) are not supported.

use primitive_types::U256;
use serde_json::Value;
use shared_types::{keccak256, Address, Payload};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("invalid signature '{0}'")]
    InvalidSignature(String),

    #[error("unsupported ABI type '{0}'")]
    UnsupportedType(String),

    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    #[error("argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("log has no topic for indexed parameter {0}")]
    MissingTopic(usize),

    #[error("log topic0 does not match {0}")]
    TopicMismatch(String),
}

/// A static ABI type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Uint(u16),
    Int(u16),
    Bool,
    Bytes32,
}

impl FromStr for ParamKind {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = |rest: &str| -> Result<u16, AbiError> {
            if rest.is_empty() {
                return Ok(256);
            }
            match rest.parse::<u16>() {
                Ok(bits) if bits % 8 == 0 && (8..=256).contains(&bits) => Ok(bits),
                _ => Err(AbiError::UnsupportedType(s.to_string())),
            }
        };

        match s {
            "address" => Ok(Self::Address),
            "bool" => Ok(Self::Bool),
            "bytes32" => Ok(Self::Bytes32),
            _ if s.starts_with("uint") => Ok(Self::Uint(bits(&s[4..])?)),
            _ if s.starts_with("int") => Ok(Self::Int(bits(&s[3..])?)),
            _ => Err(AbiError::UnsupportedType(s.to_string())),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Bool => write!(f, "bool"),
            Self::Bytes32 => write!(f, "bytes32"),
        }
    }
}

/// Split `name(a, b)` into the name and the raw parameter list.
fn split_signature(signature: &str) -> Result<(&str, Vec<&str>), AbiError> {
    let invalid = || AbiError::InvalidSignature(signature.to_string());
    let open = signature.find('(').ok_or_else(invalid)?;
    let inner = signature[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
    let name = signature[..open].trim();
    if name.is_empty() {
        return Err(invalid());
    }
    let params = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };
    Ok((name, params))
}

/// First four bytes of keccak256 of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call to `signature` (e.g. `store(uint256)`) with JSON args.
///
/// Numbers may be JSON numbers, decimal strings or `0x` hex strings.
pub fn encode_call(signature: &str, args: &[Value]) -> Result<Vec<u8>, AbiError> {
    let (name, raw) = split_signature(signature)?;
    let kinds = raw
        .iter()
        .map(|p| p.split_whitespace().next().unwrap_or_default().parse())
        .collect::<Result<Vec<ParamKind>, _>>()?;
    if kinds.len() != args.len() {
        return Err(AbiError::ArgumentCount {
            expected: kinds.len(),
            got: args.len(),
        });
    }

    let canonical = format!(
        "{name}({})",
        kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    );
    let mut out = selector(&canonical).to_vec();
    for (index, (kind, arg)) in kinds.iter().zip(args).enumerate() {
        let word = encode_word(*kind, arg)
            .map_err(|reason| AbiError::InvalidArgument { index, reason })?;
        out.extend_from_slice(&word);
    }
    Ok(out)
}

fn parse_u256(value: &Value) -> Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("{n} is not an unsigned integer")),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{e:?}")),
            None => U256::from_dec_str(s).map_err(|e| format!("{e:?}")),
        },
        other => Err(format!("expected number, got {other}")),
    }
}

fn encode_word(kind: ParamKind, value: &Value) -> Result<[u8; 32], String> {
    let mut word = [0u8; 32];
    match kind {
        ParamKind::Address => {
            let text = value.as_str().ok_or("expected address string")?;
            let address = Address::from_str(text).map_err(|e| e.to_string())?;
            word[12..].copy_from_slice(address.as_bytes());
        }
        ParamKind::Uint(_) => parse_u256(value)?.to_big_endian(&mut word),
        ParamKind::Int(_) => match value.as_i64() {
            Some(n) if n < 0 => {
                let magnitude = U256::from(n.unsigned_abs());
                (!magnitude).overflowing_add(U256::one()).0.to_big_endian(&mut word);
            }
            _ => parse_u256(value)?.to_big_endian(&mut word),
        },
        ParamKind::Bool => {
            word[31] = u8::from(value.as_bool().ok_or("expected bool")?);
        }
        ParamKind::Bytes32 => {
            let text = value.as_str().ok_or("expected hex string")?;
            let bytes = hex::decode(text.trim_start_matches("0x")).map_err(|e| e.to_string())?;
            if bytes.len() != 32 {
                return Err(format!("expected 32 bytes, got {}", bytes.len()));
            }
            word.copy_from_slice(&bytes);
        }
    }
    Ok(word)
}

/// Decode one 32-byte word into its JSON form. Integers become `0x` hex
/// strings, matching how `U256` serializes.
pub fn decode_word(kind: ParamKind, word: &[u8; 32]) -> Value {
    match kind {
        ParamKind::Address => Value::String(Address::from_word(word).to_string()),
        ParamKind::Uint(_) | ParamKind::Int(_) => {
            Value::String(format!("0x{:x}", U256::from_big_endian(word)))
        }
        ParamKind::Bool => Value::Bool(word[31] != 0),
        ParamKind::Bytes32 => Value::String(format!("0x{}", hex::encode(word))),
    }
}

fn decode_hex_word(text: &str) -> Result<[u8; 32], AbiError> {
    let bytes =
        hex::decode(text.trim_start_matches("0x")).map_err(|_| AbiError::InvalidHex(text.into()))?;
    bytes
        .try_into()
        .map_err(|_| AbiError::InvalidHex(text.to_string()))
}

/// One event parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    pub kind: ParamKind,
    pub indexed: bool,
}

/// Parsed event declaration, e.g.
/// `WinnerPicked(address indexed winner, uint256 indexed requestId)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    pub name: String,
    pub params: Vec<EventParam>,
}

impl EventSignature {
    pub fn parse(declaration: &str) -> Result<Self, AbiError> {
        let (name, raw) = split_signature(declaration)?;
        let mut params = Vec::with_capacity(raw.len());
        for (i, param) in raw.iter().enumerate() {
            let mut parts = param.split_whitespace();
            let kind: ParamKind = parts
                .next()
                .ok_or_else(|| AbiError::InvalidSignature(declaration.to_string()))?
                .parse()?;
            let mut indexed = false;
            let mut param_name = None;
            for part in parts {
                if part == "indexed" {
                    indexed = true;
                } else {
                    param_name = Some(part.to_string());
                }
            }
            params.push(EventParam {
                name: param_name.unwrap_or_else(|| format!("arg{i}")),
                kind,
                indexed,
            });
        }
        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// `Name(type,type)`.
    pub fn canonical(&self) -> String {
        let kinds: Vec<String> = self.params.iter().map(|p| p.kind.to_string()).collect();
        format!("{}({})", self.name, kinds.join(","))
    }

    /// keccak256 of the canonical signature.
    pub fn topic0(&self) -> [u8; 32] {
        keccak256(self.canonical().as_bytes())
    }

    pub fn topic0_hex(&self) -> String {
        format!("0x{}", hex::encode(self.topic0()))
    }

    /// Decode a log's parameters into a payload keyed by parameter name.
    ///
    /// `topics[0]` must be this event's topic; indexed parameters follow in
    /// order, the rest are packed in `data`.
    pub fn decode_log(&self, topics: &[String], data: &str) -> Result<Payload, AbiError> {
        let expected = self.topic0_hex();
        match topics.first() {
            Some(topic) if topic.eq_ignore_ascii_case(&expected) => {}
            _ => return Err(AbiError::TopicMismatch(self.canonical())),
        }

        let data = hex::decode(data.trim_start_matches("0x"))
            .map_err(|_| AbiError::InvalidHex(data.to_string()))?;
        let mut payload = Payload::new();
        let mut topic_index = 1;
        let mut data_words = data.chunks_exact(32);

        for param in &self.params {
            let value = if param.indexed {
                let topic = topics
                    .get(topic_index)
                    .ok_or(AbiError::MissingTopic(topic_index))?;
                topic_index += 1;
                decode_word(param.kind, &decode_hex_word(topic)?)
            } else {
                let chunk = data_words
                    .next()
                    .ok_or_else(|| AbiError::InvalidHex("log data too short".into()))?;
                let mut word = [0u8; 32];
                word.copy_from_slice(chunk);
                decode_word(param.kind, &word)
            };
            payload.insert(param.name.clone(), value);
        }
        Ok(payload)
    }
}
