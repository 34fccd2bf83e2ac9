use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use questline_core::EntityId;
use questline_system_objectives::JournalSnapshot;

const TRANSFER_DOMAIN: &str = "journal";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the owner and the encoded journal.
pub(crate) const TRANSFER_HEADER: &str = "journal:v1";
/// Delimiter used to separate the prefix, the owner and the payload.
const FIELD_DELIMITER: char = ':';

/// Encodes a journal into a single line that can be pasted back later.
pub(crate) fn encode(snapshot: &JournalSnapshot) -> Result<String, JournalTransferError> {
    let json = serde_json::to_vec(snapshot).map_err(JournalTransferError::Serialize)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!(
        "{TRANSFER_HEADER}:{}:{encoded}",
        snapshot.owner.get()
    ))
}

/// Decodes a journal from its single-line representation.
pub(crate) fn decode(value: &str) -> Result<JournalSnapshot, JournalTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JournalTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(JournalTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(JournalTransferError::MissingVersion)?;
    let owner = parts.next().ok_or(JournalTransferError::MissingOwner)?;
    let payload = parts.next().ok_or(JournalTransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(JournalTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(JournalTransferError::UnsupportedVersion(version.to_owned()));
    }

    let owner = owner
        .trim()
        .parse::<i32>()
        .map(EntityId::new)
        .map_err(|_| JournalTransferError::InvalidOwner(owner.to_owned()))?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(JournalTransferError::InvalidEncoding)?;
    let snapshot: JournalSnapshot =
        serde_json::from_slice(&bytes).map_err(JournalTransferError::InvalidPayload)?;
    if snapshot.owner != owner {
        return Err(JournalTransferError::OwnerMismatch {
            header: owner,
            payload: snapshot.owner,
        });
    }
    Ok(snapshot)
}

/// Errors that can occur while moving journals in and out of the CLI.
#[derive(Debug)]
pub(crate) enum JournalTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing.
    MissingPrefix,
    /// The version segment was missing.
    MissingVersion,
    /// The owner segment was missing.
    MissingOwner,
    /// The payload segment was missing.
    MissingPayload,
    /// The string used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The owner segment is not an entity identifier.
    InvalidOwner(String),
    /// The header and the payload name different owners.
    OwnerMismatch {
        /// Owner named by the header.
        header: EntityId,
        /// Owner stored in the payload.
        payload: EntityId,
    },
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The decoded payload could not be deserialised.
    InvalidPayload(serde_json::Error),
    /// The journal could not be serialised.
    Serialize(serde_json::Error),
}

impl fmt::Display for JournalTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "journal string was empty"),
            Self::MissingPrefix => write!(f, "journal string is missing the prefix"),
            Self::MissingVersion => write!(f, "journal string is missing the version"),
            Self::MissingOwner => write!(f, "journal string is missing the owner"),
            Self::MissingPayload => write!(f, "journal string is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "journal prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "journal version '{version}' is not supported")
            }
            Self::InvalidOwner(owner) => write!(f, "could not parse journal owner '{owner}'"),
            Self::OwnerMismatch { header, payload } => write!(
                f,
                "journal header names player {} but the payload belongs to {}",
                header.get(),
                payload.get()
            ),
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode journal payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse journal payload: {error}")
            }
            Self::Serialize(error) => write!(f, "could not serialise journal: {error}"),
        }
    }
}

impl Error for JournalTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) | Self::Serialize(error) => Some(error),
            _ => None,
        }
    }
}
