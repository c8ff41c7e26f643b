//! Commit-reveal commitments for name registration.
//!
//! A commitment binds a registrant to every parameter of a future `register`
//! call without revealing them. The registrar recomputes the hash from the
//! revealed call, so the encoding here must match it byte for byte:
//!
//! ```text
//! keccak256(abi.encode(
//!     keccak256(name), owner, duration, secret,
//!     resolver, data, reverseRecord, ownerControlledFuses
//! ))
//! ```

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use std::fmt::{Display, Formatter};

use crate::config::RegistrationConfig;
use crate::error::RelayError;

/// A 32-byte commitment hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(B256);

impl Commitment {
    /// Accepts exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RelayError> {
        if bytes.len() != 32 {
            return Err(RelayError::InvalidCommitment(bytes.len()));
        }
        Ok(Self(B256::from_slice(bytes)))
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<Commitment> for B256 {
    fn from(value: Commitment) -> Self {
        value.0
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every parameter of a name registration, validated.
///
/// The same value is used to compute the commitment and, later, to reveal it, so
/// the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    name: String,
    owner: Address,
    duration: u64,
    secret: B256,
    resolver: Option<Address>,
    resolver_data: Vec<Bytes>,
    reverse_record: bool,
    fuses: u16,
}

impl RegistrationRequest {
    pub fn new(name: impl Into<String>, owner: Address, duration: u64, secret: B256) -> Self {
        Self {
            name: name.into(),
            owner,
            duration,
            secret,
            resolver: None,
            resolver_data: Vec::new(),
            reverse_record: false,
            fuses: 0,
        }
    }

    pub fn with_resolver(mut self, resolver: Address) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_resolver_data(mut self, data: Vec<Bytes>) -> Self {
        self.resolver_data = data;
        self
    }

    pub fn with_reverse_record(mut self, reverse_record: bool) -> Self {
        self.reverse_record = reverse_record;
        self
    }

    pub fn with_fuses(mut self, fuses: u16) -> Self {
        self.fuses = fuses;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn secret(&self) -> B256 {
        self.secret
    }

    pub fn resolver(&self) -> Option<Address> {
        self.resolver
    }

    /// Resolver as it goes on the wire: the zero address when unset.
    pub fn resolver_or_zero(&self) -> Address {
        self.resolver.unwrap_or(Address::ZERO)
    }

    pub fn resolver_data(&self) -> &[Bytes] {
        &self.resolver_data
    }

    pub fn reverse_record(&self) -> bool {
        self.reverse_record
    }

    pub fn fuses(&self) -> u16 {
        self.fuses
    }

    /// `keccak256` of the UTF-8 name, the registrar's label hash.
    pub fn label(&self) -> B256 {
        keccak256(self.name.as_bytes())
    }

    pub fn commitment(&self) -> Commitment {
        let encoded = (
            self.label(),
            self.owner,
            U256::from(self.duration),
            self.secret,
            self.resolver_or_zero(),
            self.resolver_data.clone(),
            self.reverse_record,
            self.fuses,
        )
            .abi_encode_params();
        Commitment(keccak256(encoded))
    }

    /// Checks the rules a relayed registration is held to, before anything is sent.
    ///
    /// The L1 endpoint is the `msg.sender` seen by the registrar, so it can never
    /// claim a reverse record on behalf of the owner.
    pub fn validate_for_relay(&self) -> Result<(), RelayError> {
        if self.duration == 0 {
            return Err(RelayError::InvalidDuration);
        }
        if !self.resolver_data.is_empty() && self.resolver.is_none() {
            return Err(RelayError::ResolverRequired);
        }
        if self.reverse_record {
            return Err(RelayError::ReverseRecordUnsupported);
        }
        Ok(())
    }
}

/// Registration parameters as they arrive from configuration or user input,
/// with addresses still in text form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationParams {
    pub name: String,
    pub owner: String,
    pub duration: u64,
    pub secret: B256,
    pub resolver: Option<String>,
    pub resolver_data: Vec<Bytes>,
    pub reverse_record: bool,
    pub fuses: u16,
}

impl RegistrationParams {
    /// Parameters from the configuration file. The owner defaults to `default_owner`.
    pub fn from_config(config: &RegistrationConfig, default_owner: Address) -> Self {
        Self {
            name: config.name.clone(),
            owner: config
                .owner
                .clone()
                .unwrap_or_else(|| default_owner.to_checksum(None)),
            duration: config.duration,
            secret: *config.secret.inner(),
            resolver: config.resolver.clone(),
            resolver_data: config.resolver_data.clone(),
            reverse_record: config.reverse_record,
            fuses: config.fuses,
        }
    }
}

impl TryFrom<RegistrationParams> for RegistrationRequest {
    type Error = RelayError;

    fn try_from(params: RegistrationParams) -> Result<Self, Self::Error> {
        let owner = parse_address("owner", &params.owner)?;
        let resolver = match params.resolver.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(resolver) => Some(parse_address("resolver", resolver)?),
        };
        if params.duration == 0 {
            return Err(RelayError::InvalidDuration);
        }
        Ok(RegistrationRequest {
            name: params.name,
            owner,
            duration: params.duration,
            secret: params.secret,
            resolver,
            resolver_data: params.resolver_data,
            reverse_record: params.reverse_record,
            fuses: params.fuses,
        })
    }
}

/// Computes commitments from textual parameters.
pub struct CommitmentEncoder;

impl CommitmentEncoder {
    pub fn encode(params: &RegistrationParams) -> Result<Commitment, RelayError> {
        let request = RegistrationRequest::try_from(params.clone())?;
        Ok(request.commitment())
    }
}

/// Parses a 20-byte hex address, `0x` prefix optional.
///
/// All-lowercase and all-uppercase hex are accepted as is. Mixed case must carry
/// a valid EIP-55 checksum.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, RelayError> {
    let invalid = || RelayError::InvalidAddress {
        field,
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let prefixed = format!("0x{hex}");
    if has_lower && has_upper {
        Address::parse_checksummed(&prefixed, None).map_err(|_| invalid())
    } else {
        prefixed.parse::<Address>().map_err(|_| invalid())
    }
}
