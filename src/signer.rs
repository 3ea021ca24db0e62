//! EIP-712 signing for exchange actions.
//!
//! Two domains exist. L1 actions are hashed from their msgpack encoding into a
//! `connectionId`, which is then signed as an `Agent` struct under the
//! `Exchange` domain. Transfers and withdrawals are signed directly as typed
//! structs under the `HyperliquidSignTransaction` domain.

use alloy::{
    primitives::{hex, keccak256, Address, B256, U256},
    sol_types::{eip712_domain, Eip712Domain},
};
use alloy_signer::SignerSync;
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use serde::Serialize;
use serde_json::Value;

use crate::{
    actions::{Action, FieldKind, UserSignedSchema, SIGNATURE_CHAIN_ID},
    errors::SigningError,
    timings,
    types::{Network, Nonce},
};

type Result<T> = std::result::Result<T, SigningError>;

const L1_DOMAIN: Eip712Domain = eip712_domain! {
    name: "Exchange",
    version: "1",
    chain_id: 1337,
    verifying_contract: Address::ZERO,
};

const AGENT_TYPE: &str = "Agent(string source,bytes32 connectionId)";

/// `{r, s, v}` as the exchange expects it, with `v` in the 27/28 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireSignature {
    pub r: U256,
    pub s: U256,
    pub v: u8,
}

impl WireSignature {
    fn from_alloy(signature: alloy::primitives::Signature) -> Self {
        Self {
            r: signature.r(),
            s: signature.s(),
            v: 27 + u8::from(signature.v()),
        }
    }

    /// 65-byte `r ‖ s ‖ v` rendering, `0x` prefixed.
    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&self.r.to_be_bytes::<32>());
        bytes.extend_from_slice(&self.s.to_be_bytes::<32>());
        bytes.push(self.v);
        hex::encode_prefixed(bytes)
    }
}

/// Wallet key bound to one network for its whole lifetime.
#[derive(Clone)]
pub struct ActionSigner {
    wallet: PrivateKeySigner,
    network: Network,
}

impl std::fmt::Debug for ActionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSigner")
            .field("address", &self.wallet.address())
            .field("network", &self.network)
            .finish()
    }
}

impl ActionSigner {
    pub fn from_private_key(private_key: &str, network: Network) -> Result<Self> {
        let wallet: PrivateKeySigner = sanitize_private_key(private_key)
            .parse()
            .map_err(|err: LocalSignerError| SigningError::InvalidKey(err.to_string()))?;
        Ok(Self { wallet, network })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Sign an action under the domain its variant requires.
    pub fn sign(
        &self,
        action: &Action,
        vault: Option<Address>,
        nonce: Nonce,
    ) -> Result<WireSignature> {
        if action.user_signed_schema().is_some() {
            self.sign_user_signed_action(action)
        } else {
            self.sign_l1_action(action, vault, nonce)
        }
    }

    pub fn sign_l1_action(
        &self,
        action: &Action,
        vault: Option<Address>,
        nonce: Nonce,
    ) -> Result<WireSignature> {
        let _timer = timings::stage("sign_l1_action");
        let connection_id = connection_id(action, vault, nonce)?;
        self.sign_struct(&L1_DOMAIN, self.agent_struct_hash(connection_id))
    }

    pub fn sign_user_signed_action(&self, action: &Action) -> Result<WireSignature> {
        let _timer = timings::stage("sign_user_action");
        let schema = action
            .user_signed_schema()
            .ok_or(SigningError::NotUserSigned(action.kind()))?;
        let value = serde_json::to_value(action)?;
        let chain_id = signature_chain_id(&value)?;
        let domain = eip712_domain! {
            name: "HyperliquidSignTransaction",
            version: "1",
            chain_id: chain_id,
            verifying_contract: Address::ZERO,
        };
        self.sign_struct(&domain, user_struct_hash(schema, &value)?)
    }

    fn agent_struct_hash(&self, connection_id: B256) -> B256 {
        let source = if self.network.is_mainnet() { "a" } else { "b" };
        let mut encoded = Vec::with_capacity(96);
        encoded.extend_from_slice(keccak256(AGENT_TYPE).as_slice());
        encoded.extend_from_slice(keccak256(source).as_slice());
        encoded.extend_from_slice(connection_id.as_slice());
        keccak256(encoded)
    }

    fn sign_struct(&self, domain: &Eip712Domain, struct_hash: B256) -> Result<WireSignature> {
        let digest = signing_digest(domain, struct_hash);
        let signature = self.wallet.sign_hash_sync(&digest)?;
        Ok(WireSignature::from_alloy(signature))
    }
}

/// `keccak256(msgpack(action) ‖ nonce_be ‖ vault flag [‖ vault])`.
pub fn connection_id(action: &Action, vault: Option<Address>, nonce: Nonce) -> Result<B256> {
    let mut bytes = rmp_serde::to_vec_named(action)?;
    bytes.extend(nonce.into_inner().to_be_bytes());
    match vault {
        Some(vault) => {
            bytes.push(1);
            bytes.extend_from_slice(vault.as_slice());
        }
        None => bytes.push(0),
    }
    Ok(keccak256(bytes))
}

fn signing_digest(domain: &Eip712Domain, struct_hash: B256) -> B256 {
    let mut buf = Vec::with_capacity(66);
    buf.extend_from_slice(&[0x19, 0x01]);
    buf.extend_from_slice(domain.separator().as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

fn user_struct_hash(schema: &UserSignedSchema, value: &Value) -> Result<B256> {
    let mut encoded = Vec::with_capacity(32 * (schema.fields.len() + 1));
    encoded.extend_from_slice(keccak256(schema.encode_type()).as_slice());
    for (name, kind) in schema.fields {
        let field = value.get(*name).ok_or(SigningError::MissingField(name))?;
        encoded.extend_from_slice(encode_field(name, *kind, field)?.as_slice());
    }
    Ok(keccak256(encoded))
}

fn encode_field(name: &'static str, kind: FieldKind, field: &Value) -> Result<B256> {
    let malformed = |why: &str| SigningError::MalformedField {
        field: name,
        why: why.to_string(),
    };
    let word = match kind {
        FieldKind::String => {
            let text = field.as_str().ok_or_else(|| malformed("expected a string"))?;
            keccak256(text)
        }
        FieldKind::Uint64 => {
            let number = field.as_u64().ok_or_else(|| malformed("expected a u64"))?;
            B256::from(U256::from(number).to_be_bytes::<32>())
        }
        FieldKind::Bool => {
            let flag = field.as_bool().ok_or_else(|| malformed("expected a bool"))?;
            B256::from(U256::from(u8::from(flag)).to_be_bytes::<32>())
        }
        FieldKind::Address => {
            let text = field
                .as_str()
                .ok_or_else(|| malformed("expected an address"))?;
            let address: Address = text.parse().map_err(|_| malformed("invalid address"))?;
            address.into_word()
        }
    };
    Ok(word)
}

fn signature_chain_id(value: &Value) -> Result<u64> {
    match value.get("signatureChainId").and_then(Value::as_str) {
        Some(raw) => u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|err| {
            SigningError::MalformedField {
                field: "signatureChainId",
                why: err.to_string(),
            }
        }),
        None => Ok(SIGNATURE_CHAIN_ID),
    }
}

fn sanitize_private_key(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix("0x").unwrap_or(value)
}
