use crate::{Result, SandboxError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    Hash, LedgerEntry, LedgerEntryData, LedgerKey, LedgerKeyAccount, LedgerKeyContractCode,
    LedgerKeyContractData, LedgerKeyTtl, Limits, ReadXdr, ScSymbol, StringM, Transaction,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction, WriteXdr,
};

/// Decode a base64 string, reporting which payload was being decoded on failure.
pub fn decode_base64(input: &str, what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| SandboxError::MalformedInput(format!("{what} is not valid base64: {e}")))
}

/// Decode a base64 XDR value.
pub fn from_xdr_base64<T: ReadXdr>(input: &str, what: &str) -> Result<T> {
    let bytes = decode_base64(input, what)?;
    T::from_xdr(bytes, Limits::none())
        .map_err(|e| SandboxError::MalformedInput(format!("{what} is not valid XDR: {e}")))
}

pub fn to_xdr_bytes<T: WriteXdr>(value: &T) -> Result<Vec<u8>> {
    Ok(value.to_xdr(Limits::none())?)
}

pub fn to_xdr_base64<T: WriteXdr>(value: &T) -> Result<String> {
    Ok(STANDARD.encode(to_xdr_bytes(value)?))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn symbol(name: &str) -> Result<ScSymbol> {
    StringM::try_from(name)
        .map(ScSymbol)
        .map_err(|e| SandboxError::MalformedInput(format!("'{name}' is not a valid symbol: {e}")))
}

/// Size of the XDR encoding of `value`, saturating at `u32::MAX`.
pub fn xdr_len<T: WriteXdr>(value: &T) -> u32 {
    value
        .to_xdr(Limits::none())
        .map(|bytes| u32::try_from(bytes.len()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Hash of a transaction as signed by clients: sha256 over the XDR
/// `TransactionSignaturePayload` for the given network.
pub fn tx_hash(tx: &Transaction, network_id: &[u8; 32]) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(*network_id),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    Ok(sha256(&to_xdr_bytes(&payload)?))
}

/// Ledger key addressing `entry`, for the entry kinds the sandbox stores.
pub fn ledger_key_of(entry: &LedgerEntry) -> Option<LedgerKey> {
    match &entry.data {
        LedgerEntryData::Account(account) => Some(LedgerKey::Account(LedgerKeyAccount {
            account_id: account.account_id.clone(),
        })),
        LedgerEntryData::ContractData(data) => Some(LedgerKey::ContractData(LedgerKeyContractData {
            contract: data.contract.clone(),
            key: data.key.clone(),
            durability: data.durability,
        })),
        LedgerEntryData::ContractCode(code) => Some(LedgerKey::ContractCode(LedgerKeyContractCode {
            hash: code.hash.clone(),
        })),
        LedgerEntryData::Ttl(ttl) => Some(LedgerKey::Ttl(LedgerKeyTtl {
            key_hash: ttl.key_hash.clone(),
        })),
        _ => None,
    }
}

/// Short human-readable description of a key for logs and error messages.
pub fn describe_key(key: &LedgerKey) -> String {
    match key {
        LedgerKey::Account(k) => format!("account {}", super::keys::account_strkey(&k.account_id)),
        LedgerKey::ContractData(k) => format!(
            "contract data {:?} of {} ({:?})",
            k.key,
            super::keys::address_strkey(&k.contract),
            k.durability
        ),
        LedgerKey::ContractCode(k) => format!("contract code {}", hex::encode(k.hash.0)),
        other => format!("{other:?}"),
    }
}
