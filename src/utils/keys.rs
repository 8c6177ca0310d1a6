use crate::{Result, SandboxError};
use stellar_xdr::curr::{AccountId, Hash, MuxedAccount, PublicKey, ScAddress, Uint256};

use super::xdr::from_xdr_base64;

/// Parse an account id given either as a `G...` strkey or as base64 XDR `AccountId`.
pub fn parse_account_id(input: &str) -> Result<AccountId> {
    let input = input.trim();
    if input.starts_with('G') {
        return stellar_strkey::ed25519::PublicKey::from_string(input)
            .map(|pk| account_id_from_bytes(pk.0))
            .map_err(|e| SandboxError::InvalidKey(format!("'{input}' is not an account strkey: {e:?}")));
    }
    from_xdr_base64::<AccountId>(input, "account id")
        .map_err(|_| SandboxError::InvalidKey(format!("'{input}' is not an account id")))
}

/// Parse a contract or account address given as a `C...`/`G...` strkey or base64 XDR `ScAddress`.
pub fn parse_sc_address(input: &str) -> Result<ScAddress> {
    let input = input.trim();
    if input.starts_with('C') {
        return stellar_strkey::Contract::from_string(input)
            .map(|c| ScAddress::Contract(Hash(c.0)))
            .map_err(|e| SandboxError::InvalidKey(format!("'{input}' is not a contract strkey: {e:?}")));
    }
    if input.starts_with('G') {
        return parse_account_id(input).map(ScAddress::Account);
    }
    from_xdr_base64::<ScAddress>(input, "address")
        .map_err(|_| SandboxError::InvalidKey(format!("'{input}' is not a contract address")))
}

pub fn account_id_from_bytes(bytes: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes)))
}

pub fn account_key_bytes(id: &AccountId) -> [u8; 32] {
    let AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes))) = id;
    *bytes
}

pub fn account_strkey(id: &AccountId) -> String {
    stellar_strkey::ed25519::PublicKey(account_key_bytes(id)).to_string()
}

pub fn address_strkey(address: &ScAddress) -> String {
    match address {
        ScAddress::Account(id) => account_strkey(id),
        ScAddress::Contract(Hash(bytes)) => stellar_strkey::Contract(*bytes).to_string(),
    }
}

/// Underlying account of a possibly multiplexed account.
pub fn muxed_to_account_id(muxed: &MuxedAccount) -> AccountId {
    match muxed {
        MuxedAccount::Ed25519(key) => account_id_from_bytes(key.0),
        MuxedAccount::MuxedEd25519(m) => account_id_from_bytes(m.ed25519.0),
    }
}
