pub mod keys;
pub mod xdr;

pub use keys::{
    account_id_from_bytes, account_key_bytes, account_strkey, address_strkey,
    muxed_to_account_id, parse_account_id, parse_sc_address,
};
pub use xdr::{
    decode_base64, describe_key, encode_base64, from_xdr_base64, ledger_key_of, sha256,
    symbol, to_xdr_base64, to_xdr_bytes, tx_hash, xdr_len,
};
