//! Envelope checks that do not depend on evaluating the host function:
//! signatures, time bounds and authorization entries.

use super::envelope::ParsedEnvelope;
use super::host::AuthRequirement;
use crate::ledger::Ledger;
use crate::utils::{account_key_bytes, address_strkey, sha256, symbol, to_xdr_bytes};
use crate::{Result, SandboxError};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use stellar_xdr::curr::{
    Hash, HashIdPreimage, HashIdPreimageSorobanAuthorization, Preconditions, ScAddress, ScBytes,
    ScMap, ScMapEntry, ScVal, ScVec, SorobanAddressCredentials, SorobanAuthorizationEntry,
    SorobanAuthorizedInvocation, SorobanCredentials, TimeBounds,
};

/// Verify that every signature on the envelope is a valid ed25519 signature
/// of the source account over the transaction hash.
pub fn verify_signatures(parsed: &ParsedEnvelope) -> Result<()> {
    let source = parsed.source_account();
    let key_bytes = account_key_bytes(&source);
    let signatures = &parsed.envelope.signatures;
    if signatures.is_empty() {
        return Err(SandboxError::Unauthorized(
            "transaction carries no signatures".to_string(),
        ));
    }

    let verifying_key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| {
        SandboxError::Unauthorized(format!("source account key is not a valid ed25519 key: {e}"))
    })?;

    for decorated in signatures.iter() {
        if decorated.hint.0 != key_bytes[28..] {
            return Err(SandboxError::Unauthorized(format!(
                "no signer of {} matches signature hint {}",
                address_strkey(&ScAddress::Account(source.clone())),
                hex::encode(decorated.hint.0)
            )));
        }
        verify_ed25519(&verifying_key, &parsed.hash, decorated.signature.0.as_slice())
            .map_err(|e| SandboxError::Unauthorized(format!("invalid transaction signature: {e}")))?;
    }
    Ok(())
}

fn verify_ed25519(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> std::result::Result<(), String> {
    let bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| format!("expected 64 signature bytes, got {}", signature.len()))?;
    key.verify(message, &Signature::from_bytes(&bytes))
        .map_err(|e| e.to_string())
}

/// Check the transaction time bounds against the ledger timestamp. A
/// `max_time` of zero means no upper bound.
pub fn check_time_bounds(cond: &Preconditions, now: u64) -> Result<()> {
    let bounds: Option<&TimeBounds> = match cond {
        Preconditions::None => None,
        Preconditions::Time(bounds) => Some(bounds),
        Preconditions::V2(v2) => v2.time_bounds.as_ref(),
    };
    let Some(bounds) = bounds else {
        return Ok(());
    };
    let (min_time, max_time) = (bounds.min_time.0, bounds.max_time.0);
    if now < min_time || (max_time != 0 && now > max_time) {
        return Err(SandboxError::PreconditionFailed {
            now,
            min_time,
            max_time,
        });
    }
    Ok(())
}

/// Payload an address signs to authorize `invocation`.
pub fn authorization_payload(
    network_id: &[u8; 32],
    nonce: i64,
    signature_expiration_ledger: u32,
    invocation: &SorobanAuthorizedInvocation,
) -> Result<[u8; 32]> {
    let preimage = HashIdPreimage::SorobanAuthorization(HashIdPreimageSorobanAuthorization {
        network_id: Hash(*network_id),
        nonce,
        signature_expiration_ledger,
        invocation: invocation.clone(),
    });
    Ok(sha256(&to_xdr_bytes(&preimage)?))
}

/// Signature value of an account credential: a vector of
/// `{public_key, signature}` maps.
pub fn account_signature_value(public_key: [u8; 32], signature: [u8; 64]) -> Result<ScVal> {
    let entry = ScMap(
        vec![
            ScMapEntry {
                key: ScVal::Symbol(symbol("public_key")?),
                val: ScVal::Bytes(ScBytes(public_key.to_vec().try_into()?)),
            },
            ScMapEntry {
                key: ScVal::Symbol(symbol("signature")?),
                val: ScVal::Bytes(ScBytes(signature.to_vec().try_into()?)),
            },
        ]
        .try_into()?,
    );
    Ok(ScVal::Vec(Some(ScVec(vec![ScVal::Map(Some(entry))].try_into()?))))
}

/// Match each requirement against the authorization entries of the
/// operation. Every entry has to satisfy a requirement. Returns the address
/// nonces consumed by the satisfying entries.
pub fn verify_authorization(
    ledger: &Ledger,
    parsed: &ParsedEnvelope,
    requirements: &[AuthRequirement],
) -> Result<Vec<(ScAddress, i64)>> {
    let entries = parsed.operation().auth.as_slice();
    let invoker = ScAddress::Account(parsed.invocation_source());
    let network_id = ledger.clock.network_id();
    let sequence = ledger.clock.sequence();

    let mut used = vec![false; entries.len()];
    let mut nonces = Vec::new();

    for requirement in requirements {
        let mut satisfied = false;
        let mut last_error = None;
        for (index, entry) in entries.iter().enumerate() {
            if used[index] || entry.root_invocation != requirement.invocation {
                continue;
            }
            match check_credentials(entry, requirement, &invoker, &network_id, sequence, ledger, &nonces) {
                Ok(nonce) => {
                    used[index] = true;
                    nonces.extend(nonce);
                    satisfied = true;
                    break;
                }
                Err(reason) => last_error = Some(reason),
            }
        }
        if !satisfied {
            let detail = last_error.unwrap_or_else(|| "no matching authorization entry".to_string());
            return Err(SandboxError::Unauthorized(format!(
                "{} did not authorize the invocation: {detail}",
                address_strkey(&requirement.address)
            )));
        }
    }

    // every declared entry must back a requirement of this invocation
    if let Some(index) = used.iter().position(|used| !used) {
        let holder = match &entries[index].credentials {
            SorobanCredentials::SourceAccount => address_strkey(&invoker),
            SorobanCredentials::Address(creds) => address_strkey(&creds.address),
        };
        return Err(SandboxError::Unauthorized(format!(
            "authorization entry {index} for {holder} is not required by the invocation"
        )));
    }
    Ok(nonces)
}

fn check_credentials(
    entry: &SorobanAuthorizationEntry,
    requirement: &AuthRequirement,
    invoker: &ScAddress,
    network_id: &[u8; 32],
    sequence: u32,
    ledger: &Ledger,
    pending_nonces: &[(ScAddress, i64)],
) -> std::result::Result<Option<(ScAddress, i64)>, String> {
    match &entry.credentials {
        SorobanCredentials::SourceAccount => {
            if &requirement.address == invoker {
                Ok(None)
            } else {
                Err("source account credentials only cover the transaction source".to_string())
            }
        }
        SorobanCredentials::Address(creds) => {
            if creds.address != requirement.address {
                return Err("credentials are for a different address".to_string());
            }
            check_address_credentials(creds, &entry.root_invocation, network_id, sequence)?;
            let nonce = (creds.address.clone(), creds.nonce);
            if ledger.is_nonce_consumed(&nonce.0, nonce.1) || pending_nonces.contains(&nonce) {
                return Err(format!("nonce {} was already used", creds.nonce));
            }
            Ok(Some(nonce))
        }
    }
}

fn check_address_credentials(
    creds: &SorobanAddressCredentials,
    invocation: &SorobanAuthorizedInvocation,
    network_id: &[u8; 32],
    sequence: u32,
) -> std::result::Result<(), String> {
    let account = match &creds.address {
        ScAddress::Account(account) => account,
        ScAddress::Contract(_) => {
            return Err("contract address credentials are not supported".to_string())
        }
    };
    if creds.signature_expiration_ledger < sequence {
        return Err(format!(
            "signature expired at ledger {}",
            creds.signature_expiration_ledger
        ));
    }

    let key_bytes = account_key_bytes(account);
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| e.to_string())?;
    let payload = authorization_payload(
        network_id,
        creds.nonce,
        creds.signature_expiration_ledger,
        invocation,
    )
    .map_err(|e| e.to_string())?;

    let signatures = account_signatures(&creds.signature)?;
    if signatures.is_empty() {
        return Err("authorization entry is not signed".to_string());
    }
    for (public_key, signature) in signatures {
        if public_key != key_bytes {
            return Err("signature from a key that is not the account's signer".to_string());
        }
        verify_ed25519(&key, &payload, &signature)?;
    }
    Ok(())
}

fn account_signatures(value: &ScVal) -> std::result::Result<Vec<([u8; 32], Vec<u8>)>, String> {
    let items = match value {
        ScVal::Vec(Some(items)) => items.0.as_slice(),
        ScVal::Vec(None) | ScVal::Void => return Ok(Vec::new()),
        other => return Err(format!("unexpected signature value {other:?}")),
    };
    let public_key_sym = ScVal::Symbol(symbol("public_key").map_err(|e| e.to_string())?);
    let signature_sym = ScVal::Symbol(symbol("signature").map_err(|e| e.to_string())?);

    items
        .iter()
        .map(|item| {
            let ScVal::Map(Some(map)) = item else {
                return Err("signature element is not a map".to_string());
            };
            let field = |name: &ScVal| {
                map.0.iter().find(|e| &e.key == name).and_then(|e| match &e.val {
                    ScVal::Bytes(bytes) => Some(bytes.0.to_vec()),
                    _ => None,
                })
            };
            let public_key: [u8; 32] = field(&public_key_sym)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| "signature element has no public_key".to_string())?;
            let signature = field(&signature_sym)
                .ok_or_else(|| "signature element has no signature".to_string())?;
            Ok((public_key, signature))
        })
        .collect()
}
