use crate::utils::{account_strkey, decode_base64, muxed_to_account_id, tx_hash};
use crate::{Result, SandboxError};
use stellar_xdr::curr::{
    AccountId, InvokeHostFunctionOp, Limits, OperationBody, ReadXdr, SorobanTransactionData,
    TransactionEnvelope, TransactionExt, TransactionV1Envelope,
};

/// A decoded `TransactionEnvelope` carrying exactly one `InvokeHostFunction`
/// operation. The operation runs as the transaction source; an operation
/// source naming any other account is rejected.
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    pub raw: Vec<u8>,
    pub envelope: TransactionV1Envelope,
    pub hash: [u8; 32],
    operation: InvokeHostFunctionOp,
}

impl ParsedEnvelope {
    pub fn from_base64(input: &str, network_id: &[u8; 32]) -> Result<Self> {
        let raw = decode_base64(input, "transaction envelope")?;
        let envelope = TransactionEnvelope::from_xdr(&raw, Limits::none()).map_err(|e| {
            SandboxError::MalformedInput(format!("transaction envelope is not valid XDR: {e}"))
        })?;
        let envelope = match envelope {
            TransactionEnvelope::Tx(envelope) => envelope,
            TransactionEnvelope::TxV0(_) => {
                return Err(SandboxError::MalformedInput(
                    "v0 transaction envelopes are not supported".to_string(),
                ))
            }
            TransactionEnvelope::TxFeeBump(_) => {
                return Err(SandboxError::MalformedInput(
                    "fee bump transactions are not supported".to_string(),
                ))
            }
        };

        let source = muxed_to_account_id(&envelope.tx.source_account);
        let operation = match envelope.tx.operations.as_slice() {
            [op] => match &op.body {
                OperationBody::InvokeHostFunction(invoke) => {
                    if let Some(op_source) = op.source_account.as_ref().map(muxed_to_account_id) {
                        if op_source != source {
                            return Err(SandboxError::MalformedInput(format!(
                                "operation source {} differs from transaction source {}",
                                account_strkey(&op_source),
                                account_strkey(&source)
                            )));
                        }
                    }
                    invoke.clone()
                }
                other => {
                    return Err(SandboxError::MalformedInput(format!(
                        "expected an InvokeHostFunction operation, got {}",
                        other.name()
                    )))
                }
            },
            ops => {
                return Err(SandboxError::MalformedInput(format!(
                    "expected exactly one operation, got {}",
                    ops.len()
                )))
            }
        };

        let hash = tx_hash(&envelope.tx, network_id)?;
        Ok(Self {
            raw,
            envelope,
            hash,
            operation,
        })
    }

    pub fn operation(&self) -> &InvokeHostFunctionOp {
        &self.operation
    }

    pub fn source_account(&self) -> AccountId {
        muxed_to_account_id(&self.envelope.tx.source_account)
    }

    /// Account the host function runs as. Always the transaction source,
    /// the only account whose signatures are checked.
    pub fn invocation_source(&self) -> AccountId {
        self.source_account()
    }

    pub fn sequence_number(&self) -> i64 {
        self.envelope.tx.seq_num.0
    }

    pub fn fee(&self) -> u32 {
        self.envelope.tx.fee
    }

    pub fn soroban_data(&self) -> Option<&SorobanTransactionData> {
        match &self.envelope.tx.ext {
            TransactionExt::V1(data) => Some(data),
            TransactionExt::V0 => None,
        }
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
