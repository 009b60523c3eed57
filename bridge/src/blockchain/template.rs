/// Block Template - data model of kaspad's getBlockTemplate response
///
/// Field names follow the node's response message (PascalCase) so workers
/// subscribed to the channel can decode the payload with the same structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockTemplate {
    pub block: RpcBlock,
    #[serde(default)]
    pub is_synced: bool,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcBlock {
    pub header: RpcBlockHeader,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcBlockHeader {
    pub version: u32,
    #[serde(default)]
    pub parents: Vec<RpcBlockLevelParents>,
    pub hash_merkle_root: String,
    #[serde(rename = "AcceptedIDMerkleRoot")]
    pub accepted_id_merkle_root: String,
    #[serde(rename = "UTXOCommitment")]
    pub utxo_commitment: String,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
    pub bits: u32,
    pub nonce: u64,
    #[serde(rename = "DAAScore")]
    pub daa_score: u64,
    pub blue_work: String,
    pub blue_score: u64,
    pub pruning_point: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcBlockLevelParents {
    pub parent_hashes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcTransaction {
    pub version: u16,
    #[serde(default)]
    pub inputs: Vec<RpcTransactionInput>,
    #[serde(default)]
    pub outputs: Vec<RpcTransactionOutput>,
    pub lock_time: u64,
    #[serde(rename = "SubnetworkID")]
    pub subnetwork_id: String,
    pub gas: u64,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcTransactionInput {
    pub previous_outpoint: RpcOutpoint,
    pub signature_script: String,
    pub sequence: u64,
    pub sig_op_count: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcOutpoint {
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcTransactionOutput {
    pub amount: u64,
    pub script_public_key: RpcScriptPublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RpcScriptPublicKey {
    pub version: u16,
    pub script: String,
}

impl BlockTemplate {
    /// Digest of the header fields worth printing
    pub fn summary(&self) -> TemplateSummary {
        let header = &self.block.header;
        TemplateSummary {
            hash_merkle_root: header.hash_merkle_root.clone(),
            accepted_id_merkle_root: header.accepted_id_merkle_root.clone(),
            utxo_commitment: header.utxo_commitment.clone(),
            timestamp: header.timestamp,
            bits: header.bits,
            nonce: header.nonce,
            daa_score: header.daa_score,
            blue_work: header.blue_work.clone(),
            blue_score: header.blue_score,
            pruning_point: header.pruning_point.clone(),
            parent_levels: header.parents.len(),
            transaction_count: self.block.transactions.len(),
            is_synced: self.is_synced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub hash_merkle_root: String,
    pub accepted_id_merkle_root: String,
    pub utxo_commitment: String,
    pub timestamp: i64,
    pub bits: u32,
    pub nonce: u64,
    pub daa_score: u64,
    pub blue_work: String,
    pub blue_score: u64,
    pub pruning_point: String,
    pub parent_levels: usize,
    pub transaction_count: usize,
    pub is_synced: bool,
}

impl fmt::Display for TemplateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string());

        writeln!(f, "HashMerkleRoot        : {}", self.hash_merkle_root)?;
        writeln!(f, "AcceptedIDMerkleRoot  : {}", self.accepted_id_merkle_root)?;
        writeln!(f, "UTXOCommitment        : {}", self.utxo_commitment)?;
        writeln!(f, "Timestamp             : {} ({})", self.timestamp, time)?;
        writeln!(f, "Bits                  : {:#010x}", self.bits)?;
        writeln!(f, "Nonce                 : {}", self.nonce)?;
        writeln!(f, "DAAScore              : {}", self.daa_score)?;
        writeln!(f, "BlueWork              : {}", self.blue_work)?;
        writeln!(f, "BlueScore             : {}", self.blue_score)?;
        writeln!(f, "PruningPoint          : {}", self.pruning_point)?;
        writeln!(f, "Parent Levels         : {}", self.parent_levels)?;
        writeln!(f, "Transactions Length   : {}", self.transaction_count)?;
        write!(f, "Synced                : {}", self.is_synced)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Template whose every tagged field is derived from `tag`
    pub(crate) fn tagged_template(tag: u64) -> BlockTemplate {
        BlockTemplate {
            block: RpcBlock {
                header: RpcBlockHeader {
                    version: 1,
                    parents: vec![RpcBlockLevelParents {
                        parent_hashes: vec![format!("{:064x}", tag.wrapping_sub(1))],
                    }],
                    hash_merkle_root: format!("{:064x}", tag),
                    accepted_id_merkle_root: format!("{:064x}", tag),
                    utxo_commitment: format!("{:064x}", tag),
                    timestamp: 1_700_000_000_000 + tag as i64,
                    bits: 0x1e7fffff,
                    nonce: 0,
                    daa_score: tag,
                    blue_work: format!("{:x}", tag),
                    blue_score: tag,
                    pruning_point: format!("{:064x}", 0),
                },
                transactions: vec![RpcTransaction {
                    version: 0,
                    inputs: vec![],
                    outputs: vec![RpcTransactionOutput {
                        amount: 50_000_000_000,
                        script_public_key: RpcScriptPublicKey {
                            version: 0,
                            script: "20aa".to_string(),
                        },
                        verbose_data: None,
                    }],
                    lock_time: 0,
                    subnetwork_id: "0100000000000000000000000000000000000000".to_string(),
                    gas: 0,
                    payload: format!("{:016x}", tag),
                    verbose_data: None,
                }],
                verbose_data: None,
            },
            is_synced: true,
            error: None,
        }
    }

    #[test]
    fn test_template_wire_names() {
        let json = serde_json::to_value(tagged_template(7)).unwrap();
        let header = &json["Block"]["Header"];

        assert_eq!(header["DAAScore"], 7);
        assert!(header.get("AcceptedIDMerkleRoot").is_some());
        assert!(header.get("UTXOCommitment").is_some());
        assert_eq!(json["Block"]["Transactions"][0]["SubnetworkID"], "0100000000000000000000000000000000000000");
        assert_eq!(json["IsSynced"], true);
    }

    #[test]
    fn test_template_parsing_tolerates_missing_optionals() {
        let json = serde_json::json!({
            "Block": {
                "Header": {
                    "Version": 1,
                    "HashMerkleRoot": "aa",
                    "AcceptedIDMerkleRoot": "bb",
                    "UTXOCommitment": "cc",
                    "Timestamp": 1700000000000i64,
                    "Bits": 503_316_479u32,
                    "Nonce": 0,
                    "DAAScore": 42,
                    "BlueWork": "ff",
                    "BlueScore": 41,
                    "PruningPoint": "dd"
                }
            }
        });

        let template: BlockTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(template.block.header.daa_score, 42);
        assert!(template.block.transactions.is_empty());
        assert!(!template.is_synced);
        assert!(template.error.is_none());
    }

    #[test]
    fn test_summary_reflects_header() {
        let summary = tagged_template(99).summary();

        assert_eq!(summary.daa_score, 99);
        assert_eq!(summary.blue_score, 99);
        assert_eq!(summary.transaction_count, 1);
        assert_eq!(summary.parent_levels, 1);

        let text = summary.to_string();
        assert!(text.contains("DAAScore              : 99"));
        assert!(text.contains("Transactions Length   : 1"));
        assert!(text.contains("0x1e7fffff"));
    }
}
