use super::*;
use std::collections::BTreeSet;
use std::str::FromStr;

#[test]
fn test_typed_id_from_uuid() {
    let uuid = Uuid::new_v4();
    let id = AccountId::from_uuid(uuid);
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_display() {
    let uuid = Uuid::new_v4();
    let id = LoanTransactionId::from_uuid(uuid);
    assert_eq!(format!("{id}"), uuid.to_string());
}

#[test]
fn test_typed_id_from_str() {
    let uuid = Uuid::new_v4();
    let id = MemberProfileId::from_str(&uuid.to_string()).unwrap();
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_from_str_error() {
    assert!(BranchId::from_str("invalid").is_err());
}

#[test]
fn test_typed_id_serde_transparent() {
    let uuid = Uuid::new_v4();
    let id = GeneralLedgerId::from_uuid(uuid);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{uuid}\""));
    let back: GeneralLedgerId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_v7_ids_sort_by_creation() {
    let ids: Vec<TransactionBatchId> = (0..16).map(|_| TransactionBatchId::new()).collect();
    let sorted: BTreeSet<_> = ids.iter().copied().collect();
    assert_eq!(sorted.len(), ids.len());
}
