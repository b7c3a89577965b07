/// Templates and jobs are identified by UUID strings minted at creation
/// time (not by the database), so ids survive export/import unchanged.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh entity id.
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
