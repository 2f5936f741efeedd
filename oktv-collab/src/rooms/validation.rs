use crate::store::{RoomId, RoomStore};

use super::RoomError;

/// The states a room code passes through on its way into a room. The length
/// and charset gate runs before the store is ever consulted, so malformed
/// codes cannot cause store reads.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomValidation {
    Idle,
    ValidatingLength,
    CheckingExistence(RoomId),
    Valid(RoomId),
    InvalidRedirecting,
}

impl RoomValidation {
    pub fn new() -> Self {
        Self::Idle
    }

    /// Runs the local gate: normalization, length, and charset.
    pub fn validate_code(self, raw: &str) -> Self {
        match RoomId::parse(raw) {
            Ok(id) => Self::CheckingExistence(id),
            Err(_) => Self::InvalidRedirecting,
        }
    }

    /// Resolves the existence check. Admins validate into rooms that do not
    /// exist yet, since creation is lazy on their path.
    pub fn confirm_existence(self, exists: bool, is_admin: bool) -> Self {
        match self {
            Self::CheckingExistence(id) if exists || is_admin => Self::Valid(id),
            _ => Self::InvalidRedirecting,
        }
    }
}

impl Default for RoomValidation {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the full validation sequence against a store.
pub async fn validate_room<S>(store: &S, raw: &str, is_admin: bool) -> Result<RoomId, RoomError>
where
    S: RoomStore,
{
    let id = RoomId::parse(raw).map_err(RoomError::InvalidCode)?;

    let exists = store.room_exists(&id).await?;
    let state = RoomValidation::CheckingExistence(id.clone()).confirm_existence(exists, is_admin);

    match state {
        RoomValidation::Valid(id) => Ok(id),
        _ => Err(RoomError::RoomNotFound(id.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn transitions_reject_malformed_codes() {
        let state = RoomValidation::new().validate_code("short");
        assert_eq!(state, RoomValidation::InvalidRedirecting);

        let state = RoomValidation::new().validate_code("abc123");
        assert_eq!(
            state,
            RoomValidation::CheckingExistence(RoomId::parse("ABC123").unwrap())
        );
    }

    #[test]
    fn existence_check_respects_admin() {
        let checking = RoomValidation::new().validate_code("abc123");

        let guest = checking.clone().confirm_existence(false, false);
        assert_eq!(guest, RoomValidation::InvalidRedirecting);

        let admin = checking.confirm_existence(false, true);
        assert!(matches!(admin, RoomValidation::Valid(_)));
    }

    #[tokio::test]
    async fn length_gate_runs_before_store_access() {
        let store = MemoryStore::new();

        let result = validate_room(&store, "toolongcode", false).await;
        assert!(matches!(result, Err(RoomError::InvalidCode(_))));

        let result = validate_room(&store, "ABC123", false).await;
        assert!(matches!(result, Err(RoomError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn existing_room_validates_for_guests() {
        let store = MemoryStore::new();
        let id = RoomId::parse("ABC123").unwrap();
        store.create_room(&id).await.unwrap();

        let validated = validate_room(&store, "abc123", false).await.unwrap();
        assert_eq!(validated, id);
    }
}
