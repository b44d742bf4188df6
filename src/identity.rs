use crate::data_structures::{ID, ID_LEN};

/// Every peer id we send starts with this Azureus-style signature.
pub const CLIENT_SIGNATURE: &[u8; 8] = b"-BY0001-";

/// Self-identifying token announced to trackers: the 8-byte client
/// signature followed by 12 random bytes.
///
/// Generated exactly once per process (in `main`) and passed by reference
/// into every tracker session, so all sessions announce the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerId(ID);

impl PeerId {
    pub fn generate() -> Self {
        let mut bytes: [u8; ID_LEN] = rand::random();
        bytes[..CLIENT_SIGNATURE.len()].copy_from_slice(CLIENT_SIGNATURE);

        Self(ID::new(bytes))
    }

    pub fn id(&self) -> &ID {
        &self.0
    }
}
