use std::fmt;

use rand::Rng;

use crate::constants::CLIENT_PREFIX;

/// A 20-byte peer identifier.
///
/// Generated ids are Azureus-style: `-BP0001-` followed by 12 random bytes.
///
/// ```
/// use bitpaito::peer::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.client_id(), Some("BP0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generates a peer id drawing its random tail from `rng`.
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let mut id = [0u8; 20];
        id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
        rng.fill(&mut id[CLIENT_PREFIX.len()..]);
        Self(id)
    }

    /// Returns `None` if the slice is not exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The six characters between the dashes of an Azureus-style id.
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_id() {
            Some(client) => write!(f, "PeerId({})", client),
            None => write!(f, "PeerId({:02x?})", &self.0[..8]),
        }
    }
}

/// Azureus-style ids keep their `-XX0000-` prefix; everything else is hex.
impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = match self.client_id() {
            Some(_) => {
                f.write_str(&String::from_utf8_lossy(&self.0[..8]))?;
                &self.0[8..]
            }
            None => &self.0[..],
        };
        tail.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}
