use std::fmt;

pub const ID_LEN: usize = 20;

/// 20-byte token shared by info hashes and peer ids.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ID([u8; ID_LEN]);

impl ID {
    pub fn new(id_array: [u8; ID_LEN]) -> Self {
        Self(id_array)
    }

    pub fn as_byte_ref(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn as_array(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rv = String::with_capacity(ID_LEN * 2 + 4);

        for chunk in self.0.chunks(4) {
            for byte in chunk {
                rv.push_str(&format!("{byte:02X?}"));
            }
            rv.push(' ');
        }

        f.write_str(rv.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::{ID, ID_LEN};

    #[test]
    fn create() {
        let arr: [u8; ID_LEN] = rand::random();

        let id = ID::new(arr.to_owned());

        for (i, x) in arr.iter().enumerate() {
            assert_eq!(*x, id.as_byte_ref()[i]);
        }
    }

    #[test]
    fn eq() {
        let arr: [u8; ID_LEN] = rand::random();
        let arr2 = arr;

        let id = ID::new(arr);
        let id2 = ID::new(arr2);

        assert_eq!(id, id2);
    }

    #[test]
    fn ne() {
        let arr: [u8; ID_LEN] = rand::random();

        let mut arr2 = arr;
        arr2[9] = arr2[9].wrapping_add(1);

        let id = ID::new(arr);
        let id2 = ID::new(arr2);

        assert_ne!(id, id2);
    }
}
