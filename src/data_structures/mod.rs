mod id;

pub use id::{ID, ID_LEN};
