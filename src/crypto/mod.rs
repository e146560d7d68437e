mod cbc;
mod prf;

pub(crate) use cbc::{Decryptor, Encryptor, MAC_LEN};
pub(crate) use prf::prf;
