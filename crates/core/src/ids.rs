#![forbid(unsafe_code)]

use rand::RngCore;
use rand::rngs::OsRng;

pub const RUN_PREFIX: &str = "run";
pub const STEP_PREFIX: &str = "step";
pub const DB_CHECK_PREFIX: &str = "db";

const ID_BYTES: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdError {
    Generation(String),
}

impl IdError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation_error",
        }
    }
}

impl std::fmt::Display for IdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation(detail) => write!(f, "id generation failed: {detail}"),
        }
    }
}

impl std::error::Error for IdError {}

/// Returns `<prefix>_<16 lowercase hex>` from 8 bytes of OS randomness.
pub fn new_id(prefix: &str) -> Result<String, IdError> {
    new_id_with(&mut OsRng, prefix)
}

pub fn new_id_with<R: RngCore + ?Sized>(rng: &mut R, prefix: &str) -> Result<String, IdError> {
    let mut bytes = [0u8; ID_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|err| IdError::Generation(err.to_string()))?;
    Ok(format!("{prefix}_{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn id_has_prefix_and_sixteen_hex_chars() {
        let id = new_id(RUN_PREFIX).expect("os rng");
        let (prefix, hex_part) = id.split_once('_').expect("separator");
        assert_eq!(prefix, "run");
        assert_eq!(hex_part.len(), 16);
        assert!(
            hex_part
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn deterministic_rng_yields_expected_encoding() {
        let mut rng = StepRng::new(0x0102_0304_0506_0708, 0);
        let id = new_id_with(&mut rng, "step").expect("mock rng");
        assert_eq!(id, "step_0807060504030201");
    }

    #[test]
    fn consecutive_ids_differ() {
        let a = new_id(STEP_PREFIX).expect("os rng");
        let b = new_id(STEP_PREFIX).expect("os rng");
        assert_ne!(a, b);
    }
}
