#![forbid(unsafe_code)]

use crate::model::{JsonMap, Unit};
use time::OffsetDateTime;

/// Title/env offered by a get-or-create caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitSeed {
    pub title: String,
    pub env: Option<JsonMap>,
}

impl UnitSeed {
    pub fn new(title: impl Into<String>, env: Option<JsonMap>) -> Self {
        Self {
            title: title.into(),
            env,
        }
    }

    pub fn into_unit(self, unit_id: &str, now: OffsetDateTime) -> Unit {
        Unit::new(unit_id, self.title, self.env.unwrap_or_default(), now)
    }
}

/// Applies a seed to an existing unit: non-empty title and non-empty env replace the
/// stored values, anything else leaves them untouched. Returns whether the unit changed.
pub fn apply_seed(unit: &mut Unit, seed: &UnitSeed) -> bool {
    let mut changed = false;
    if !seed.title.is_empty() && unit.title != seed.title {
        unit.title = seed.title.clone();
        changed = true;
    }
    if let Some(env) = seed.env.as_ref()
        && !env.is_empty()
        && &unit.env != env
    {
        unit.env = env.clone();
        changed = true;
    }
    changed
}
