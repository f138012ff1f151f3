#![forbid(unsafe_code)]

use super::StoreError;
use std::path::Path;
use sz_core::merge::{UnitSeed, apply_seed};
use sz_core::{ProjectConfig, Unit};
use time::OffsetDateTime;

/// Unit-document persistence. A whole unit is read, mutated by the caller and written
/// back; implementations only guarantee atomicity at unit granularity.
pub trait UnitStore {
    fn get_unit(&self, project_key: &str, unit_id: &str) -> Result<Unit, StoreError>;

    fn save_unit(&mut self, project_key: &str, unit: &Unit) -> Result<(), StoreError>;

    /// Unit ids of a project in ascending order.
    fn list_unit_ids(&self, project_key: &str) -> Result<Vec<String>, StoreError>;

    fn load_project_config(&self, project_key: &str)
    -> Result<Option<ProjectConfig>, StoreError>;

    fn save_project_config(&mut self, config: &ProjectConfig) -> Result<(), StoreError>;

    fn base_dir(&self) -> &Path;

    /// Loads the unit and applies `seed` through the merge policy, or builds a fresh unit
    /// from the seed. Nothing is written; the caller saves once its own edits are done.
    fn load_or_seed_unit(
        &self,
        project_key: &str,
        unit_id: &str,
        seed: UnitSeed,
        now: OffsetDateTime,
    ) -> Result<Unit, StoreError> {
        match self.get_unit(project_key, unit_id) {
            Ok(mut unit) => {
                if apply_seed(&mut unit, &seed) {
                    unit.touch(now);
                }
                Ok(unit)
            }
            Err(err) if err.is_unknown_unit() => Ok(seed.into_unit(unit_id, now)),
            Err(err) => Err(err),
        }
    }
}
