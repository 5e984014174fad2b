//! FILENAME: core/engine/src/store.rs
//! PURPOSE: The persistence boundary the engine depends on.
//! CONTEXT: Implementations live outside the engine (see the `cube-store`
//! crate). How a name maps to tenant, app, version or branch is up to the
//! implementation.

use crate::definition::CubeDefinition;
use crate::error::CubeResult;

pub trait CubeStore: Send + Sync {
    /// `Ok(None)` when the store has no cube by that name.
    fn load_cube(&self, name: &str) -> CubeResult<Option<CubeDefinition>>;

    fn save_cube(&self, name: &str, definition: &CubeDefinition) -> CubeResult<()>;

    fn list_cubes(&self) -> CubeResult<Vec<String>>;
}
