//! Astrodynamics data context
//!
//! Carries the data providers force models need (ephemeris and gravity field
//! coefficients). A context is built once and passed explicitly to whatever
//! builds force models; nothing is initialized process-wide.

use std::sync::Arc;

use crate::propagation::ephemeris::{Ephemeris, EphemerisType, SatkitEphemeris};
use crate::propagation::forces::{BuiltinGravityFields, GravityFieldProvider};

/// Shared ephemeris and gravity field providers
#[derive(Clone)]
pub struct AstroContext {
    ephemeris: Arc<dyn Ephemeris>,
    gravity_fields: Arc<dyn GravityFieldProvider>,
}

impl Default for AstroContext {
    fn default() -> Self {
        Self::low_precision()
    }
}

impl AstroContext {
    pub fn new(
        ephemeris: Arc<dyn Ephemeris>,
        gravity_fields: Arc<dyn GravityFieldProvider>,
    ) -> Self {
        Self {
            ephemeris,
            gravity_fields,
        }
    }

    /// Analytic `satkit` ephemeris and the built-in fields
    pub fn low_precision() -> Self {
        Self::with_ephemeris_type(EphemerisType::LowPrecision)
    }

    pub fn with_ephemeris_type(precision: EphemerisType) -> Self {
        let ctx = Self::new(
            Arc::new(SatkitEphemeris::new(precision)),
            Arc::new(BuiltinGravityFields),
        );
        log::debug!(
            "Astro context: ephemeris {}, gravity fields {}",
            ctx.ephemeris.name(),
            ctx.gravity_fields.name()
        );
        ctx
    }

    pub fn ephemeris(&self) -> Arc<dyn Ephemeris> {
        Arc::clone(&self.ephemeris)
    }

    pub fn gravity_fields(&self) -> &dyn GravityFieldProvider {
        self.gravity_fields.as_ref()
    }
}

impl std::fmt::Debug for AstroContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstroContext")
            .field("ephemeris", &self.ephemeris.name())
            .field("gravity_fields", &self.gravity_fields.name())
            .finish()
    }
}
