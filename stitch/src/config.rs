use crate::bundle::ProjectionMethod;

#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Cylindrical panorama mode: search for the focal factor and pre-warp
    /// every input before chaining.
    pub pano: bool,
    /// Early-exit threshold on |slope| during the factor search.
    pub slope_plain: f64,
    /// Output projection override. `None` keeps the per-mode default: flat
    /// after a cylindrical pre-warp, cylindrical for the planar chain.
    pub projection: Option<ProjectionMethod>,
    /// Shear the chained transforms so the first and last image centers end
    /// up on the same horizontal. Planar-chain mode only.
    pub straighten: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            pano: false,
            slope_plain: 1e-2,
            projection: None,
            straighten: false,
        }
    }
}
