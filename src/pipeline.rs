//! Render pipeline seam between the frame loop and the GPU.

use crate::error::Result;
use crate::scene::SceneHandles;
use crate::viewport::ViewportSize;

/// One stage of the per-frame render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Backdrop and sphere into the HDR target
    Scene,
    /// Bright pass, blurred mips, composite to the surface
    Bloom,
}

/// Passes run in this order every frame
pub const PASS_ORDER: [PassKind; 2] = [PassKind::Scene, PassKind::Bloom];

pub trait RenderPipeline {
    /// Build GPU programs for the scene's materials, running their compile hooks.
    /// Called once before the first frame.
    fn compile(&mut self, scene: &mut SceneHandles) -> Result<()>;

    /// Resize every pass buffer. `size` is already non-zero.
    fn set_size(&mut self, size: ViewportSize);

    /// Run all passes and present. An error abandons this frame only.
    fn render(&mut self, scene: &SceneHandles) -> Result<()>;
}
