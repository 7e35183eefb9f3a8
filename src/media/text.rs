use tracing::debug;

use crate::error::Result;
use crate::media::{OverlayRequest, RenderedOverlay, TextRenderer};
use crate::model::ScriptRenderSettings;
use crate::render::Frame;

/// Stand-in text renderer used when no shaping collaborator is wired up.
///
/// Emits a fully transparent canvas-sized overlay per request so previews
/// and exports stay structurally correct without the external renderer.
pub struct BlankTextRenderer {
    width: u32,
    height: u32,
}

impl BlankTextRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl TextRenderer for BlankTextRenderer {
    fn render(
        &self,
        requests: &[OverlayRequest],
        _settings: &ScriptRenderSettings,
    ) -> Result<Vec<RenderedOverlay>> {
        debug!("Rendering {} blank overlays", requests.len());
        let blank = Frame::new_transparent(self.width, self.height).to_png_bytes()?;
        Ok(requests
            .iter()
            .map(|request| RenderedOverlay {
                item_id: request.item_id,
                width: self.width,
                height: self.height,
                png_bytes: blank.clone(),
            })
            .collect())
    }
}
