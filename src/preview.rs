//! Live preview
//!
//! A `PreviewLayer` watches the latest frame of one capture session. A
//! `PreviewSurface` hosts at most one layer and keeps its frame equal to
//! the surface bounds.

use crate::convert::to_rgb_image;
use crate::errors::CameraError;
use crate::types::{PixelBuffer, Rect};
use image::RgbImage;
use tokio::sync::watch;
use uuid::Uuid;

pub struct PreviewLayer {
    id: Uuid,
    session_id: Uuid,
    frame: Rect,
    attached: bool,
    source: watch::Receiver<Option<PixelBuffer>>,
}

impl PreviewLayer {
    pub fn new(session_id: Uuid, source: watch::Receiver<Option<PixelBuffer>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            frame: Rect::ZERO,
            attached: false,
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Most recent frame the session produced, if any.
    pub fn latest_frame(&self) -> Option<PixelBuffer> {
        self.source.borrow().clone()
    }

    /// Render the latest frame as RGB. `Ok(None)` before the first frame.
    pub fn snapshot(&self) -> Result<Option<RgbImage>, CameraError> {
        self.latest_frame().as_ref().map(to_rgb_image).transpose()
    }

    /// Wait for the next frame published after the last one seen.
    pub async fn next_frame(&mut self) -> Option<PixelBuffer> {
        self.source.changed().await.ok()?;
        self.source.borrow_and_update().clone()
    }
}

pub struct PreviewSurface {
    frame: Rect,
    layer: Option<PreviewLayer>,
}

impl PreviewSurface {
    pub fn new(frame: Rect) -> Self {
        Self { frame, layer: None }
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn bounds(&self) -> Rect {
        self.frame.bounds()
    }

    /// Attach `layer`, evicting any previous one. The evicted layer is
    /// detached and handed back.
    pub fn insert_preview_layer(&mut self, mut layer: PreviewLayer) -> Option<PreviewLayer> {
        let evicted = self.layer.take().map(|mut old| {
            old.attached = false;
            old
        });

        layer.frame = self.bounds();
        layer.attached = true;
        log::debug!("Preview layer {} attached at {:?}", layer.id, layer.frame);
        self.layer = Some(layer);
        evicted
    }

    /// Detach the current layer and hand it back.
    pub fn remove_preview_layer(&mut self) -> Option<PreviewLayer> {
        self.layer.take().map(|mut layer| {
            layer.attached = false;
            layer
        })
    }

    /// Resize the surface and lay out its layer.
    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
        self.layout_sublayers();
    }

    pub fn layout_sublayers(&mut self) {
        let bounds = self.bounds();
        if let Some(layer) = self.layer.as_mut() {
            layer.frame = bounds;
        }
    }

    pub fn layer(&self) -> Option<&PreviewLayer> {
        self.layer.as_ref()
    }

    pub fn layer_count(&self) -> usize {
        usize::from(self.layer.is_some())
    }
}
