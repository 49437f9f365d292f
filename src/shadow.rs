//! Shadow State (spec §3): translator-side replica of bind/viewport/scissor
//! fields needed to rewrite draw-target-sensitive calls deterministically.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    pub current_framebuffer: u32,
    pub viewport: Rect,
    pub max_viewport: Rect,
    pub scissor: Rect,
    pub max_scissor: Rect,
}

impl ShadowState {
    #[must_use]
    pub fn new() -> Self {
        ShadowState::default()
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
        self.max_viewport.w = self.max_viewport.w.max(rect.x + rect.w);
        self.max_viewport.h = self.max_viewport.h.max(rect.y + rect.h);
    }

    pub fn set_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
        self.max_scissor.w = self.max_scissor.w.max(rect.x + rect.w);
        self.max_scissor.h = self.max_scissor.h.max(rect.y + rect.h);
    }

    pub fn bind_framebuffer(&mut self, id: u32) {
        self.current_framebuffer = id;
    }

    #[must_use]
    pub fn is_default_framebuffer(&self) -> bool {
        self.current_framebuffer == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_tracks_its_running_maximum() {
        let mut shadow = ShadowState::new();
        shadow.set_viewport(Rect { x: 0, y: 0, w: 100, h: 200 });
        shadow.set_viewport(Rect { x: 0, y: 0, w: 50, h: 400 });
        assert_eq!(shadow.max_viewport.w, 100);
        assert_eq!(shadow.max_viewport.h, 400);
    }

    #[test]
    fn binding_zero_is_the_default_framebuffer() {
        let mut shadow = ShadowState::new();
        shadow.bind_framebuffer(7);
        assert!(!shadow.is_default_framebuffer());
        shadow.bind_framebuffer(0);
        assert!(shadow.is_default_framebuffer());
    }
}
