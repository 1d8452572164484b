//! Cell-grid layout primitives

/// Rectangle bounds in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering the whole terminal
    pub fn fullscreen(cols: u16, rows: u16) -> Self {
        Rect::new(0, 0, cols, rows)
    }

    /// Right edge x-coordinate (exclusive)
    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge y-coordinate (exclusive)
    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    /// Split horizontally into top and bottom parts
    pub fn split_horizontal(&self, top_height: u16) -> (Rect, Rect) {
        let top = Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: top_height.min(self.height),
        };
        let bottom = Rect {
            x: self.x,
            y: self.y.saturating_add(top.height),
            width: self.width,
            height: self.height.saturating_sub(top.height),
        };
        (top, bottom)
    }

    /// Centered placement of a `width × height` box inside this rect.
    ///
    /// Boxes larger than the rect are pinned to the rect's origin.
    pub fn center(&self, width: u16, height: u16) -> Rect {
        let x = self
            .x
            .saturating_add(self.width.saturating_sub(width) / 2);
        let y = self
            .y
            .saturating_add(self.height.saturating_sub(height) / 2);
        Rect::new(x, y, width.min(self.width), height.min(self.height))
    }
}

/// Truncate a string to fit `width` cells, appending an ellipsis when cut.
///
/// Operates on char boundaries; wide glyphs are not measured (file names in
/// the browser are the only consumer and the off-by-one there is cosmetic).
pub fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    if width <= 1 {
        return "…".repeat(width.min(1));
    }
    let mut out: String = name.chars().take(width - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
    }

    #[test]
    fn test_split_horizontal() {
        let r = Rect::fullscreen(80, 24);
        let (top, bottom) = r.split_horizontal(3);
        assert_eq!(top, Rect::new(0, 0, 80, 3));
        assert_eq!(bottom, Rect::new(0, 3, 80, 21));
    }

    #[test]
    fn test_center_small_box() {
        let r = Rect::new(0, 2, 80, 20);
        let c = r.center(40, 10);
        assert_eq!(c, Rect::new(20, 7, 40, 10));
    }

    #[test]
    fn test_center_oversized_box_pins_to_origin() {
        let r = Rect::new(5, 5, 10, 10);
        let c = r.center(100, 100);
        assert_eq!((c.x, c.y), (5, 5));
        assert_eq!((c.width, c.height), (10, 10));
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 10), "short");
        assert_eq!(truncate_name("a_rather_long_name.mp4", 10), "a_rather_…");
        assert_eq!(truncate_name("ab", 1), "…");
    }
}
