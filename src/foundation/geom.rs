/// Integer rectangle `[left, right) x [top, bottom)` in surface pixel space.
///
/// Serialized as `[left, top, right, bottom]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct IRect {
    /// Inclusive left edge.
    pub left: i32,
    /// Inclusive top edge.
    pub top: i32,
    /// Exclusive right edge.
    pub right: i32,
    /// Exclusive bottom edge.
    pub bottom: i32,
}

impl IRect {
    /// The canonical empty rectangle.
    pub const EMPTY: IRect = IRect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Build from edges.
    pub const fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from an origin and a size.
    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::from_ltrb(x, y, x.saturating_add(w), y.saturating_add(h))
    }

    /// Rectangle covering a `width x height` surface.
    pub fn from_size(width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        Self::from_ltrb(0, 0, w, h)
    }

    /// Width in pixels (0 for empty or inverted rectangles).
    pub fn width(self) -> u32 {
        u32::try_from(self.right.saturating_sub(self.left)).unwrap_or(0)
    }

    /// Height in pixels (0 for empty or inverted rectangles).
    pub fn height(self) -> u32 {
        u32::try_from(self.bottom.saturating_sub(self.top)).unwrap_or(0)
    }

    /// Return `true` when the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Smallest rectangle containing both. Empty inputs are ignored.
    pub fn join(self, other: IRect) -> IRect {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        IRect::from_ltrb(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Overlap of both rectangles, or `None` when they do not intersect.
    pub fn intersect(self, other: IRect) -> Option<IRect> {
        let r = IRect::from_ltrb(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Return `true` when `other` lies entirely inside `self`.
    pub fn contains(self, other: IRect) -> bool {
        !other.is_empty()
            && self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

impl From<[i32; 4]> for IRect {
    fn from(v: [i32; 4]) -> Self {
        IRect::from_ltrb(v[0], v[1], v[2], v[3])
    }
}

impl From<IRect> for [i32; 4] {
    fn from(r: IRect) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}
