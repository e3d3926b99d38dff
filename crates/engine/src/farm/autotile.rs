/// Which of the four orthogonal neighbours are tilled. Out-of-bounds counts as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NeighborMask {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl NeighborMask {
    /// Bit 0 top, bit 1 right, bit 2 bottom, bit 3 left.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            top: bits & 0b0001 != 0,
            right: bits & 0b0010 != 0,
            bottom: bits & 0b0100 != 0,
            left: bits & 0b1000 != 0,
        }
    }

    pub fn bits(self) -> u8 {
        u8::from(self.top)
            | u8::from(self.right) << 1
            | u8::from(self.bottom) << 2
            | u8::from(self.left) << 3
    }
}

/// Tilled-soil tile shapes. Names describe which edges of the tile stay open, so a cell
/// with only a left neighbour uses the piece whose right side is rounded off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoilVariant {
    Isolated,
    OpenRight,
    OpenLeft,
    Horizontal,
    OpenBottom,
    OpenTop,
    Vertical,
    CornerTopRight,
    CornerTopLeft,
    CornerBottomRight,
    CornerBottomLeft,
    TeeRight,
    TeeLeft,
    TeeBottom,
    TeeTop,
    Cross,
}

impl SoilVariant {
    pub const ALL: [SoilVariant; 16] = [
        SoilVariant::Isolated,
        SoilVariant::OpenRight,
        SoilVariant::OpenLeft,
        SoilVariant::Horizontal,
        SoilVariant::OpenBottom,
        SoilVariant::OpenTop,
        SoilVariant::Vertical,
        SoilVariant::CornerTopRight,
        SoilVariant::CornerTopLeft,
        SoilVariant::CornerBottomRight,
        SoilVariant::CornerBottomLeft,
        SoilVariant::TeeRight,
        SoilVariant::TeeLeft,
        SoilVariant::TeeBottom,
        SoilVariant::TeeTop,
        SoilVariant::Cross,
    ];

    pub fn select(mask: NeighborMask) -> Self {
        let NeighborMask {
            top: t,
            right: r,
            bottom: b,
            left: l,
        } = mask;

        match (t, r, b, l) {
            (true, true, true, true) => SoilVariant::Cross,
            // horizontal runs
            (false, false, false, true) => SoilVariant::OpenRight,
            (false, true, false, false) => SoilVariant::OpenLeft,
            (false, true, false, true) => SoilVariant::Horizontal,
            // vertical runs
            (true, false, false, false) => SoilVariant::OpenBottom,
            (false, false, true, false) => SoilVariant::OpenTop,
            (true, false, true, false) => SoilVariant::Vertical,
            // corners
            (false, false, true, true) => SoilVariant::CornerTopRight,
            (false, true, true, false) => SoilVariant::CornerTopLeft,
            (true, false, false, true) => SoilVariant::CornerBottomRight,
            (true, true, false, false) => SoilVariant::CornerBottomLeft,
            // T junctions
            (true, true, true, false) => SoilVariant::TeeRight,
            (true, false, true, true) => SoilVariant::TeeLeft,
            (true, true, false, true) => SoilVariant::TeeBottom,
            (false, true, true, true) => SoilVariant::TeeTop,
            (false, false, false, false) => SoilVariant::Isolated,
        }
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// File stem of the variant's image under `graphics/soil/`.
    pub fn asset_name(self) -> &'static str {
        match self {
            SoilVariant::Isolated => "o",
            SoilVariant::OpenRight => "r",
            SoilVariant::OpenLeft => "l",
            SoilVariant::Horizontal => "lr",
            SoilVariant::OpenBottom => "b",
            SoilVariant::OpenTop => "t",
            SoilVariant::Vertical => "tb",
            SoilVariant::CornerTopRight => "tr",
            SoilVariant::CornerTopLeft => "tl",
            SoilVariant::CornerBottomRight => "br",
            SoilVariant::CornerBottomLeft => "bl",
            SoilVariant::TeeRight => "tbr",
            SoilVariant::TeeLeft => "tbl",
            SoilVariant::TeeBottom => "lrb",
            SoilVariant::TeeTop => "lrt",
            SoilVariant::Cross => "x",
        }
    }
}
