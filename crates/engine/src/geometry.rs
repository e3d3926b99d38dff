#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized_or_zero(self) -> Vec2 {
        let length = self.length();
        if length <= f32::EPSILON {
            return Vec2::ZERO;
        }
        Vec2 {
            x: self.x / length,
            y: self.y / length,
        }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Integer pixel rectangle. `right()` and `bottom()` are inclusive, so a rect at x=0 with
/// width 10 has `right() == 9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width - 1
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height - 1
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: self.x as f32 + self.width as f32 * 0.5,
            y: self.y as f32 + self.height as f32 * 0.5,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        !self.is_empty()
            && point.x >= self.x as f32
            && point.x < (self.x + self.width) as f32
            && point.y >= self.y as f32
            && point.y < (self.y + self.height) as f32
    }

    pub fn set_left(&mut self, left: i32) {
        self.x = left;
    }

    pub fn set_right(&mut self, right: i32) {
        self.x = right - self.width + 1;
    }

    pub fn set_top(&mut self, top: i32) {
        self.y = top;
    }

    pub fn set_bottom(&mut self, bottom: i32) {
        self.y = bottom - self.height + 1;
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn translated_by(&self, offset: Vec2) -> Rect {
        self.translate(-offset.x.round() as i32, -offset.y.round() as i32)
    }

    pub fn with_center(&self, center: Vec2) -> Rect {
        Rect::new(
            (center.x - self.width as f32 * 0.5).round() as i32,
            (center.y - self.height as f32 * 0.5).round() as i32,
            self.width,
            self.height,
        )
    }

    /// Sub-rectangle of the given fractional size anchored at the bottom center.
    pub fn bottom_centered(&self, width_ratio: f32, height_ratio: f32) -> Rect {
        let width = (self.width as f32 * width_ratio) as i32;
        let height = (self.height as f32 * height_ratio) as i32;
        Rect::new(
            self.x + (self.width - width) / 2,
            self.y + self.height - height,
            width,
            height,
        )
    }
}
