//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for entities, allocated by the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Identifier of a player faction (index into the map's team table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u8);

impl TeamId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Simulation time in seconds
pub type Seconds = f64;

/// Integer tile coordinate on the world grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(&self, other: &Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// True when both axes are within `radius` tiles of `other`
    pub fn within(&self, other: &Self, radius: i32) -> bool {
        (self.x - other.x).abs() <= radius && (self.y - other.y).abs() <= radius
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Outer ring of the square of half-width `radius` around this tile
    ///
    /// Ordered by column then row, so scans over growing radii visit each
    /// tile exactly once.
    pub fn ring(self, radius: i32) -> impl Iterator<Item = TilePos> {
        let radius = radius.max(0);
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius)
                .filter(move |dy| dx.abs() == radius || dy.abs() == radius)
                .map(move |dy| self.offset(dx, dy))
        })
    }

    /// The eight surrounding tiles, orthogonal first
    pub fn neighbors(&self) -> [TilePos; 8] {
        [
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
            self.offset(0, -1),
            self.offset(1, 1),
            self.offset(1, -1),
            self.offset(-1, 1),
            self.offset(-1, -1),
        ]
    }
}

/// 2D position in float tile coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn manhattan(&self, other: &Self) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Tile containing this point (rounds half away from zero)
    pub fn tile(&self) -> TilePos {
        TilePos::new(self.x.round() as i32, self.y.round() as i32)
    }

    /// Angle in radians from `self` towards `other`
    pub fn angle_to(&self, other: &Self) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs }
    }
}

impl From<TilePos> for Vec2 {
    fn from(tile: TilePos) -> Self {
        tile.center()
    }
}
