use std::fmt;
use std::marker::PhantomData;

/// Type-level marker for the logical coordinate space (global compositor space)
#[derive(Debug)]
pub struct Logical;

/// Type-level marker for the physical coordinate space (pixels of an output mode)
#[derive(Debug)]
pub struct Physical;

/// Type-level marker for raw coordinates (millimeters of a physical device or display)
#[derive(Debug)]
pub struct Raw;

/// Type-level marker for device coordinates normalized to the unit square
///
/// Absolute-coordinate events (touch, tablet, absolute pointer motion) are recorded in
/// this space by the translator, so that the compositor thread can map them through
/// whatever output the device ends up bound to.
#[derive(Debug)]
pub struct Normalized;

/// Trait for types serving as a coordinate for other geometry utils
pub trait Coordinate:
    Sized + Copy + PartialEq + PartialOrd + std::ops::Add<Output = Self> + std::ops::Sub<Output = Self>
{
    /// Access this value as an `f64`
    fn to_f64(self) -> f64;
    /// Create this value from an `f64`, rounding to the nearest representable value
    fn from_f64(v: f64) -> Self;
}

impl Coordinate for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Coordinate for i32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v.round() as i32
    }
}

/// A point as defined by its x and y coordinates
pub struct Point<N, Kind> {
    /// horizontal coordinate
    pub x: N,
    /// vertical coordinate
    pub y: N,
    _kind: PhantomData<Kind>,
}

impl<N: Coordinate, Kind> Point<N, Kind> {
    /// Convert the underlying numerical type to `f64` for floating point manipulations
    #[inline]
    pub fn to_f64(self) -> Point<f64, Kind> {
        (self.x.to_f64(), self.y.to_f64()).into()
    }

    /// Upscale this point by a scale factor
    #[inline]
    pub fn upscale(self, scale: f64) -> Point<N, Kind> {
        (
            N::from_f64(self.x.to_f64() * scale),
            N::from_f64(self.y.to_f64() * scale),
        )
            .into()
    }

    /// Downscale this point by a scale factor
    #[inline]
    pub fn downscale(self, scale: f64) -> Point<N, Kind> {
        (
            N::from_f64(self.x.to_f64() / scale),
            N::from_f64(self.y.to_f64() / scale),
        )
            .into()
    }
}

impl<Kind> Point<f64, Kind> {
    /// Round this point to the nearest integer coordinates
    #[inline]
    pub fn to_i32_round(self) -> Point<i32, Kind> {
        (self.x.round() as i32, self.y.round() as i32).into()
    }
}

impl<N: Coordinate, Kind> std::ops::Add for Point<N, Kind> {
    type Output = Point<N, Kind>;

    #[inline]
    fn add(self, other: Point<N, Kind>) -> Point<N, Kind> {
        (self.x + other.x, self.y + other.y).into()
    }
}

impl<N: Coordinate, Kind> std::ops::Sub for Point<N, Kind> {
    type Output = Point<N, Kind>;

    #[inline]
    fn sub(self, other: Point<N, Kind>) -> Point<N, Kind> {
        (self.x - other.x, self.y - other.y).into()
    }
}

impl<N: Coordinate, Kind> std::ops::AddAssign for Point<N, Kind> {
    #[inline]
    fn add_assign(&mut self, rhs: Point<N, Kind>) {
        *self = *self + rhs;
    }
}

impl<N, Kind> From<(N, N)> for Point<N, Kind> {
    #[inline]
    fn from((x, y): (N, N)) -> Point<N, Kind> {
        Point {
            x,
            y,
            _kind: PhantomData,
        }
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Point<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl<N: Clone, Kind> Clone for Point<N, Kind> {
    fn clone(&self) -> Self {
        Point {
            x: self.x.clone(),
            y: self.y.clone(),
            _kind: PhantomData,
        }
    }
}

impl<N: Copy, Kind> Copy for Point<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Point<N, Kind> {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<N: Default, Kind> Default for Point<N, Kind> {
    fn default() -> Self {
        Point {
            x: N::default(),
            y: N::default(),
            _kind: PhantomData,
        }
    }
}

/// A size as defined by its width and height
pub struct Size<N, Kind> {
    /// horizontal dimension
    pub w: N,
    /// vertical dimension
    pub h: N,
    _kind: PhantomData<Kind>,
}

impl<N: Coordinate, Kind> Size<N, Kind> {
    /// Convert the underlying numerical type to `f64` for floating point manipulations
    #[inline]
    pub fn to_f64(self) -> Size<f64, Kind> {
        (self.w.to_f64(), self.h.to_f64()).into()
    }

    /// Downscale this size by a scale factor
    #[inline]
    pub fn downscale(self, scale: f64) -> Size<N, Kind> {
        (
            N::from_f64(self.w.to_f64() / scale),
            N::from_f64(self.h.to_f64() / scale),
        )
            .into()
    }
}

impl<N, Kind> From<(N, N)> for Size<N, Kind> {
    #[inline]
    fn from((w, h): (N, N)) -> Size<N, Kind> {
        Size {
            w,
            h,
            _kind: PhantomData,
        }
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Size<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Size")
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}

impl<N: Clone, Kind> Clone for Size<N, Kind> {
    fn clone(&self) -> Self {
        Size {
            w: self.w.clone(),
            h: self.h.clone(),
            _kind: PhantomData,
        }
    }
}

impl<N: Copy, Kind> Copy for Size<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Size<N, Kind> {
    fn eq(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }
}

impl<N: Default, Kind> Default for Size<N, Kind> {
    fn default() -> Self {
        Size {
            w: N::default(),
            h: N::default(),
            _kind: PhantomData,
        }
    }
}

/// A rectangle defined by its top-left corner and dimensions
pub struct Rectangle<N, Kind> {
    /// Location of the top-left corner of the rectangle
    pub loc: Point<N, Kind>,
    /// Size of the rectangle, as (width, height)
    pub size: Size<N, Kind>,
}

impl<N: Coordinate, Kind> Rectangle<N, Kind> {
    /// Create a new [`Rectangle`] from its location and size
    #[inline]
    pub fn new(loc: Point<N, Kind>, size: Size<N, Kind>) -> Self {
        Rectangle { loc, size }
    }

    /// Smallest rectangle containing both `self` and `other`
    pub fn merge(self, other: Self) -> Self {
        let x = if self.loc.x < other.loc.x { self.loc.x } else { other.loc.x };
        let y = if self.loc.y < other.loc.y { self.loc.y } else { other.loc.y };
        let x2_a = self.loc.x + self.size.w;
        let x2_b = other.loc.x + other.size.w;
        let x2 = if x2_a > x2_b { x2_a } else { x2_b };
        let y2_a = self.loc.y + self.size.h;
        let y2_b = other.loc.y + other.size.h;
        let y2 = if y2_a > y2_b { y2_a } else { y2_b };
        Rectangle {
            loc: (x, y).into(),
            size: (x2 - x, y2 - y).into(),
        }
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Rectangle<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rectangle")
            .field("loc", &self.loc)
            .field("size", &self.size)
            .finish()
    }
}

impl<N: Clone, Kind> Clone for Rectangle<N, Kind> {
    fn clone(&self) -> Self {
        Rectangle {
            loc: self.loc.clone(),
            size: self.size.clone(),
        }
    }
}

impl<N: Copy, Kind> Copy for Rectangle<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Rectangle<N, Kind> {
    fn eq(&self, other: &Self) -> bool {
        self.loc == other.loc && self.size == other.size
    }
}

impl<N: Default, Kind> Default for Rectangle<N, Kind> {
    fn default() -> Self {
        Rectangle {
            loc: Default::default(),
            size: Default::default(),
        }
    }
}

/// Possible transformations to two-dimensional planes
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum Transform {
    /// Identity transformation (plane is unaltered when applied)
    #[default]
    Normal,
    /// Plane is rotated by 90 degrees
    Rotated90,
    /// Plane is rotated by 180 degrees
    Rotated180,
    /// Plane is rotated by 270 degrees
    Rotated270,
    /// Plane is flipped vertically
    Flipped,
    /// Plane is flipped vertically and rotated by 90 degrees
    Flipped90,
    /// Plane is flipped vertically and rotated by 180 degrees
    Flipped180,
    /// Plane is flipped vertically and rotated by 270 degrees
    Flipped270,
}

impl Transform {
    /// Inverts any 90-degree transformation into 270-degree transformations and vise versa.
    ///
    /// Flipping is preserved and 180/Normal transformation are uneffected.
    #[inline]
    pub fn invert(&self) -> Transform {
        match self {
            Transform::Normal => Transform::Normal,
            Transform::Flipped => Transform::Flipped,
            Transform::Rotated90 => Transform::Rotated270,
            Transform::Rotated180 => Transform::Rotated180,
            Transform::Rotated270 => Transform::Rotated90,
            Transform::Flipped90 => Transform::Flipped270,
            Transform::Flipped180 => Transform::Flipped180,
            Transform::Flipped270 => Transform::Flipped90,
        }
    }

    /// Maps a point of an input-device coordinate space into an area of the given size
    /// by applying this transformation.
    ///
    /// Flipped variants share the mapping of their base rotation; a flip swaps which
    /// edge of the glass the device counts from, not where the contact lands on the
    /// plane.
    pub fn transform_point_in<N: Coordinate, Kind>(
        &self,
        point: Point<N, Kind>,
        area: &Size<N, Kind>,
    ) -> Point<N, Kind> {
        match *self {
            Transform::Normal | Transform::Flipped => point,
            Transform::Rotated90 | Transform::Flipped90 => (area.h - point.y, point.x).into(),
            Transform::Rotated180 | Transform::Flipped180 => {
                (area.w - point.x, area.h - point.y).into()
            }
            Transform::Rotated270 | Transform::Flipped270 => (point.y, area.w - point.x).into(),
        }
    }

    /// Transformed size after applying this transformation.
    pub fn transform_size<N: Coordinate, Kind>(&self, size: Size<N, Kind>) -> Size<N, Kind> {
        if *self == Transform::Rotated90
            || *self == Transform::Rotated270
            || *self == Transform::Flipped90
            || *self == Transform::Flipped270
        {
            (size.h, size.w).into()
        } else {
            size
        }
    }

    /// Returns true if the transformation would flip contents
    pub fn flipped(&self) -> bool {
        !matches!(
            self,
            Transform::Normal | Transform::Rotated90 | Transform::Rotated180 | Transform::Rotated270
        )
    }

    /// Returns the angle (in degrees) of the transformation
    #[inline]
    pub fn degrees(&self) -> u32 {
        match self {
            Transform::Normal | Transform::Flipped => 0,
            Transform::Rotated90 | Transform::Flipped90 => 90,
            Transform::Rotated180 | Transform::Flipped180 => 180,
            Transform::Rotated270 | Transform::Flipped270 => 270,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Physical, Point, Size, Transform};

    const ALL: [Transform; 8] = [
        Transform::Normal,
        Transform::Rotated90,
        Transform::Rotated180,
        Transform::Rotated270,
        Transform::Flipped,
        Transform::Flipped90,
        Transform::Flipped180,
        Transform::Flipped270,
    ];

    #[test]
    fn transform_point_roundtrip() {
        let area: Size<i32, Physical> = (1920, 1080).into();
        let point: Point<i32, Physical> = (271, 643).into();
        for transform in ALL {
            let transformed_area = transform.transform_size(area);
            let mapped = transform.transform_point_in(point, &area);
            let back = transform.invert().transform_point_in(mapped, &transformed_area);
            assert_eq!(back, point, "{transform:?}");
        }
    }

    #[test]
    fn rotated_270_maps_origin_to_mode_width(){
        let area: Size<i32, Physical> = (1920, 1080).into();
        let mapped = Transform::Rotated270.transform_point_in(Point::from((0, 0)), &area);
        assert_eq!(mapped, Point::from((0, 1920)));
    }

    #[test]
    fn flipped_variants_share_base_rotation() {
        let area: Size<i32, Physical> = (800, 600).into();
        let point: Point<i32, Physical> = (10, 20).into();
        assert_eq!(
            Transform::Flipped90.transform_point_in(point, &area),
            Transform::Rotated90.transform_point_in(point, &area),
        );
        assert_eq!(
            Transform::Flipped.transform_point_in(point, &area),
            Transform::Normal.transform_point_in(point, &area),
        );
    }
}
