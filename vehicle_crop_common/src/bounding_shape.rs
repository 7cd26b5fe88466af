use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An axis aligned rectangle in image coordinates (x is the column, y is the row).
///
/// Coordinates are not restricted to the image, so a shape centered near the edge
/// of a frame may have negative or oversized bounds. Use [`BoundingShape::pixel_window`]
/// to clamp a shape onto a concrete image before indexing into it.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct BoundingShape {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// A non-empty rectangle of whole pixels inside a particular image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingShape {
    /// Build a shape, checking that every coordinate is finite and that min <= max on both axes.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self> {
        let ret = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        ret.validate()?;
        Ok(ret)
    }

    pub fn validate(&self) -> Result<()> {
        let coords = [self.x_min, self.x_max, self.y_min, self.y_max];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "non-finite coordinate in {self:?}"
            )));
        }
        if self.x_min > self.x_max {
            return Err(Error::InvalidGeometry(format!(
                "x_min {} > x_max {}",
                self.x_min, self.x_max
            )));
        }
        if self.y_min > self.y_max {
            return Err(Error::InvalidGeometry(format!(
                "y_min {} > y_max {}",
                self.y_min, self.y_max
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Clamp this shape onto an image of the given dimensions.
    ///
    /// Both edges are floored to whole pixels and the max edges are exclusive, so
    /// a shape of width 400 covers exactly 400 columns when it lies fully inside the
    /// image. Returns `None` if nothing of the shape remains after clamping.
    #[must_use]
    pub fn pixel_window(&self, (img_width, img_height): (u32, u32)) -> Option<PixelWindow> {
        let clamp = |v: f64, max: u32| -> u32 {
            let v = v.floor();
            if v <= 0.0 {
                0
            } else if v >= f64::from(max) {
                max
            } else {
                v as u32
            }
        };

        let x0 = clamp(self.x_min, img_width);
        let x1 = clamp(self.x_max, img_width);
        let y0 = clamp(self.y_min, img_height);
        let y1 = clamp(self.y_max, img_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelWindow {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

impl PixelWindow {
    #[must_use]
    pub fn as_view_args(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// The midpoint of a rectangle, as `(cx, cy)`.
///
/// Fails if the shape was built by hand with min > max on either axis.
pub fn center_of(shape: &BoundingShape) -> Result<(f64, f64)> {
    shape.validate()?;
    let cx = (shape.x_min + shape.x_max) / 2.0;
    let cy = (shape.y_min + shape.y_max) / 2.0;
    Ok((cx, cy))
}

/// A rectangle of exactly `width` x `height` centered on `center`.
///
/// The result is not clamped to any image and can have negative coordinates.
pub fn rectangle_around((cx, cy): (f64, f64), width: f64, height: f64) -> Result<BoundingShape> {
    if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
        return Err(Error::InvalidGeometry(format!(
            "rectangle size must be finite and not negative, got {width}x{height}"
        )));
    }

    let half_width = width / 2.0;
    let half_height = height / 2.0;
    BoundingShape::new(
        cx - half_width,
        cx + half_width,
        cy - half_height,
        cy + half_height,
    )
}

#[cfg(test)]
mod test {
    use rand::prelude::*;

    use super::*;

    #[test]
    fn test_center_of_simple() {
        let shape = BoundingShape::new(1000.0, 1200.0, 650.0, 800.0).unwrap();
        assert_eq!(center_of(&shape), Ok((1100.0, 725.0)));
    }

    #[test]
    fn test_center_of_malformed() {
        let shape = BoundingShape {
            x_min: 10.0,
            x_max: 5.0,
            y_min: 0.0,
            y_max: 1.0,
        };
        assert!(matches!(center_of(&shape), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_new_rejects_inverted_y() {
        assert!(BoundingShape::new(0.0, 1.0, 3.0, 2.0).is_err());
        assert!(BoundingShape::new(0.0, f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_rectangle_around_allows_negative() {
        let act = rectangle_around((50.0, 50.0), 400.0, 200.0).unwrap();
        let exp = BoundingShape::new(-150.0, 250.0, -50.0, 150.0).unwrap();
        assert_eq!(exp, act);
    }

    #[test]
    fn test_rectangle_around_zero_size() {
        let act = rectangle_around((3.0, 4.0), 0.0, 0.0).unwrap();
        assert_eq!(act.width(), 0.0);
        assert_eq!(act.height(), 0.0);
        assert_eq!(center_of(&act), Ok((3.0, 4.0)));
    }

    #[test]
    fn test_rectangle_around_negative_size() {
        assert!(rectangle_around((0.0, 0.0), -1.0, 5.0).is_err());
        assert!(rectangle_around((0.0, 0.0), 1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_center_roundtrip_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            // dyadic values keep the arithmetic exact.
            let cx = f64::from(rng.gen_range(-4096_i32..4096)) / 4.0;
            let cy = f64::from(rng.gen_range(-4096_i32..4096)) / 4.0;
            let w = f64::from(rng.gen_range(0_u32..2048)) / 2.0;
            let h = f64::from(rng.gen_range(0_u32..2048)) / 2.0;

            let shape = rectangle_around((cx, cy), w, h).unwrap();
            assert_eq!(center_of(&shape), Ok((cx, cy)));
            assert_eq!(shape.width(), w);
            assert_eq!(shape.height(), h);
        }
    }

    #[test]
    fn test_pixel_window_inside() {
        let shape = BoundingShape::new(10.0, 20.0, 5.0, 8.0).unwrap();
        let act = shape.pixel_window((100, 100)).unwrap();
        assert_eq!(act.as_view_args(), (10, 5, 10, 3));
        assert_eq!(act.area(), 30);
    }

    #[test]
    fn test_pixel_window_clamped() {
        let shape = rectangle_around((50.0, 50.0), 400.0, 200.0).unwrap();
        let act = shape.pixel_window((320, 240)).unwrap();
        assert_eq!(act.as_view_args(), (0, 0, 250, 150));
    }

    #[test]
    fn test_pixel_window_fractional_keeps_width() {
        let shape = rectangle_around((60.5, 40.5), 40.0, 20.0).unwrap();
        let act = shape.pixel_window((200, 200)).unwrap();
        assert_eq!(act.as_view_args(), (40, 30, 40, 20));
    }

    #[test]
    fn test_pixel_window_outside() {
        let shape = BoundingShape::new(1000.0, 1200.0, 650.0, 800.0).unwrap();
        assert_eq!(shape.pixel_window((640, 480)), None);

        let thin = BoundingShape::new(3.2, 3.7, 0.0, 10.0).unwrap();
        assert_eq!(thin.pixel_window((640, 480)), None);
    }
}
