use image::{GenericImageView, Luma};

use crate::{Error, Result};

/// Center of mass of a foreground mask, as `(cx, cy)` (column, row).
///
/// With `threshold == 0.0` every pixel is weighted by its intensity. With a positive
/// threshold the mask is first binarized (pixel counts as 1 if its intensity is strictly
/// greater than the threshold, 0 otherwise) and the unweighted center of the set pixels
/// is returned.
///
/// # Errors
/// * [`Error::InvalidThreshold`] if the threshold is negative or not finite.
/// * [`Error::EmptyMask`] if no pixel carries any weight.
pub fn centroid<I>(mask: &I, threshold: f64) -> Result<(f64, f64)>
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::InvalidThreshold(threshold));
    }

    let binarize = threshold > 0.0;
    let weight = |l: u8| -> f64 {
        let l = f64::from(l);
        match (binarize, l > threshold) {
            (false, _) => l,
            (true, true) => 1.0,
            (true, false) => 0.0,
        }
    };

    let mut total = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for (x, y, Luma([l])) in mask.pixels() {
        let w = weight(l);
        if w == 0.0 {
            continue;
        }
        total += w;
        sum_x += f64::from(x) * w;
        sum_y += f64::from(y) * w;
    }

    if total == 0.0 {
        return Err(Error::EmptyMask);
    }

    Ok((sum_x / total, sum_y / total))
}
