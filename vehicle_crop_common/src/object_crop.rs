use image::{GenericImageView, SubImage};

use crate::{keypoints::DenseCluster, Error, PixelWindow, Result};

/// Pixel window spanned by a keypoint cluster inside an image of `(width, height)`.
///
/// Coordinates are floored to whole pixels and the max edges are exclusive, so a
/// cluster whose keypoints share a column (or a row) has no area.
///
/// # Errors
/// * [`Error::DegenerateCrop`] if the cluster is empty or the window has no width or height.
/// * [`Error::CropOutOfBounds`] if the window reaches outside of the image.
pub fn cluster_window(cluster: &DenseCluster, (width, height): (u32, u32)) -> Result<PixelWindow> {
    let Some(extent) = cluster.extent() else {
        return Err(Error::DegenerateCrop {
            x_min: 0,
            x_max: 0,
            y_min: 0,
            y_max: 0,
        });
    };

    let x_min = extent.x_min.floor() as i64;
    let x_max = extent.x_max.floor() as i64;
    let y_min = extent.y_min.floor() as i64;
    let y_max = extent.y_max.floor() as i64;

    if x_min == x_max || y_min == y_max {
        return Err(Error::DegenerateCrop {
            x_min,
            x_max,
            y_min,
            y_max,
        });
    }

    if x_min < 0 || y_min < 0 || x_max > i64::from(width) || y_max > i64::from(height) {
        return Err(Error::CropOutOfBounds {
            x_min,
            x_max,
            y_min,
            y_max,
            width,
            height,
        });
    }

    Ok(PixelWindow {
        x: x_min as u32,
        y: y_min as u32,
        width: (x_max - x_min) as u32,
        height: (y_max - y_min) as u32,
    })
}

/// View of the part of `image` spanned by the keypoints of `cluster`.
///
/// Works for any image type, so the same cluster can be applied to a frame and
/// to its mask.
pub fn crop_to_cluster<'a, I>(image: &'a I, cluster: &DenseCluster) -> Result<SubImage<&'a I>>
where
    I: GenericImageView,
{
    let window = cluster_window(cluster, image.dimensions())?;
    let (x, y, width, height) = window.as_view_args();
    Ok(image::imageops::crop_imm(image, x, y, width, height))
}
