use itertools::Itertools;

use super::Keypoint;
use crate::{BoundingShape, Error, Result};

/// The keypoints of a set that lie most closely together, ordered from the most
/// central keypoint outwards.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseCluster {
    points: Vec<Keypoint>,
}

impl DenseCluster {
    pub fn points(&self) -> &[Keypoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Keypoint> {
        self.points
    }

    /// The smallest rectangle containing every keypoint of the cluster, or `None`
    /// for an empty cluster.
    pub fn extent(&self) -> Option<BoundingShape> {
        let (first, rest) = self.points.split_first()?;
        let init = (first.x, first.x, first.y, first.y);
        let (x_min, x_max, y_min, y_max) =
            rest.iter().fold(init, |(x_min, x_max, y_min, y_max), kp| {
                (
                    x_min.min(kp.x),
                    x_max.max(kp.x),
                    y_min.min(kp.y),
                    y_max.max(kp.y),
                )
            });

        Some(BoundingShape {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
}

/// Select the `floor(len * fraction)` keypoints with the smallest mean distance to
/// all other keypoints.
///
/// Keypoints with equal mean distance keep their original relative order, so a set
/// where every keypoint sits on the same spot yields its first keypoints. Sets of
/// fewer than two keypoints, and a pair of keypoints on the same spot, are returned
/// unchanged.
///
/// Cost is quadratic in the number of keypoints, which is fine for the tens to low
/// hundreds of features a detector reports on one frame.
///
/// # Errors
/// * [`Error::InvalidFraction`] if `fraction` is not finite or not positive.
/// * [`Error::InsufficientKeypoints`] if the fraction rounds down to zero keypoints.
pub fn densest_subset(keypoints: &[Keypoint], fraction: f64) -> Result<DenseCluster> {
    if !fraction.is_finite() || fraction <= 0.0 {
        return Err(Error::InvalidFraction(fraction));
    }

    let pass_through = match keypoints {
        [] | [_] => true,
        [a, b] => a.same_position(b),
        _ => false,
    };
    if pass_through {
        return Ok(DenseCluster {
            points: keypoints.to_vec(),
        });
    }

    let num_kept = ((keypoints.len() as f64 * fraction).floor() as usize).min(keypoints.len());
    if num_kept == 0 {
        return Err(Error::InsufficientKeypoints {
            available: keypoints.len(),
            fraction,
        });
    }

    let scores = isolation_scores(keypoints);

    // sort_by is stable, so ties stay in input order.
    let mut order = (0..keypoints.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let points = order
        .into_iter()
        .take(num_kept)
        .map(|idx| keypoints[idx])
        .collect();

    Ok(DenseCluster { points })
}

// mean distance from each keypoint to every other keypoint. Requires at least 2 keypoints.
fn isolation_scores(keypoints: &[Keypoint]) -> Vec<f64> {
    let mut dist_sums = vec![0.0; keypoints.len()];
    for (a, b) in (0..keypoints.len()).tuple_combinations() {
        let dist = keypoints[a].distance(&keypoints[b]);
        dist_sums[a] += dist;
        dist_sums[b] += dist;
    }

    let num_others = (keypoints.len() - 1) as f64;
    dist_sums.into_iter().map(|sum| sum / num_others).collect()
}

#[cfg(test)]
mod test {
    use rand::prelude::*;

    use super::*;

    fn kps(coords: &[(f64, f64)]) -> Vec<Keypoint> {
        coords.iter().copied().map(Keypoint::from).collect()
    }

    fn coords(cluster: &DenseCluster) -> Vec<(f64, f64)> {
        cluster.points().iter().map(|kp| (kp.x, kp.y)).collect()
    }

    #[test]
    fn test_outlier_excluded() {
        let input = kps(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (100.0, 100.0)]);
        let act = densest_subset(&input, 0.75).unwrap();

        assert_eq!(act.len(), 3);
        assert!(!coords(&act).contains(&(100.0, 100.0)));

        // (1,0) is the most central, then (2,0) which is slightly nearer the outlier than (0,0)
        assert_eq!(coords(&act), vec![(1.0, 0.0), (2.0, 0.0), (0.0, 0.0)]);
    }

    #[test]
    fn test_two_identical_points() {
        let input = kps(&[(4.0, 5.0), (4.0, 5.0)]);
        for fraction in [0.01, 0.3, 0.5, 0.6, 1.0] {
            let act = densest_subset(&input, fraction).unwrap();
            assert_eq!(act.into_inner(), input);
        }
    }

    #[test]
    fn test_fewer_than_two() {
        let one = kps(&[(7.0, 7.0)]);
        assert_eq!(densest_subset(&one, 0.6).unwrap().into_inner(), one);

        let none = kps(&[]);
        assert!(densest_subset(&none, 0.6).unwrap().is_empty());
    }

    #[test]
    fn test_fraction_too_small() {
        let input = kps(&[(0.0, 0.0), (1.0, 0.0), (5.0, 5.0)]);
        assert_eq!(
            densest_subset(&input, 0.3),
            Err(Error::InsufficientKeypoints {
                available: 3,
                fraction: 0.3
            })
        );
    }

    #[test]
    fn test_invalid_fraction() {
        let input = kps(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(matches!(
            densest_subset(&input, 0.0),
            Err(Error::InvalidFraction(_))
        ));
        assert!(matches!(
            densest_subset(&input, f64::NAN),
            Err(Error::InvalidFraction(_))
        ));
    }

    #[test]
    fn test_fraction_above_one_keeps_everything() {
        let input = kps(&[(0.0, 0.0), (3.0, 4.0), (6.0, 8.0)]);
        let act = densest_subset(&input, 2.0).unwrap();
        assert_eq!(act.len(), 3);
        assert_eq!(act.points()[0], input[1]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        // corners of a square are all equally isolated
        let input = kps(&[(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)]);
        let act = densest_subset(&input, 0.5).unwrap();
        assert_eq!(coords(&act), vec![(0.0, 0.0), (0.0, 10.0)]);
    }

    #[test]
    fn test_duplicates_are_separate_entries() {
        let input = kps(&[(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (50.0, 50.0)]);
        let act = densest_subset(&input, 0.75).unwrap();
        assert_eq!(coords(&act), vec![(0.0, 0.0), (0.0, 0.0), (1.0, 0.0)]);
    }

    #[test]
    fn test_many_coincident_points() {
        let input = (0..5)
            .map(|i| Keypoint {
                score: i as f32,
                ..Keypoint::new(4.0, 5.0)
            })
            .collect::<Vec<_>>();

        // every point is equally central, so the first ones are kept
        let act = densest_subset(&input, 0.6).unwrap();
        assert_eq!(act.points(), &input[..3]);

        assert_eq!(
            densest_subset(&input, 0.1),
            Err(Error::InsufficientKeypoints {
                available: 5,
                fraction: 0.1
            })
        );
    }

    #[test]
    fn test_cluster_size_random() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let len = rng.gen_range(2..60);
            let input = (0..len)
                .map(|_| Keypoint::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)))
                .collect::<Vec<_>>();
            let fraction = rng.gen_range(0.05..1.0);
            let expected_len = (len as f64 * fraction).floor() as usize;

            match densest_subset(&input, fraction) {
                Ok(cluster) => {
                    assert_eq!(cluster.len(), expected_len);
                    assert!(cluster.points().iter().all(|kp| input.contains(kp)));
                }
                Err(Error::InsufficientKeypoints { .. }) => assert_eq!(expected_len, 0),
                Err(e) => panic!("unexpected error {e}"),
            }
        }
    }

    #[test]
    fn test_extent() {
        let input = kps(&[(3.0, 9.0), (1.0, 4.0), (8.0, 2.0)]);
        let cluster = densest_subset(&input, 1.0).unwrap();
        let exp = BoundingShape::new(1.0, 8.0, 2.0, 9.0).unwrap();
        assert_eq!(cluster.extent(), Some(exp));

        let empty = densest_subset(&[], 1.0).unwrap();
        assert_eq!(empty.extent(), None);
    }
}
