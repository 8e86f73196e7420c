use nalgebra::Vector3;

use super::{newton_root, plane_root, Shape};

/// Sag of the sum of `terms`
pub fn sag(terms: &[Shape], x: f64, y: f64) -> Option<f64> {
    terms.iter().map(|term| term.sag(x, y)).sum()
}

pub fn gradient(terms: &[Shape], x: f64, y: f64) -> Option<(f64, f64)> {
    terms
        .iter()
        .map(|term| term.gradient(x, y))
        .try_fold((0., 0.), |(gx, gy), g| g.map(|(dx, dy)| (gx + dx, gy + dy)))
}

/// Propagation times refined by Newton iterations from the intersections with the first term
pub fn roots(terms: &[Shape], r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
    let mut starts = terms.first().map_or([None, None], |term| term.roots(r, v));
    if starts.iter().all(Option::is_none) {
        starts[0] = plane_root(r, v, 0., 0.);
    }
    starts.map(|start| {
        start.and_then(|dt| {
            newton_root(
                |x, y| sag(terms, x, y),
                |x, y| gradient(terms, x, y),
                r,
                v,
                dt,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_sphere_and_tilt() {
        let terms = vec![
            Shape::Sphere { radius: 5. },
            Shape::Tilted {
                tanx: 0.01,
                tany: 0.,
            },
        ];
        let (x, y) = (0.3, 0.2);
        let expected = Shape::Sphere { radius: 5. }.sag(x, y).unwrap() + 0.01 * x;
        assert!((sag(&terms, x, y).unwrap() - expected).abs() < 1e-15);

        let r = Vector3::new(x, y, 3.);
        let v = Vector3::new(0., 0., -1.);
        let dt = roots(&terms, &r, &v)
            .into_iter()
            .flatten()
            .next()
            .unwrap();
        assert!((r.z + v.z * dt - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_sum_is_a_plane() {
        assert_eq!(sag(&[], 1., 2.), Some(0.));
        let dt = roots(&[], &Vector3::new(0., 0., 2.), &Vector3::new(0., 0., -1.))[0];
        assert_eq!(dt, Some(2.));
    }
}
