use std::collections::VecDeque;

use foundation::math::Vec2;

pub struct SpatialAnalysis;

impl SpatialAnalysis {
    /// Dense row-major matrix of pairwise distances.
    pub fn distance_matrix(points: &[Vec2]) -> Vec<f64> {
        let n = points.len();
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = points[i].distance(points[j]);
                out[i * n + j] = d;
                out[j * n + i] = d;
            }
        }
        out
    }

    /// Connected components of the graph linking points strictly closer than
    /// `threshold`.
    ///
    /// Components are ordered by their lowest index and list their members in
    /// ascending order, so the output is independent of traversal details.
    pub fn connected_components(points: &[Vec2], threshold: f64) -> Vec<Vec<usize>> {
        let n = points.len();
        let dist = Self::distance_matrix(points);
        let mut visited = vec![false; n];
        let mut components = Vec::new();

        for seed in 0..n {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let mut members = vec![seed];
            let mut queue = VecDeque::from([seed]);
            while let Some(i) = queue.pop_front() {
                for j in 0..n {
                    if !visited[j] && dist[i * n + j] < threshold {
                        visited[j] = true;
                        members.push(j);
                        queue.push_back(j);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }
}
