//! K-means and diagonal Gaussian mixture clustering
//!
//! Small, dense feature sets only (a few thousand points, a handful of dims).

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum k-means iterations
const MAX_KMEANS_ITERATIONS: usize = 25;

/// Maximum EM iterations for the mixture refinement
const MAX_EM_ITERATIONS: usize = 30;

/// Relative convergence threshold for both algorithms
const CONVERGENCE_THRESHOLD: f64 = 1e-6;

/// Lower bound on per-dimension variance
pub const VARIANCE_FLOOR: f64 = 1e-6;

/// Clustering algorithm used by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterModel {
    #[serde(alias = "KMeans", alias = "KMEANS")]
    KMeans,
    /// K-means initialization refined by EM with diagonal covariances
    #[serde(alias = "GMM")]
    Gmm,
}

/// Hard cluster assignment with per-cluster diagonal Gaussians
#[derive(Debug, Clone)]
pub struct Clustering {
    pub labels: Vec<usize>,
    pub means: Vec<Vec<f64>>,
    pub variances: Vec<Vec<f64>>,
    pub counts: Vec<usize>,
}

impl Clustering {
    /// Number of clusters that received at least one point
    pub fn occupied(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Summary statistics for the given hard labels
    fn from_labels(data: &[Vec<f64>], labels: Vec<usize>, k: usize) -> Self {
        let dim = data.first().map_or(0, Vec::len);
        let mut means = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];

        for (point, &label) in data.iter().zip(&labels) {
            for (m, &v) in means[label].iter_mut().zip(point) {
                *m += v;
            }
            counts[label] += 1;
        }
        for (mean, &count) in means.iter_mut().zip(&counts) {
            if count > 0 {
                mean.iter_mut().for_each(|m| *m /= count as f64);
            }
        }

        let mut variances = vec![vec![0.0; dim]; k];
        for (point, &label) in data.iter().zip(&labels) {
            for ((var, &v), &m) in variances[label].iter_mut().zip(point).zip(&means[label]) {
                *var += (v - m) * (v - m);
            }
        }
        for (var, &count) in variances.iter_mut().zip(&counts) {
            var.iter_mut().for_each(|v| {
                *v = if count > 0 { *v / count as f64 } else { 0.0 };
                *v = v.max(VARIANCE_FLOOR);
            });
        }

        Self {
            labels,
            means,
            variances,
            counts,
        }
    }
}

/// Cluster `data` into at most `k` groups, keeping the best of `n_init` restarts
pub fn fit(
    data: &[Vec<f64>],
    k: usize,
    model: ClusterModel,
    n_init: usize,
    rng: &mut StdRng,
) -> Clustering {
    let k = k.clamp(1, data.len().max(1));

    let (centroids, labels) = (0..n_init.max(1))
        .map(|_| kmeans(data, k, rng))
        .min_by(|a, b| {
            inertia(data, &a.0, &a.1)
                .partial_cmp(&inertia(data, &b.0, &b.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or_else(|| (Vec::new(), vec![0; data.len()]));

    let clustering = Clustering::from_labels(data, labels, centroids.len().max(1));
    match model {
        ClusterModel::KMeans => clustering,
        ClusterModel::Gmm => refine_gmm(data, clustering),
    }
}

fn kmeans(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> (Vec<Vec<f64>>, Vec<usize>) {
    if data.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let dim = data[0].len();
    let mut centroids = initialize_centroids(data, k, rng);
    let mut labels = assign(data, &centroids);
    let mut prev_inertia = f64::INFINITY;

    for _ in 0..MAX_KMEANS_ITERATIONS {
        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &label) in data.iter().zip(&labels) {
            for (s, &v) in sums[label].iter_mut().zip(point) {
                *s += v;
            }
            counts[label] += 1;
        }

        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums).zip(&counts) {
            if count > 0 {
                *centroid = sum.into_iter().map(|s| s / count as f64).collect();
            } else {
                // Empty cluster: reseed on a random point
                centroid.clone_from(&data[rng.random_range(0..data.len())]);
            }
        }

        labels = assign(data, &centroids);
        let current = inertia(data, &centroids, &labels);
        if (prev_inertia - current).abs() <= CONVERGENCE_THRESHOLD * prev_inertia.max(f64::MIN_POSITIVE) {
            break;
        }
        prev_inertia = current;
    }

    (centroids, labels)
}

/// K-means++ seeding
fn initialize_centroids(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..data.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = data
            .iter()
            .map(|point| {
                centroids
                    .iter()
                    .map(|c| squared_distance(point, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        let total: f64 = distances.iter().sum();
        let idx = if total <= 0.0 {
            rng.random_range(0..data.len())
        } else {
            let threshold = rng.random::<f64>() * total;
            let mut cumsum = 0.0;
            distances
                .iter()
                .position(|&d| {
                    cumsum += d;
                    cumsum >= threshold
                })
                .unwrap_or(data.len() - 1)
        };
        centroids.push(data[idx].clone());
    }

    centroids
}

fn assign(data: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    data.iter()
        .map(|point| {
            centroids
                .iter()
                .enumerate()
                .map(|(i, c)| (i, squared_distance(point, c)))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0
        })
        .collect()
}

fn inertia(data: &[Vec<f64>], centroids: &[Vec<f64>], labels: &[usize]) -> f64 {
    data.iter()
        .zip(labels)
        .map(|(point, &label)| squared_distance(point, &centroids[label]))
        .sum()
}

/// EM refinement of a hard clustering into a diagonal Gaussian mixture
fn refine_gmm(data: &[Vec<f64>], init: Clustering) -> Clustering {
    let n = data.len();
    let k = init.means.len();
    if n == 0 || k <= 1 {
        return init;
    }
    let dim = data[0].len();

    let mut weights: Vec<f64> = init
        .counts
        .iter()
        .map(|&c| (c as f64 / n as f64).max(f64::MIN_POSITIVE))
        .collect();
    let mut means = init.means;
    let mut variances = init.variances;
    let mut resp = vec![vec![0.0; k]; n];
    let mut prev_ll = f64::NEG_INFINITY;

    for _ in 0..MAX_EM_ITERATIONS {
        // E-step in log space
        let mut ll = 0.0;
        for (point, r) in data.iter().zip(resp.iter_mut()) {
            for j in 0..k {
                r[j] = weights[j].ln() + log_gaussian(point, &means[j], &variances[j]);
            }
            let max = r.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let sum: f64 = r.iter().map(|&v| (v - max).exp()).sum();
            let log_norm = max + sum.ln();
            r.iter_mut().for_each(|v| *v = (*v - log_norm).exp());
            ll += log_norm;
        }

        // M-step
        for j in 0..k {
            let nj: f64 = resp.iter().map(|r| r[j]).sum();
            if nj <= f64::EPSILON {
                weights[j] = f64::MIN_POSITIVE;
                continue;
            }
            weights[j] = nj / n as f64;
            for d in 0..dim {
                let mean = data.iter().zip(&resp).map(|(p, r)| r[j] * p[d]).sum::<f64>() / nj;
                let var = data
                    .iter()
                    .zip(&resp)
                    .map(|(p, r)| r[j] * (p[d] - mean) * (p[d] - mean))
                    .sum::<f64>()
                    / nj;
                means[j][d] = mean;
                variances[j][d] = var.max(VARIANCE_FLOOR);
            }
        }

        if (ll - prev_ll).abs() <= CONVERGENCE_THRESHOLD * ll.abs().max(1.0) {
            break;
        }
        prev_ll = ll;
    }

    let labels = resp
        .iter()
        .map(|r| {
            r.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        })
        .collect();

    Clustering::from_labels(data, labels, k)
}

/// Log density of a diagonal Gaussian (natural log)
pub fn log_gaussian(point: &[f64], mean: &[f64], variance: &[f64]) -> f64 {
    point
        .iter()
        .zip(mean)
        .zip(variance)
        .map(|((&x, &m), &v)| -0.5 * ((2.0 * std::f64::consts::PI * v).ln() + (x - m) * (x - m) / v))
        .sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
