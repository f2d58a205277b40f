//! Pure cosine K-means (§4.3.S).
//!
//! No I/O, no clock: everything here is a function of `&[Vec<f32>]` and a seed. Ported from the
//! original `clustering_engine.py`'s use of scikit-learn into hand-rolled Lloyd's-algorithm
//! iterations: assignment by max cosine similarity, centroid update by mean-then-renormalize.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::ClusteringConfig;
use crate::embeddings::{cosine_similarity, l2_normalize};

/// Result of a single K-means run at a fixed K.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub inertia: f64,
}

/// Result of sweeping K and picking the best candidate.
#[derive(Debug, Clone)]
pub struct OptimalClustersResult {
    pub k: usize,
    pub result: KmeansResult,
    pub inertias: Vec<(usize, f64)>,
    pub silhouettes: Vec<(usize, f64)>,
}

/// Run Lloyd's algorithm once for a fixed `k`, starting from `n_init` random seedings and keeping
/// the lowest-inertia run.
pub fn kmeans(vectors: &[Vec<f32>], k: usize, config: &ClusteringConfig, seed: u64) -> KmeansResult {
    assert!(k >= 1 && k <= vectors.len(), "k must be in [1, n]");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<KmeansResult> = None;

    for _ in 0..config.n_init.max(1) {
        let run = kmeans_once(vectors, k, config.max_iter, &mut rng);
        if best.as_ref().map(|b| run.inertia < b.inertia).unwrap_or(true) {
            best = Some(run);
        }
    }
    best.expect("n_init >= 1 guarantees at least one run")
}

fn kmeans_once(vectors: &[Vec<f32>], k: usize, max_iter: usize, rng: &mut StdRng) -> KmeansResult {
    let dims = vectors[0].len();
    let mut indices: Vec<usize> = (0..vectors.len()).collect();
    indices.shuffle(rng);
    let mut centroids: Vec<Vec<f32>> = indices[..k].iter().map(|&i| vectors[i].clone()).collect();
    let mut assignments = vec![0usize; vectors.len()];

    for _ in 0..max_iter.max(1) {
        let mut changed = false;
        for (i, v) in vectors.iter().enumerate() {
            let best_c = centroids
                .iter()
                .enumerate()
                .map(|(c, centroid)| (c, cosine_similarity(v, centroid)))
                .fold((0usize, f32::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc })
                .0;
            if assignments[i] != best_c {
                changed = true;
            }
            assignments[i] = best_c;
        }

        let mut sums = vec![vec![0f32; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, v) in vectors.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for d in 0..dims {
                sums[c][d] += v[d];
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for d in 0..dims {
                    sums[c][d] /= counts[c] as f32;
                }
                l2_normalize(&mut sums[c]);
                centroids[c] = sums[c].clone();
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let sim = cosine_similarity(v, &centroids[assignments[i]]);
            (1.0 - sim as f64).max(0.0)
        })
        .sum();

    KmeansResult {
        assignments,
        centroids,
        inertia,
    }
}

/// Mean silhouette score for a clustering result, using `1 - cosine_similarity` as distance.
fn silhouette_score(vectors: &[Vec<f32>], assignments: &[usize], k: usize) -> f64 {
    if k < 2 || vectors.len() <= k {
        return 0.0;
    }
    let mut total = 0.0;
    let mut counted = 0usize;

    for (i, v) in vectors.iter().enumerate() {
        let own = assignments[i];
        let mut same_dist_sum = 0f64;
        let mut same_count = 0usize;
        let mut other_min_mean: Option<f64> = None;

        for c in 0..k {
            let mut dist_sum = 0f64;
            let mut count = 0usize;
            for (j, w) in vectors.iter().enumerate() {
                if i == j || assignments[j] != c {
                    continue;
                }
                dist_sum += 1.0 - cosine_similarity(v, w) as f64;
                count += 1;
            }
            if c == own {
                same_dist_sum = dist_sum;
                same_count = count;
            } else if count > 0 {
                let mean = dist_sum / count as f64;
                other_min_mean = Some(other_min_mean.map_or(mean, |m: f64| m.min(mean)));
            }
        }

        if same_count == 0 {
            continue;
        }
        let a = same_dist_sum / same_count as f64;
        let b = match other_min_mean {
            Some(b) => b,
            None => continue,
        };
        let s = if a.max(b) > 0.0 { (b - a) / a.max(b) } else { 0.0 };
        total += s;
        counted += 1;
    }

    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

/// Sweep candidate K from `min_k` to `min(max_k, n-1)`, picking by the elbow/silhouette
/// heuristic in §4.3. Returns `None` if `n < min_k` (caller should fall back to a single bucket).
pub fn select_optimal_k(vectors: &[Vec<f32>], config: &ClusteringConfig, seed: u64) -> Option<OptimalClustersResult> {
    let n = vectors.len();
    if n < config.min_k {
        return None;
    }
    let max_k = config.max_k.min(n.saturating_sub(1)).max(config.min_k);

    let mut runs: Vec<(usize, KmeansResult)> = Vec::new();
    for k in config.min_k..=max_k {
        let run = kmeans(vectors, k, config, seed);
        runs.push((k, run));
    }

    let inertias: Vec<(usize, f64)> = runs.iter().map(|(k, r)| (*k, r.inertia)).collect();
    let silhouettes: Vec<(usize, f64)> = runs
        .iter()
        .map(|(k, r)| (*k, silhouette_score(vectors, &r.assignments, *k)))
        .collect();

    let elbow_k = elbow_k(&inertias);
    let silhouette_k = silhouettes
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(k, _)| *k)
        .unwrap_or(elbow_k);

    let chosen_k = if elbow_k == silhouette_k {
        elbow_k
    } else {
        let candidates: Vec<usize> = [elbow_k.saturating_sub(1), elbow_k, elbow_k + 1]
            .into_iter()
            .filter(|k| *k >= config.min_k && *k <= max_k)
            .collect();
        candidates
            .into_iter()
            .max_by(|a, b| {
                let sa = silhouettes.iter().find(|(k, _)| k == a).map(|(_, s)| *s).unwrap_or(f64::MIN);
                let sb = silhouettes.iter().find(|(k, _)| k == b).map(|(_, s)| *s).unwrap_or(f64::MIN);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(elbow_k)
    };

    let result = runs.into_iter().find(|(k, _)| *k == chosen_k).map(|(_, r)| r)?;

    Some(OptimalClustersResult {
        k: chosen_k,
        result,
        inertias,
        silhouettes,
    })
}

/// The K that maximizes the discrete second derivative of the inertia curve.
fn elbow_k(inertias: &[(usize, f64)]) -> usize {
    if inertias.len() < 3 {
        return inertias.first().map(|(k, _)| *k).unwrap_or(2);
    }
    let mut best_k = inertias[1].0;
    let mut best_curvature = f64::MIN;
    for w in inertias.windows(3) {
        let (_, y0) = w[0];
        let (k1, y1) = w[1];
        let (_, y2) = w[2];
        let curvature = y0 - 2.0 * y1 + y2;
        if curvature > best_curvature {
            best_curvature = curvature;
            best_k = k1;
        }
    }
    best_k
}
