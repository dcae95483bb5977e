use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::model::SamplingParams;

/// Picks the next token id from a logits vector.
///
/// Greedy when sampling is disabled or the temperature is not positive,
/// otherwise temperature scaling followed by top-k and top-p filtering.
pub struct LogitsSampler {
    rng: StdRng,
}

impl LogitsSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns `None` only for an empty logits slice.
    pub fn sample(&mut self, logits: &[f32], params: &SamplingParams) -> Option<usize> {
        if logits.is_empty() {
            return None;
        }
        if !params.do_sample || params.temperature <= 0.0 {
            return argmax(logits);
        }

        let temperature = params.temperature as f32;
        let mut candidates: Vec<(usize, f32)> = logits
            .iter()
            .enumerate()
            .filter(|(_, logit)| !logit.is_nan())
            .map(|(id, logit)| (id, logit / temperature))
            .collect();
        if candidates.is_empty() {
            return argmax(logits);
        }
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        if params.top_k > 0 {
            candidates.truncate(params.top_k);
        }

        let max = candidates[0].1;
        let mut probs: Vec<f32> = candidates.iter().map(|(_, l)| (l - max).exp()).collect();
        let sum: f32 = probs.iter().sum();
        probs.iter_mut().for_each(|p| *p /= sum);

        if params.top_p < 1.0 {
            let mut cumulative = 0.0;
            let mut keep = probs.len();
            for (i, p) in probs.iter().enumerate() {
                cumulative += p;
                if cumulative >= params.top_p as f32 {
                    keep = i + 1;
                    break;
                }
            }
            probs.truncate(keep);
            candidates.truncate(keep);
        }

        let total: f32 = probs.iter().sum();
        let mut draw = self.rng.random::<f32>() * total;
        for (i, p) in probs.iter().enumerate() {
            if draw < *p {
                return Some(candidates[i].0);
            }
            draw -= p;
        }
        candidates.last().map(|(id, _)| *id)
    }
}

fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(top_k: usize, top_p: f64) -> SamplingParams {
        SamplingParams {
            top_k,
            top_p,
            temperature: 1.0,
            do_sample: true,
            ..SamplingParams::default()
        }
    }

    #[test]
    fn greedy_when_sampling_disabled() {
        let mut sampler = LogitsSampler::new(0);
        let params = SamplingParams {
            do_sample: false,
            ..SamplingParams::default()
        };
        assert_eq!(sampler.sample(&[0.1, 2.0, 1.5], &params), Some(1));
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let mut sampler = LogitsSampler::new(0);
        let params = SamplingParams {
            temperature: 0.0,
            ..SamplingParams::default()
        };
        assert_eq!(sampler.sample(&[3.0, 2.0, 1.5], &params), Some(0));
    }

    #[test]
    fn top_k_of_one_always_picks_the_best_token() {
        let mut sampler = LogitsSampler::new(7);
        for _ in 0..50 {
            assert_eq!(sampler.sample(&[0.5, 0.4, 0.9, 0.2], &sampled(1, 1.0)), Some(2));
        }
    }

    #[test]
    fn tiny_top_p_keeps_only_the_head() {
        let mut sampler = LogitsSampler::new(7);
        for _ in 0..50 {
            assert_eq!(sampler.sample(&[1.0, 5.0, 1.0], &sampled(0, 0.01)), Some(1));
        }
    }

    #[test]
    fn samples_stay_inside_top_k() {
        let mut sampler = LogitsSampler::new(11);
        let logits = [4.0, 3.9, -2.0, 3.8, -5.0];
        for _ in 0..200 {
            let id = sampler.sample(&logits, &sampled(3, 1.0)).unwrap();
            assert!([0, 1, 3].contains(&id), "unexpected token {id}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let logits = [1.0, 1.1, 0.9, 1.05];
        let params = sampled(0, 1.0);
        let mut a = LogitsSampler::new(60);
        let mut b = LogitsSampler::new(60);
        let left: Vec<_> = (0..20).map(|_| a.sample(&logits, &params)).collect();
        let right: Vec<_> = (0..20).map(|_| b.sample(&logits, &params)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn empty_logits_yield_nothing() {
        let mut sampler = LogitsSampler::new(0);
        assert_eq!(sampler.sample(&[], &SamplingParams::default()), None);
    }
}
