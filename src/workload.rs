//! 工作负载模块
//! 每个线程独立的随机Key选择器，不在线程之间共享

use crate::error::{AppError, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Zipf;

/// Key下标的分布
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum KeyDistribution {
    /// `[0, N)` 均匀分布
    #[default]
    Uniform,
    /// Zipf分布，下标越小越热
    Zipf { exponent: f64 },
}

enum Sampler {
    Uniform,
    Zipf(Zipf<f64>),
}

/// 线程本地的Key下标生成器
pub struct KeyChooser {
    rng: ChaCha8Rng,
    len: usize,
    sampler: Sampler,
}

impl KeyChooser {
    /// 给定种子时线程 `worker_id` 使用 `seed + worker_id`，保证可复现；否则取随机熵
    pub fn new(
        distribution: KeyDistribution,
        len: usize,
        seed: Option<u64>,
        worker_id: usize,
    ) -> Result<Self> {
        if len == 0 {
            return Err(AppError::Config("cannot choose from an empty key pool".into()));
        }
        let sampler = match distribution {
            KeyDistribution::Uniform => Sampler::Uniform,
            KeyDistribution::Zipf { exponent } => Sampler::Zipf(
                Zipf::new(len as f64, exponent).map_err(|e| AppError::Zipf(e.to_string()))?,
            ),
        };
        let seed = seed.map_or_else(rand::random, |s| s.wrapping_add(worker_id as u64));
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            len,
            sampler,
        })
    }

    /// 下一个下标，范围 `[0, len)`
    #[inline]
    pub fn next_index(&mut self) -> usize {
        match &self.sampler {
            Sampler::Uniform => self.rng.random_range(0..self.len),
            Sampler::Zipf(zipf) => {
                // Zipf 采样范围是 [1, n]
                let rank = zipf.sample(&mut self.rng) as usize;
                rank.saturating_sub(1).min(self.len - 1)
            }
        }
    }
}
