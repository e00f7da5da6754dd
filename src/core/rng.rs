//! Random Number Generator
//!
//! A PCG32 generator. Every stochastic decision in the renderer draws
//! from a stream selected by [`Rng::with_sequence`], so results only
//! depend on the seed and on *which* ray or voxel is being processed,
//! never on the order in which worker threads pick up work.

use hexf::*;

// ngp
use crate::core::ngp::Float;

pub const FLOAT_ONE_MINUS_EPSILON: Float = hexf32!("0x1.fffffep-1");
pub const PCG32_DEFAULT_STATE: u64 = 0x853c_49e6_748f_ea9b;
pub const PCG32_DEFAULT_STREAM: u64 = 0xda3e_39cb_94b9_5bdb;
pub const PCG32_MULT: u64 = 0x5851_f42d_4c95_7f2d;

/// Random number generator
#[derive(Debug, Copy, Clone)]
pub struct Rng {
    state: u64,
    inc: u64,
}

impl Default for Rng {
    fn default() -> Self {
        Rng::new()
    }
}

impl Rng {
    pub fn new() -> Self {
        Rng {
            state: PCG32_DEFAULT_STATE,
            inc: PCG32_DEFAULT_STREAM,
        }
    }
    /// A generator positioned at the start of stream `initseq`.
    pub fn with_sequence(initseq: u64) -> Self {
        let mut rng = Rng::new();
        rng.set_sequence(initseq);
        rng
    }
    /// Derive a stream index from a seed and a per-item index.
    pub fn stream(seed: u64, index: u64) -> u64 {
        seed.wrapping_mul(PCG32_MULT) ^ index
    }
    pub fn set_sequence(&mut self, initseq: u64) {
        self.state = 0_u64;
        self.inc = initseq.wrapping_shl(1) | 1;
        self.uniform_uint32();
        self.state = self.state.wrapping_add(PCG32_DEFAULT_STATE);
        self.uniform_uint32();
    }
    pub fn uniform_uint32(&mut self) -> u32 {
        let oldstate: u64 = self.state;
        self.state = oldstate.wrapping_mul(PCG32_MULT).wrapping_add(self.inc);
        let xorshifted: u32 = (oldstate.wrapping_shr(18) ^ oldstate).wrapping_shr(27) as u32;
        let rot: u32 = oldstate.wrapping_shr(59) as u32;
        xorshifted.wrapping_shr(rot)
            | xorshifted.wrapping_shl((!rot).wrapping_add(1_u32) & 31)
    }
    /// Uniform integer in `[0, b)`, `b` must be positive.
    pub fn uniform_uint32_bounded(&mut self, b: u32) -> u32 {
        let threshold = (!b).wrapping_add(1) % b;
        loop {
            let r = self.uniform_uint32();
            if r >= threshold {
                return r % b;
            }
        }
    }
    /// Uniform sample in `[0, 1)`.
    pub fn uniform_float(&mut self) -> Float {
        (self.uniform_uint32() as Float * hexf32!("0x1.0p-32") as Float)
            .min(FLOAT_ONE_MINUS_EPSILON)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_sequence_same_numbers() {
        let mut a = Rng::with_sequence(Rng::stream(7, 42));
        let mut b = Rng::with_sequence(Rng::stream(7, 42));
        for _ in 0..16 {
            assert_eq!(a.uniform_uint32(), b.uniform_uint32());
        }
    }

    #[test]
    fn different_streams_diverge() {
        let mut a = Rng::with_sequence(Rng::stream(7, 1));
        let mut b = Rng::with_sequence(Rng::stream(7, 2));
        let va: Vec<u32> = (0..8).map(|_| a.uniform_uint32()).collect();
        let vb: Vec<u32> = (0..8).map(|_| b.uniform_uint32()).collect();
        assert_ne!(va, vb);
    }

    #[test]
    fn uniform_float_in_unit_interval() {
        let mut rng = Rng::new();
        for _ in 0..1000 {
            let u = rng.uniform_float();
            assert!((0.0..1.0).contains(&u));
        }
        for _ in 0..1000 {
            assert!(rng.uniform_uint32_bounded(10) < 10);
        }
    }
}
