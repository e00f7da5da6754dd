//! Provides utilities for 3D Morton code generation using Fabian
//! Giesen's Morton code encoding/decoding functions, see [his post on
//! Morton
//! codes](https://fgiesen.wordpress.com/2009/12/13/decoding-morton-codes/)
//!
//! Coordinates are limited to 10 bits per axis, which covers occupancy
//! grids of up to 1024 cells per side.

/// Largest supported coordinate (exclusive).
pub const MORTON_MAX_COORD: u32 = 1 << 10;

/// Insert two 0 bits after each of the low 10 bits of x
pub fn part1_by2(mut x: u32) -> u32 {
    // x = ---- ---- ---- ---- ---- --98 7654 3210
    x &= 0x0000_03ff;
    // x = ---- --98 ---- ---- ---- ---- 7654 3210
    x = (x ^ (x << 16)) & 0xff00_00ff;
    // x = ---- --98 ---- ---- 7654 ---- ---- 3210
    x = (x ^ (x << 8)) & 0x0300_f00f;
    // x = ---- --98 ---- 76-- --54 ---- 32-- --10
    x = (x ^ (x << 4)) & 0x030c_30c3;
    // x = ---- 9--8 --7- -6-- 5--4 --3- -2-- 1--0
    (x ^ (x << 2)) & 0x0924_9249
}

/// Inverse of part1_by2, remove all bits not at positions divisible by 3
pub fn compact1_by2(mut x: u32) -> u32 {
    x &= 0x0924_9249;
    x = (x ^ (x >> 2)) & 0x030c_30c3;
    x = (x ^ (x >> 4)) & 0x0300_f00f;
    x = (x ^ (x >> 8)) & 0xff00_00ff;
    (x ^ (x >> 16)) & 0x0000_03ff
}

/// Compute the Morton code for the `(x, y, z)` position.
pub fn morton3(x: u32, y: u32, z: u32) -> u32 {
    part1_by2(x) | (part1_by2(y) << 1) | (part1_by2(z) << 2)
}

/// Recover the `(x, y, z)` position from a Morton code.
pub fn morton3_invert(code: u32) -> (u32, u32, u32) {
    (
        compact1_by2(code),
        compact1_by2(code >> 1),
        compact1_by2(code >> 2),
    )
}
