/// Floor used when converting silent levels to dB.
pub const DB_EPS: f32 = 1e-6;

pub fn lin_to_db(lin: f32) -> f32 {
    20.0 * lin.max(DB_EPS).log10()
}

/// Largest absolute sample in `x` (0.0 for an empty slice).
#[inline]
pub fn peak_abs(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |p, &v| p.max(v.abs()))
}
