//! Fourier-space smoothing windows.

/// Spherical top-hat window `W(y) = 3 (sin y - y cos y) / y³`.
///
/// Below `y = 1e-3` the series `1 - y²/10 + y⁴/280` is used; the closed form
/// loses all precision there.
pub fn top_hat(y: f64) -> f64 {
    if y.abs() < 1e-3 {
        let y2 = y * y;
        1.0 - y2 / 10.0 + y2 * y2 / 280.0
    } else {
        3.0 * (y.sin() - y * y.cos()) / (y * y * y)
    }
}

/// Gaussian window `exp(-y²/2)`.
pub fn gaussian(y: f64) -> f64 {
    (-0.5 * y * y).exp()
}

/// Gaussian radius enclosing the same mass as a top-hat of radius `r_l`.
pub fn gaussian_radius(r_l: f64) -> f64 {
    0.46 * r_l
}
