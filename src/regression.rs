use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::record::{EvaluatedFit, LinearFit};
use crate::uncertain::Uncertain;
use crate::{Error, Result};

/// Fewest points for which a straight line leaves a residual degree of freedom.
pub const MIN_POINTS: usize = 3;

/// Weighting applied to a regression window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Weighting {
    /// Inverse-variance weights from the per-point standard deviations.
    InverseVariance,
    /// Unit weights, parameter errors estimated from the residual scatter.
    Ordinary,
}

fn weighting(points: &[(f64, Uncertain)]) -> Result<Weighting> {
    if points.len() < MIN_POINTS {
        return Err(Error::InsufficientData {
            required: MIN_POINTS,
            available: points.len(),
        });
    }
    let weighted = points.iter().filter(|(_, y)| y.std_dev() > 0.0).count();
    match weighted {
        0 => Ok(Weighting::Ordinary),
        n if n == points.len() => Ok(Weighting::InverseVariance),
        _ => Err(Error::numeric(
            "regression window mixes exact and uncertain ordinates",
        )),
    }
}

fn weight(y: &Uncertain, weighting: Weighting) -> f64 {
    match weighting {
        Weighting::InverseVariance => y.std_dev().powi(2).recip(),
        Weighting::Ordinary => 1.0,
    }
}

/// Straight-line fit through `(x, y)` pairs.
///
/// When every ordinate carries a positive standard deviation this is the χ² fit with weights
/// `1 / σ²`; the parameter errors are then `sqrt(Sxx / Δ)` and `sqrt(S / Δ)` and do not depend on
/// the scatter of the data. When every standard deviation is zero the fit is unweighted and the
/// parameter errors are scaled by the residual variance.
///
/// Sums are taken about the weighted means and are algebraically equal to the textbook
/// `S, Sx, Sy, Sxx, Sxy` form.
///
/// # Errors
/// `Error::InsufficientData` for fewer than three points, `Error::Numeric` when all abscissae
/// coincide or exact and uncertain ordinates are mixed.
pub fn fit_line(points: &[(f64, Uncertain)]) -> Result<LinearFit> {
    let weighting = weighting(points)?;

    let (s, sx, sy) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(s, sx, sy), (x, y)| {
            let w = weight(y, weighting);
            (s + w, w.mul_add(*x, sx), w.mul_add(y.value(), sy))
        });
    let x_bar = sx / s;
    let y_bar = sy / s;

    let (stt, sty) = points.iter().fold((0.0, 0.0), |(stt, sty), (x, y)| {
        let w = weight(y, weighting);
        let t = x - x_bar;
        ((w * t).mul_add(t, stt), (w * t).mul_add(y.value() - y_bar, sty))
    });
    if stt <= 0.0 {
        return Err(Error::numeric("regression abscissae are all equal"));
    }

    let b = sty / stt;
    let a = b.mul_add(-x_bar, y_bar);

    // var(b) = 1 / Stt, var(a) = 1 / S + x̄² / Stt
    let var_b = stt.recip();
    let var_a = x_bar.powi(2).mul_add(var_b, s.recip());

    let scale = match weighting {
        Weighting::InverseVariance => 1.0,
        Weighting::Ordinary => {
            let residual = points
                .iter()
                .map(|(x, y)| (y.value() - b.mul_add(*x, a)).powi(2))
                .sum::<f64>();
            residual / (points.len() - 2) as f64
        }
    };

    Ok(LinearFit {
        a,
        sig_a: (scale * var_a).sqrt(),
        b,
        sig_b: (scale * var_b).sqrt(),
    })
}

/// Goodness of fit of `fit` over the points it was fitted to.
///
/// `r2` is the unweighted coefficient of determination and `chi2` the weighted residual sum
/// (unit weights for an ordinary fit). `q` is the χ² survival probability at `chi2` with
/// `nu_chi = n - 2` degrees of freedom.
///
/// # Errors
/// `Error::InsufficientData` for fewer than three points.
pub fn evaluate_fit(points: &[(f64, Uncertain)], fit: LinearFit) -> Result<EvaluatedFit> {
    let weighting = weighting(points)?;
    let n = points.len();

    let y_mean = points.iter().map(|(_, y)| y.value()).sum::<f64>() / n as f64;
    let (ss_res, ss_tot, chi2) =
        points
            .iter()
            .fold((0.0, 0.0, 0.0), |(ss_res, ss_tot, chi2), (x, y)| {
                let residual = y.value() - fit.b.mul_add(*x, fit.a);
                (
                    residual.mul_add(residual, ss_res),
                    (y.value() - y_mean).powi(2) + ss_tot,
                    (residual.powi(2)).mul_add(weight(y, weighting), chi2),
                )
            });
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        1.0
    };

    let nu_chi = n - 2;
    let q = ChiSquared::new(nu_chi as f64)
        .map_err(|e| Error::numeric(e.to_string()))?
        .sf(chi2);

    Ok(EvaluatedFit {
        fit,
        r2,
        q,
        chi2,
        nu_chi,
    })
}
