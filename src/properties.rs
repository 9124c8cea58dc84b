//! Thermophysical properties of the evaporating film and the dimensionless groups built from
//! them.
//!
//! Every quantity is an [`Uncertain`] so the instrument and calibration uncertainties of the
//! local state reach the final groups. The humid-air and liquid-water properties come from
//! closed-form correlations:
//!
//! - saturation vapour pressure after Hyland and Wexler (see [`crate::humidity`]),
//! - vapour mole fractions with the CIPM-2007 enhancement factor
//!   `f = 1.000 62 + 3.14e-8 P + 5.6e-7 t²`,
//! - ideal-gas mixture densities,
//! - latent heat of vaporisation as the cubic fit of Rogers and Yau,
//! - dry-air specific heat `1002.5 + 275e-6 (T - 200)²` with a quadratic vapour specific heat,
//!   mixed by mass fraction,
//! - liquid-water specific heat as an Osborne-type quartic in Celsius,
//! - dry-air conductivity `2.646e-3 T^1.5 / (T + 245.4 10^(-12/T))` and Sutherland's dry-air
//!   viscosity, each mixed linearly with the vapour by mole fraction.

use std::f64::consts::{LN_10, PI};

use crate::config::{ChamberConfig, InstrumentConfig};
use crate::humidity::saturation_pressure;
use crate::observation::Observation;
use crate::record::LinearFit;
use crate::uncertain::Uncertain;
use crate::{Error, Result};

const ZERO_CELSIUS: f64 = 273.15;
/// Universal gas constant [J/(mol K)].
const GAS_CONSTANT: f64 = 8.314_462_618;
const STANDARD_PRESSURE: f64 = 101_325.0;
/// Reference temperatures are rounded to a multiple of this [K].
const REFERENCE_STEP: f64 = 5.0;

/// Latent heat of vaporisation [J/kg], cubic in Celsius.
const LATENT_HEAT: [f64; 4] = [2.500_8e6, -2.36e3, 1.6, -0.06];
/// Specific heat of liquid water [J/(kg K)], quartic in Celsius.
const LIQUID_CP: [f64; 5] = [
    4217.4,
    -3.720_283,
    0.141_285_5,
    -2.654_387e-3,
    2.093_236e-5,
];
/// Specific heat of water vapour [J/(kg K)], quadratic in Celsius.
const VAPOUR_CP: [f64; 3] = [1858.0, 0.382, 4.22e-4];
/// Thermal conductivity of water vapour [W/(m K)], linear in Celsius.
const VAPOUR_CONDUCTIVITY: [f64; 2] = [1.75e-2, 7.0e-5];
/// Dynamic viscosity of water vapour [Pa s], linear in Celsius.
const VAPOUR_VISCOSITY: [f64; 2] = [8.85e-6, 3.5e-8];

/// Averages over an accepted regression window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalState {
    /// Calibrated surface temperature [K].
    pub ts: Uncertain,
    /// Ambient temperature rounded to the reference grid [K].
    pub te: Uncertain,
    pub tdp: Uncertain,
    pub p: Uncertain,
}

/// Derived film properties, SI units throughout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Properties {
    /// Evaporative mass flux [kg/(m² s)].
    pub mddp: Uncertain,
    pub x1s: Uncertain,
    pub x1e: Uncertain,
    pub x1: Uncertain,
    pub m1s: Uncertain,
    pub m1e: Uncertain,
    pub m1: Uncertain,
    pub rhos: Uncertain,
    pub rhoe: Uncertain,
    pub rho: Uncertain,
    pub bm1: Uncertain,
    /// Film temperature [K].
    pub t: Uncertain,
    pub d12: Uncertain,
    pub hfg: Uncertain,
    pub hu: Uncertain,
    pub hs: Uncertain,
    pub cpv: Uncertain,
    pub he: Uncertain,
    pub cpl: Uncertain,
    pub ht: Uncertain,
    pub qcu: Uncertain,
    pub ebe: Uncertain,
    pub ebs: Uncertain,
    pub qrs: Uncertain,
    pub kv: Uncertain,
    pub alpha: Uncertain,
    pub bh: Uncertain,
    /// Film molar mass [g/mol].
    pub m: Uncertain,
    pub gamma1: Uncertain,
    pub gamma2: Uncertain,
    pub beta: Uncertain,
    pub delta_m: Uncertain,
    pub delta_t: Uncertain,
    pub mu: Uncertain,
    pub nu: Uncertain,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NondimensionalGroups {
    /// Sherwood number on the tube radius.
    pub sh_r: Uncertain,
    /// Nusselt number on the tube radius.
    pub nu_r: Uncertain,
    /// Lewis number.
    pub le: Uncertain,
    pub gr_r_binary: Uncertain,
    pub gr_r_primary: Uncertain,
}

/// Average the observations of an accepted window into the local experimental state.
///
/// The surface temperature passes through the infrared sensor calibration, which is linear in
/// Celsius. The ambient temperature is the thermocouple mean rounded to the nearest 5 K, keeping
/// its uncertainty.
///
/// # Errors
/// `Error::Numeric` for an empty window or an index without a connected thermocouple.
pub fn local_state(
    observations: &[Observation],
    instrument: &InstrumentConfig,
    chamber: &ChamberConfig,
) -> Result<LocalState> {
    let mean = |field: fn(&InstrumentConfig, f64) -> Uncertain, value: fn(&Observation) -> f64| {
        Uncertain::mean(
            observations
                .iter()
                .map(|obs| field(instrument, value(obs))),
        )
    };

    let ts_raw = mean(InstrumentConfig::surface_temp, |obs| obs.surface_temp)?;
    let ts = chamber.ir_gain() * (ts_raw - ZERO_CELSIUS) + chamber.ir_offset() + ZERO_CELSIUS;

    let te = Uncertain::mean(
        observations
            .iter()
            .map(|obs| obs.average_temperature(instrument.thermocouple))
            .collect::<Result<Vec<_>>>()?,
    )?;
    let te = Uncertain::new(
        (te.value() / REFERENCE_STEP).round() * REFERENCE_STEP,
        te.std_dev(),
    );

    Ok(LocalState {
        ts,
        te,
        tdp: mean(InstrumentConfig::dew_point, |obs| obs.dew_point)?,
        p: mean(InstrumentConfig::pressure, |obs| obs.pressure)?,
    })
}

/// A polynomial in `x` with coefficients lowest power first, propagated through its derivative.
fn polynomial(x: Uncertain, coefficients: &[f64]) -> Uncertain {
    let t = x.value();
    let value = coefficients.iter().rev().fold(0.0_f64, |acc, c| acc.mul_add(t, *c));
    let derivative = coefficients
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0_f64, |acc, (power, c)| acc.mul_add(t, power as f64 * c));
    Uncertain::propagate(value, &[(derivative, x)])
}

fn celsius(temperature: Uncertain) -> Uncertain {
    temperature - ZERO_CELSIUS
}

/// Vapour mole fraction of air saturated at `temperature`, including the enhancement factor.
fn saturated_mole_fraction(temperature: Uncertain, pressure: Uncertain) -> Result<Uncertain> {
    let enhancement = pressure * 3.14e-8 + celsius(temperature).powi(2) * 5.6e-7 + 1.000_62;
    (enhancement * saturation_pressure(temperature)?).try_div(pressure)
}

fn mass_fraction(mole_fraction: Uncertain, chamber: &ChamberConfig) -> Result<Uncertain> {
    let water = mole_fraction * chamber.m1;
    let air = (1.0 - mole_fraction) * chamber.m2;
    water.try_div(water + air)
}

/// Ideal-gas density of humid air [kg/m³].
fn mixture_density(
    mole_fraction: Uncertain,
    temperature: Uncertain,
    pressure: Uncertain,
    chamber: &ChamberConfig,
) -> Result<Uncertain> {
    let molar_mass = mole_fraction * chamber.m1 + (1.0 - mole_fraction) * chamber.m2;
    (pressure * molar_mass * 1e-3).try_div(temperature * GAS_CONSTANT)
}

fn dry_air_specific_heat(temperature: Uncertain) -> Uncertain {
    (temperature - 200.0).powi(2) * 275e-6 + 1002.5
}

fn dry_air_conductivity(temperature: Uncertain) -> Result<Uncertain> {
    let damping = (temperature.recip()? * (-12.0 * LN_10)).exp() * 245.4;
    (temperature.powf(1.5)? * 2.646e-3).try_div(temperature + damping)
}

fn dry_air_viscosity(temperature: Uncertain) -> Result<Uncertain> {
    (temperature.powf(1.5)? * 1.458e-6).try_div(temperature + 110.4)
}

/// Mole-fraction weighted mean of a dry-air and a vapour property.
fn mole_mix(mole_fraction: Uncertain, air: Uncertain, vapour: Uncertain) -> Uncertain {
    (1.0 - mole_fraction) * air + mole_fraction * vapour
}

/// Evaluate the property chain for an accepted fit.
///
/// # Errors
/// `Error::Numeric` when an intermediate leaves its domain, for instance a zero slope.
#[allow(clippy::similar_names)]
pub fn compute_properties(
    state: &LocalState,
    fit: &LinearFit,
    chamber: &ChamberConfig,
) -> Result<Properties> {
    let LocalState { ts, te, tdp, p } = *state;

    let area = chamber.radius().powi(2) * PI;
    let mddp = (-fit.slope()).try_div(area)?;

    let x1s = saturated_mole_fraction(ts, p)?;
    let x1e = saturated_mole_fraction(tdp, p)?;
    let x1 = (x1s + x1e) * 0.5;

    let m1s = mass_fraction(x1s, chamber)?;
    let m1e = mass_fraction(x1e, chamber)?;
    let m1 = (m1s + m1e) * 0.5;

    let rhos = mixture_density(x1s, ts, p, chamber)?;
    let rhoe = mixture_density(x1e, te, p, chamber)?;
    let rho = (rhos + rhoe) * 0.5;

    let bm1 = (m1s - m1e).try_div(1.0 - m1s)?;

    let t = (te + ts) * 0.5;
    let d12 = (STANDARD_PRESSURE * 1.97e-5) * p.recip()? * t.try_div(256.0)?.powf(1.685)?;

    let hfg = polynomial(celsius(ts), &LATENT_HEAT);
    let hu = -hfg;
    let hs = Uncertain::exact(0.0);

    let cp_vapour = polynomial(celsius(t), &VAPOUR_CP);
    let cpv = (1.0 - m1) * dry_air_specific_heat(t) + m1 * cp_vapour;
    let he = cpv * (te - ts);

    let cpl = polynomial(celsius(t), &LIQUID_CP);
    let ht = cpl * (te - ts);

    let qcu = mddp * (ht - hu);

    let ebe = te.powi(4) * chamber.stefan_boltzmann;
    let ebs = ts.powi(4) * chamber.stefan_boltzmann;
    let qrs = (ebe - ebs).try_div(chamber.radiation_factor())?;

    let kv = mole_mix(
        x1,
        dry_air_conductivity(t)?,
        polynomial(celsius(t), &VAPOUR_CONDUCTIVITY),
    );
    let alpha = kv.try_div(rho * cpv)?;

    let bh = (hs - he).try_div(hu + (qcu + qrs).try_div(mddp)? - hs)?;

    let m = m1 * chamber.m1 + (1.0 - m1) * chamber.m2;
    let gamma1 = rho.recip()? * (m.try_div(chamber.m1)? - 1.0);
    let gamma2 = rho.recip()? * (m.try_div(chamber.m2)? - 1.0);
    let beta = t.recip()?;

    let delta_m = m1s - m1e;
    let delta_t = ts - te;

    let mu = mole_mix(
        x1,
        dry_air_viscosity(t)?,
        polynomial(celsius(t), &VAPOUR_VISCOSITY),
    );
    let nu = mu.try_div(rho)?;

    Ok(Properties {
        mddp,
        x1s,
        x1e,
        x1,
        m1s,
        m1e,
        m1,
        rhos,
        rhoe,
        rho,
        bm1,
        t,
        d12,
        hfg,
        hu,
        hs,
        cpv,
        he,
        cpl,
        ht,
        qcu,
        ebe,
        ebs,
        qrs,
        kv,
        alpha,
        bh,
        m,
        gamma1,
        gamma2,
        beta,
        delta_m,
        delta_t,
        mu,
        nu,
    })
}

/// Sherwood, Nusselt, Lewis and Grashof numbers on the tube radius.
///
/// # Errors
/// `Error::Numeric` when a transfer number is at or below -1 or a divisor vanishes.
pub fn nondimensional_groups(
    properties: &Properties,
    chamber: &ChamberConfig,
) -> Result<NondimensionalGroups> {
    let Properties {
        mddp,
        rho,
        d12,
        alpha,
        bm1,
        bh,
        nu,
        mu,
        beta,
        delta_t,
        gamma1,
        delta_m,
        rhos,
        rhoe,
        ..
    } = *properties;
    let radius = chamber.radius();
    let flux = mddp * radius;

    let sh_r = flux.try_div(bm1.ln_1p()? * rho * d12)?;
    let nu_r = flux.try_div(bh.ln_1p()? * rho * alpha)?;
    let le = d12.try_div(alpha)?;

    let buoyancy = radius.powi(3) * chamber.gravity;
    let gr_r_binary =
        buoyancy.try_div(nu.powi(2))? * (beta * delta_t + gamma1 * rho * delta_m);
    let gr_r_primary = buoyancy.try_div(mu.powi(2))? * (rho * (rhos - rhoe));

    for (name, value) in [
        ("ShR", sh_r),
        ("NuR", nu_r),
        ("Le", le),
        ("GrR_binary", gr_r_binary),
        ("GrR_primary", gr_r_primary),
    ] {
        if !value.value().is_finite() {
            return Err(Error::numeric(format!("{name} is not finite")));
        }
    }

    Ok(NondimensionalGroups {
        sh_r,
        nu_r,
        le,
        gr_r_binary,
        gr_r_primary,
    })
}
