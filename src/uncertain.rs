use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use num_traits::Float;

use crate::{Error, Result};

/// A nominal value paired with its standard deviation.
///
/// Every operation returns a fresh value whose standard deviation follows first-order (linear)
/// propagation, treating operands as uncorrelated:
///
/// $$
///     \sigma_z = \sqrt{\sum_i \left(\frac{\partial f}{\partial x_i} \sigma_{x_i}\right)^2}
/// $$
///
/// Addition, subtraction and multiplication are also available as operators, with either another
/// `Uncertain` or a plain scalar on the right. There is no `/` operator: every division goes
/// through [`Uncertain::try_div`], which reports a zero-nominal divisor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uncertain<T = f64> {
    value: T,
    std_dev: T,
}

impl<T: Float> Uncertain<T> {
    /// The standard deviation is stored as its absolute value.
    pub fn new(value: T, std_dev: T) -> Self {
        Self {
            value,
            std_dev: std_dev.abs(),
        }
    }

    /// A value known without uncertainty.
    pub fn exact(value: T) -> Self {
        Self {
            value,
            std_dev: T::zero(),
        }
    }

    pub const fn value(&self) -> T {
        self.value
    }

    pub const fn std_dev(&self) -> T {
        self.std_dev
    }

    /// `std_dev / |value|`, infinite for a zero nominal value.
    pub fn relative_uncertainty(&self) -> T {
        self.std_dev / self.value.abs()
    }

    /// Build the result of `f(x_1, .., x_n)` from its nominal `value` and the partial derivatives
    /// of `f` with respect to each input, evaluated at the nominal operating point.
    pub fn propagate(value: T, terms: &[(T, Self)]) -> Self {
        let variance = terms
            .iter()
            .map(|(partial, input)| (*partial * input.std_dev).powi(2))
            .fold(T::zero(), |acc, term| acc + term);
        Self::new(value, variance.sqrt())
    }

    pub fn add(self, rhs: impl Into<Self>) -> Self {
        let rhs = rhs.into();
        Self::propagate(
            self.value + rhs.value,
            &[(T::one(), self), (T::one(), rhs)],
        )
    }

    pub fn sub(self, rhs: impl Into<Self>) -> Self {
        let rhs = rhs.into();
        Self::propagate(
            self.value - rhs.value,
            &[(T::one(), self), (-T::one(), rhs)],
        )
    }

    pub fn mul(self, rhs: impl Into<Self>) -> Self {
        let rhs = rhs.into();
        Self::propagate(
            self.value * rhs.value,
            &[(rhs.value, self), (self.value, rhs)],
        )
    }

    /// # Errors
    /// `Error::Numeric` when the divisor's nominal value is zero.
    pub fn try_div(self, rhs: impl Into<Self>) -> Result<Self> {
        let rhs = rhs.into();
        if rhs.value.is_zero() {
            return Err(Error::numeric("division by a zero nominal value"));
        }
        Ok(Self::propagate(
            self.value / rhs.value,
            &[
                (T::one() / rhs.value, self),
                (-self.value / rhs.value.powi(2), rhs),
            ],
        ))
    }

    /// # Errors
    /// `Error::Numeric` when the nominal value is zero.
    pub fn recip(self) -> Result<Self> {
        Self::exact(T::one()).try_div(self)
    }

    pub fn powi(self, n: i32) -> Self {
        let derivative = match n {
            0 => T::zero(),
            _ => T::from(n).unwrap_or_else(T::nan) * self.value.powi(n - 1),
        };
        Self::propagate(self.value.powi(n), &[(derivative, self)])
    }

    /// Real power with a scalar exponent.
    ///
    /// # Errors
    /// `Error::Numeric` when the result is not finite, for instance a negative base with a
    /// fractional exponent.
    pub fn powf(self, exponent: T) -> Result<Self> {
        let value = self.value.powf(exponent);
        finite(value, "powf")?;
        let derivative = exponent * self.value.powf(exponent - T::one());
        Ok(Self::propagate(value, &[(derivative, self)]))
    }

    /// `self ^ exponent` where both carry uncertainty.
    ///
    /// # Errors
    /// `Error::Numeric` unless the base is strictly positive.
    pub fn pow(self, exponent: Self) -> Result<Self> {
        if self.value <= T::zero() {
            return Err(Error::numeric("uncertain exponent requires a positive base"));
        }
        let value = self.value.powf(exponent.value);
        Ok(Self::propagate(
            value,
            &[
                (
                    exponent.value * self.value.powf(exponent.value - T::one()),
                    self,
                ),
                (value * self.value.ln(), exponent),
            ],
        ))
    }

    /// # Errors
    /// `Error::Numeric` for a non-positive nominal value.
    pub fn ln(self) -> Result<Self> {
        if self.value <= T::zero() {
            return Err(Error::numeric("logarithm of a non-positive value"));
        }
        Ok(Self::propagate(
            self.value.ln(),
            &[(T::one() / self.value, self)],
        ))
    }

    /// `ln(1 + self)`, the form the transfer numbers are taken in.
    ///
    /// # Errors
    /// `Error::Numeric` when `self <= -1`.
    pub fn ln_1p(self) -> Result<Self> {
        if self.value <= -T::one() {
            return Err(Error::numeric("ln(1 + x) with x <= -1"));
        }
        Ok(Self::propagate(
            self.value.ln_1p(),
            &[(T::one() / (T::one() + self.value), self)],
        ))
    }

    pub fn exp(self) -> Self {
        let value = self.value.exp();
        Self::propagate(value, &[(value, self)])
    }

    /// # Errors
    /// `Error::Numeric` for a negative nominal value.
    pub fn sqrt(self) -> Result<Self> {
        if self.value < T::zero() {
            return Err(Error::numeric("square root of a negative value"));
        }
        let value = self.value.sqrt();
        let derivative = if value.is_zero() {
            T::zero()
        } else {
            T::one() / (T::from(2.0).unwrap_or_else(T::nan) * value)
        };
        Ok(Self::propagate(value, &[(derivative, self)]))
    }

    /// Arithmetic mean, each element treated as an independent measurement.
    ///
    /// # Errors
    /// `Error::Numeric` for an empty iterator.
    pub fn mean(values: impl IntoIterator<Item = Self>) -> Result<Self> {
        let (count, total) = values
            .into_iter()
            .fold((0usize, Self::exact(T::zero())), |(count, total), value| {
                (count + 1, total + value)
            });
        if count == 0 {
            return Err(Error::numeric("mean of an empty set"));
        }
        let count = T::from(count).ok_or_else(|| Error::numeric("count does not fit"))?;
        total.try_div(count)
    }
}

fn finite<T: Float>(value: T, operation: &'static str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::numeric(format!("{operation} produced a non-finite value")))
    }
}

impl<T: Float> From<T> for Uncertain<T> {
    fn from(value: T) -> Self {
        Self::exact(value)
    }
}

impl<T: Float> Add for Uncertain<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::add(self, rhs)
    }
}

impl<T: Float> Add<T> for Uncertain<T> {
    type Output = Self;

    fn add(self, rhs: T) -> Self {
        Self::add(self, rhs)
    }
}

impl<T: Float> Sub for Uncertain<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::sub(self, rhs)
    }
}

impl<T: Float> Sub<T> for Uncertain<T> {
    type Output = Self;

    fn sub(self, rhs: T) -> Self {
        Self::sub(self, rhs)
    }
}

impl<T: Float> Mul for Uncertain<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::mul(self, rhs)
    }
}

impl<T: Float> Mul<T> for Uncertain<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self::mul(self, rhs)
    }
}

impl<T: Float> Neg for Uncertain<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            std_dev: self.std_dev,
        }
    }
}

impl Add<Uncertain<f64>> for f64 {
    type Output = Uncertain<f64>;

    fn add(self, rhs: Uncertain<f64>) -> Uncertain<f64> {
        rhs + self
    }
}

impl Sub<Uncertain<f64>> for f64 {
    type Output = Uncertain<f64>;

    fn sub(self, rhs: Uncertain<f64>) -> Uncertain<f64> {
        Uncertain::exact(self) - rhs
    }
}

impl Mul<Uncertain<f64>> for f64 {
    type Output = Uncertain<f64>;

    fn mul(self, rhs: Uncertain<f64>) -> Uncertain<f64> {
        rhs * self
    }
}

impl<T: Float> Sum for Uncertain<T> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::exact(T::zero()), |acc, value| acc + value)
    }
}

impl<T: Float + fmt::Display> fmt::Display for Uncertain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ± {}", self.value, self.std_dev)
    }
}
