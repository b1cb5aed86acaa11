//! 精确有理数
//!
//! 确定性模式下帧率与时间轴位置用有理数表示（如 29.97fps = 30000/1001），
//! 子步边界时间精确计算，避免浮点累积误差。

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use crate::{Result, SpringBoneError};

/// 有理数（分母恒为正，已约分）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

/// 饱和到 i64 范围
fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value > 0 { i64::MAX } else { i64::MIN })
}

impl Rational {
    pub const ZERO: Self = Self { num: 0, den: 1 };
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// 创建有理数，分母为 0 时返回错误
    pub fn new(num: i64, den: i64) -> Result<Self> {
        if den == 0 {
            return Err(SpringBoneError::InvalidFrameRate(format!("{num}/0")));
        }
        Ok(Self::reduced(num as i128, den as i128))
    }

    pub fn from_integer(value: i64) -> Self {
        Self { num: value, den: 1 }
    }

    /// 用连分数求分母不超过 `max_den` 的最佳近似（用于 fps_base 等浮点输入）
    pub fn approximate(value: f64, max_den: i64) -> Result<Self> {
        if !value.is_finite() {
            return Err(SpringBoneError::InvalidFrameRate(value.to_string()));
        }
        let max_den = max_den.max(1) as i128;
        let (mut p0, mut q0, mut p1, mut q1) = (0i128, 1i128, 1i128, 0i128);
        let mut x = value;
        for _ in 0..64 {
            let a = x.floor();
            let ai = a as i128;
            let p2 = ai * p1 + p0;
            let q2 = ai * q1 + q0;
            if q2 > max_den {
                break;
            }
            (p0, q0, p1, q1) = (p1, q1, p2, q2);
            let frac = x - a;
            if frac.abs() < 1e-12 {
                break;
            }
            x = 1.0 / frac;
        }
        if q1 == 0 {
            return Err(SpringBoneError::InvalidFrameRate(value.to_string()));
        }
        Ok(Self::reduced(p1, q1))
    }

    fn reduced(num: i128, den: i128) -> Self {
        let sign = if den < 0 { -1 } else { 1 };
        let divisor = gcd(num, den).max(1);
        Self {
            num: saturate(sign * num / divisor),
            den: saturate(sign * den / divisor),
        }
    }

    #[inline]
    pub fn numer(&self) -> i64 {
        self.num
    }

    #[inline]
    pub fn denom(&self) -> i64 {
        self.den
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    /// 向下取整
    #[inline]
    pub fn floor(&self) -> i64 {
        self.num.div_euclid(self.den)
    }

    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Rational {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let (a, b, c, d) = (self.num as i128, self.den as i128, rhs.num as i128, rhs.den as i128);
        Self::reduced(a * d + c * b, b * d)
    }
}

impl Sub for Rational {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let (a, b, c, d) = (self.num as i128, self.den as i128, rhs.num as i128, rhs.den as i128);
        Self::reduced(a * d - c * b, b * d)
    }
}

impl Mul for Rational {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::reduced(
            self.num as i128 * rhs.num as i128,
            self.den as i128 * rhs.den as i128,
        )
    }
}

impl Div for Rational {
    type Output = Self;

    /// 除以零得到零
    fn div(self, rhs: Self) -> Self {
        if rhs.num == 0 {
            return Self::ZERO;
        }
        Self::reduced(
            self.num as i128 * rhs.den as i128,
            self.den as i128 * rhs.num as i128,
        )
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as i128 * other.den as i128).cmp(&(other.num as i128 * self.den as i128))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_and_sign() {
        let r = Rational::new(6, -4).unwrap();
        assert_eq!((r.numer(), r.denom()), (-3, 2));
        assert!(Rational::new(1, 0).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Rational::new(1, 3).unwrap();
        let b = Rational::new(1, 6).unwrap();
        assert_eq!(a + b, Rational::new(1, 2).unwrap());
        assert_eq!(a - b, b);
        assert_eq!(a * b, Rational::new(1, 18).unwrap());
        assert_eq!(a / b, Rational::from_integer(2));
        assert!(a > b);
    }

    #[test]
    fn test_floor_negative() {
        assert_eq!(Rational::new(-1, 2).unwrap().floor(), -1);
        assert_eq!(Rational::new(7, 2).unwrap().floor(), 3);
    }

    #[test]
    fn test_approximate_ntsc() {
        let fps = Rational::from_integer(30) / Rational::approximate(1.001, 10_000).unwrap();
        assert_eq!(fps, Rational::new(30000, 1001).unwrap());
    }
}
