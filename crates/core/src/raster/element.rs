//! Cell value trait for generic raster grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// The "no stream / no data" sentinel shared by every raster this pipeline
/// reads or writes. Matches the convention of the rasterized stream
/// networks and streamflow rasters the solver consumes.
pub const NODATA_SENTINEL: f64 = -9999.0;

/// Trait for types that can be stored in a raster cell.
pub trait CellValue:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// The -9999 sentinel expressed in this type
    fn nodata() -> Self;

    /// Check whether a value is the nodata sentinel
    fn is_nodata(&self) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert an f64 into this type, if representable
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_cell_value_int {
    ($t:ty) => {
        impl CellValue for $t {
            fn nodata() -> Self {
                NODATA_SENTINEL as $t
            }

            fn is_nodata(&self) -> bool {
                *self == Self::nodata()
            }
        }
    };
}

macro_rules! impl_cell_value_float {
    ($t:ty) => {
        impl CellValue for $t {
            fn nodata() -> Self {
                NODATA_SENTINEL as $t
            }

            fn is_nodata(&self) -> bool {
                self.is_nan() || (*self - Self::nodata()).abs() < 0.5
            }
        }
    };
}

impl_cell_value_int!(i16);
impl_cell_value_int!(i32);
impl_cell_value_int!(i64);
impl_cell_value_float!(f32);
impl_cell_value_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_nodata() {
        assert_eq!(i32::nodata(), -9999);
        assert!((-9999i32).is_nodata());
        assert!(!0i32.is_nodata());
    }

    #[test]
    fn test_float_nodata() {
        assert!(f64::nodata().is_nodata());
        assert!(f64::NAN.is_nodata());
        assert!(!12.5f64.is_nodata());
    }

    #[test]
    fn test_casts() {
        assert_eq!(CellValue::to_f64(7i32), Some(7.0));
        assert_eq!(<i32 as CellValue>::from_f64(7.0), Some(7));
    }
}
