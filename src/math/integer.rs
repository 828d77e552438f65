/// Integer types that can be snapped to a multiple of a positive step.
pub trait RoundInteger: Copy + PartialOrd {
    fn round_down(self, multiple: Self) -> Self;
    fn round_up(self, multiple: Self) -> Self;
}

macro_rules! impl_round_signed {
    ($($ty:ty),*) => {
        $(
            impl RoundInteger for $ty {
                fn round_down(self, multiple: Self) -> Self {
                    debug_assert!(multiple > 0);
                    self.div_euclid(multiple) * multiple
                }

                fn round_up(self, multiple: Self) -> Self {
                    debug_assert!(multiple > 0);
                    let down = self.round_down(multiple);
                    if down == self { down } else { down + multiple }
                }
            }
        )*
    };
}

macro_rules! impl_round_unsigned {
    ($($ty:ty),*) => {
        $(
            impl RoundInteger for $ty {
                fn round_down(self, multiple: Self) -> Self {
                    debug_assert!(multiple > 0);
                    (self / multiple) * multiple
                }

                fn round_up(self, multiple: Self) -> Self {
                    debug_assert!(multiple > 0);
                    let down = self.round_down(multiple);
                    if down == self { down } else { down + multiple }
                }
            }
        )*
    };
}

impl_round_signed!(i8, i16, i32, i64, isize);
impl_round_unsigned!(u8, u16, u32, u64, usize);

/// Largest multiple of `multiple` that is `<= value`.
pub fn round_down<T: RoundInteger>(value: T, multiple: T) -> T {
    value.round_down(multiple)
}

/// Smallest multiple of `multiple` that is `>= value`.
pub fn round_up<T: RoundInteger>(value: T, multiple: T) -> T {
    value.round_up(multiple)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_signed_values_bracket_the_input() {
        for value in -50_i32..=50 {
            for multiple in 1_i32..=9 {
                let down = round_down(value, multiple);
                let up = round_up(value, multiple);
                assert!(down <= value && value <= up, "{value} {multiple}");
                assert_eq!(down % multiple, 0);
                assert_eq!(up % multiple, 0);
                let exact = value % multiple == 0;
                assert_eq!(down == value, exact);
                assert_eq!(up == value, exact);
            }
        }
    }

    #[test]
    fn round_negative_dividends() {
        assert_eq!(round_down(-7_i32, 4), -8);
        assert_eq!(round_up(-7_i32, 4), -4);
        assert_eq!(round_down(-8_i64, 4), -8);
        assert_eq!(round_up(-8_i64, 4), -8);
    }

    #[test]
    fn round_unsigned_zero_stays_zero() {
        for multiple in 1_u32..=16 {
            assert_eq!(round_down(0_u32, multiple), 0);
            assert_eq!(round_up(0_u32, multiple), 0);
        }
        assert_eq!(round_up(13_usize, 8), 16);
        assert_eq!(round_down(13_u64, 8), 8);
    }
}
