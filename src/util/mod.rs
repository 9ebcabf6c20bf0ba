pub mod fs;
pub mod tool;

/// Rounds `x` up to the next multiple of `y`.
pub fn align_up(x: u64, y: u64) -> u64 {
    x.div_ceil(y) * y
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn align_up_returns_correct_alignment() {
        assert_eq!(align_up(0, 2352), 0);
        assert_eq!(align_up(1, 2352), 2352);
        assert_eq!(align_up(2351, 2352), 2352);
        assert_eq!(align_up(2352, 2352), 2352);
        assert_eq!(align_up(2353, 2352), 4704);
        assert_eq!(align_up(65, 64), 128);
    }
}
