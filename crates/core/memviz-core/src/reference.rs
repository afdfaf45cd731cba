//! 引用串
//!
//! 生成带局部性的随机引用串，或清洗用户给出的显式引用串。

use rand::Rng;

use crate::PageNumber;
use crate::config::{Adjustment, clamp_setting};

/// 生成长度为 `length` 的引用串，页号范围 `0..page_count`
///
/// 除第一个引用外，每个引用以 `locality` 的概率落在前一页的 ±1 范围内
/// （钳制到合法页号），否则均匀随机。
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    page_count: usize,
    locality: f64,
) -> Vec<PageNumber> {
    if page_count == 0 {
        return Vec::new();
    }

    let locality = if locality.is_nan() { 0.0 } else { locality.clamp(0.0, 1.0) };
    let mut references: Vec<PageNumber> = Vec::with_capacity(length);
    for _ in 0..length {
        let page = match references.last() {
            Some(&previous) if rng.gen_bool(locality) => {
                let step: i64 = rng.gen_range(-1..=1);
                (previous as i64 + step).clamp(0, page_count as i64 - 1) as PageNumber
            }
            _ => rng.gen_range(0..page_count),
        };
        references.push(page);
    }
    references
}

/// 把显式引用串中的页号钳制到 `0..page_count`
pub fn sanitize(pages: &[PageNumber], page_count: usize) -> (Vec<PageNumber>, Vec<Adjustment>) {
    let mut adjustments = Vec::new();
    let max = page_count.saturating_sub(1);
    let references = pages
        .iter()
        .enumerate()
        .map(|(i, &page)| clamp_setting(&format!("reference.pages[{i}]"), page, 0, max, &mut adjustments))
        .collect();
    (references, adjustments)
}

/// 解析形如 `"7 0 1, 2"` 的引用串
pub fn parse(text: &str) -> Result<Vec<PageNumber>, std::num::ParseIntError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_range_and_length() {
        let mut rng = StdRng::seed_from_u64(42);
        let refs = generate(&mut rng, 30, 8, 0.66);
        assert_eq!(refs.len(), 30);
        assert!(refs.iter().all(|&p| p < 8));
    }

    #[test]
    fn test_full_locality_stays_adjacent() {
        let mut rng = StdRng::seed_from_u64(3);
        let refs = generate(&mut rng, 30, 50, 1.0);
        for pair in refs.windows(2) {
            assert!(pair[0].abs_diff(pair[1]) <= 1, "{pair:?}");
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate(&mut StdRng::seed_from_u64(9), 20, 6, 0.5);
        let b = generate(&mut StdRng::seed_from_u64(9), 20, 6, 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_without_pages() {
        assert!(generate(&mut StdRng::seed_from_u64(1), 10, 0, 0.5).is_empty());
    }

    #[test]
    fn test_sanitize() {
        let (refs, adjustments) = sanitize(&[0, 3, 12, 7], 8);
        assert_eq!(refs, vec![0, 3, 7, 7]);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].field, "reference.pages[2]");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("7 0 1,2, 0").unwrap(), vec![7, 0, 1, 2, 0]);
        assert!(parse("1 x 2").is_err());
        assert!(parse("").unwrap().is_empty());
    }
}
