//! Longest common subsequence over two sequences.

/// Matched `(a_index, b_index)` pairs of a longest common subsequence of
/// `a` and `b`, ascending in both coordinates.
///
/// Uses the O(n·m) table. Backtracking prefers a diagonal match, and on a
/// tie between the two unilateral moves steps back through `b`.
pub fn lcs<T, F>(a: &[T], b: &[T], eq: F) -> Vec<(usize, usize)>
where
    F: Fn(&T, &T) -> bool,
{
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    let mut table = vec![0usize; (n + 1) * width];
    for i in 1..=n {
        for j in 1..=m {
            table[i * width + j] = if eq(&a[i - 1], &b[j - 1]) {
                table[(i - 1) * width + j - 1] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + j - 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(table[n * width + m]);
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if eq(&a[i - 1], &b[j - 1]) {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if table[(i - 1) * width + j] > table[i * width + j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(a: &[char], pairs: &[(usize, usize)]) -> String {
        pairs.iter().map(|&(i, _)| a[i]).collect()
    }

    #[test]
    fn empty_inputs() {
        assert!(lcs::<u8, _>(&[], &[1, 2], |a, b| a == b).is_empty());
        assert!(lcs::<u8, _>(&[1], &[], |a, b| a == b).is_empty());
    }

    #[test]
    fn identical_sequences_match_fully() {
        let a = [1, 2, 3];
        assert_eq!(lcs(&a, &a, |x, y| x == y), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn classic_example() {
        let a: Vec<char> = "ABCBDAB".chars().collect();
        let b: Vec<char> = "BDCABA".chars().collect();
        let pairs = lcs(&a, &b, |x, y| x == y);
        assert_eq!(pairs.len(), 4);
        for &(i, j) in &pairs {
            assert_eq!(a[i], b[j]);
        }
        assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
        assert_eq!(values(&a, &pairs), "BDAB");
    }

    #[test]
    fn moved_element_is_dropped_from_the_match() {
        // [x, y, z] -> [z, x, y]: x and y survive, z moved.
        let pairs = lcs(&['z', 'x', 'y'], &['x', 'y', 'z'], |a, b| a == b);
        assert_eq!(pairs, vec![(1, 0), (2, 1)]);
    }
}
