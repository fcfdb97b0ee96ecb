//! Parallelism configuration for element conversion.

use rayon::prelude::*;

/// Whether conversion loops may run on the rayon pool.
///
/// Layouts use [`Parallelism::auto`]; the flag only decides between
/// `rayon` parallel iterators and plain iteration, the thread pool itself
/// belongs to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    Sequential,
    #[default]
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Parallel when the current rayon pool has more than one thread.
    #[inline]
    pub fn auto() -> Self {
        Self::from_threads(0)
    }

    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Apply `f` to every `(dst, src)` pair, in parallel when allowed.
    #[inline]
    pub fn maybe_par_zip<D, S, F>(self, dst: &mut [D], src: &[S], f: F)
    where
        D: Send,
        S: Sync,
        F: Fn(&mut D, &S) + Sync + Send,
    {
        if self.is_parallel() {
            dst.par_iter_mut().zip(src.par_iter()).for_each(|(d, s)| f(d, s));
        } else {
            dst.iter_mut().zip(src.iter()).for_each(|(d, s)| f(d, s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_threads() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_threads(4), Parallelism::Parallel);
    }

    #[test]
    fn zip_matches_sequential() {
        let src: Vec<i32> = (0..1000).collect();
        let mut a = vec![0i64; 1000];
        let mut b = vec![0i64; 1000];
        Parallelism::Parallel.maybe_par_zip(&mut a, &src, |d, s| *d = *s as i64 * 2);
        Parallelism::Sequential.maybe_par_zip(&mut b, &src, |d, s| *d = *s as i64 * 2);
        assert_eq!(a, b);
    }
}
