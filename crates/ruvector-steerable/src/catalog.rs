//! Basis catalog
//!
//! A convolution between fields of several orders needs one basis per
//! `(order_in, order_out)` pair. Pairs are independent, so they are built
//! in parallel when the `parallel` feature is enabled.

use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::kernels::{KernelBasis, SteerableBasis};
use crate::window::RadialWindow;

/// Kernel bases of one size for every requested order pair
///
/// Pairs without a basis at this size are kept as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisCatalog {
    size: usize,
    entries: BTreeMap<(usize, usize), Option<KernelBasis>>,
}

impl BasisCatalog {
    /// Build bases for the product of `orders_in` and `orders_out`
    ///
    /// Duplicate orders are built once. The first failing pair aborts the build.
    pub fn build<W>(
        engine: &SteerableBasis,
        size: usize,
        orders_in: &[usize],
        orders_out: &[usize],
        window: &W,
    ) -> Result<Self>
    where
        W: RadialWindow + ?Sized,
    {
        let pairs: Vec<(usize, usize)> = orders_in
            .iter()
            .flat_map(|&i| orders_out.iter().map(move |&o| (i, o)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let build_pair = |&(order_in, order_out): &(usize, usize)| {
            engine
                .cube_basis_kernels(size, order_in, order_out, window)
                .map(|basis| ((order_in, order_out), basis))
        };

        #[cfg(feature = "parallel")]
        let built: Vec<_> = pairs.par_iter().map(build_pair).collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let built: Vec<_> = pairs.iter().map(build_pair).collect::<Result<_>>()?;

        let catalog = Self {
            size,
            entries: built.into_iter().collect(),
        };
        info!(
            size,
            pairs = catalog.entries.len(),
            total_basis = catalog.total_basis_count(),
            "built basis catalog"
        );
        Ok(catalog)
    }

    /// Kernel side length
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of order pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pair was requested
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `(order_in, order_out)` was requested
    pub fn contains_pair(&self, order_in: usize, order_out: usize) -> bool {
        self.entries.contains_key(&(order_in, order_out))
    }

    /// Basis of a pair; `None` if the pair was not requested or has no basis
    pub fn get(&self, order_in: usize, order_out: usize) -> Option<&KernelBasis> {
        self.entries
            .get(&(order_in, order_out))
            .and_then(Option::as_ref)
    }

    /// All pairs in `(order_in, order_out)` order
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), Option<&KernelBasis>)> {
        self.entries.iter().map(|(&pair, basis)| (pair, basis.as_ref()))
    }

    /// Sum of `n_basis` over all pairs
    pub fn total_basis_count(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .map(KernelBasis::n_basis)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasisConfig, CacheConfig};
    use crate::window::GaussianWindow;

    fn engine() -> SteerableBasis {
        SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::memory())).unwrap()
    }

    #[test]
    fn test_catalog_covers_product() {
        let window = GaussianWindow::new(vec![1.0], vec![1], 0.6).unwrap();
        let catalog = BasisCatalog::build(&engine(), 5, &[0, 1], &[0, 1, 1], &window).unwrap();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.size(), 5);
        assert!(catalog.contains_pair(1, 0));

        // (0, 0) -> J = 0; (0, 1), (1, 0) -> J = 1; (1, 1) -> J = 0, 1
        assert_eq!(catalog.get(0, 0).map(KernelBasis::n_basis), Some(1));
        assert_eq!(catalog.get(0, 1).map(KernelBasis::n_basis), Some(1));
        assert_eq!(catalog.get(1, 1).map(KernelBasis::n_basis), Some(2));
        assert_eq!(catalog.total_basis_count(), 5);
    }

    #[test]
    fn test_pairs_without_basis_are_kept() {
        let window = GaussianWindow::new(vec![1.0], vec![0], 0.6).unwrap();
        let catalog = BasisCatalog::build(&engine(), 3, &[0], &[0, 2], &window).unwrap();
        assert!(catalog.contains_pair(0, 2));
        assert!(catalog.get(0, 2).is_none());
        assert!(catalog.get(0, 0).is_some());
        assert_eq!(catalog.iter().filter(|(_, b)| b.is_none()).count(), 1);
    }

    #[test]
    fn test_empty_request() {
        let window = GaussianWindow::new(vec![1.0], vec![0], 0.6).unwrap();
        let catalog = BasisCatalog::build(&engine(), 3, &[], &[0], &window).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.total_basis_count(), 0);
    }
}
