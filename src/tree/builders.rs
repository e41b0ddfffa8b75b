//! Tree topologies: chunking the dataset and arranging chunks into leaves.
//!
//! Both shapes start from a random permutation of the dataset rows, split into
//! chunks of at most `max_dict_size`. They differ only in how chunks are
//! arranged:
//!
//! | Shape | Depth on k chunks | Merges in flight at once |
//! |-------|-------------------|--------------------------|
//! | Sequential | k - 1 | 1 |
//! | Balanced | ⌈log₂ k⌉ | up to k / 2 |

use rand::prelude::*;

use super::{MergeNode, MergeTree};
use crate::error::{Error, Result};

/// Arrangement of chunk leaves in the merge tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TreeShape {
    /// A path: each merge folds one new chunk into the running dictionary.
    #[default]
    Sequential,
    /// A balanced binary tree of minimal depth.
    Balanced,
}

impl TreeShape {
    /// Number of chunks to cut `n` rows into with at most `max_dict_size`
    /// rows per chunk.
    ///
    /// The balanced shape rounds a count above one up to an even number,
    /// unless that would leave a chunk empty.
    pub fn chunk_count(&self, n: usize, max_dict_size: usize) -> usize {
        let k = n.div_ceil(max_dict_size.max(1)).max(1);
        match self {
            TreeShape::Sequential => k,
            TreeShape::Balanced if k > 1 && k % 2 == 1 && k < n => k + 1,
            TreeShape::Balanced => k,
        }
    }

    /// Arrange `chunks` into a tree of this shape.
    pub fn build(&self, chunks: Vec<Vec<usize>>) -> Result<MergeTree> {
        match self {
            TreeShape::Sequential => sequential(chunks),
            TreeShape::Balanced => balanced(chunks),
        }
    }
}

/// Split `indices` into `k` contiguous chunks whose sizes differ by at most
/// one, larger chunks first.
pub fn split_even(indices: &[usize], k: usize) -> Vec<Vec<usize>> {
    let k = k.max(1);
    let base = indices.len() / k;
    let extra = indices.len() % k;
    let mut out = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let len = base + usize::from(i < extra);
        out.push(indices[start..start + len].to_vec());
        start += len;
    }
    out
}

/// Randomly permute `0..n` and split the permutation into `k` chunks.
pub fn chunk_indices<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);
    split_even(&perm, k)
}

/// Chain `chunks` into a fully unbalanced tree.
///
/// Nodes `0..k-1` form the spine with root 0; spine node `j` has the next
/// spine node as left child and the leaf for chunk `j` as right child. The
/// last spine node is itself the leaf for the last chunk. One chunk gives a
/// single leaf that is also the root.
pub fn sequential(chunks: Vec<Vec<usize>>) -> Result<MergeTree> {
    let k = chunks.len();
    if k == 0 {
        return Err(Error::EmptyInput);
    }

    let mut chunks = chunks;
    let last = chunks.pop().unwrap_or_default();

    let mut nodes = Vec::with_capacity(2 * k - 1);
    for j in 0..k - 1 {
        nodes.push(MergeNode::internal(j, j + 1, k + j));
    }
    nodes.push(MergeNode::leaf(k - 1, last));
    for (i, chunk) in chunks.into_iter().enumerate() {
        nodes.push(MergeNode::leaf(k + i, chunk));
    }

    MergeTree::new(nodes, 0)
}

/// Place `chunks` into a balanced binary tree of minimal depth.
///
/// A complete tree of depth `h = ⌊log₂ k⌋` offers `2^h` leaf slots. The first
/// `k - 2^h` slots are split into two leaves each so every chunk gets a leaf;
/// the remaining slots take one chunk directly. Ids follow heap order
/// (children of `i` are `2i + 1`, `2i + 2`), with split leaves appended.
pub fn balanced(chunks: Vec<Vec<usize>>) -> Result<MergeTree> {
    let k = chunks.len();
    if k == 0 {
        return Err(Error::EmptyInput);
    }
    if k == 1 {
        let only = chunks.into_iter().next().unwrap_or_default();
        return MergeTree::new(vec![MergeNode::leaf(0, only)], 0);
    }

    let h = k.ilog2();
    let width = 1usize << h;
    let first_leaf = width - 1;
    let mut diff = k - width;

    let mut nodes: Vec<MergeNode> = (0..first_leaf)
        .map(|i| MergeNode::internal(i, 2 * i + 1, 2 * i + 2))
        .collect();
    let mut split_leaves = Vec::with_capacity(2 * diff);
    let mut next_id = first_leaf + width;
    let mut chunks = chunks.into_iter();
    let mut take = || {
        chunks
            .next()
            .ok_or_else(|| Error::Other("balanced tree ran out of chunks".to_string()))
    };

    for slot in first_leaf..first_leaf + width {
        if diff == 0 {
            nodes.push(MergeNode::leaf(slot, take()?));
        } else {
            nodes.push(MergeNode::internal(slot, next_id, next_id + 1));
            split_leaves.push(MergeNode::leaf(next_id, take()?));
            split_leaves.push(MergeNode::leaf(next_id + 1, take()?));
            next_id += 2;
            diff -= 1;
        }
    }
    nodes.extend(split_leaves);

    MergeTree::new(nodes, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assigned(tree: &MergeTree) -> Vec<usize> {
        let mut all: Vec<usize> = tree
            .iter()
            .filter_map(|n| n.leaf_samples())
            .flat_map(|s| s.iter().copied())
            .collect();
        all.sort_unstable();
        all
    }

    fn unit_chunks(k: usize) -> Vec<Vec<usize>> {
        (0..k).map(|i| vec![i]).collect()
    }

    #[test]
    fn split_even_matches_array_split() {
        let idx: Vec<usize> = (0..10).collect();
        let parts = split_even(&idx, 3);
        assert_eq!(parts, vec![vec![0, 1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]);
        assert_eq!(split_even(&idx, 1), vec![idx.clone()]);
    }

    #[test]
    fn chunk_indices_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let chunks = chunk_indices(23, 5, &mut rng);
        assert_eq!(chunks.len(), 5);
        let mut all: Vec<usize> = chunks.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn chunk_count_rounds_balanced_to_even() {
        assert_eq!(TreeShape::Sequential.chunk_count(1000, 200), 5);
        assert_eq!(TreeShape::Balanced.chunk_count(1000, 200), 6);
        assert_eq!(TreeShape::Balanced.chunk_count(800, 200), 4);
        assert_eq!(TreeShape::Balanced.chunk_count(50, 200), 1);
        assert_eq!(TreeShape::Sequential.chunk_count(0, 200), 1);
        assert_eq!(TreeShape::Balanced.chunk_count(3, 1), 3);
    }

    #[test]
    fn sequential_layout() {
        let tree = sequential(unit_chunks(3)).unwrap();
        // 0 -> [1, 3], 1 -> [2, 4], 2 = chunk 2, 3 = chunk 0, 4 = chunk 1
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.node(0).unwrap().children(), Some((1, 3)));
        assert_eq!(tree.node(1).unwrap().children(), Some((2, 4)));
        assert_eq!(tree.node(2).unwrap().leaf_samples(), Some(&[2usize][..]));
        assert_eq!(tree.node(3).unwrap().leaf_samples(), Some(&[0usize][..]));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn single_chunk_is_a_lone_leaf_for_both_shapes() {
        for shape in [TreeShape::Sequential, TreeShape::Balanced] {
            let tree = shape.build(vec![vec![0, 1, 2]]).unwrap();
            assert_eq!(tree.len(), 1);
            assert!(tree.node(tree.root()).unwrap().is_leaf());
            assert_eq!(tree.depth(), 0);
        }
    }

    #[test]
    fn balanced_layout_with_split_leaves() {
        // k = 6: h = 2, four slots, the first two split.
        let tree = balanced(unit_chunks(6)).unwrap();
        assert_eq!(tree.len(), 11);
        assert_eq!(tree.node(3).unwrap().children(), Some((7, 8)));
        assert_eq!(tree.node(4).unwrap().children(), Some((9, 10)));
        assert_eq!(tree.node(5).unwrap().leaf_samples(), Some(&[4usize][..]));
        assert_eq!(tree.node(6).unwrap().leaf_samples(), Some(&[5usize][..]));
        assert_eq!(tree.node(7).unwrap().leaf_samples(), Some(&[0usize][..]));
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn empty_chunk_list_errors() {
        assert_eq!(sequential(Vec::new()).unwrap_err(), Error::EmptyInput);
        assert_eq!(balanced(Vec::new()).unwrap_err(), Error::EmptyInput);
    }

    proptest! {
        #[test]
        fn sequential_depth_is_k_minus_one(k in 1usize..64) {
            let tree = sequential(unit_chunks(k)).unwrap();
            prop_assert_eq!(tree.depth(), k - 1);
            prop_assert_eq!(tree.leaves().len(), k);
            prop_assert_eq!(tree.internal_count(), k - 1);
            prop_assert_eq!(assigned(&tree), (0..k).collect::<Vec<_>>());
        }

        #[test]
        fn balanced_depth_is_ceil_log2(k in 1usize..200) {
            let tree = balanced(unit_chunks(k)).unwrap();
            let expected = if k == 1 { 0 } else { (k - 1).ilog2() as usize + 1 };
            prop_assert_eq!(tree.depth(), expected);
            prop_assert_eq!(tree.leaves().len(), k);
            prop_assert_eq!(tree.internal_count(), k - 1);
            prop_assert_eq!(assigned(&tree), (0..k).collect::<Vec<_>>());
        }

        #[test]
        fn shapes_assign_every_row_once(n in 1usize..500, m in 1usize..80, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for shape in [TreeShape::Sequential, TreeShape::Balanced] {
                let k = shape.chunk_count(n, m);
                let chunks = chunk_indices(n, k, &mut rng);
                prop_assert!(chunks.iter().all(|c| c.len() <= m && !c.is_empty()));
                let tree = shape.build(chunks).unwrap();
                prop_assert!(tree.leaves().iter().all(|&l| tree.node(l).unwrap().leaf_samples().is_some()));
                prop_assert_eq!(assigned(&tree), (0..n).collect::<Vec<_>>());
            }
        }
    }
}
