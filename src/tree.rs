//! Loser tree.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::source::Source;

/// Run number a leaf is assigned to. Runs are numbered from 1.
pub type RunId = u64;

/// Leaf key. [`Key::Eof`] marks an exhausted source and is greater than any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key<T> {
    Value(T),
    Eof,
}

impl<T> Key<T> {
    /// Returns `true` if the key marks an exhausted source.
    pub fn is_eof(&self) -> bool {
        matches!(self, Key::Eof)
    }

    /// Returns a reference to the contained value if any.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Key::Value(value) => Some(value),
            Key::Eof => None,
        }
    }

    /// Converts the key into the contained value if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Key::Value(value) => Some(value),
            Key::Eof => None,
        }
    }
}

impl<T> From<Option<T>> for Key<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Key::Value(value),
            None => Key::Eof,
        }
    }
}

/// Tournament leaf: the key contested for a source and the run it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf<T> {
    pub key: Key<T>,
    pub run: RunId,
}

impl<T: Ord> Leaf<T> {
    /// Checks if the leaf loses to `other`: lower run wins first, smaller key wins within a run.
    pub fn loses_to(&self, other: &Leaf<T>) -> bool {
        match self.run.cmp(&other.run) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.key > other.key,
        }
    }
}

/// Tournament tree error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Tree construction parameter is out of range.
    InvalidArgument(String),
}

impl Error for TreeError {}

impl Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            TreeError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

/// Checks the number of tournament leaves, a tree needs at least one leaf.
pub fn check_leaves(k: usize) -> Result<(), TreeError> {
    if k == 0 {
        return Err(TreeError::InvalidArgument("leaves number must be positive".to_string()));
    }

    return Ok(());
}

/// Loser tree over `k` leaves.
///
/// Branches form an implicit complete binary tree: leaf `i` is node `i + k` and the parent of node `n`
/// is `n / 2`. `branch[0]` stores the overall winner, `branch[1..k]` the losers of the matches played
/// at the corresponding nodes. Each replay costs one comparison per tree level.
#[derive(Debug, Clone)]
pub struct TournamentTree<T> {
    branch: Vec<usize>,
    leaves: Vec<Leaf<T>>,
}

impl<T: Ord> TournamentTree<T> {
    /// Creates a tree of `k` leaves, priming leaf `i` with `source.next(i)` in descending leaf order.
    ///
    /// # Arguments
    /// * `k` - Number of leaves, must be positive
    /// * `source` - Source the leaves are primed from
    pub fn new<S>(k: usize, source: &mut S) -> Result<Self, TreeError>
    where
        S: Source<T> + ?Sized,
    {
        check_leaves(k)?;

        // run 0 sentinels beat every primed leaf, so primed leaves get parked as losers
        let mut tree = TournamentTree {
            branch: vec![0; k],
            leaves: Vec::from_iter((0..k).map(|_| Leaf { key: Key::Eof, run: 0 })),
        };

        for i in (0..k).rev() {
            tree.leaves[i] = Leaf {
                key: source.next(i).into(),
                run: 1,
            };
            tree.contest(i);
        }

        return Ok(tree);
    }

    /// Returns the index of the winner leaf.
    pub fn winner(&self) -> usize {
        self.branch[0]
    }

    /// Replays the matches on the path from leaf `i` to the root.
    /// Must be called after leaf `i` has been changed.
    pub fn contest(&mut self, mut i: usize) {
        let mut p = (i + self.leaves.len()) / 2;

        while p > 0 {
            let parked = self.branch[p];
            if self.leaves[i].loses_to(&self.leaves[parked]) {
                self.branch[p] = i;
                i = parked;
            }
            p /= 2;
        }

        self.branch[0] = i;
    }
}

impl<T> TournamentTree<T> {
    /// Returns leaves number.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns leaf `i`.
    pub fn leaf(&self, i: usize) -> &Leaf<T> {
        &self.leaves[i]
    }

    /// Returns leaf `i` for modification. [`TournamentTree::contest`] must be called afterwards.
    pub fn leaf_mut(&mut self, i: usize) -> &mut Leaf<T> {
        &mut self.leaves[i]
    }

    pub fn leaves(&self) -> &[Leaf<T>] {
        &self.leaves
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use rstest::*;

    use super::{check_leaves, Key, Leaf, TournamentTree, TreeError};

    fn tree_of(values: &[i32]) -> TournamentTree<i32> {
        let mut source = |i: usize| Some(values[i]);
        TournamentTree::new(values.len(), &mut source).unwrap()
    }

    #[test]
    fn test_zero_leaves() {
        let mut source = |_: usize| Some(1);
        let result = TournamentTree::<i32>::new(0, &mut source);

        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
        assert_eq!(result.unwrap_err(), check_leaves(0).unwrap_err());
        assert!(check_leaves(1).is_ok());
    }

    #[test]
    fn test_key_order() {
        assert!(Key::Value(i32::MAX) < Key::Eof);
        assert!(Key::Value(1) < Key::Value(2));
        assert_eq!(Key::from(None::<i32>), Key::Eof);
    }

    #[rstest]
    #[case(vec![7], 0)]
    #[case(vec![5, 3], 1)]
    #[case(vec![4, 8, 1], 2)]
    #[case(vec![9, 2, 7, 4, 6], 1)]
    #[case(vec![3, 3, 3, 3], 0)]
    fn test_initial_winner(#[case] values: Vec<i32>, #[case] expected_winner: usize) {
        let tree = tree_of(&values);

        assert_eq!(tree.winner(), expected_winner);
        assert_eq!(tree.winner(), expected_winner);
    }

    #[test]
    fn test_priming_order() {
        let mut primed = Vec::new();
        let mut source = |i: usize| {
            primed.push(i);
            Some(i)
        };
        TournamentTree::new(4, &mut source).unwrap();

        assert_eq!(primed, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_exhausted_leaves_lose() {
        let mut source = |i: usize| if i % 2 == 0 { None } else { Some(i) };
        let tree = TournamentTree::new(6, &mut source).unwrap();

        assert_eq!(tree.winner(), 1);
        assert_eq!(tree.leaf(0).key, Key::Eof);
    }

    #[test]
    fn test_lower_run_wins() {
        let mut tree = tree_of(&[1, 50, 60]);

        let winner = tree.winner();
        *tree.leaf_mut(winner) = Leaf {
            key: Key::Value(0),
            run: 2,
        };
        tree.contest(winner);
        assert_eq!(tree.winner(), 1);

        *tree.leaf_mut(1) = Leaf { key: Key::Eof, run: 3 };
        tree.contest(1);
        assert_eq!(tree.winner(), 2);

        *tree.leaf_mut(2) = Leaf { key: Key::Eof, run: 3 };
        tree.contest(2);
        assert_eq!(tree.winner(), 0);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(7)]
    #[case(16)]
    #[case(33)]
    fn test_random_contests(#[case] k: usize) {
        let mut rng = rand::thread_rng();
        let mut source = |_: usize| Some(rng.gen_range(0..100));
        let mut tree = TournamentTree::new(k, &mut source).unwrap();

        for _ in 0..500 {
            let winner = tree.winner();
            let best = tree
                .leaves()
                .iter()
                .map(|leaf| (leaf.run, leaf.key))
                .min()
                .unwrap();
            let actual = tree.leaf(winner);
            assert_eq!((actual.run, actual.key), best);

            *tree.leaf_mut(winner) = Leaf {
                key: if rng.gen_bool(0.1) {
                    Key::Eof
                } else {
                    Key::Value(rng.gen_range(0..100))
                },
                run: rng.gen_range(1..4),
            };
            tree.contest(winner);
        }
    }
}
