//! Loser tree merger.

use crate::sink::Sink;
use crate::source::Source;
use crate::tree::{Key, TournamentTree, TreeError};

/// Loser tree merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*k*) where *m* is the number of items and *k* is the number
/// of inputs.
pub struct RunMerger<T, S> {
    tree: TournamentTree<T>,
    source: S,
}

impl<T, S> RunMerger<T, S>
where
    T: Ord,
    S: Source<T>,
{
    /// Creates an instance of a merger over `k` inputs, leaf `i` is fed by `source.next(i)`.
    /// Input items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `k` - Number of inputs to be merged, must be positive
    /// * `source` - Inputs source
    pub fn new(k: usize, mut source: S) -> Result<Self, TreeError> {
        let tree = TournamentTree::new(k, &mut source)?;

        return Ok(RunMerger { tree, source });
    }

    /// Writes merged items to the sink. Returns the number of items written.
    pub fn merge_into<K>(&mut self, sink: &mut K) -> Result<usize, K::Error>
    where
        K: Sink<T>,
    {
        let mut count = 0;
        for item in self.by_ref() {
            sink.push(item)?;
            count += 1;
        }

        return Ok(count);
    }
}

impl<T, S> RunMerger<T, S> {
    /// Returns inputs number.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<T, S> Iterator for RunMerger<T, S>
where
    T: Ord,
    S: Source<T>,
{
    type Item = T;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        let winner = self.tree.winner();
        if self.tree.leaf(winner).key.is_eof() {
            return None;
        }

        let next = Key::from(self.source.next(winner));
        let result = std::mem::replace(&mut self.tree.leaf_mut(winner).key, next);
        self.tree.contest(winner);

        return result.into_value();
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::RunMerger;
    use crate::runs::RunBuilder;
    use crate::sink::RunCollector;
    use crate::source::{Sources, StreamSource};
    use crate::tree::TreeError;

    #[rstest]
    #[case(
        vec![
            vec![],
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![1, 4, 9],
            vec![2, 3],
            vec![5, 5, 8],
        ],
        vec![1, 2, 3, 4, 5, 5, 8, 9],
    )]
    #[case(
        vec![
            vec![4, 5, 7],
            vec![1, 6],
            vec![3],
            vec![],
        ],
        vec![1, 3, 4, 5, 6, 7],
    )]
    #[case(
        vec![
            vec![2, 2, 2],
            vec![2, 2],
        ],
        vec![2, 2, 2, 2, 2],
    )]
    fn test_merger(#[case] inputs: Vec<Vec<i32>>, #[case] expected_result: Vec<i32>) {
        let merger = RunMerger::new(inputs.len(), Sources::new(inputs)).unwrap();
        let actual_result = Vec::from_iter(merger);

        assert_eq!(actual_result, expected_result);
    }

    #[test]
    fn test_no_inputs() {
        let result = RunMerger::<i32, _>::new(0, Sources::new(Vec::<Vec<i32>>::new()));

        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
    }

    #[test]
    fn test_merger_fused() {
        let mut merger = RunMerger::new(2, Sources::new(vec![vec![1], vec![0]])).unwrap();

        assert_eq!(merger.next(), Some(0));
        assert_eq!(merger.next(), Some(1));
        assert_eq!(merger.next(), None);
        assert_eq!(merger.next(), None);
    }

    #[test]
    fn test_merge_into() {
        let inputs = vec![vec![10, 20], vec![15]];
        let mut merger = RunMerger::new(inputs.len(), Sources::new(inputs)).unwrap();
        let mut sink = Vec::new();

        assert_eq!(merger.merge_into(&mut sink).unwrap(), 3);
        assert_eq!(sink, vec![10, 15, 20]);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(8)]
    #[case(31)]
    fn test_random_merge(#[case] k: usize) {
        let mut rng = rand::thread_rng();
        let inputs = Vec::from_iter((0..k).map(|_| {
            let len = rng.gen_range(0..100);
            let mut input = Vec::from_iter((0..len).map(|_| rng.gen_range(-50..50)));
            input.sort();
            input
        }));

        let merger = RunMerger::new(k, Sources::new(inputs.clone())).unwrap();
        let actual_result = Vec::from_iter(merger);

        let mut expected_result = inputs.concat();
        expected_result.sort();
        assert_eq!(actual_result, expected_result);
    }

    #[rstest]
    #[case(vec![3, 1, 4, 1, 5, 9, 2, 6], 4)]
    #[case(Vec::from_iter((0..200).rev()), 7)]
    #[case(Vec::from_iter(0..50), 3)]
    fn test_round_trip(#[case] input: Vec<i32>, #[case] k: usize) {
        let mut builder = RunBuilder::new(k, StreamSource::new(input.clone())).unwrap();
        let mut runs = RunCollector::new();
        builder.write_runs(&mut runs).unwrap();
        let runs = runs.into_runs();

        let merger = RunMerger::new(runs.len(), Sources::new(runs)).unwrap();
        let actual_result = Vec::from_iter(merger);

        let mut expected_result = input;
        expected_result.sort();
        assert_eq!(actual_result, expected_result);
    }

    #[test]
    fn test_random_round_trip() {
        let mut input = Vec::from_iter((0..2000).map(|x| x % 300));
        input.shuffle(&mut rand::thread_rng());

        let mut builder = RunBuilder::new(16, StreamSource::new(input.clone())).unwrap();
        let mut runs = RunCollector::new();
        builder.write_runs(&mut runs).unwrap();
        let runs = runs.into_runs();

        // spare leaves stay exhausted
        let merger = RunMerger::new(runs.len() + 3, Sources::new(runs)).unwrap();
        let actual_result = Vec::from_iter(merger);

        input.sort();
        assert_eq!(actual_result, input);
    }
}
