//! Structured input map for one evaluation or update call

use super::Values;
use ndarray::Array2;

/// Which statistics pass a call belongs to. Collaborators that keep
/// separate train/test statistics (batch normalization and the like)
/// switch on this selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataId {
    Train,
    Test,
}

impl DataId {
    /// Numeric selector: 0 for the train-time pass, 1 for the test-time pass.
    pub fn index(self) -> usize {
        match self {
            DataId::Train => 0,
            DataId::Test => 1,
        }
    }
}

/// Target bindings for one call, one binding per target head.
///
/// A single-target network binds its one value array directly; a network
/// with several named targets gets each target zipped to its value array in
/// head order. Arrays are borrowed exactly as supplied by the data
/// provider, shapes untouched.
#[derive(Debug)]
pub enum FeedTargets<'a> {
    Single(&'a Array2<f32>),
    Multi(Vec<&'a Array2<f32>>),
}

impl<'a> FeedTargets<'a> {
    /// Zip target values into bindings following their tag.
    pub fn bind(values: &'a Values) -> Self {
        match values {
            Values::Single(a) => FeedTargets::Single(a),
            Values::Multi(heads) => FeedTargets::Multi(heads.iter().collect()),
        }
    }
}

/// The structured input map for one engine call.
#[derive(Debug)]
pub struct Feed<'a> {
    /// True for an optimizer update, false for an evaluation pass.
    pub training: bool,
    /// Whether dropout layers are active for this call.
    pub dropout: bool,
    /// Train-time vs test-time statistics selector.
    pub data_id: DataId,
    /// Input features, shape `(n, d_in)`.
    pub inputs: &'a Array2<f32>,
    /// Target bindings.
    pub targets: FeedTargets<'a>,
}

impl<'a> Feed<'a> {
    pub fn new(
        training: bool,
        dropout: bool,
        data_id: DataId,
        inputs: &'a Array2<f32>,
        targets: &'a Values,
    ) -> Self {
        Self {
            training,
            dropout,
            data_id,
            inputs,
            targets: FeedTargets::bind(targets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn multi_targets_zip_in_head_order() {
        let x = array![[0.0], [1.0]];
        let y = Values::Multi(vec![array![[1.0], [2.0]], array![[3.0], [4.0]]]);
        let feed = Feed::new(true, true, DataId::Train, &x, &y);
        match feed.targets {
            FeedTargets::Multi(heads) => {
                assert_eq!(heads.len(), 2);
                assert_eq!(heads[0][[0, 0]], 1.0);
                assert_eq!(heads[1][[1, 0]], 4.0);
            }
            FeedTargets::Single(_) => panic!("expected multi bindings"),
        }
    }

    #[test]
    fn single_target_binds_directly_with_exact_shape() {
        let x = array![[0.0, 1.0], [1.0, 2.0], [2.0, 3.0]];
        let y = Values::Single(array![[1.0, 9.0], [2.0, 8.0], [3.0, 7.0]]);
        let feed = Feed::new(false, false, DataId::Test, &x, &y);
        assert_eq!(feed.data_id.index(), 1);
        match feed.targets {
            FeedTargets::Single(a) => assert_eq!(a.shape(), &[3, 2]),
            FeedTargets::Multi(_) => panic!("expected single binding"),
        }
    }
}
